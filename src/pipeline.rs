use std::time::Duration;

use tokio::sync::mpsc::Receiver;

use crate::animator::{DispatchAnimator, RoutePlayback};
use crate::config::Config;
use crate::contacts::Contact;
use crate::coords::{GeoPoint, IncidentLocation};
use crate::countdown::{CountdownEvent, EscalationTimer};
use crate::motion::ImpactEvent;
use crate::route::{PoiLookup, ResolvedRoute, RouteProvider, RoutingBackend};
use crate::session::{DispatchTrigger, SessionError, SessionState};
use crate::sos::{
    resolve_location, DispatchReport, LocationFix, MessageTransport, SosDispatcher, SosError,
};

/// Transient, non-blocking user feedback (the Toast/speech layer of the
/// hosting app). Never modal, never fatal.
pub trait NoticeSink {
    fn notice(&mut self, text: &str);
}

/// Notices routed to the log, for headless runs.
pub struct LogNotices;

impl NoticeSink for LogNotices {
    fn notice(&mut self, text: &str) {
        log::info!("{}", text);
    }
}

/// Incident coordinate used when the trigger carries the unknown
/// sentinel and no live fix is available.
pub const DEFAULT_INCIDENT: GeoPoint = GeoPoint {
    lat: 44.4268,
    lon: 26.1025,
};

#[derive(Debug)]
pub enum PipelineOutcome {
    /// Operator cancelled during the countdown; nothing downstream ran.
    Cancelled,
    /// Countdown elapsed: contacts were alerted and a dispatch trigger
    /// was handed to the session.
    Escalated {
        location: IncidentLocation,
        report: Result<DispatchReport, SosError>,
    },
}

/// Detection → countdown → alert pipeline, composed of typed async
/// stages. The whole response is one future: cancelling the countdown
/// returns before any downstream stage starts, and dropping the future
/// cancels whichever stage is in flight together with everything after
/// it.
pub struct EmergencyPipeline<L: LocationFix, T: MessageTransport> {
    config: Config,
    location: L,
    dispatcher: SosDispatcher<T>,
}

impl<L: LocationFix, T: MessageTransport> EmergencyPipeline<L, T> {
    pub fn new(config: Config, location: L, transport: T) -> Self {
        EmergencyPipeline {
            config,
            location,
            dispatcher: SosDispatcher::new(transport),
        }
    }

    /// Run the cancellable countdown, then escalate.
    ///
    /// `cancel` is the operator's abort channel; a message on it while
    /// the countdown runs aborts the whole response. After escalation
    /// the trigger payload is delivered into `session` for the visual
    /// layer to pick up.
    pub async fn respond_to_impact<N: NoticeSink>(
        &mut self,
        impact: &ImpactEvent,
        contacts: &[Contact],
        cancel: &mut Receiver<()>,
        session: &mut SessionState,
        notices: &mut N,
    ) -> PipelineOutcome {
        log::warn!("impact at {:.1} g, starting countdown", impact.g_force);

        let mut timer = EscalationTimer::new();
        if timer
            .start(self.config.countdown_ms, self.config.countdown_tick_ms)
            .is_err()
        {
            // Fresh timer, cannot happen; treated as already escalated.
            log::error!("countdown failed to start");
        }

        let cancelled = loop {
            tokio::select! {
                event = timer.next_event() => match event {
                    Some(CountdownEvent::Tick { remaining_ms }) => {
                        notices.notice(&format!("Sending SOS in {}", remaining_ms / 1000));
                    }
                    Some(CountdownEvent::Elapsed) | None => break false,
                },
                _ = cancel.recv() => break true,
            }
        };

        if cancelled {
            let _ = timer.cancel();
            notices.notice("Alert Cancelled");
            return PipelineOutcome::Cancelled;
        }

        let (location, report) = self.escalate(contacts, notices).await;

        session.deliver_trigger(DispatchTrigger {
            triggered: true,
            lat: location.point.lat,
            lon: location.point.lon,
        });

        PipelineOutcome::Escalated { location, report }
    }

    /// Post-countdown stage: bounded location fix, then the alert round.
    async fn escalate<N: NoticeSink>(
        &mut self,
        contacts: &[Contact],
        notices: &mut N,
    ) -> (IncidentLocation, Result<DispatchReport, SosError>) {
        let timeout = Duration::from_millis(self.config.location_fix_timeout_ms);
        let location = resolve_location(&self.location, timeout).await;

        let report = self.dispatcher.dispatch(&location, contacts);
        match &report {
            Ok(report) if report.failed == 0 => notices.notice("SOS SENT!"),
            Ok(report) => {
                notices.notice(&format!(
                    "SOS sent to {} of {} contacts",
                    report.delivered, report.attempted
                ));
            }
            Err(SosError::NoRecipients) => notices.notice("No contacts to call!"),
        }

        (location, report)
    }
}

/// Visual-layer entry point: consume the pending trigger, resolve the
/// route and register the dispatch run.
///
/// Returns the resolved route for the animator, or `None` when there was
/// no trigger or the session rejected the start (already active). The
/// rejection surfaces as a notice; a repeat trigger is user feedback,
/// not a queued second run.
pub async fn launch_dispatch<P: PoiLookup, R: RoutingBackend, N: NoticeSink>(
    session: &mut SessionState,
    routes: &RouteProvider<P, R>,
    notices: &mut N,
) -> Option<ResolvedRoute> {
    let trigger = session.take_pending()?;

    let incident = if trigger.lat != 0.0 || trigger.lon != 0.0 {
        GeoPoint::new(trigger.lat, trigger.lon)
    } else {
        // Unknown-location sentinel: fall back to the configured default
        // so the simulation still has somewhere to route to.
        DEFAULT_INCIDENT
    };

    notices.notice("Help is on the way. Calculating route from nearest hospital.");
    let resolved = routes.resolve_route(incident).await;

    match session.begin_dispatch(resolved.route.clone(), resolved.duration_ms) {
        Ok(_) => {
            notices.notice(&format!("Ambulance dispatched. ETA: {}", resolved.eta));
            Some(resolved)
        }
        Err(err @ SessionError::DispatchAlreadyActive) => {
            notices.notice(&err.to_string());
            None
        }
        Err(err) => {
            log::warn!("dispatch not started: {}", err);
            None
        }
    }
}

/// Build the animator for a (possibly resumed) dispatch run.
pub fn animator_for(
    resolved: &ResolvedRoute,
    config: &Config,
) -> Result<DispatchAnimator, crate::animator::AnimatorError> {
    let playback = RoutePlayback::new(&resolved.route, resolved.duration_ms, config.look_ahead_m)?;
    Ok(DispatchAnimator::new(playback, config.frame_interval_ms))
}

/// Arrival epilogue: announce, hold the terminal frame for the grace
/// delay, then clear the run so the session returns to idle.
pub async fn settle_arrival<N: NoticeSink>(
    session: &mut SessionState,
    notices: &mut N,
    grace_ms: u64,
) {
    notices.notice("Ambulance Arrived!");
    tokio::time::sleep(Duration::from_millis(grace_ms)).await;
    session.finish_dispatch();
}
