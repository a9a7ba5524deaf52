use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::route::Route;

/// The single mutable record of one active responder animation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DispatchRun {
    pub route: Route,
    pub duration_ms: u64,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub active: bool,
}

/// Cross-screen payload from the detection/escalation pipeline to the
/// visualization layer. May be re-delivered by the platform; consumption
/// is idempotent.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DispatchTrigger {
    pub triggered: bool,
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// A second concurrent dispatch is rejected, never queued.
    DispatchAlreadyActive,
    /// `active == true` must imply a playable route.
    EmptyRoute,
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::DispatchAlreadyActive => write!(f, "ambulance is already en route"),
            SessionError::EmptyRoute => write!(f, "cannot dispatch along an empty route"),
        }
    }
}

impl std::error::Error for SessionError {}

/// What the visual layer should do when it comes back.
#[derive(Debug, Clone, PartialEq)]
pub enum ResumeAction {
    /// Re-seed the animator at the persisted elapsed offset.
    Restart { duration_ms: u64, elapsed_ms: u64 },
    /// The run finished while suspended; take the idle-reset path
    /// instead of replaying the final frame.
    AlreadyArrived,
    /// Nothing was in flight.
    Idle,
}

/// Session-scoped dispatch state. Created with the user session,
/// destroyed at logout; explicitly owned and passed to whoever needs it
/// rather than living in an ambient singleton.
///
/// Holds at most one [`DispatchRun`] and the pending cross-screen
/// trigger. Must only be mutated from the foreground context.
#[derive(Default)]
pub struct SessionState {
    run: Option<DispatchRun>,
    pending: Option<DispatchTrigger>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.run.as_ref().map(|r| r.active).unwrap_or(false)
    }

    pub fn active_run(&self) -> Option<&DispatchRun> {
        self.run.as_ref().filter(|r| r.active)
    }

    /// Start a new dispatch. Rejected while one is active; the caller
    /// surfaces the error text as user feedback.
    pub fn begin_dispatch(
        &mut self,
        route: Route,
        duration_ms: u64,
    ) -> Result<&DispatchRun, SessionError> {
        if self.is_active() {
            return Err(SessionError::DispatchAlreadyActive);
        }
        if route.points.is_empty() {
            return Err(SessionError::EmptyRoute);
        }

        Ok(self.run.insert(DispatchRun {
            route,
            duration_ms,
            started_at: Utc::now(),
            elapsed_ms: 0,
            active: true,
        }))
    }

    /// Capture progress when the visual layer is suspended.
    pub fn suspend(&mut self, elapsed_ms: u64) {
        if let Some(run) = self.run.as_mut() {
            if run.active {
                run.elapsed_ms = elapsed_ms;
            }
        }
    }

    /// Decide how to restore the visual layer.
    pub fn resume(&self) -> ResumeAction {
        match self.active_run() {
            Some(run) if run.elapsed_ms >= run.duration_ms => ResumeAction::AlreadyArrived,
            Some(run) => ResumeAction::Restart {
                duration_ms: run.duration_ms,
                elapsed_ms: run.elapsed_ms,
            },
            None => ResumeAction::Idle,
        }
    }

    /// Clear the run after arrival (post grace delay) or reset.
    pub fn finish_dispatch(&mut self) {
        self.run = None;
    }

    /// Accept a cross-screen trigger. Non-triggered payloads are
    /// ignored; a trigger arriving while a dispatch is active is
    /// rejected (re-delivery must not restart an active run).
    pub fn deliver_trigger(&mut self, trigger: DispatchTrigger) {
        if !trigger.triggered {
            return;
        }
        if self.is_active() {
            log::info!("trigger ignored, dispatch already active");
            return;
        }
        self.pending = Some(trigger);
    }

    /// Consume the pending trigger, if any. Clearing on read makes
    /// repeated platform delivery of the same payload a no-op.
    pub fn take_pending(&mut self) -> Option<DispatchTrigger> {
        self.pending.take()
    }
}
