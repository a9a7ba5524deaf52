use std::fmt;
use std::time::Duration;

use crate::contacts::Contact;
use crate::coords::{GeoPoint, IncidentLocation};

/// Fire-and-forget text send. No delivery receipt is modeled.
pub trait MessageTransport {
    fn send_text(&mut self, phone_number: &str, body: &str) -> Result<(), TransportError>;
}

#[derive(Debug, Clone)]
pub enum TransportError {
    SendFailed(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::SendFailed(msg) => write!(f, "send failed: {}", msg),
        }
    }
}

impl std::error::Error for TransportError {}

/// Single best-effort high-accuracy fix. Returns `None` when the
/// platform cannot produce one.
pub trait LocationFix {
    fn current_location(&self) -> impl std::future::Future<Output = Option<GeoPoint>> + Send;
}

/// Bounded single-shot location resolution.
///
/// Failure or timeout downgrades to the unknown sentinel and dispatch
/// proceeds; this fallback is the contract, not an error path.
pub async fn resolve_location<L: LocationFix>(fix: &L, timeout: Duration) -> IncidentLocation {
    match tokio::time::timeout(timeout, fix.current_location()).await {
        Ok(Some(point)) => IncidentLocation::known(point.lat, point.lon),
        Ok(None) => {
            log::warn!("location fix unavailable, dispatching with unknown location");
            IncidentLocation::unknown()
        }
        Err(_) => {
            log::warn!(
                "location fix timed out after {:?}, dispatching with unknown location",
                timeout
            );
            IncidentLocation::unknown()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SosError {
    /// Empty contact list; failing fast beats silently "succeeding"
    /// with zero messages.
    NoRecipients,
}

impl fmt::Display for SosError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SosError::NoRecipients => write!(f, "no emergency contacts to notify"),
        }
    }
}

impl std::error::Error for SosError {}

/// Aggregate outcome of one alert round. Partial failure is normal and
/// reported here, never escalated per-contact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    pub attempted: usize,
    pub delivered: usize,
    pub failed: usize,
}

/// Builds the alert body. Known location embeds a map link with the
/// literal coordinates; unknown uses the fixed fallback phrase.
pub fn compose_message(location: &IncidentLocation) -> String {
    if location.known {
        format!(
            "EMERGENCY! Crash detected. Location: http://maps.google.com/?q={},{}",
            location.point.lat, location.point.lon
        )
    } else {
        "EMERGENCY! Crash detected. GPS unavailable.".to_string()
    }
}

/// Sends the identical alert to every contact in order.
pub struct SosDispatcher<T: MessageTransport> {
    transport: T,
}

impl<T: MessageTransport> SosDispatcher<T> {
    pub fn new(transport: T) -> Self {
        SosDispatcher { transport }
    }

    /// One message per contact, in the given (priority) order. A failed
    /// send is logged and counted; the loop always continues to the
    /// remaining contacts.
    pub fn dispatch(
        &mut self,
        location: &IncidentLocation,
        contacts: &[Contact],
    ) -> Result<DispatchReport, SosError> {
        if contacts.is_empty() {
            return Err(SosError::NoRecipients);
        }

        let body = compose_message(location);
        let mut delivered = 0;
        let mut failed = 0;

        for contact in contacts {
            match self.transport.send_text(&contact.phone_number, &body) {
                Ok(()) => delivered += 1,
                Err(err) => {
                    failed += 1;
                    log::warn!("alert to {} ({}) failed: {}", contact.name, contact.id, err);
                }
            }
        }

        Ok(DispatchReport {
            attempted: contacts.len(),
            delivered,
            failed,
        })
    }

    pub fn into_transport(self) -> T {
        self.transport
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Transport that records every send and can be told to fail for
    /// specific phone numbers.
    #[derive(Default)]
    pub struct RecordingTransport {
        pub sent: Vec<(String, String)>,
        pub fail_numbers: Vec<String>,
    }

    impl MessageTransport for RecordingTransport {
        fn send_text(&mut self, phone_number: &str, body: &str) -> Result<(), TransportError> {
            if self.fail_numbers.iter().any(|n| n == phone_number) {
                return Err(TransportError::SendFailed("carrier rejected".to_string()));
            }
            self.sent.push((phone_number.to_string(), body.to_string()));
            Ok(())
        }
    }

    /// Fix that resolves instantly with a preset answer.
    pub struct FixedLocation(pub Option<GeoPoint>);

    impl LocationFix for FixedLocation {
        async fn current_location(&self) -> Option<GeoPoint> {
            self.0
        }
    }

    /// Fix that never resolves; exercises the timeout bound.
    pub struct HangingLocation;

    impl LocationFix for HangingLocation {
        async fn current_location(&self) -> Option<GeoPoint> {
            std::future::pending().await
        }
    }
}
