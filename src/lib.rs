//! Crash detection and emergency response pipeline.
//!
//! Watches an accelerometer stream for a collision-grade impact, runs an
//! operator-cancellable countdown, alerts the emergency contacts with the
//! incident location, and animates a simulated responder along a real
//! road route to the incident.
//!
//! The stages are plain types wired together in [`pipeline`]:
//!
//! - [`motion`]: g-force threshold classifier over raw samples
//! - [`countdown`]: the cancellable escalation timer
//! - [`sos`]: alert composition and per-contact delivery
//! - [`route`]: responder start point (POI lookup) + road routing
//! - [`animator`]: time-parameterized playback with heading look-ahead
//! - [`session`]: the one-dispatch-at-a-time session record
//!
//! External collaborators (sensor feed, contact store, SMS transport,
//! location fix, POI and routing backends) sit behind traits so the
//! pipeline is testable without a phone or a network.

pub mod animator;
pub mod config;
pub mod contacts;
pub mod coords;
pub mod countdown;
pub mod motion;
pub mod pipeline;
pub mod route;
pub mod session;
pub mod sos;

pub use config::Config;
pub use coords::{GeoPoint, IncidentLocation};
pub use motion::{AccelSample, ImpactEvent, MotionClassifier};
pub use session::SessionState;
