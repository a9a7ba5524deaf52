/// Calibrated constants for the detection → countdown → dispatch pipeline.
///
/// Defaults match the shipped tuning: a single 5 g sample trips the
/// classifier, the countdown runs 5 seconds with 1-second ticks, and
/// the responder travels at an assumed 50 km/h.
#[derive(Clone, Debug)]
pub struct Config {
    /// Impact threshold in g. Not auto-tuned.
    pub crash_threshold_g: f64,
    /// Countdown before automatic escalation, milliseconds.
    pub countdown_ms: u64,
    /// Countdown tick cadence, milliseconds.
    pub countdown_tick_ms: u64,
    /// Upper bound on the single-shot location fix, milliseconds.
    pub location_fix_timeout_ms: u64,
    /// Assumed responder travel speed for ETA, km/h.
    pub assumed_speed_kmh: f64,
    /// POI category searched for the responder start point.
    pub poi_category: String,
    /// Max POI results per lookup.
    pub poi_max_results: usize,
    /// POI search radius, degrees.
    pub poi_radius_deg: f64,
    /// Synthetic start offset when the POI lookup yields nothing, degrees.
    pub fallback_offset_deg: f64,
    /// Minimum look-ahead distance for heading computation, meters.
    pub look_ahead_m: f64,
    /// Animation frame cadence, milliseconds (~60 fps).
    pub frame_interval_ms: u64,
    /// Delay between arrival and the idle-state reset, milliseconds.
    pub arrival_grace_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            crash_threshold_g: 5.0,
            countdown_ms: 5_000,
            countdown_tick_ms: 1_000,
            location_fix_timeout_ms: 10_000,
            assumed_speed_kmh: 50.0,
            poi_category: "hospital".to_string(),
            poi_max_results: 10,
            poi_radius_deg: 0.1,
            fallback_offset_deg: 0.01,
            look_ahead_m: 8.0,
            frame_interval_ms: 16,
            arrival_grace_ms: 10_000,
        }
    }
}
