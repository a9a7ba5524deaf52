use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval, Instant, MissedTickBehavior};

use crate::coords::GeoPoint;
use crate::route::Route;

/// One rendered animation frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Frame {
    pub position: GeoPoint,
    /// Degrees, 0 = north.
    pub heading_deg: f64,
    /// Linear progress in [0, 1].
    pub t: f64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnimatorError {
    EmptyRoute,
}

impl fmt::Display for AnimatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnimatorError::EmptyRoute => write!(f, "route has no points to animate"),
        }
    }
}

impl std::error::Error for AnimatorError {}

/// Time-parameterized playback over a route poly-line.
///
/// Progress is linear (no easing): `t = clamp(elapsed / duration, 0, 1)`
/// maps to a fractional index into the point sequence, with lat/lon
/// interpolated between the neighboring points. Heading looks ahead to
/// the first point more than `look_ahead_m` away from the interpolated
/// position; interpolating bearing between near-coincident
/// high-resolution points would jitter. Past the last such point the
/// heading holds its previous value.
///
/// `frame_at` is a pure function of elapsed time (plus the held
/// heading), which is what makes mid-flight restoration exact: resuming
/// from a persisted elapsed produces the same position an uninterrupted
/// run would have reached.
pub struct RoutePlayback {
    points: Vec<GeoPoint>,
    duration_ms: u64,
    look_ahead_m: f64,
}

impl RoutePlayback {
    pub fn new(route: &Route, duration_ms: u64, look_ahead_m: f64) -> Result<Self, AnimatorError> {
        if route.points.is_empty() {
            return Err(AnimatorError::EmptyRoute);
        }
        Ok(RoutePlayback {
            points: route.points.clone(),
            duration_ms,
            look_ahead_m,
        })
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    fn progress(&self, elapsed_ms: u64) -> f64 {
        if self.duration_ms == 0 {
            return 1.0;
        }
        (elapsed_ms as f64 / self.duration_ms as f64).clamp(0.0, 1.0)
    }

    /// Frame for a given elapsed time. `last_heading` is returned
    /// unchanged when no look-ahead candidate remains.
    pub fn frame_at(&self, elapsed_ms: u64, last_heading: f64) -> Frame {
        let t = self.progress(elapsed_ms);
        let last_index = self.points.len() - 1;

        let exact_index = t * last_index as f64;
        let index = exact_index.floor() as usize;
        let next_index = (index + 1).min(last_index);
        let segment_t = exact_index - index as f64;

        let position = self.points[index].lerp(&self.points[next_index], segment_t);

        let mut heading_deg = last_heading;
        for candidate in &self.points[next_index..] {
            if position.distance_m(candidate) > self.look_ahead_m {
                heading_deg = position.bearing_to(candidate);
                break;
            }
        }

        Frame {
            position,
            heading_deg,
            t,
        }
    }
}

/// Where frames go. `is_live` is consulted before every write so a torn
/// down surface stops the loop instead of crashing it.
pub trait FrameSink {
    fn is_live(&self) -> bool;
    fn draw(&mut self, frame: &Frame);
}

/// Why the animation loop returned.
#[derive(Debug, Clone, PartialEq)]
pub enum AnimatorExit {
    /// Progress reached 1.0; emitted exactly once.
    Arrived,
    /// The sink reported itself gone; elapsed was captured for resume.
    SinkGone { elapsed_ms: u64 },
    /// Externally halted (screen teardown); elapsed captured for resume.
    Halted { elapsed_ms: u64 },
}

/// Cooperative halt flag shared with the hosting screen. Checked at the
/// top of every frame callback.
pub type HaltFlag = Arc<AtomicBool>;

pub fn halt_flag() -> HaltFlag {
    Arc::new(AtomicBool::new(false))
}

/// Drives [`RoutePlayback`] on a fixed frame cadence.
pub struct DispatchAnimator {
    playback: RoutePlayback,
    frame_interval: Duration,
    last_heading: f64,
}

impl DispatchAnimator {
    pub fn new(playback: RoutePlayback, frame_interval_ms: u64) -> Self {
        DispatchAnimator {
            playback,
            frame_interval: Duration::from_millis(frame_interval_ms.max(1)),
            last_heading: 0.0,
        }
    }

    pub fn playback(&self) -> &RoutePlayback {
        &self.playback
    }

    /// Run until arrival, halt, or sink teardown. `start_offset_ms`
    /// seeds progress when restoring a suspended dispatch; pass 0 for a
    /// fresh start. Arrival is returned (not drawn repeatedly) so the
    /// caller reacts exactly once.
    pub async fn run<S: FrameSink>(
        &mut self,
        sink: &mut S,
        start_offset_ms: u64,
        halt: &HaltFlag,
    ) -> AnimatorExit {
        let started = Instant::now();
        let mut frames = interval(self.frame_interval);
        frames.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            frames.tick().await;
            let elapsed_ms = start_offset_ms + started.elapsed().as_millis() as u64;

            if halt.load(Ordering::Acquire) {
                return AnimatorExit::Halted { elapsed_ms };
            }
            if !sink.is_live() {
                return AnimatorExit::SinkGone { elapsed_ms };
            }

            let frame = self.playback.frame_at(elapsed_ms, self.last_heading);
            self.last_heading = frame.heading_deg;
            sink.draw(&frame);

            if frame.t >= 1.0 {
                return AnimatorExit::Arrived;
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Sink that records frames and can be torn down after a set count.
    pub struct RecordingSink {
        pub frames: Vec<Frame>,
        pub die_after: Option<usize>,
    }

    impl RecordingSink {
        pub fn new() -> Self {
            RecordingSink {
                frames: Vec::new(),
                die_after: None,
            }
        }
    }

    impl FrameSink for RecordingSink {
        fn is_live(&self) -> bool {
            match self.die_after {
                Some(n) => self.frames.len() < n,
                None => true,
            }
        }

        fn draw(&mut self, frame: &Frame) {
            self.frames.push(*frame);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::RecordingSink;
    use super::*;
    use crate::route::testing::straight_route;
    use approx::assert_relative_eq;

    fn eastbound_route() -> Route {
        // ~7.9 km of uniformly spaced points heading due east.
        straight_route(
            GeoPoint::new(44.4268, 26.0),
            GeoPoint::new(44.4268, 26.1),
            101,
            7.9,
        )
    }

    #[test]
    fn start_midpoint_and_end_positions() {
        let route = eastbound_route();
        let playback = RoutePlayback::new(&route, 10_000, 8.0).unwrap();

        let start = playback.frame_at(0, 0.0);
        assert_eq!(start.position, route.points[0]);
        assert_relative_eq!(start.t, 0.0);

        let mid = playback.frame_at(5_000, 0.0);
        assert_relative_eq!(mid.position.lat, 44.4268, epsilon = 1e-9);
        assert_relative_eq!(mid.position.lon, 26.05, epsilon = 1e-6);

        let end = playback.frame_at(10_000, 0.0);
        assert_eq!(end.position, *route.points.last().unwrap());
        assert_relative_eq!(end.t, 1.0);

        // Past the duration it clamps, no overshoot.
        let past = playback.frame_at(99_000, 0.0);
        assert_eq!(past.position, end.position);
    }

    #[test]
    fn heading_points_along_the_route() {
        let playback = RoutePlayback::new(&eastbound_route(), 10_000, 8.0).unwrap();
        let frame = playback.frame_at(2_500, 0.0);
        // Due east.
        assert_relative_eq!(frame.heading_deg, 90.0, epsilon = 1.0);
    }

    #[test]
    fn heading_holds_when_no_lookahead_candidate_remains() {
        let playback = RoutePlayback::new(&eastbound_route(), 10_000, 8.0).unwrap();
        let at_end = playback.frame_at(10_000, 87.3);
        // Every remaining point is within the look-ahead radius (there
        // are none beyond the last), so the previous heading survives.
        assert_relative_eq!(at_end.heading_deg, 87.3);
    }

    #[test]
    fn lookahead_skips_near_coincident_points() {
        // Dense cluster at the start, then a far point to the north.
        let mut points: Vec<GeoPoint> = (0..10)
            .map(|i| GeoPoint::new(44.0 + i as f64 * 1e-7, 26.0))
            .collect();
        points.push(GeoPoint::new(44.01, 26.0));
        let route = Route {
            points,
            length_km: 1.1,
            status: crate::route::RouteStatus::Ok,
        };
        let playback = RoutePlayback::new(&route, 10_000, 8.0).unwrap();

        let frame = playback.frame_at(0, 0.0);
        // Bearing to the distant point, not to a sub-meter neighbor.
        assert_relative_eq!(frame.heading_deg, 0.0, epsilon = 1.0);
    }

    #[test]
    fn resume_matches_uninterrupted_run() {
        let playback = RoutePlayback::new(&eastbound_route(), 60_000, 8.0).unwrap();
        for elapsed in [0u64, 7_000, 23_500, 42_000, 60_000] {
            let uninterrupted = playback.frame_at(elapsed, 0.0);
            let resumed = playback.frame_at(elapsed, 0.0);
            assert_eq!(uninterrupted.position, resumed.position);
            assert_relative_eq!(uninterrupted.t, resumed.t);
        }
    }

    #[test]
    fn empty_route_is_rejected() {
        let route = Route {
            points: vec![],
            length_km: 0.0,
            status: crate::route::RouteStatus::Error,
        };
        assert!(matches!(
            RoutePlayback::new(&route, 1_000, 8.0),
            Err(AnimatorError::EmptyRoute)
        ));
    }

    #[test]
    fn single_point_route_arrives_in_place() {
        let route = Route {
            points: vec![GeoPoint::new(44.0, 26.0)],
            length_km: 0.0,
            status: crate::route::RouteStatus::Error,
        };
        let playback = RoutePlayback::new(&route, 0, 8.0).unwrap();
        let frame = playback.frame_at(0, 0.0);
        assert_relative_eq!(frame.t, 1.0);
        assert_eq!(frame.position, route.points[0]);
    }

    #[tokio::test(start_paused = true)]
    async fn run_arrives_exactly_once() {
        let playback = RoutePlayback::new(&eastbound_route(), 1_000, 8.0).unwrap();
        let mut animator = DispatchAnimator::new(playback, 16);
        let mut sink = RecordingSink::new();
        let halt = halt_flag();

        let exit = animator.run(&mut sink, 0, &halt).await;
        assert_eq!(exit, AnimatorExit::Arrived);

        // Exactly one terminal frame at t == 1.0.
        let terminal = sink.frames.iter().filter(|f| f.t >= 1.0).count();
        assert_eq!(terminal, 1);
        // First frame is the route start.
        assert_relative_eq!(sink.frames[0].t, 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn run_stops_cleanly_when_sink_dies() {
        let playback = RoutePlayback::new(&eastbound_route(), 60_000, 8.0).unwrap();
        let mut animator = DispatchAnimator::new(playback, 16);
        let mut sink = RecordingSink::new();
        sink.die_after = Some(10);
        let halt = halt_flag();

        let exit = animator.run(&mut sink, 0, &halt).await;
        match exit {
            AnimatorExit::SinkGone { elapsed_ms } => {
                // Ten frames at 16 ms, give or take scheduler slack.
                assert!(elapsed_ms >= 10 * 16 && elapsed_ms < 60_000);
            }
            other => panic!("expected SinkGone, got {:?}", other),
        }
        assert_eq!(sink.frames.len(), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn run_halts_and_reports_elapsed() {
        let playback = RoutePlayback::new(&eastbound_route(), 60_000, 8.0).unwrap();
        let mut animator = DispatchAnimator::new(playback, 16);
        let mut sink = RecordingSink::new();
        let halt = halt_flag();
        halt.store(true, Ordering::Release);

        let exit = animator.run(&mut sink, 5_000, &halt).await;
        match exit {
            AnimatorExit::Halted { elapsed_ms } => assert!(elapsed_ms >= 5_000),
            other => panic!("expected Halted, got {:?}", other),
        }
        // Halt is checked before the draw; nothing was written.
        assert!(sink.frames.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn run_resumes_from_offset() {
        let playback = RoutePlayback::new(&eastbound_route(), 1_000, 8.0).unwrap();
        let expected_first = playback.frame_at(500, 0.0);

        let mut animator = DispatchAnimator::new(playback, 16);
        let mut sink = RecordingSink::new();
        let halt = halt_flag();

        animator.run(&mut sink, 500, &halt).await;
        // Seeded at the persisted elapsed, not restarted from zero.
        assert_eq!(sink.frames[0].position, expected_first.position);
        assert!(sink.frames[0].t >= 0.5);
    }
}
