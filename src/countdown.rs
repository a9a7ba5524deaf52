use std::fmt;
use std::time::Duration;
use tokio::time::{sleep_until, Instant};

/// Lifecycle of the escalation countdown. `Cancelled` and `Elapsed`
/// are terminal; there is no pause/resume and the timer does not
/// survive destruction of its owner.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimerState {
    Idle,
    Running,
    Cancelled,
    Elapsed,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CountdownEvent {
    Tick { remaining_ms: u64 },
    Elapsed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerError {
    /// `start` called on a timer that is not idle.
    AlreadyStarted,
    /// `cancel` called outside the running state.
    NotRunning,
}

impl fmt::Display for TimerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimerError::AlreadyStarted => write!(f, "countdown already started"),
            TimerError::NotRunning => write!(f, "countdown is not running"),
        }
    }
}

impl std::error::Error for TimerError {}

/// Cancellable escalation countdown.
///
/// Events are pulled by the owner via [`next_event`], which keeps the
/// no-delivery-after-cancel guarantee structural: once `cancel` flips the
/// state, `next_event` returns `None` forever, so a tick that was "due"
/// before cancellation can never be observed afterwards.
///
/// Ticks are best-effort: near the deadline the final tick is folded
/// into the single `Elapsed` event rather than delivered separately, so
/// consumers may see fewer than `duration / tick` ticks.
///
/// [`next_event`]: EscalationTimer::next_event
pub struct EscalationTimer {
    state: TimerState,
    deadline: Instant,
    tick: Duration,
    next_tick_at: Instant,
}

impl EscalationTimer {
    pub fn new() -> Self {
        let now = Instant::now();
        EscalationTimer {
            state: TimerState::Idle,
            deadline: now,
            tick: Duration::from_millis(0),
            next_tick_at: now,
        }
    }

    /// Idle → Running. Schedules the first tick one tick interval out.
    pub fn start(&mut self, duration_ms: u64, tick_ms: u64) -> Result<(), TimerError> {
        if self.state != TimerState::Idle {
            return Err(TimerError::AlreadyStarted);
        }
        let now = Instant::now();
        self.deadline = now + Duration::from_millis(duration_ms);
        self.tick = Duration::from_millis(tick_ms.max(1));
        self.next_tick_at = now + self.tick;
        self.state = TimerState::Running;
        Ok(())
    }

    /// Running → Cancelled. No further tick or elapsed event will be
    /// delivered after this returns.
    pub fn cancel(&mut self) -> Result<(), TimerError> {
        if self.state != TimerState::Running {
            return Err(TimerError::NotRunning);
        }
        self.state = TimerState::Cancelled;
        Ok(())
    }

    pub fn state(&self) -> TimerState {
        self.state
    }

    /// Milliseconds left, clamped at zero. For display only.
    pub fn remaining_ms(&self) -> u64 {
        if self.state != TimerState::Running {
            return 0;
        }
        self.deadline
            .saturating_duration_since(Instant::now())
            .as_millis() as u64
    }

    /// Wait for the next countdown event. Returns `None` once the timer
    /// is in a terminal state (or was never started).
    pub async fn next_event(&mut self) -> Option<CountdownEvent> {
        if self.state != TimerState::Running {
            return None;
        }

        if self.next_tick_at < self.deadline {
            let fire_at = self.next_tick_at;
            sleep_until(fire_at).await;
            self.next_tick_at = fire_at + self.tick;
            let remaining_ms = self
                .deadline
                .saturating_duration_since(fire_at)
                .as_millis() as u64;
            Some(CountdownEvent::Tick { remaining_ms })
        } else {
            sleep_until(self.deadline).await;
            self.state = TimerState::Elapsed;
            Some(CountdownEvent::Elapsed)
        }
    }
}

impl Default for EscalationTimer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn full_run_ticks_then_elapses_once() {
        let started = Instant::now();
        let mut timer = EscalationTimer::new();
        timer.start(5_000, 1_000).unwrap();

        let mut events = Vec::new();
        while let Some(event) = timer.next_event().await {
            events.push(event);
        }

        assert_eq!(
            events,
            vec![
                CountdownEvent::Tick { remaining_ms: 4_000 },
                CountdownEvent::Tick { remaining_ms: 3_000 },
                CountdownEvent::Tick { remaining_ms: 2_000 },
                CountdownEvent::Tick { remaining_ms: 1_000 },
                CountdownEvent::Elapsed,
            ]
        );
        assert_eq!(timer.state(), TimerState::Elapsed);
        // Elapsed fires at or after the full duration.
        assert!(started.elapsed() >= Duration::from_millis(5_000));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_suppresses_everything_after_it() {
        let mut timer = EscalationTimer::new();
        timer.start(5_000, 1_000).unwrap();

        // Consume two ticks (2000 ms in), then the operator cancels.
        assert!(matches!(
            timer.next_event().await,
            Some(CountdownEvent::Tick { remaining_ms: 4_000 })
        ));
        assert!(matches!(
            timer.next_event().await,
            Some(CountdownEvent::Tick { remaining_ms: 3_000 })
        ));
        timer.cancel().unwrap();

        assert_eq!(timer.next_event().await, None);
        assert_eq!(timer.next_event().await, None);
        assert_eq!(timer.state(), TimerState::Cancelled);
        assert_eq!(timer.remaining_ms(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn truncated_final_tick_near_deadline() {
        let mut timer = EscalationTimer::new();
        // 2500 / 1000: two ticks fit, the partial third folds into Elapsed.
        timer.start(2_500, 1_000).unwrap();

        let mut ticks = 0;
        let mut elapsed = 0;
        while let Some(event) = timer.next_event().await {
            match event {
                CountdownEvent::Tick { .. } => ticks += 1,
                CountdownEvent::Elapsed => elapsed += 1,
            }
        }
        assert_eq!(ticks, 2);
        assert_eq!(elapsed, 1);
    }

    #[tokio::test]
    async fn state_machine_guards() {
        let mut timer = EscalationTimer::new();
        assert_eq!(timer.cancel(), Err(TimerError::NotRunning));

        timer.start(1_000, 100).unwrap();
        assert_eq!(timer.start(1_000, 100), Err(TimerError::AlreadyStarted));

        timer.cancel().unwrap();
        assert_eq!(timer.cancel(), Err(TimerError::NotRunning));
        // Terminal states never restart.
        assert_eq!(timer.start(1_000, 100), Err(TimerError::AlreadyStarted));
    }

    #[tokio::test(start_paused = true)]
    async fn never_started_yields_no_events() {
        let mut timer = EscalationTimer::new();
        assert_eq!(timer.next_event().await, None);
        assert_eq!(timer.state(), TimerState::Idle);
    }
}
