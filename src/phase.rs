//! Conversation phases derived from elapsed session time
//!
//! A session moves through introduction, task and conclusion. The phase is
//! never stored: it is recomputed from the session clock at the top of every
//! cycle, because the wall-clock length of a cycle depends on how long the
//! participant talks.

use std::fmt;
use std::time::{Duration, Instant};

/// Default end of the introduction phase
pub const DEFAULT_TASK_START: Duration = Duration::from_secs(30);

/// Default start of the conclusion phase
pub const DEFAULT_CONCLUSION_START: Duration = Duration::from_secs(300);

/// Stage of the scripted conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Phase {
    /// Robot introduces itself and the task
    Intro,
    /// Main task interaction
    Task,
    /// Robot wraps up and says goodbye
    Conclusion,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Intro => write!(f, "intro"),
            Self::Task => write!(f, "task"),
            Self::Conclusion => write!(f, "conclusion"),
        }
    }
}

/// Maps elapsed session time to a [`Phase`]
///
/// Thresholds are inclusive lower bounds: an elapsed time exactly equal to
/// `task_start` is already [`Phase::Task`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseClock {
    task_start: Duration,
    conclusion_start: Duration,
}

impl Default for PhaseClock {
    fn default() -> Self {
        Self {
            task_start: DEFAULT_TASK_START,
            conclusion_start: DEFAULT_CONCLUSION_START,
        }
    }
}

impl PhaseClock {
    /// Create a phase clock with custom thresholds
    ///
    /// # Errors
    ///
    /// Returns error unless `task_start < conclusion_start`
    pub fn new(task_start: Duration, conclusion_start: Duration) -> crate::Result<Self> {
        if task_start >= conclusion_start {
            return Err(crate::Error::Config(format!(
                "task phase must start before conclusion ({}s >= {}s)",
                task_start.as_secs_f64(),
                conclusion_start.as_secs_f64()
            )));
        }

        Ok(Self {
            task_start,
            conclusion_start,
        })
    }

    /// Phase for the given elapsed session time
    #[must_use]
    pub fn current_phase(&self, elapsed: Duration) -> Phase {
        if elapsed >= self.conclusion_start {
            Phase::Conclusion
        } else if elapsed >= self.task_start {
            Phase::Task
        } else {
            Phase::Intro
        }
    }
}

/// Source of elapsed session time
///
/// The orchestrator only ever asks "how long has this session been running",
/// which keeps phase decisions testable without sleeping.
pub trait SessionClock: Send + Sync {
    /// Time since the session started
    fn elapsed(&self) -> Duration;
}

/// Monotonic session clock started at construction
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    started: Instant,
}

impl MonotonicClock {
    /// Start a new clock now
    #[must_use]
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
        }
    }
}

impl SessionClock for MonotonicClock {
    fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

/// Latches the furthest phase reached in a session
///
/// [`PhaseClock::current_phase`] is already monotonic for a monotonic clock;
/// the tracker additionally guarantees that once the conclusion is reached
/// the session never reverts, even if thresholds or clocks misbehave.
#[derive(Debug, Clone, Copy)]
pub struct PhaseTracker {
    clock: PhaseClock,
    reached: Phase,
}

impl PhaseTracker {
    /// Create a tracker starting in [`Phase::Intro`]
    #[must_use]
    pub const fn new(clock: PhaseClock) -> Self {
        Self {
            clock,
            reached: Phase::Intro,
        }
    }

    /// Evaluate the phase for this cycle
    ///
    /// Returns the phase together with whether it changed since the last call.
    pub fn advance(&mut self, elapsed: Duration) -> (Phase, bool) {
        let computed = self.clock.current_phase(elapsed).max(self.reached);
        let changed = computed != self.reached;
        self.reached = computed;
        (computed, changed)
    }

    /// Furthest phase reached so far
    #[must_use]
    pub const fn reached(&self) -> Phase {
        self.reached
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(s: f64) -> Duration {
        Duration::from_secs_f64(s)
    }

    #[test]
    fn test_phase_boundaries() {
        let clock = PhaseClock::default();

        assert_eq!(clock.current_phase(secs(0.0)), Phase::Intro);
        assert_eq!(clock.current_phase(secs(29.999)), Phase::Intro);
        assert_eq!(clock.current_phase(secs(30.0)), Phase::Task);
        assert_eq!(clock.current_phase(secs(299.999)), Phase::Task);
        assert_eq!(clock.current_phase(secs(300.0)), Phase::Conclusion);
        assert_eq!(clock.current_phase(secs(10_000.0)), Phase::Conclusion);
    }

    #[test]
    fn test_custom_thresholds() {
        let clock = PhaseClock::new(Duration::from_secs(5), Duration::from_secs(10)).unwrap();

        assert_eq!(clock.current_phase(secs(4.9)), Phase::Intro);
        assert_eq!(clock.current_phase(secs(5.0)), Phase::Task);
        assert_eq!(clock.current_phase(secs(10.0)), Phase::Conclusion);
    }

    #[test]
    fn test_invalid_thresholds_rejected() {
        assert!(PhaseClock::new(Duration::from_secs(60), Duration::from_secs(60)).is_err());
        assert!(PhaseClock::new(Duration::from_secs(90), Duration::from_secs(60)).is_err());
    }

    #[test]
    fn test_phase_ordering() {
        assert!(Phase::Intro < Phase::Task);
        assert!(Phase::Task < Phase::Conclusion);
    }

    #[test]
    fn test_tracker_never_reverts_from_conclusion() {
        let mut tracker = PhaseTracker::new(PhaseClock::default());

        assert_eq!(tracker.advance(secs(1.0)), (Phase::Intro, false));
        assert_eq!(tracker.advance(secs(45.0)), (Phase::Task, true));
        assert_eq!(tracker.advance(secs(301.0)), (Phase::Conclusion, true));

        // A smaller elapsed value must not move the session backwards
        assert_eq!(tracker.advance(secs(2.0)), (Phase::Conclusion, false));
        assert_eq!(tracker.reached(), Phase::Conclusion);
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(Phase::Intro.to_string(), "intro");
        assert_eq!(Phase::Task.to_string(), "task");
        assert_eq!(Phase::Conclusion.to_string(), "conclusion");
    }
}
