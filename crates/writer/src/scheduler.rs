//! Flush scheduler
//!
//! A single repeating deadline owned by the writer task. The task sleeps until
//! [`Scheduler::deadline`], asks [`Scheduler::tick`] whether to flush, and
//! calls [`Scheduler::reschedule`] once that flush has completed, so a tick
//! never overlaps a flush.
//!
//! ```text
//!          start                  tick, buffer empty
//! STOPPED ───────▶ SCHEDULED ───────────────────────▶ PAUSED
//!    ▲                 ▲                                 │
//!    │ stop            └────────── resume (append) ──────┘
//!    └──────────────── (from any state)
//! ```

use std::time::Duration;

use tokio::time::Instant;

/// Default flush interval
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleState {
    /// No timer; ticks are ignored
    Stopped,
    /// Running but idle; waits for new work
    Paused,
    /// Next tick is due at this instant
    Scheduled(Instant),
}

/// Cooperative flush timer
#[derive(Debug)]
pub struct Scheduler {
    interval: Duration,
    state: ScheduleState,
}

impl Scheduler {
    /// Create a stopped scheduler
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            state: ScheduleState::Stopped,
        }
    }

    #[inline]
    pub fn state(&self) -> ScheduleState {
        self.state
    }

    #[inline]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Whether the scheduler is scheduled or paused
    #[inline]
    pub fn is_running(&self) -> bool {
        self.state != ScheduleState::Stopped
    }

    /// When the next tick is due, if one is pending
    pub fn deadline(&self) -> Option<Instant> {
        match self.state {
            ScheduleState::Scheduled(at) => Some(at),
            _ => None,
        }
    }

    /// Start ticking, with the first tick due immediately
    pub fn start(&mut self, now: Instant) {
        self.state = ScheduleState::Scheduled(now);
    }

    /// Clear the pending timer
    ///
    /// Returns `false` if the scheduler was already stopped.
    pub fn stop(&mut self) -> bool {
        let was_running = self.is_running();
        self.state = ScheduleState::Stopped;
        was_running
    }

    /// Leave the paused state because new work arrived
    ///
    /// No-op unless paused: a stopped scheduler stays stopped until the
    /// connection is re-established.
    pub fn resume(&mut self, now: Instant) -> bool {
        if self.state == ScheduleState::Paused {
            self.state = ScheduleState::Scheduled(now + self.interval);
            return true;
        }
        false
    }

    /// Go idle if currently scheduled
    pub fn pause(&mut self) {
        if matches!(self.state, ScheduleState::Scheduled(_)) {
            self.state = ScheduleState::Paused;
        }
    }

    /// Handle a timer firing at `now`
    ///
    /// Returns `true` when a flush should run. An empty buffer pauses the
    /// scheduler instead of rescheduling.
    pub fn tick(&mut self, now: Instant, buffer_empty: bool) -> bool {
        match self.state {
            ScheduleState::Scheduled(at) if at <= now => {
                if buffer_empty {
                    self.state = ScheduleState::Paused;
                    false
                } else {
                    true
                }
            }
            _ => false,
        }
    }

    /// Schedule the next tick after a flush completed
    ///
    /// Only applies while scheduled; a flush that failed and stopped the
    /// scheduler, or one that paused it, stays that way.
    pub fn reschedule(&mut self, now: Instant) {
        if matches!(self.state, ScheduleState::Scheduled(_)) {
            self.state = ScheduleState::Scheduled(now + self.interval);
        }
    }
}
