use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebounceState<T> {
    Idle,
    Pending { deadline: Instant, value: T },
}

/// Holds at most one pending value; every new value restarts the quiet period.
#[derive(Debug, Clone)]
pub struct Debouncer<T> {
    quiet: Duration,
    state: DebounceState<T>,
}

impl<T: Copy> Debouncer<T> {
    pub fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            state: DebounceState::Idle,
        }
    }

    pub fn state(&self) -> DebounceState<T> {
        self.state
    }

    /// Replaces any pending value and returns the new deadline.
    pub fn schedule(&mut self, value: T, now: Instant) -> Instant {
        let deadline = now + self.quiet;
        self.state = DebounceState::Pending { deadline, value };
        deadline
    }

    pub fn cancel(&mut self) -> Option<T> {
        match std::mem::replace(&mut self.state, DebounceState::Idle) {
            DebounceState::Pending { value, .. } => Some(value),
            DebounceState::Idle => None,
        }
    }

    /// Takes the pending value once its deadline has passed.
    pub fn fire(&mut self, now: Instant) -> Option<T> {
        match self.state {
            DebounceState::Pending { deadline, value } if now >= deadline => {
                self.state = DebounceState::Idle;
                Some(value)
            }
            _ => None,
        }
    }

    pub fn pending(&self) -> Option<T> {
        match self.state {
            DebounceState::Pending { value, .. } => Some(value),
            DebounceState::Idle => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUIET: Duration = Duration::from_millis(5_000);

    #[test]
    fn fires_only_after_quiet_period() {
        let start = Instant::now();
        let mut d = Debouncer::new(QUIET);
        let deadline = d.schedule(10, start);
        assert_eq!(deadline, start + QUIET);

        assert_eq!(d.fire(start + Duration::from_millis(4_999)), None);
        assert_eq!(d.fire(deadline), Some(10));
        assert_eq!(d.state(), DebounceState::Idle);
        assert_eq!(d.fire(deadline + QUIET), None);
    }

    #[test]
    fn rescheduling_supersedes_and_restarts() {
        let start = Instant::now();
        let mut d = Debouncer::new(QUIET);
        d.schedule(10, start);
        let later = start + Duration::from_millis(3_000);
        let deadline = d.schedule(20, later);

        // the first deadline no longer fires
        assert_eq!(d.fire(start + QUIET), None);
        assert_eq!(d.pending(), Some(20));
        assert_eq!(d.fire(deadline), Some(20));
    }

    #[test]
    fn cancel_returns_to_idle() {
        let start = Instant::now();
        let mut d = Debouncer::new(QUIET);
        assert_eq!(d.cancel(), None);
        d.schedule(7, start);
        assert_eq!(d.cancel(), Some(7));
        assert_eq!(d.fire(start + QUIET), None);
    }
}
