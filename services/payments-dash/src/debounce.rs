// services/payments-dash/src/debounce.rs
//
// Single-timer debounce between the search box and the shared search filter

use std::time::{Duration, Instant};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    Idle,
    Armed(Instant),
}

/// Timer handle that is cancelled and re-armed on every input event.
///
/// Time is always passed in by the caller, so the same state machine works
/// under any event loop and in tests without sleeping.
#[derive(Debug, Clone)]
pub struct Debouncer {
    delay: Duration,
    state: TimerState,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            state: TimerState::Idle,
        }
    }

    pub fn state(&self) -> TimerState {
        self.state
    }

    /// Cancel any pending deadline and start a fresh one from `now`.
    pub fn rearm(&mut self, now: Instant) {
        self.state = TimerState::Armed(now + self.delay);
    }

    /// Returns true exactly once per armed period, when its deadline has passed.
    pub fn fire_if_due(&mut self, now: Instant) -> bool {
        match self.state {
            TimerState::Armed(deadline) if now >= deadline => {
                self.state = TimerState::Idle;
                true
            }
            _ => false,
        }
    }

    /// Time left until the deadline, for sizing the event-poll timeout.
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        match self.state {
            TimerState::Armed(deadline) => Some(deadline.saturating_duration_since(now)),
            TimerState::Idle => None,
        }
    }
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}

/// Search box text plus the timer that syncs it into the shared search filter.
#[derive(Debug, Clone)]
pub struct SearchInput {
    pending: String,
    timer: Debouncer,
}

impl SearchInput {
    pub fn new(initial: &str, delay: Duration) -> Self {
        Self {
            pending: initial.to_string(),
            timer: Debouncer::new(delay),
        }
    }

    pub fn pending(&self) -> &str {
        &self.pending
    }

    pub fn timer(&self) -> &Debouncer {
        &self.timer
    }

    /// Replace the box contents. Never triggers a fetch by itself.
    pub fn set_pending(&mut self, value: &str, now: Instant) {
        if self.pending != value {
            self.pending = value.to_string();
        }
        self.timer.rearm(now);
    }

    pub fn push(&mut self, c: char, now: Instant) {
        self.pending.push(c);
        self.timer.rearm(now);
    }

    pub fn pop(&mut self, now: Instant) {
        if self.pending.pop().is_some() {
            self.timer.rearm(now);
        }
    }

    pub fn clear(&mut self, now: Instant) {
        if !self.pending.is_empty() {
            self.pending.clear();
            self.timer.rearm(now);
        }
    }

    /// Value to commit to the shared search filter, if the timer just elapsed
    /// and the box differs from `committed`.
    pub fn poll(&mut self, committed: &str, now: Instant) -> Option<String> {
        if self.timer.fire_if_due(now) && self.pending != committed {
            return Some(self.pending.clone());
        }
        None
    }

    pub fn awaiting_sync(&self, committed: &str) -> bool {
        self.pending != committed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_debouncer_fires_once_after_deadline() {
        let t0 = Instant::now();
        let mut timer = Debouncer::default();

        assert!(!timer.fire_if_due(t0));
        timer.rearm(t0);
        assert!(!timer.fire_if_due(t0 + ms(499)));
        assert!(timer.fire_if_due(t0 + ms(500)));
        assert!(!timer.fire_if_due(t0 + ms(900)));
        assert_eq!(timer.state(), TimerState::Idle);
    }

    #[test]
    fn test_rearm_pushes_deadline_back() {
        let t0 = Instant::now();
        let mut timer = Debouncer::default();

        timer.rearm(t0);
        timer.rearm(t0 + ms(300));
        assert!(!timer.fire_if_due(t0 + ms(600)));
        assert_eq!(timer.remaining(t0 + ms(600)), Some(ms(200)));
        assert!(timer.fire_if_due(t0 + ms(800)));
    }

    #[test]
    fn test_rapid_keystrokes_coalesce_to_final_value() {
        let t0 = Instant::now();
        let mut input = SearchInput::new("", DEFAULT_DEBOUNCE);
        let mut commits = Vec::new();
        let mut now = t0;

        for (i, c) in "alice".chars().enumerate() {
            now = t0 + ms(i as u64 * 120);
            input.push(c, now);
            if let Some(v) = input.poll("", now) {
                commits.push(v);
            }
        }
        for step in 1..=10 {
            if let Some(v) = input.poll("", now + ms(step * 100)) {
                commits.push(v);
            }
        }

        assert_eq!(commits, vec!["alice".to_string()]);
    }

    #[test]
    fn test_no_commit_when_box_matches_committed() {
        let t0 = Instant::now();
        let mut input = SearchInput::new("al", DEFAULT_DEBOUNCE);

        input.push('i', t0);
        input.pop(t0 + ms(100));
        assert_eq!(input.poll("al", t0 + ms(700)), None);
        assert!(!input.awaiting_sync("al"));
    }

    #[test]
    fn test_cleared_box_commits_empty() {
        let t0 = Instant::now();
        let mut input = SearchInput::new("bob", DEFAULT_DEBOUNCE);

        input.clear(t0);
        assert!(input.awaiting_sync("bob"));
        assert_eq!(input.poll("bob", t0 + ms(500)), Some(String::new()));
    }
}
