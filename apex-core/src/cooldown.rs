//! Time-window gate shared by the reward actions
//!
//! Both reward actions run the same state machine
//! (Idle → gate open → Claiming → Idle) and differ only in window length.

use crate::{Error, Result};

/// Seconds left before the gate opens: `max(0, window - (now - last))`
///
/// A `last` in the future (clock skew) counts as zero elapsed time.
pub fn remaining(now: i64, last: i64, window_secs: u64) -> u64 {
    let elapsed = now.saturating_sub(last).max(0) as u64;
    window_secs.saturating_sub(elapsed)
}

/// Cooldown gate with a fixed window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CooldownGate {
    window_secs: u64,
}

impl CooldownGate {
    /// Create gate
    pub const fn new(window_secs: u64) -> Self {
        Self { window_secs }
    }

    /// Window length in seconds
    pub fn window_secs(&self) -> u64 {
        self.window_secs
    }

    /// Seconds left for a claim last made at `last`
    pub fn remaining(&self, now: i64, last: i64) -> u64 {
        remaining(now, last, self.window_secs)
    }

    /// Fail with `CooldownActive` unless the gate is open
    pub fn check(&self, now: i64, last: i64) -> Result<()> {
        match self.remaining(now, last) {
            0 => Ok(()),
            remaining_secs => Err(Error::CooldownActive { remaining_secs }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remaining() {
        assert_eq!(remaining(1_000, 1_000, 15), 15);
        assert_eq!(remaining(1_010, 1_000, 15), 5);
        assert_eq!(remaining(1_015, 1_000, 15), 0);
        assert_eq!(remaining(5_000, 1_000, 15), 0);
    }

    #[test]
    fn test_never_claimed_is_open() {
        let gate = CooldownGate::new(86_400);
        assert!(gate.check(1_700_000_000, 0).is_ok());
    }

    #[test]
    fn test_future_last_saturates() {
        assert_eq!(remaining(100, 200, 15), 15);
        assert_eq!(remaining(i64::MIN, i64::MAX, 15), 15);
    }

    #[test]
    fn test_check_reports_remaining() {
        let gate = CooldownGate::new(15);
        match gate.check(110, 100) {
            Err(Error::CooldownActive { remaining_secs }) => assert_eq!(remaining_secs, 5),
            other => panic!("unexpected {:?}", other),
        }
    }
}
