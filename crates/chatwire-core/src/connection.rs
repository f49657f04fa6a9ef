//! Connection lifecycle types and the reconnection policy.
//!
//! The transport lives in `chatwire-infrastructure`; this module only holds
//! the state names and the retry arithmetic so they can be reasoned about
//! without sockets.

use std::fmt;
use std::time::Duration;

use serde::Serialize;

/// `Connecting -> Open -> Closed`, with `Closed` feeding back into
/// `Connecting` until the retry budget is spent, then `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
    /// Retry budget exhausted. No further automatic attempts.
    Failed,
}

impl ConnectionState {
    /// Outbound input is enabled only while open.
    pub fn accepts_input(self) -> bool {
        matches!(self, Self::Open)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Connecting => "connecting",
            Self::Open => "connected",
            Self::Closed => "disconnected",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectDecision {
    /// Schedule exactly one attempt after `delay`.
    Retry { attempt: u32, delay: Duration },
    /// Budget exhausted after `attempts` consecutive attempts.
    GiveUp { attempts: u32 },
}

/// Fixed-delay, bounded reconnection policy.
///
/// Every abnormal close (including a failed attempt) consumes one attempt;
/// a successful open resets the counter. Once given up, the policy stays
/// exhausted.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    delay: Duration,
    max_attempts: u32,
    attempts: u32,
    exhausted: bool,
}

impl ReconnectPolicy {
    pub fn new(delay: Duration, max_attempts: u32) -> Self {
        Self {
            delay,
            max_attempts,
            attempts: 0,
            exhausted: false,
        }
    }

    pub fn on_open(&mut self) {
        self.attempts = 0;
    }

    pub fn on_close(&mut self) -> ReconnectDecision {
        if self.exhausted || self.attempts >= self.max_attempts {
            self.exhausted = true;
            return ReconnectDecision::GiveUp {
                attempts: self.attempts,
            };
        }
        self.attempts += 1;
        ReconnectDecision::Retry {
            attempt: self.attempts,
            delay: self.delay,
        }
    }

    /// Forgets all history, including exhaustion (used when the target
    /// address changes).
    pub fn reset(&mut self) {
        self.attempts = 0;
        self.exhausted = false;
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_five_closes_five_attempts_then_give_up() {
        let delay = Duration::from_millis(3000);
        let mut policy = ReconnectPolicy::new(delay, 5);

        for expected in 1..=5 {
            assert_eq!(
                policy.on_close(),
                ReconnectDecision::Retry {
                    attempt: expected,
                    delay
                }
            );
        }
        assert_eq!(policy.on_close(), ReconnectDecision::GiveUp { attempts: 5 });
        assert!(policy.is_exhausted());
        // stays exhausted
        assert_eq!(policy.on_close(), ReconnectDecision::GiveUp { attempts: 5 });
    }

    #[test]
    fn test_open_resets_counter() {
        let mut policy = ReconnectPolicy::new(Duration::from_millis(10), 2);
        policy.on_close();
        policy.on_close();
        policy.on_open();
        assert_eq!(policy.attempts(), 0);
        assert!(matches!(
            policy.on_close(),
            ReconnectDecision::Retry { attempt: 1, .. }
        ));
    }

    #[test]
    fn test_zero_budget_gives_up_immediately() {
        let mut policy = ReconnectPolicy::new(Duration::from_millis(10), 0);
        assert_eq!(policy.on_close(), ReconnectDecision::GiveUp { attempts: 0 });
    }

    #[test]
    fn test_reset_revives_exhausted_policy() {
        let mut policy = ReconnectPolicy::new(Duration::from_millis(10), 1);
        policy.on_close();
        policy.on_close();
        assert!(policy.is_exhausted());
        policy.reset();
        assert!(!policy.is_exhausted());
        assert!(matches!(policy.on_close(), ReconnectDecision::Retry { attempt: 1, .. }));
    }

    #[test]
    fn test_only_open_accepts_input() {
        assert!(ConnectionState::Open.accepts_input());
        assert!(!ConnectionState::Connecting.accepts_input());
        assert!(!ConnectionState::Closed.accepts_input());
        assert!(!ConnectionState::Failed.accepts_input());
    }
}
