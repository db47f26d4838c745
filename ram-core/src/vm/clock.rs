//! Pacing of instruction execution.

use std::time::{Duration, Instant};

use crate::error::CoreError;
use crate::vm::cancel::CancellationToken;

/// How fast the interpreter steps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Pacing {
    /// Back-to-back execution, only checking for cancellation.
    RealTime,
    /// One instruction per `period`.
    Clocked { period: Duration },
}

impl Pacing {
    /// Clocked pacing at `speed` instructions per second.
    pub fn from_speed(speed: f64) -> Result<Pacing, CoreError> {
        if !speed.is_finite() || speed <= 0.0 {
            return Err(CoreError::InvalidSpeed(speed));
        }
        Ok(Pacing::Clocked {
            period: Duration::from_secs_f64(1.0 / speed),
        })
    }
}

/// A periodic timer: the first tick fires one period after creation,
/// missed ticks are skipped rather than replayed.
#[derive(Debug)]
pub(crate) struct Ticker {
    pacing: Pacing,
    next: Instant,
}

impl Ticker {
    pub fn new(pacing: Pacing) -> Self {
        Ticker {
            pacing,
            next: Instant::now(),
        }
    }

    /// Wait for the next tick. Returns `false` if cancelled instead.
    pub fn tick(&mut self, token: &CancellationToken) -> bool {
        match self.pacing {
            Pacing::RealTime => !token.is_cancelled(),
            Pacing::Clocked { period } => {
                self.next += period;
                let now = Instant::now();
                if self.next > now {
                    if token.wait_timeout(self.next - now) {
                        return false;
                    }
                } else {
                    self.next = now;
                }
                !token.is_cancelled()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_positive_speeds() {
        assert!(matches!(Pacing::from_speed(0.0), Err(CoreError::InvalidSpeed(_))));
        assert!(matches!(Pacing::from_speed(-2.0), Err(CoreError::InvalidSpeed(_))));
        assert!(matches!(Pacing::from_speed(f64::NAN), Err(CoreError::InvalidSpeed(_))));
    }

    #[test]
    fn speed_sets_the_period() {
        assert_eq!(
            Pacing::from_speed(4.0).expect("pacing"),
            Pacing::Clocked {
                period: Duration::from_millis(250)
            }
        );
    }

    #[test]
    fn clocked_ticks_wait_for_the_period() {
        let token = CancellationToken::new();
        let mut ticker = Ticker::new(Pacing::Clocked {
            period: Duration::from_millis(10),
        });
        let started = Instant::now();
        assert!(ticker.tick(&token));
        assert!(ticker.tick(&token));
        assert!(started.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn cancelled_ticks_fail() {
        let token = CancellationToken::new();
        token.cancel();
        assert!(!Ticker::new(Pacing::RealTime).tick(&token));
        assert!(!Ticker::new(Pacing::Clocked {
            period: Duration::from_millis(1)
        })
        .tick(&token));
    }
}
