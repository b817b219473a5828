//! Trading-session clock and the wall-clock seam used by the engine.

use chrono::{Datelike, Duration, Local, NaiveDateTime, Timelike, Weekday};
use std::sync::Mutex;

/// Session opens at 09:30 local time.
const SESSION_OPEN_MINUTE: u32 = 9 * 60 + 30;
/// Session closes at 15:00 local time, inclusive.
const SESSION_CLOSE_MINUTE: u32 = 15 * 60;

/// Source of "now" for every time-dependent decision in the engine.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// Local wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<NaiveDateTime>,
}

impl ManualClock {
    pub fn new(start: NaiveDateTime) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|p| p.into_inner());
        *now += by;
    }

    pub fn set(&self, to: NaiveDateTime) {
        *self.now.lock().unwrap_or_else(|p| p.into_inner()) = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> NaiveDateTime {
        *self.now.lock().unwrap_or_else(|p| p.into_inner())
    }
}

/// Returns true on weekdays between 09:30 and 15:00 inclusive.
pub fn is_trading_session(now: &NaiveDateTime) -> bool {
    if matches!(now.weekday(), Weekday::Sat | Weekday::Sun) {
        return false;
    }
    let minute_of_day = now.hour() * 60 + now.minute();
    (SESSION_OPEN_MINUTE..=SESSION_CLOSE_MINUTE).contains(&minute_of_day)
}

/// Quote freshness policy: a short TTL while the market moves, a long one otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TtlPolicy {
    pub trading: Duration,
    pub non_trading: Duration,
}

impl Default for TtlPolicy {
    fn default() -> Self {
        Self {
            trading: Duration::seconds(300),
            non_trading: Duration::seconds(3600),
        }
    }
}

impl TtlPolicy {
    pub fn ttl(&self, now: &NaiveDateTime) -> Duration {
        if is_trading_session(now) {
            self.trading
        } else {
            self.non_trading
        }
    }
}
