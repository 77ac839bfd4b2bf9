use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use rand::Rng;

/// Injected time source so deadline and expiry logic stay deterministic under test.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock pinned to an instant; used by tests and by operator runs with an `--as-of` date.
#[derive(Debug)]
pub struct FixedClock {
    instant: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(instant: DateTime<Utc>) -> Self {
        Self {
            instant: Mutex::new(instant),
        }
    }

    pub fn set(&self, instant: DateTime<Utc>) {
        *self.instant.lock().unwrap_or_else(|err| err.into_inner()) = instant;
    }

    pub fn advance(&self, by: Duration) {
        let mut guard = self.instant.lock().unwrap_or_else(|err| err.into_inner());
        *guard += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.instant.lock().unwrap_or_else(|err| err.into_inner())
    }
}

/// Source of opaque session tokens.
pub trait TokenGenerator: Send + Sync {
    fn new_token(&self) -> String;
}

/// 48 alphanumeric characters, roughly 285 bits of entropy.
pub const SESSION_TOKEN_LENGTH: usize = 48;

#[derive(Debug, Default, Clone, Copy)]
pub struct RandomTokenGenerator;

impl TokenGenerator for RandomTokenGenerator {
    fn new_token(&self) -> String {
        rand::rng()
            .sample_iter(&rand::distr::Alphanumeric)
            .take(SESSION_TOKEN_LENGTH)
            .map(char::from)
            .collect()
    }
}
