//! Bounded retry with a fixed pause between attempts.
//!
//! The ledger is eventually consistent: account creation can be rejected
//! for a stale blockhash and a freshly confirmed transaction may not be
//! visible on the node we query yet. Both cases are retried a bounded number
//! of times with a fixed delay; nothing backs off exponentially.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How many times to try and how long to wait between tries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryPolicy {
    pub max_attempts: u32,
    #[serde(rename = "delayMs", with = "millis")]
    pub delay: Duration,
}

impl RetryPolicy {
    pub const fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    /// Same budget, no waiting. Used by tests.
    pub const fn immediate(max_attempts: u32) -> Self {
        Self::fixed(max_attempts, Duration::ZERO)
    }

    /// Run `op` until it succeeds or the attempt budget is spent.
    ///
    /// `on_failure` sees every failed attempt (1-based) before the next one
    /// starts, including the last. The delay is only slept between attempts.
    /// Returns the first success or the final error. A budget of zero still
    /// makes one attempt.
    pub async fn run<T, E, F, Fut, L>(&self, mut op: F, mut on_failure: L) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        L: FnMut(u32, &E),
    {
        let budget = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    on_failure(attempt, &err);
                    if attempt >= budget {
                        return Err(err);
                    }
                }
            }
            self.pause().await;
            attempt += 1;
        }
    }

    /// Poll a lookup until it yields a value.
    ///
    /// Misses (`Ok(None)`) are retried up to the budget; errors end the poll
    /// immediately. Returns `Ok(None)` once the budget is exhausted.
    pub async fn poll<T, E, F, Fut>(&self, mut op: F) -> Result<Option<T>, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<Option<T>, E>>,
    {
        for attempt in 1..=self.max_attempts {
            if let Some(value) = op(attempt).await? {
                return Ok(Some(value));
            }
            if attempt < self.max_attempts {
                tracing::debug!(attempt, max = self.max_attempts, "lookup missed, retrying");
                self.pause().await;
            }
        }
        Ok(None)
    }

    async fn pause(&self) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }
}

/// Serde adapter for durations written as whole milliseconds.
pub(crate) mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(delay: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(delay.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
