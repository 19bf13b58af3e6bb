// -------------------------------------------------------------------------------------------------
//  Copyright (C) 2015-2025 Nautech Systems Pty Ltd. All rights reserved.
//  https://nautechsystems.io
//
//  Licensed under the GNU Lesser General Public License Version 3.0 (the "License");
//  You may not use this file except in compliance with the License.
//  You may obtain a copy of the License at https://www.gnu.org/licenses/lgpl-3.0.en.html
//
//  Unless required by applicable law or agreed to in writing, software
//  distributed under the License is distributed on an "AS IS" BASIS,
//  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//  See the License for the specific language governing permissions and
//  limitations under the License.
// -------------------------------------------------------------------------------------------------

//! Per-operation-class admission control.
//!
//! Three independent token buckets guard the NetStorage API classes: `dir`
//! listings, other reads, and writes. Each bucket holds at most
//! `tokens_per_interval` tokens and refills continuously at
//! `tokens_per_interval / interval_ms`, so across any sliding window of
//! `interval_ms` the admissions on a bucket never exceed its limit.

use std::{
    sync::Mutex,
    time::{Duration, Instant},
};

use strum::Display;

use crate::{
    common::consts::MUTEX_POISONED,
    config::RateLimitConfig,
};

/// The admission class an operation is charged against.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Hash)]
#[strum(serialize_all = "lowercase")]
pub enum OpClass {
    /// `stat`, `du`, `download`.
    Read,
    /// `mkdir`, `rmdir`, `rm`, `rename`, `symlink`, `mtime`, `upload`.
    Write,
    /// `dir` listings.
    Dir,
}

#[derive(Debug)]
struct TokenBucket {
    capacity: f64,
    tokens: f64,
    refill_per_ms: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(tokens_per_interval: u32, interval_ms: u64) -> Self {
        let capacity = f64::from(tokens_per_interval.max(1));
        Self {
            capacity,
            tokens: capacity,
            refill_per_ms: capacity / interval_ms.max(1) as f64,
            last_refill: Instant::now(),
        }
    }

    fn refill(&mut self, now: Instant) {
        let elapsed_ms = now.duration_since(self.last_refill).as_secs_f64() * 1_000.0;
        if elapsed_ms > 0.0 {
            self.tokens = (self.tokens + elapsed_ms * self.refill_per_ms).min(self.capacity);
            self.last_refill = now;
        }
    }

    /// Try to consume one token; returns how long the caller should wait when
    /// the bucket is empty.
    fn try_consume(&mut self, now: Instant) -> Option<Duration> {
        self.refill(now);
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            None
        } else {
            let shortfall = 1.0 - self.tokens;
            let wait_ms = shortfall / self.refill_per_ms;
            Some(Duration::from_secs_f64(wait_ms / 1_000.0))
        }
    }
}

/// A single admission bucket with an awaiting `acquire`.
#[derive(Debug)]
pub struct RateLimiter {
    bucket: Mutex<TokenBucket>,
}

impl RateLimiter {
    /// Creates a new [`RateLimiter`] instance.
    #[must_use]
    pub fn new(tokens_per_interval: u32, interval_ms: u64) -> Self {
        Self {
            bucket: Mutex::new(TokenBucket::new(tokens_per_interval, interval_ms)),
        }
    }

    /// Acquires one token, awaiting until the bucket refills if necessary.
    pub async fn acquire(&self) {
        loop {
            let maybe_wait = {
                let mut bucket = self.bucket.lock().expect(MUTEX_POISONED);
                bucket.try_consume(Instant::now())
            };
            match maybe_wait {
                None => return,
                Some(wait) => {
                    tracing::trace!("Rate limit reached, waiting {wait:?}");
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }

    /// Attempts to acquire one token without waiting.
    #[must_use]
    pub fn try_acquire(&self) -> bool {
        let mut bucket = self.bucket.lock().expect(MUTEX_POISONED);
        bucket.try_consume(Instant::now()).is_none()
    }
}

/// The three class buckets derived from a [`RateLimitConfig`].
#[derive(Debug)]
pub struct RateLimiterSet {
    read: RateLimiter,
    write: RateLimiter,
    dir: RateLimiter,
}

impl RateLimiterSet {
    /// Creates a new [`RateLimiterSet`] instance.
    #[must_use]
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            read: RateLimiter::new(config.read, config.interval_ms),
            write: RateLimiter::new(config.write, config.interval_ms),
            dir: RateLimiter::new(config.dir, config.interval_ms),
        }
    }

    /// Returns the bucket guarding the given class.
    #[must_use]
    pub fn for_class(&self, class: OpClass) -> &RateLimiter {
        match class {
            OpClass::Read => &self.read,
            OpClass::Write => &self.write,
            OpClass::Dir => &self.dir,
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn test_burst_bounded_by_capacity() {
        let limiter = RateLimiter::new(5, 60_000);
        let mut admitted = 0;
        for _ in 0..20 {
            if limiter.try_acquire() {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 5);
    }

    #[rstest]
    fn test_bucket_refills_over_time() {
        let mut bucket = TokenBucket::new(2, 100);
        let start = Instant::now();

        assert!(bucket.try_consume(start).is_none());
        assert!(bucket.try_consume(start).is_none());
        let wait = bucket.try_consume(start);
        assert!(wait.is_some());

        // One full interval later the bucket is back at capacity.
        let later = start + Duration::from_millis(100);
        assert!(bucket.try_consume(later).is_none());
        assert!(bucket.try_consume(later).is_none());
    }

    #[rstest]
    fn test_refill_capped_at_capacity() {
        let mut bucket = TokenBucket::new(3, 10);
        let start = Instant::now();
        let much_later = start + Duration::from_secs(60);

        bucket.refill(much_later);
        assert!(bucket.tokens <= 3.0);
    }

    #[rstest]
    fn test_classes_are_isolated() {
        let set = RateLimiterSet::new(&RateLimitConfig {
            read: 1,
            write: 1,
            dir: 1,
            interval_ms: 60_000,
        });

        assert!(set.for_class(OpClass::Read).try_acquire());
        assert!(!set.for_class(OpClass::Read).try_acquire());
        assert!(set.for_class(OpClass::Write).try_acquire());
        assert!(set.for_class(OpClass::Dir).try_acquire());
    }

    #[tokio::test]
    async fn test_acquire_waits_for_refill() {
        let limiter = RateLimiter::new(1, 50);
        limiter.acquire().await;

        let start = Instant::now();
        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(40));
    }
}
