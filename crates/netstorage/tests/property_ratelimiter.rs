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

//! Property-based tests for the admission-control buckets.
//!
//! These tests verify fundamental properties that should hold regardless of
//! specific input values:
//! - A bucket never admits more than its capacity in a burst
//! - The three operation classes are isolated from each other
//! - Admitted plus denied always accounts for every request

use netstorage::{
    ratelimiter::{OpClass, RateLimiter, RateLimiterSet},
    RateLimitConfig,
};
use proptest::prelude::*;

// A long interval so continuous refill stays negligible during a burst.
const SLOW_INTERVAL_MS: u64 = 600_000;

proptest! {
    /// Property: Rapid admissions never exceed the bucket capacity.
    #[test]
    fn burst_bounded_by_capacity(
        capacity in 1u32..=100u32,
        request_count in 1usize..=200
    ) {
        let limiter = RateLimiter::new(capacity, SLOW_INTERVAL_MS);

        let mut admitted = 0usize;
        let mut denied = 0usize;
        for i in 0..request_count {
            if limiter.try_acquire() {
                admitted += 1;
            } else {
                denied += 1;
            }

            // Within capacity every admission must succeed.
            if i < capacity as usize {
                prop_assert_eq!(denied, 0, "Request {} should be admitted within capacity", i);
            }
        }

        let expected = std::cmp::min(request_count, capacity as usize);
        prop_assert_eq!(
            admitted,
            expected,
            "Should admit exactly min(request_count, capacity)"
        );
        prop_assert_eq!(
            admitted + denied,
            request_count,
            "Total requests should equal admitted + denied"
        );
    }

    /// Property: Exhausting one class leaves the others untouched.
    #[test]
    fn classes_are_isolated(
        read in 1u32..=20u32,
        write in 1u32..=20u32,
        dir in 1u32..=20u32
    ) {
        let set = RateLimiterSet::new(&RateLimitConfig {
            read,
            write,
            dir,
            interval_ms: SLOW_INTERVAL_MS,
        });

        for _ in 0..read {
            prop_assert!(set.for_class(OpClass::Read).try_acquire());
        }
        prop_assert!(!set.for_class(OpClass::Read).try_acquire());

        prop_assert!(
            set.for_class(OpClass::Write).try_acquire(),
            "Write class should be untouched by read exhaustion"
        );
        prop_assert!(
            set.for_class(OpClass::Dir).try_acquire(),
            "Dir class should be untouched by read exhaustion"
        );
    }

    /// Property: Per-class capacities match the configuration exactly.
    #[test]
    fn class_capacity_matches_config(
        read in 1u32..=50u32,
        write in 1u32..=50u32,
        dir in 1u32..=50u32
    ) {
        let config = RateLimitConfig {
            read,
            write,
            dir,
            interval_ms: SLOW_INTERVAL_MS,
        };
        let set = RateLimiterSet::new(&config);

        for (class, capacity) in [
            (OpClass::Read, read),
            (OpClass::Write, write),
            (OpClass::Dir, dir),
        ] {
            let mut admitted = 0u32;
            while set.for_class(class).try_acquire() {
                admitted += 1;
                prop_assert!(admitted <= capacity, "Admitted beyond capacity for {class}");
            }
            prop_assert_eq!(admitted, capacity, "Class {} capacity mismatch", class);
        }
    }
}

/// An exhausted bucket admits again once the refill interval elapses.
#[tokio::test]
async fn exhausted_bucket_refills() {
    let limiter = RateLimiter::new(2, 50);
    assert!(limiter.try_acquire());
    assert!(limiter.try_acquire());
    assert!(!limiter.try_acquire());

    tokio::time::sleep(std::time::Duration::from_millis(60)).await;
    assert!(limiter.try_acquire());
}
