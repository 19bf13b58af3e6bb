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

//! Property-based tests for the exponential backoff mechanism.
//!
//! These tests verify mathematical properties and invariants that should hold
//! regardless of specific parameter combinations:
//! - Base delays grow exponentially up to the maximum
//! - Jittered delays stay below the undithered envelope
//! - Reset behavior is consistent
//! - Immediate-first behavior works correctly

use std::time::Duration;

use netstorage::backoff::ExponentialBackoff;
use proptest::prelude::*;
use rstest::rstest;

/// Generate valid backoff parameters.
fn backoff_params_strategy() -> impl Strategy<Value = (Duration, Duration, f64, bool)> {
    (
        1u64..=5000u64,   // initial_ms: 1ms to 5s
        10u64..=60000u64, // max_ms: 10ms to 60s
        1.1f64..=10.0f64, // factor: reasonable exponential growth
        any::<bool>(),    // immediate_first
    )
        .prop_filter("max >= initial", |(initial_ms, max_ms, _, _)| {
            max_ms >= initial_ms
        })
        .prop_map(|(initial_ms, max_ms, factor, immediate_first)| {
            (
                Duration::from_millis(initial_ms),
                Duration::from_millis(max_ms),
                factor,
                immediate_first,
            )
        })
}

proptest! {
    /// Property: The base delay grows monotonically up to the maximum.
    #[rstest]
    fn base_delay_grows_to_max(
        (initial, max, factor, immediate_first) in backoff_params_strategy(),
        iterations in 1usize..=30
    ) {
        let mut backoff = ExponentialBackoff::new(initial, max, factor, false, immediate_first)
            .expect("Valid backoff parameters");

        let mut last_base = backoff.current_delay();
        for _ in 0..iterations {
            backoff.next_duration();
            let base = backoff.current_delay();

            prop_assert!(
                base >= last_base,
                "Base delay should never shrink: {} -> {}",
                last_base.as_millis(),
                base.as_millis()
            );
            prop_assert!(
                base <= max,
                "Base delay {} should not exceed maximum {}",
                base.as_millis(),
                max.as_millis()
            );
            last_base = base;
        }
    }

    /// Property: Without jitter the returned delay equals the base envelope.
    #[rstest]
    fn undithered_delay_matches_envelope(
        (initial, max, factor, _) in backoff_params_strategy(),
        iterations in 1usize..=20
    ) {
        let mut backoff = ExponentialBackoff::new(initial, max, factor, false, false)
            .expect("Valid backoff parameters");

        for _ in 0..iterations {
            let base_before = backoff.current_delay();
            let delay = backoff.next_duration();
            prop_assert_eq!(delay, base_before, "Undithered delay should equal the base");
        }
    }

    /// Property: Jittered delays stay strictly below the undithered envelope.
    #[rstest]
    fn jitter_below_envelope(
        (initial, max, factor, _) in backoff_params_strategy(),
        iterations in 1usize..=50
    ) {
        let mut backoff = ExponentialBackoff::new(initial, max, factor, true, false)
            .expect("Valid backoff parameters");

        for _ in 0..iterations {
            let base_before = backoff.current_delay();
            let delay = backoff.next_duration();
            prop_assert!(
                delay < base_before,
                "Jittered delay {} should be below the envelope {}",
                delay.as_millis(),
                base_before.as_millis()
            );
        }
    }

    /// Property: Reset restores the initial state.
    #[rstest]
    fn reset_restores_initial_state(
        (initial, max, factor, immediate_first) in backoff_params_strategy(),
        advance_iterations in 1usize..=10
    ) {
        let mut backoff = ExponentialBackoff::new(initial, max, factor, false, immediate_first)
            .expect("Valid backoff parameters");

        let initial_delay = backoff.current_delay();
        for _ in 0..advance_iterations {
            backoff.next_duration();
        }

        backoff.reset();
        prop_assert_eq!(
            backoff.current_delay(),
            initial_delay,
            "Current delay should be restored to initial after reset"
        );

        if immediate_first {
            let first_delay_after_reset = backoff.next_duration();
            prop_assert_eq!(
                first_delay_after_reset,
                Duration::ZERO,
                "First delay after reset should be zero with immediate_first"
            );
        }
    }

    /// Property: Immediate-first returns zero once, then the envelope.
    #[rstest]
    fn immediate_first_behavior(
        (initial, max, factor, _) in backoff_params_strategy(),
        subsequent_calls in 1usize..=5
    ) {
        let mut backoff = ExponentialBackoff::new(initial, max, factor, false, true)
            .expect("Valid backoff parameters");

        let first_delay = backoff.next_duration();
        prop_assert_eq!(
            first_delay,
            Duration::ZERO,
            "First call should return zero delay with immediate_first"
        );

        for i in 0..subsequent_calls {
            let delay = backoff.next_duration();
            prop_assert!(
                delay >= initial,
                "Subsequent call {} should return delay >= initial ({}ms), was {}ms",
                i + 1,
                initial.as_millis(),
                delay.as_millis()
            );
        }
    }

    /// Property: Backoff eventually reaches and stays at the maximum delay.
    #[rstest]
    fn eventually_reaches_maximum(
        (initial, max, factor, immediate_first) in backoff_params_strategy(),
        excess_iterations in 1usize..=10
    ) {
        prop_assume!(factor > 1.1);
        prop_assume!(max > initial * 2);

        let mut backoff = ExponentialBackoff::new(initial, max, factor, false, immediate_first)
            .expect("Valid backoff parameters");

        let growth_ratio = max.as_millis() as f64 / initial.as_millis() as f64;
        let expected_iterations = growth_ratio.log(factor).ceil() as usize + 5;

        for _ in 0..expected_iterations {
            backoff.next_duration();
        }

        prop_assert_eq!(
            backoff.current_delay(),
            max,
            "Should reach maximum delay after sufficient iterations"
        );

        for _ in 0..excess_iterations {
            backoff.next_duration();
            prop_assert_eq!(
                backoff.current_delay(),
                max,
                "Should stay at maximum delay"
            );
        }
    }

    /// Property: Factor bounds are enforced at construction.
    #[rstest]
    fn factor_bounds_respected(
        initial_ms in 1u64..=1000u64,
        max_ms in 1000u64..=10000u64,
        immediate_first in any::<bool>()
    ) {
        let initial = Duration::from_millis(initial_ms);
        let max = Duration::from_millis(max_ms);

        let valid_factors = [1.0, 1.1, 2.0, 10.0, 50.0, 100.0];
        let invalid_factors = [0.0, 0.5, 0.99, 100.1, 150.0];

        for &factor in &valid_factors {
            let result = ExponentialBackoff::new(initial, max, factor, false, immediate_first);
            prop_assert!(result.is_ok(), "Factor {} should be valid", factor);
        }

        for &factor in &invalid_factors {
            let result = ExponentialBackoff::new(initial, max, factor, false, immediate_first);
            prop_assert!(result.is_err(), "Factor {} should be invalid", factor);
        }
    }
}
