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

//! Exponential backoff with full jitter for the retry driver.
//!
//! The base delay grows as `min(initial * factor^n, max)`. With jitter
//! enabled each returned duration is a uniform sample in `[0, base)`, which
//! decorrelates concurrent retry storms while keeping the envelope bounded
//! by the undithered schedule.

use std::time::Duration;

use rand::Rng;

/// Exponential backoff state machine.
#[derive(Clone, Debug)]
pub struct ExponentialBackoff {
    initial: Duration,
    max: Duration,
    factor: f64,
    jitter: bool,
    immediate_first: bool,
    current: Duration,
    fired: bool,
}

impl ExponentialBackoff {
    /// Creates a new [`ExponentialBackoff`] instance.
    ///
    /// # Errors
    ///
    /// Returns an error if `factor` is outside `[1.0, 100.0]` or `max` is
    /// below `initial`.
    pub fn new(
        initial: Duration,
        max: Duration,
        factor: f64,
        jitter: bool,
        immediate_first: bool,
    ) -> anyhow::Result<Self> {
        if !(1.0..=100.0).contains(&factor) {
            anyhow::bail!("backoff factor must be in [1.0, 100.0], was {factor}");
        }
        if max < initial {
            anyhow::bail!(
                "backoff max ({max:?}) must be greater than or equal to initial ({initial:?})"
            );
        }
        Ok(Self {
            initial,
            max,
            factor,
            jitter,
            immediate_first,
            current: initial,
            fired: false,
        })
    }

    /// Returns the next delay to sleep and advances the schedule.
    pub fn next_duration(&mut self) -> Duration {
        if self.immediate_first && !self.fired {
            self.fired = true;
            return Duration::ZERO;
        }
        self.fired = true;

        let base = self.current;
        let current_ms = self.current.as_millis() as u64;
        let mut next_ms = (current_ms as f64 * self.factor).ceil() as u64;
        if self.factor > 1.0 && next_ms <= current_ms {
            // Growth must not stall on sub-millisecond increments.
            next_ms = current_ms + 1;
        }
        self.current = Duration::from_millis(next_ms).min(self.max);

        if self.jitter && !base.is_zero() {
            let sampled = rand::rng().random_range(0..base.as_millis() as u64);
            Duration::from_millis(sampled)
        } else {
            base
        }
    }

    /// Returns the current undithered base delay.
    #[must_use]
    pub fn current_delay(&self) -> Duration {
        self.current
    }

    /// Restores the initial schedule.
    pub fn reset(&mut self) {
        self.current = self.initial;
        self.fired = false;
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
    fn test_deterministic_schedule_without_jitter() {
        let mut backoff = ExponentialBackoff::new(
            Duration::from_millis(300),
            Duration::from_millis(2000),
            2.0,
            false,
            false,
        )
        .unwrap();

        assert_eq!(backoff.next_duration(), Duration::from_millis(300));
        assert_eq!(backoff.next_duration(), Duration::from_millis(600));
        assert_eq!(backoff.next_duration(), Duration::from_millis(1200));
        assert_eq!(backoff.next_duration(), Duration::from_millis(2000));
        assert_eq!(backoff.next_duration(), Duration::from_millis(2000));
    }

    #[rstest]
    fn test_jitter_bounded_by_base() {
        let mut backoff = ExponentialBackoff::new(
            Duration::from_millis(100),
            Duration::from_millis(1000),
            2.0,
            true,
            false,
        )
        .unwrap();

        let mut expected_base = Duration::from_millis(100);
        for _ in 0..8 {
            let delay = backoff.next_duration();
            assert!(delay < expected_base, "{delay:?} must be below {expected_base:?}");
            expected_base = (expected_base * 2).min(Duration::from_millis(1000));
        }
    }

    #[rstest]
    fn test_immediate_first() {
        let mut backoff = ExponentialBackoff::new(
            Duration::from_millis(50),
            Duration::from_millis(500),
            2.0,
            false,
            true,
        )
        .unwrap();

        assert_eq!(backoff.next_duration(), Duration::ZERO);
        assert_eq!(backoff.next_duration(), Duration::from_millis(50));
    }

    #[rstest]
    fn test_reset_restores_initial_state() {
        let mut backoff = ExponentialBackoff::new(
            Duration::from_millis(50),
            Duration::from_millis(500),
            2.0,
            false,
            true,
        )
        .unwrap();

        backoff.next_duration();
        backoff.next_duration();
        backoff.next_duration();
        assert!(backoff.current_delay() > Duration::from_millis(50));

        backoff.reset();
        assert_eq!(backoff.current_delay(), Duration::from_millis(50));
        assert_eq!(backoff.next_duration(), Duration::ZERO);
    }

    #[rstest]
    #[case(0.5)]
    #[case(0.99)]
    #[case(100.1)]
    fn test_invalid_factor_rejected(#[case] factor: f64) {
        let result = ExponentialBackoff::new(
            Duration::from_millis(10),
            Duration::from_millis(100),
            factor,
            false,
            false,
        );
        assert!(result.is_err());
    }

    #[rstest]
    fn test_max_below_initial_rejected() {
        let result = ExponentialBackoff::new(
            Duration::from_millis(100),
            Duration::from_millis(10),
            2.0,
            false,
            false,
        );
        assert!(result.is_err());
    }
}
