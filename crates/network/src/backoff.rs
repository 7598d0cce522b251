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

//! Exponential backoff with jitter for spacing out retries of failed HTTP calls.
//!
//! Each delay grows by a constant factor up to a configurable maximum. Random jitter is
//! added on top so that many tasks throttled at the same moment do not retry in lockstep.
//! An "immediate first" flag allows the first retry to happen without any delay.

use std::time::Duration;

/// Upper bound accepted for the backoff multiplier.
const MAX_BACKOFF_FACTOR: f64 = 100.0;

/// An exponential backoff mechanism with optional jitter and immediate-first behavior.
#[derive(Clone, Debug)]
pub struct ExponentialBackoff {
    /// The initial backoff delay.
    delay_initial: Duration,
    /// The maximum delay to cap the backoff.
    delay_max: Duration,
    /// The current backoff delay.
    delay_current: Duration,
    /// The factor to multiply the delay on each iteration.
    factor: f64,
    /// The maximum random jitter to add (in milliseconds).
    jitter_ms: u64,
    /// If true, the first call to `next_duration()` returns zero delay.
    immediate_first: bool,
}

impl ExponentialBackoff {
    /// Creates a new [`ExponentialBackoff`] instance.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `factor` is not finite or is outside `[1.0, 100.0]`.
    /// - `delay_initial` is zero or greater than `delay_max`.
    pub fn new(
        delay_initial: Duration,
        delay_max: Duration,
        factor: f64,
        jitter_ms: u64,
        immediate_first: bool,
    ) -> anyhow::Result<Self> {
        if !factor.is_finite() || !(1.0..=MAX_BACKOFF_FACTOR).contains(&factor) {
            anyhow::bail!("backoff factor must be in [1.0, {MAX_BACKOFF_FACTOR}], was {factor}");
        }
        if delay_initial.is_zero() {
            anyhow::bail!("initial backoff delay must be positive");
        }
        if delay_initial > delay_max {
            anyhow::bail!(
                "initial backoff delay {delay_initial:?} exceeds maximum delay {delay_max:?}"
            );
        }

        Ok(Self {
            delay_initial,
            delay_max,
            delay_current: delay_initial,
            factor,
            jitter_ms,
            immediate_first,
        })
    }

    /// Returns the next backoff delay with jitter and updates the internal state.
    ///
    /// If `immediate_first` is set, the first call returns [`Duration::ZERO`] and the flag
    /// is cleared for subsequent calls.
    pub fn next_duration(&mut self) -> Duration {
        if self.immediate_first {
            self.immediate_first = false;
            return Duration::ZERO;
        }

        let jitter = if self.jitter_ms == 0 {
            0
        } else {
            rand::random_range(0..=self.jitter_ms)
        };
        let delay_with_jitter = self.delay_current + Duration::from_millis(jitter);

        let max_nanos = self.delay_max.as_nanos();
        let next_nanos = (self.delay_current.as_nanos() as f64 * self.factor) as u128;
        let capped = next_nanos.min(max_nanos);
        self.delay_current = Duration::from_nanos(u64::try_from(capped).unwrap_or(u64::MAX));

        delay_with_jitter
    }

    /// Resets the backoff to its initial delay.
    pub const fn reset(&mut self) {
        self.delay_current = self.delay_initial;
    }

    /// Returns the current base delay without jitter.
    #[must_use]
    pub const fn current_delay(&self) -> Duration {
        self.delay_current
    }

    /// Returns the configured maximum delay.
    #[must_use]
    pub const fn max_delay(&self) -> Duration {
        self.delay_max
    }
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////
#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rstest::rstest;

    use super::*;

    fn backoff(initial_ms: u64, max_ms: u64, factor: f64) -> ExponentialBackoff {
        ExponentialBackoff::new(
            Duration::from_millis(initial_ms),
            Duration::from_millis(max_ms),
            factor,
            0,
            false,
        )
        .unwrap()
    }

    #[rstest]
    fn test_no_jitter_exponential_growth() {
        let mut backoff = backoff(100, 1_600, 2.0);

        let delays: Vec<u128> = (0..6).map(|_| backoff.next_duration().as_millis()).collect();

        assert_eq!(delays, vec![100, 200, 400, 800, 1_600, 1_600]);
    }

    #[rstest]
    fn test_reset_returns_to_initial() {
        let mut backoff = backoff(100, 1_600, 2.0);
        let _ = backoff.next_duration();
        let _ = backoff.next_duration();

        backoff.reset();

        assert_eq!(backoff.next_duration(), Duration::from_millis(100));
    }

    #[rstest]
    fn test_jitter_within_bounds() {
        for _ in 0..20 {
            let mut backoff = ExponentialBackoff::new(
                Duration::from_millis(100),
                Duration::from_millis(1_000),
                2.0,
                50,
                false,
            )
            .unwrap();
            let delay = backoff.next_duration();
            assert!(delay >= Duration::from_millis(100), "{delay:?} below base");
            assert!(delay <= Duration::from_millis(150), "{delay:?} above base + jitter");
        }
    }

    #[rstest]
    #[case(100, 200, 1.5, vec![100, 150, 200, 200])]
    #[case(500, 1_000, 3.0, vec![500, 1_000, 1_000, 1_000])]
    fn test_growth_is_capped(
        #[case] initial_ms: u64,
        #[case] max_ms: u64,
        #[case] factor: f64,
        #[case] expected: Vec<u128>,
    ) {
        let mut backoff = backoff(initial_ms, max_ms, factor);
        let delays: Vec<u128> = (0..expected.len())
            .map(|_| backoff.next_duration().as_millis())
            .collect();
        assert_eq!(delays, expected);
    }

    #[rstest]
    fn test_immediate_first() {
        let mut backoff = ExponentialBackoff::new(
            Duration::from_millis(100),
            Duration::from_millis(1_600),
            2.0,
            0,
            true,
        )
        .unwrap();

        assert_eq!(backoff.next_duration(), Duration::ZERO);
        assert_eq!(backoff.next_duration(), Duration::from_millis(100));
        assert_eq!(backoff.next_duration(), Duration::from_millis(200));
    }

    #[rstest]
    #[case(0.5)]
    #[case(f64::NAN)]
    #[case(f64::INFINITY)]
    #[case(101.0)]
    fn test_invalid_factor_rejected(#[case] factor: f64) {
        let result = ExponentialBackoff::new(
            Duration::from_millis(100),
            Duration::from_millis(1_000),
            factor,
            0,
            false,
        );
        assert!(result.is_err());
    }

    #[rstest]
    fn test_initial_above_max_rejected() {
        let result = ExponentialBackoff::new(
            Duration::from_millis(2_000),
            Duration::from_millis(1_000),
            2.0,
            0,
            false,
        );
        assert!(result.is_err());
    }
}
