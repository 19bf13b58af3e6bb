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

//! Bounded retry driver with exponential backoff.
//!
//! Every NetStorage operation runs through [`RetryManager::execute`]: the
//! driver checks cancellation, awaits the `before_attempt` hook (token
//! acquisition), runs the attempt, and on a retryable failure sleeps the
//! backoff schedule before trying again. For `k` retryable failures the
//! attempt closure runs exactly `k + 1` times, bounded by `max_retries`.

use std::{future::Future, sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::{
    backoff::ExponentialBackoff,
    http::error::{NetStorageError, Result},
};

/// Observer invoked after a retryable failure, before the backoff sleep.
pub type RetryObserver = Arc<dyn Fn(&NetStorageError, u32, Duration) + Send + Sync>;

/// Retry policy for the request pipeline.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct RetryConfig {
    /// Maximum number of re-attempts after the initial one.
    pub max_retries: u32,
    /// First backoff delay in milliseconds.
    pub base_delay_ms: u64,
    /// Backoff ceiling in milliseconds.
    pub max_delay_ms: u64,
    /// When `true`, each delay is a uniform sample below the exponential
    /// envelope.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 300,
            max_delay_ms: 2_000,
            jitter: true,
        }
    }
}

/// Drives operations through the retry policy.
#[derive(Clone)]
pub struct RetryManager {
    config: RetryConfig,
    observer: Option<RetryObserver>,
}

impl std::fmt::Debug for RetryManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(stringify!(RetryManager))
            .field("config", &self.config)
            .field("observer", &self.observer.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

impl RetryManager {
    /// Creates a new [`RetryManager`] instance.
    #[must_use]
    pub fn new(config: RetryConfig) -> Self {
        Self {
            config,
            observer: None,
        }
    }

    /// Attaches an observer called on every retry decision.
    #[must_use]
    pub fn with_observer(mut self, observer: RetryObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    fn backoff(&self) -> Result<ExponentialBackoff> {
        ExponentialBackoff::new(
            Duration::from_millis(self.config.base_delay_ms),
            Duration::from_millis(self.config.max_delay_ms.max(self.config.base_delay_ms)),
            2.0,
            self.config.jitter,
            false,
        )
        .map_err(|e| NetStorageError::Internal(e.to_string()))
    }

    /// Executes `attempt` under the retry policy.
    ///
    /// `before_attempt` runs once per attempt (this is where the rate-limit
    /// token is acquired); `classify` decides whether a failure is worth
    /// re-attempting.
    ///
    /// # Errors
    ///
    /// Returns the last attempt's error once the retry budget is exhausted
    /// or `classify` rejects the failure, or `Network(aborted)` when the
    /// cancellation token fires.
    pub async fn execute<T, F, Fut, B, BFut, C>(
        &self,
        operation: &str,
        cancel: Option<&CancellationToken>,
        mut before_attempt: B,
        classify: C,
        mut attempt: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
        B: FnMut() -> BFut,
        BFut: Future<Output = ()>,
        C: Fn(&NetStorageError) -> bool,
    {
        let mut backoff = self.backoff()?;
        let mut retries = 0u32;

        loop {
            if let Some(token) = cancel {
                if token.is_cancelled() {
                    return Err(NetStorageError::aborted(format!(
                        "{operation} canceled before attempt"
                    )));
                }
            }

            before_attempt().await;

            let error = match attempt().await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            if retries >= self.config.max_retries || !classify(&error) {
                return Err(error);
            }

            let delay = backoff.next_duration();
            retries += 1;
            tracing::warn!(
                "Retrying {operation} after error (attempt {retries}/{}, delay {delay:?}): {error}",
                self.config.max_retries,
            );
            if let Some(observer) = &self.observer {
                observer(&error, retries, delay);
            }

            match cancel {
                Some(token) => {
                    tokio::select! {
                        () = token.cancelled() => {
                            return Err(NetStorageError::aborted(format!(
                                "{operation} canceled during backoff"
                            )));
                        }
                        () = tokio::time::sleep(delay) => {}
                    }
                }
                None => tokio::time::sleep(delay).await,
            }
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////
