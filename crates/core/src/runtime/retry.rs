//! Retry controller for batch execution
//!
//! Re-drives [`ClientContext::execute_query`] on the same pending queue with
//! a fixed delay between attempts. `max_retry = N` allows `N + 1` attempts.

use std::fmt;
use std::time::Duration;

use parking_lot::Mutex;
use restq_common::policies::PredicateRetry;
use restq_common::{RetryConfig, RetryError, RetryExecutor};
use restq_domain::constants::{DEFAULT_MAX_RETRY, DEFAULT_RETRY_DELAY_MS};
use restq_domain::{RestqError, Result, RetrySettings};
use tracing::{info, instrument, warn};

use super::context::ClientContext;

type SuccessCallback = Box<dyn FnOnce() + Send>;
type FailureCallback = Box<dyn FnOnce(&RestqError) + Send>;
type AttemptCallback = Box<dyn FnMut(u32, &RestqError) + Send>;
type RetryPredicate = Box<dyn Fn(&RestqError) -> bool + Send + Sync>;

/// Options for [`ClientContext::execute_query_retry`]
pub struct RetryOptions {
    max_retry: u32,
    delay: Duration,
    on_success: Option<SuccessCallback>,
    on_failure: Option<FailureCallback>,
    on_retry: Option<AttemptCallback>,
    retry_if: Option<RetryPredicate>,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_retry: DEFAULT_MAX_RETRY,
            delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
            on_success: None,
            on_failure: None,
            on_retry: None,
            retry_if: None,
        }
    }
}

impl RetryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Retries after the initial attempt.
    pub fn max_retry(mut self, max_retry: u32) -> Self {
        self.max_retry = max_retry;
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Delay between attempts, in whole seconds.
    pub fn timeout_secs(self, secs: u64) -> Self {
        self.delay(Duration::from_secs(secs))
    }

    /// Called once when an attempt succeeds.
    pub fn on_success(mut self, callback: impl FnOnce() + Send + 'static) -> Self {
        self.on_success = Some(Box::new(callback));
        self
    }

    /// Called once with the final error when no attempt succeeds.
    pub fn on_failure(mut self, callback: impl FnOnce(&RestqError) + Send + 'static) -> Self {
        self.on_failure = Some(Box::new(callback));
        self
    }

    /// Called with the 1-based number of each failed attempt that will be
    /// retried.
    pub fn on_retry(mut self, callback: impl FnMut(u32, &RestqError) + Send + 'static) -> Self {
        self.on_retry = Some(Box::new(callback));
        self
    }

    /// Only retry failures matching `predicate`. Every failure is retried
    /// by default.
    pub fn retry_if(
        mut self,
        predicate: impl Fn(&RestqError) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.retry_if = Some(Box::new(predicate));
        self
    }

    pub fn max_retry_count(&self) -> u32 {
        self.max_retry
    }

    pub fn retry_delay(&self) -> Duration {
        self.delay
    }

    fn retry_config(&self) -> Result<RetryConfig> {
        RetryConfig::builder()
            .max_attempts(self.max_retry.saturating_add(1))
            .fixed_backoff(self.delay)
            .unlimited_time()
            .build()
            .map_err(|err| match err {
                RetryError::InvalidConfiguration { message } => RestqError::Config(message),
                other => RestqError::Config(format!("invalid retry configuration: {other:?}")),
            })
    }
}

impl From<&RetrySettings> for RetryOptions {
    fn from(settings: &RetrySettings) -> Self {
        Self::new().max_retry(settings.max_retry).delay(settings.delay)
    }
}

impl From<RetrySettings> for RetryOptions {
    fn from(settings: RetrySettings) -> Self {
        Self::from(&settings)
    }
}

impl fmt::Debug for RetryOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryOptions")
            .field("max_retry", &self.max_retry)
            .field("delay", &self.delay)
            .field("on_success", &self.on_success.is_some())
            .field("on_failure", &self.on_failure.is_some())
            .field("on_retry", &self.on_retry.is_some())
            .field("retry_if", &self.retry_if.is_some())
            .finish()
    }
}

impl ClientContext {
    /// Retry options built from this context's configured retry settings.
    pub fn default_retry_options(&self) -> RetryOptions {
        RetryOptions::from(self.retry_settings())
    }

    /// [`execute_query`](Self::execute_query) under the retry controller.
    ///
    /// Each attempt re-sends the whole pending queue; a failed attempt leaves
    /// it untouched.
    ///
    /// # Errors
    /// - `RestqError::RetryExhausted` carrying the last failure once every
    ///   attempt has failed (the bare failure when `max_retry` is 0)
    /// - the bare failure when `retry_if` refuses to retry it
    /// - `RestqError::Config` for an unusable retry configuration
    #[instrument(skip(self, options), fields(max_retry = options.max_retry))]
    pub async fn execute_query_retry(&self, options: RetryOptions) -> Result<()> {
        let config = options.retry_config()?;
        let RetryOptions { max_retry, on_success, on_failure, on_retry, retry_if, .. } = options;

        let on_retry = Mutex::new(on_retry);
        let policy = PredicateRetry::new(|error: &RestqError, attempt: u32| {
            let retry = retry_if.as_ref().map_or(true, |predicate| predicate(error));
            if retry {
                if let Some(callback) = on_retry.lock().as_mut() {
                    callback(attempt + 1, error);
                }
            }
            retry
        });

        let outcome = RetryExecutor::new(config, policy)
            .execute_with_outcome(|| self.execute_query())
            .await;
        let attempts = outcome.attempts;

        let error = match outcome.result {
            Ok(()) => {
                if attempts > 1 {
                    info!(attempts, "Batch succeeded after retries");
                }
                if let Some(callback) = on_success {
                    callback();
                }
                return Ok(());
            }
            Err(RetryError::InvalidConfiguration { message }) => {
                return Err(RestqError::Config(message));
            }
            Err(RetryError::NonRetryable { error, .. }) => error,
            Err(RetryError::AttemptsExhausted { last, .. })
            | Err(RetryError::TimeoutExceeded { last, .. }) => {
                if max_retry == 0 {
                    last
                } else {
                    RestqError::RetryExhausted { attempts, last: Box::new(last) }
                }
            }
        };

        warn!(attempts, error = %error, "Batch failed");
        if let Some(callback) = on_failure {
            callback(&error);
        }
        Err(error)
    }
}
