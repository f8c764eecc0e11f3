//! Retry wrapper with fixed-interval or exponential backoff.
//!
//! Any async operation can be made resilient by wrapping it with
//! [`with_retry`] (or [`back_off`] for the exponential shorthand). Both share
//! one state machine:
//!
//! ```text
//! Idle -> Attempting -> Succeeded
//!                    -> Waiting -> Attempting ...
//!                    -> Failed      (attempts exhausted, last error returned as-is)
//!                    -> Aborted     (signal cancelled, E::from(Aborted) returned)
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use fetchkit::download::{DownloadError, DownloadOptions, Downloader};
//! use fetchkit::retry::{RetryOptions, with_retry};
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), DownloadError> {
//! let downloader = Downloader::new();
//! let options = DownloadOptions::default();
//! let path = with_retry(
//!     || downloader.download("https://example.com/img.png", Path::new("./media"), &options),
//!     RetryOptions::fixed(Duration::from_secs(1)).with_max_attempts(3),
//! )
//! .await?;
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::environment::Environment;

/// Default delay between fixed-interval attempts (1 second).
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(1);

/// The retry signal was cancelled before the operation succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Error)]
#[error("operation aborted")]
pub struct Aborted;

impl From<Aborted> for std::io::Error {
    fn from(aborted: Aborted) -> Self {
        Self::new(std::io::ErrorKind::Interrupted, aborted)
    }
}

/// Delay schedule between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Same delay after every failure.
    Fixed(Duration),
    /// `base * 2^attempt` after failed attempt `attempt` (1-based).
    Exponential {
        /// Base delay.
        base: Duration,
    },
}

impl Backoff {
    /// Delay to wait after the given failed attempt (1-based).
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match *self {
            Self::Fixed(interval) => interval,
            Self::Exponential { base } => {
                let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
                base.saturating_mul(factor)
            }
        }
    }
}

/// Position of a wrapped invocation in the retry state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    Idle,
    Attempting { attempt: u32 },
    Waiting { attempt: u32, delay: Duration },
    Succeeded { attempt: u32 },
    Failed { attempt: u32 },
    Aborted { attempt: u32 },
}

impl RetryState {
    /// Whether no further transitions can happen.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Succeeded { .. } | Self::Failed { .. } | Self::Aborted { .. }
        )
    }
}

/// Details passed to the failure hook each time the wrapper enters `Waiting`.
#[derive(Clone, Copy)]
pub struct RetryFailure<'a> {
    /// The error returned by the failed attempt.
    pub error: &'a dyn fmt::Display,
    /// The attempt that failed (1-based).
    pub attempt: u32,
    /// Attempt limit, `None` when unlimited.
    pub max_attempts: Option<u32>,
    /// Delay before the next attempt.
    pub delay: Duration,
}

impl fmt::Debug for RetryFailure<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryFailure")
            .field("error", &self.error.to_string())
            .field("attempt", &self.attempt)
            .field("max_attempts", &self.max_attempts)
            .field("delay", &self.delay)
            .finish()
    }
}

/// Callback invoked on every transition into `Waiting`.
pub type FailureHook = Box<dyn FnMut(&RetryFailure<'_>) + Send>;

/// Options for [`with_retry`].
pub struct RetryOptions {
    /// Total attempts including the first; `None` retries until success or abort.
    pub max_attempts: Option<u32>,
    /// Delay schedule.
    pub backoff: Backoff,
    /// Called with the last error before each wait.
    pub on_failure: Option<FailureHook>,
    /// Cancels the loop; checked before each attempt and while waiting.
    pub signal: Option<CancellationToken>,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self::fixed(DEFAULT_RETRY_INTERVAL)
    }
}

impl fmt::Debug for RetryOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryOptions")
            .field("max_attempts", &self.max_attempts)
            .field("backoff", &self.backoff)
            .field("on_failure", &self.on_failure.is_some())
            .field("signal", &self.signal)
            .finish()
    }
}

impl RetryOptions {
    /// Unlimited attempts with a constant delay.
    #[must_use]
    pub fn fixed(interval: Duration) -> Self {
        Self {
            max_attempts: None,
            backoff: Backoff::Fixed(interval),
            on_failure: None,
            signal: None,
        }
    }

    /// Exponential backoff with an attempt limit (at least 1).
    #[must_use]
    pub fn exponential(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: Some(max_attempts.max(1)),
            backoff: Backoff::Exponential { base: base_delay },
            on_failure: None,
            signal: None,
        }
    }

    /// Limits the total number of attempts (at least 1).
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts.max(1));
        self
    }

    /// Sets the failure hook.
    #[must_use]
    pub fn with_on_failure<F>(mut self, hook: F) -> Self
    where
        F: FnMut(&RetryFailure<'_>) + Send + 'static,
    {
        self.on_failure = Some(Box::new(hook));
        self
    }

    /// Sets the cancellation signal.
    #[must_use]
    pub fn with_signal(mut self, signal: CancellationToken) -> Self {
        self.signal = Some(signal);
        self
    }
}

/// Runs `operation` until it succeeds, attempts are exhausted, or the signal
/// is cancelled.
///
/// # Errors
///
/// Returns the last operation error unchanged once attempts are exhausted,
/// or `E::from(Aborted)` when the signal fires. A request already in flight
/// is not interrupted by the signal.
pub async fn with_retry<T, E, F, Fut>(operation: F, options: RetryOptions) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display + From<Aborted>,
{
    let RetryOptions {
        max_attempts,
        backoff,
        mut on_failure,
        signal,
    } = options;

    let abort = signal.as_ref().map(|token| (token, || E::from(Aborted)));
    drive(operation, backoff, max_attempts, abort, on_failure.as_mut()).await
}

/// Exponential backoff shorthand: up to `max_attempts` attempts, waiting
/// `base_delay * 2^n` after failed attempt `n`.
///
/// There is no cancellation signal, so `E` needs no [`Aborted`] conversion.
///
/// # Errors
///
/// Returns the last operation error unchanged once attempts are exhausted.
pub async fn back_off<T, E, F, Fut>(
    operation: F,
    max_attempts: u32,
    base_delay: Duration,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
{
    let RetryOptions {
        max_attempts,
        backoff,
        ..
    } = RetryOptions::exponential(max_attempts, base_delay);
    drive(operation, backoff, max_attempts, None::<(&CancellationToken, fn() -> E)>, None).await
}

/// `abort` pairs the cancellation token with the conversion producing the
/// error returned when it fires.
async fn drive<T, E, F, Fut, A>(
    mut operation: F,
    backoff: Backoff,
    max_attempts: Option<u32>,
    abort: Option<(&CancellationToken, A)>,
    mut on_failure: Option<&mut FailureHook>,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
    A: Fn() -> E,
{
    let signal = abort.as_ref().map(|(token, _)| *token);
    let diagnostics = Environment::current().diagnostics_enabled();
    let mut state = RetryState::Idle;
    let mut attempt: u32 = 0;

    loop {
        if let Some((token, into_error)) = &abort
            && token.is_cancelled()
        {
            transition(state, RetryState::Aborted { attempt });
            return Err(into_error());
        }

        attempt = attempt.saturating_add(1);
        state = transition(state, RetryState::Attempting { attempt });

        let error = match operation().await {
            Ok(value) => {
                transition(state, RetryState::Succeeded { attempt });
                if attempt > 1 {
                    info!(attempts = attempt, "operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(error) => error,
        };

        if max_attempts.is_some_and(|max| attempt >= max) {
            transition(state, RetryState::Failed { attempt });
            debug!(error = %error, attempts = attempt, "retry attempts exhausted");
            return Err(error);
        }

        let delay = backoff.delay_for(attempt);
        state = transition(state, RetryState::Waiting { attempt, delay });

        if diagnostics {
            warn!(
                error = %error,
                attempt,
                max_attempts = ?max_attempts,
                delay_ms = delay.as_millis(),
                "operation failed, retrying"
            );
        } else {
            debug!(error = %error, attempt, delay_ms = delay.as_millis(), "operation failed, retrying");
        }

        if let Some(hook) = on_failure.as_mut() {
            hook(&RetryFailure {
                error: &error,
                attempt,
                max_attempts,
                delay,
            });
        }

        wait(delay, signal).await;
    }
}

fn transition(from: RetryState, to: RetryState) -> RetryState {
    trace!(?from, ?to, "retry state");
    to
}

async fn wait(delay: Duration, signal: Option<&CancellationToken>) {
    match signal {
        Some(token) => {
            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                () = token.cancelled() => {}
            }
        }
        None => tokio::time::sleep(delay).await,
    }
}
