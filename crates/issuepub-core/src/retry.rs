//! Retry with exponential backoff for tracker API calls

use std::time::Duration;

use crate::error::ApiError;
use crate::http::http_config;

/// Exponential backoff: 2^attempt seconds (2s, 4s, 8s, ...)
pub const fn backoff_duration(attempt: u32) -> Duration {
    Duration::from_secs(2u64.pow(attempt))
}

/// Wait before retry `attempt`: the server's `Retry-After` when it sent
/// one, else the exponential backoff.
fn retry_delay(err: &ApiError, attempt: u32, backoff: impl Fn(u32) -> Duration) -> Duration {
    err.retry_after().unwrap_or_else(|| backoff(attempt))
}

/// Retry a fallible API call with exponential backoff.
///
/// On retryable errors, logs the failure, sleeps, and retries up to
/// `max_retries` (from global [`HttpConfig`](crate::HttpConfig)).
///
/// Returns `Ok(T)` on first success, or the final `Err` on exhaustion / non-retryable error.
pub fn retry_with_backoff<T>(
    label: &str,
    attempt_fn: impl FnMut() -> Result<T, ApiError>,
) -> Result<T, ApiError> {
    retry_with(label, http_config().max_retries, backoff_duration, attempt_fn, || Ok(None))
}

/// Retry for calls that must not be applied twice (creating an item).
///
/// When a failed attempt may still have been applied server-side
/// ([`ApiError::may_have_applied`]), `recheck` runs after the backoff and
/// before the next attempt. `Ok(Some(v))` ends the retry with `v`. A
/// recheck that cannot answer returns the original error instead of
/// risking a second application.
pub fn retry_with_recheck<T>(
    label: &str,
    attempt_fn: impl FnMut() -> Result<T, ApiError>,
    recheck: impl FnMut() -> Result<Option<T>, ApiError>,
) -> Result<T, ApiError> {
    retry_with(label, http_config().max_retries, backoff_duration, attempt_fn, recheck)
}

fn retry_with<T>(
    label: &str,
    max_retries: u32,
    backoff: impl Fn(u32) -> Duration,
    mut attempt_fn: impl FnMut() -> Result<T, ApiError>,
    mut recheck: impl FnMut() -> Result<Option<T>, ApiError>,
) -> Result<T, ApiError> {
    let mut attempt = 0u32;
    loop {
        match attempt_fn() {
            Ok(v) => return Ok(v),
            Err(e) if attempt < max_retries && e.is_retryable() => {
                attempt += 1;
                let delay = retry_delay(&e, attempt, &backoff);
                log::warn!("{label}: attempt {attempt}/{max_retries} failed: {e}, retry in {delay:?}");
                std::thread::sleep(delay);

                if e.may_have_applied() {
                    match recheck() {
                        Ok(Some(v)) => {
                            log::info!("{label}: earlier attempt was applied, not retrying");
                            return Ok(v);
                        }
                        Ok(None) => {}
                        Err(check_err) => {
                            log::warn!("{label}: cannot tell whether {e} was applied: {check_err}");
                            return Err(e);
                        }
                    }
                }
            }
            Err(e) => {
                log::debug!("{label}: giving up: {e}");
                return Err(e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn http_err(status: u16) -> ApiError {
        ApiError::Http {
            status: Some(status),
            message: "test".to_string(),
        }
    }

    #[test]
    fn backoff_exponential() {
        assert_eq!(backoff_duration(1), Duration::from_secs(2));
        assert_eq!(backoff_duration(2), Duration::from_secs(4));
        assert_eq!(backoff_duration(3), Duration::from_secs(8));
    }

    #[test]
    fn retries_until_success() {
        let mut calls = 0;
        let result = retry_with("t", 3, |_| Duration::ZERO, || {
            calls += 1;
            if calls < 3 { Err(http_err(502)) } else { Ok(calls) }
        }, || Ok(None));
        assert_eq!(result.unwrap(), 3);
    }

    #[test]
    fn gives_up_after_max_retries() {
        let mut calls = 0;
        let result: Result<(), _> = retry_with("t", 2, |_| Duration::ZERO, || {
            calls += 1;
            Err(http_err(429))
        }, || Ok(None));
        assert!(result.is_err());
        assert_eq!(calls, 3);
    }

    #[test]
    fn non_retryable_fails_immediately() {
        let mut calls = 0;
        let result: Result<(), _> = retry_with("t", 5, |_| Duration::ZERO, || {
            calls += 1;
            Err(http_err(422))
        }, || Ok(None));
        assert_eq!(result.unwrap_err().status(), Some(422));
        assert_eq!(calls, 1);
    }

    fn timeout() -> ApiError {
        ApiError::Http {
            status: None,
            message: "operation timed out".to_string(),
        }
    }

    #[test]
    fn applied_attempt_is_not_repeated() {
        let mut calls = 0;
        let mut checks = 0;
        let result = retry_with("create", 3, |_| Duration::ZERO, || {
            calls += 1;
            Err(timeout())
        }, || {
            checks += 1;
            Ok(Some(41))
        });
        assert_eq!(result.unwrap(), 41);
        assert_eq!((calls, checks), (1, 1));
    }

    #[test]
    fn unapplied_attempt_is_repeated() {
        let mut calls = 0;
        let result = retry_with("create", 3, |_| Duration::ZERO, || {
            calls += 1;
            if calls == 1 { Err(http_err(503)) } else { Ok(7) }
        }, || Ok(None));
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls, 2);
    }

    #[test]
    fn failed_recheck_returns_original_error() {
        let mut calls = 0;
        let result: Result<u32, _> = retry_with("create", 3, |_| Duration::ZERO, || {
            calls += 1;
            Err(timeout())
        }, || Err(http_err(500)));
        assert_eq!(result.unwrap_err().status(), None);
        assert_eq!(calls, 1);
    }

    #[test]
    fn rejected_attempt_skips_recheck() {
        let mut calls = 0;
        let mut checks = 0;
        let result = retry_with("create", 3, |_| Duration::ZERO, || {
            calls += 1;
            if calls == 1 { Err(ApiError::Connect("refused".into())) } else { Ok(1) }
        }, || {
            checks += 1;
            Ok(None)
        });
        assert_eq!(result.unwrap(), 1);
        assert_eq!(checks, 0);
    }

    #[test]
    fn server_wait_overrides_backoff() {
        let limited = ApiError::RateLimited {
            status: 403,
            retry_after: Some(Duration::from_secs(60)),
            message: "Forbidden".into(),
        };
        assert_eq!(retry_delay(&limited, 1, backoff_duration), Duration::from_secs(60));
        assert_eq!(retry_delay(&http_err(502), 1, backoff_duration), Duration::from_secs(2));
    }
}
