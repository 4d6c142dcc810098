//! Transport error type for tracker API calls

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use reqwest::header::HeaderMap;

/// Longest wait honored from a rate-limit response
pub const MAX_RATE_LIMIT_WAIT: Duration = Duration::from_secs(15 * 60);

/// Error from a single remote API call.
///
/// Routine "not found" outcomes are never represented here; callers get
/// those as `Option`/`bool`. This type is reserved for transport, HTTP
/// status and payload failures.
#[derive(Debug)]
pub enum ApiError {
    /// HTTP error with optional status code (None = timeout or a
    /// failure after the request was sent)
    Http {
        status: Option<u16>,
        message: String,
    },
    /// Connection could not be established; nothing reached the server
    Connect(String),
    /// Throttled (429, or 403 carrying rate-limit signals)
    RateLimited {
        status: u16,
        retry_after: Option<Duration>,
        message: String,
    },
    /// Response body could not be decoded
    Decode(String),
    /// Local I/O failure while talking to the API
    Io(std::io::Error),
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Http {
                status: Some(s),
                message,
            } => write!(f, "HTTP {s}: {message}"),
            Self::Http {
                status: None,
                message,
            } => write!(f, "HTTP error: {message}"),
            Self::Connect(msg) => write!(f, "connect error: {msg}"),
            Self::RateLimited {
                status,
                retry_after: Some(wait),
                message,
            } => write!(f, "HTTP {status}: {message} (rate limited, retry in {}s)", wait.as_secs()),
            Self::RateLimited {
                status,
                retry_after: None,
                message,
            } => write!(f, "HTTP {status}: {message} (rate limited)"),
            Self::Decode(msg) => write!(f, "decode error: {msg}"),
            Self::Io(e) => write!(f, "IO error: {e}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<std::io::Error> for ApiError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl ApiError {
    /// Create HTTP error from reqwest error.
    ///
    /// The URL is stripped so request paths and query strings
    /// never end up in logs or the run report.
    pub fn from_reqwest(e: &reqwest::Error) -> Self {
        let mut message = e.to_string();
        if let Some(url) = e.url() {
            message = message.replace(url.as_str(), "<url>");
        }
        if e.is_connect() {
            return Self::Connect(message);
        }
        Self::Http {
            status: e.status().map(|s| s.as_u16()),
            message,
        }
    }

    /// Create error from a non-success response.
    ///
    /// GitHub throttles with 429 or with a 403 that carries
    /// `x-ratelimit-remaining: 0`, a `Retry-After` header, or a
    /// "rate limit" message. Those become [`ApiError::RateLimited`]; any
    /// other 403 stays an auth failure.
    pub fn from_response(status: u16, headers: &HeaderMap, body: &str) -> Self {
        let message = reqwest::StatusCode::from_u16(status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or("request failed")
            .to_string();

        let retry_after = header_u64(headers, "retry-after").map(Duration::from_secs);
        let exhausted = header_u64(headers, "x-ratelimit-remaining") == Some(0);
        let throttled = status == 429
            || (status == 403
                && (exhausted
                    || retry_after.is_some()
                    || body.to_ascii_lowercase().contains("rate limit")));
        if !throttled {
            return Self::Http {
                status: Some(status),
                message,
            };
        }

        let until_reset = || {
            let reset = header_u64(headers, "x-ratelimit-reset")?;
            let now = SystemTime::now().duration_since(UNIX_EPOCH).ok()?.as_secs();
            Some(Duration::from_secs(reset.saturating_sub(now) + 1))
        };
        let wait = retry_after.or_else(|| if exhausted { until_reset() } else { None });
        Self::RateLimited {
            status,
            retry_after: wait.map(|w| w.min(MAX_RATE_LIMIT_WAIT)),
            message,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => *status,
            Self::RateLimited { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Server-requested wait before the next attempt.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// Rate limiting, server errors (5xx), connect failures and
    /// status-less network failures are worth another attempt.
    /// Everything else is final.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http { status, .. } => matches!(status, None | Some(429) | Some(500..=599)),
            Self::Connect(_) | Self::RateLimited { .. } => true,
            Self::Decode(_) => false,
            Self::Io(e) => e.kind() != std::io::ErrorKind::StorageFull,
        }
    }

    /// The request may have been applied even though no success came back:
    /// a timeout or dropped connection after sending, or a 5xx.
    pub fn may_have_applied(&self) -> bool {
        match self {
            Self::Http { status, .. } => matches!(status, None | Some(500..=599)),
            _ => false,
        }
    }

    /// Bad or missing credential.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Http { status: Some(401 | 403), .. })
    }
}

fn header_u64(headers: &HeaderMap, name: &str) -> Option<u64> {
    headers.get(name)?.to_str().ok()?.trim().parse().ok()
}
