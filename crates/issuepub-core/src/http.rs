//! Shared HTTP client and runtime.
//!
//! Uses async reqwest internally but the pipeline is strictly sequential,
//! so callers get a sync interface via `SHARED_RUNTIME.block_on`.

use std::sync::{LazyLock, OnceLock};
use std::time::Duration;

/// Connect timeout
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Process-wide HTTP settings, set once at startup.
#[derive(Debug, Clone, Copy)]
pub struct HttpConfig {
    /// Whole-request timeout (connect + body)
    pub request_timeout: Duration,
    /// Maximum retry attempts for retryable failures
    pub max_retries: u32,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(60),
            max_retries: 3,
        }
    }
}

static HTTP_CONFIG: OnceLock<HttpConfig> = OnceLock::new();

/// Install HTTP settings. Only the first call wins; must happen before
/// the first request so the client picks up the timeout.
pub fn set_http_config(config: HttpConfig) {
    if HTTP_CONFIG.set(config).is_err() {
        log::debug!("HTTP config already set, ignoring override");
    }
}

/// Current HTTP settings (defaults when never set).
pub fn http_config() -> HttpConfig {
    HTTP_CONFIG.get().copied().unwrap_or_default()
}

/// Shared async HTTP client with connection pooling.
static SHARED_CLIENT: LazyLock<reqwest::Client> = LazyLock::new(|| {
    reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(http_config().request_timeout)
        .user_agent(concat!("issuepub/", env!("CARGO_PKG_VERSION")))
        .pool_max_idle_per_host(2)
        .build()
        .expect("failed to build HTTP client")
});

/// Get shared HTTP client.
pub fn http_client() -> &'static reqwest::Client {
    &SHARED_CLIENT
}

/// Shared tokio runtime for HTTP operations.
///
/// One worker is enough: documents are processed one at a time and each
/// call is awaited to completion before the next one starts.
pub static SHARED_RUNTIME: LazyLock<tokio::runtime::Runtime> = LazyLock::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
        .expect("failed to build tokio runtime")
});
