//! Issuepub Core - Shared infrastructure for the publishing pipeline
//!
//! Logging, progress output, the shared HTTP client and runtime,
//! transport errors with retry classification, and graceful shutdown.

pub mod error;
pub mod http;
pub mod logging;
pub mod progress;
pub mod retry;
pub mod shutdown;

// Re-exports for convenience
pub use error::ApiError;
pub use http::{HttpConfig, SHARED_RUNTIME, http_client, http_config, set_http_config};
pub use logging::{IndicatifLogger, init_logging};
pub use progress::{ProgressContext, SharedProgress};
pub use retry::{backoff_duration, retry_with_backoff, retry_with_recheck};
pub use shutdown::{
    INTERRUPTED_EXIT, install_signal_handlers, is_shutdown_requested, request_shutdown,
};
