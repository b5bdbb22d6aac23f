//! Tracing setup and secret redaction.

use std::sync::Once;

pub const DEFAULT_LOG_FILTER: &str = "byoa=debug,info";

const REDACTED: &str = "****";

static INIT: Once = Once::new();

/// Install the global `tracing` subscriber. `RUST_LOG` wins over `filter`;
/// later calls are ignored.
pub fn init_tracing(filter: Option<&str>) {
    INIT.call_once(|| {
        let fallback = filter.unwrap_or(DEFAULT_LOG_FILTER);
        let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .or_else(|_| tracing_subscriber::EnvFilter::try_new(fallback))
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_LOG_FILTER));

        if let Err(e) = tracing_subscriber::fmt().with_env_filter(env_filter).try_init() {
            eprintln!("tracing already initialized: {e}");
        }
    });
}

/// Mask a secret for logs and `Debug` output. Empty values stay empty so a
/// missing key is still visible.
pub fn redact(secret: &str) -> &'static str {
    if secret.is_empty() {
        ""
    } else {
        REDACTED
    }
}
