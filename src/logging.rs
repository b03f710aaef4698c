// 📜 Logging - tracing subscriber setup shared by the CLI and the server

use std::sync::Once;
use tracing_subscriber::{fmt, EnvFilter};

static TRACING_INIT: Once = Once::new();

/// Default filter when `RUST_LOG` is not set
pub const DEFAULT_FILTER: &str = "gym_insight=info,gym_server=info,tower_http=info";

/// Initialize the global tracing subscriber.
///
/// Honors `RUST_LOG`; falls back to [`DEFAULT_FILTER`]. Safe to call more than once.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

        // try_init: a test harness may already own the global subscriber
        let _ = fmt().with_env_filter(filter).with_target(true).try_init();
    });
}
