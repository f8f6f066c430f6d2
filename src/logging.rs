//! Tracing subscriber setup for the binary.

use std::sync::Once;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INIT: Once = Once::new();

/// Install the global subscriber: `RUST_LOG` filter (default `info`),
/// human-readable or JSON lines on stderr. Later calls are ignored.
pub fn init_tracing(json: bool) {
    INIT.call_once(|| {
        let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        if json {
            let fmt_layer = fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_current_span(true);
            tracing_subscriber::registry().with(env_filter).with(fmt_layer).init();
        } else {
            let fmt_layer = fmt::layer().with_writer(std::io::stderr).with_target(true);
            tracing_subscriber::registry().with(env_filter).with(fmt_layer).init();
        }

        tracing::debug!(json, "tracing initialized");
    });
}
