//! Tracing setup for the CLI.
//!
//! Logs go to stderr so stdout stays reserved for the report. `RUST_LOG`
//! overrides the level derived from `-v`.

use std::sync::Once;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INIT: Once = Once::new();

/// Level name for a `-v` count.
pub fn level_for(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Install the global subscriber. Later calls are ignored.
pub fn init_logging(verbosity: u8, json: bool) {
    INIT.call_once(|| {
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(level_for(verbosity)));

        let registry = tracing_subscriber::registry().with(env_filter);
        let result = if json {
            registry.with(fmt::layer().json().with_writer(std::io::stderr)).try_init()
        } else {
            registry
                .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
                .try_init()
        };
        if let Err(e) = result {
            eprintln!("Failed to install log subscriber: {e}");
        }
    });
}
