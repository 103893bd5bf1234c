//! Telemetry initialization (tracing/tracing-subscriber).
//!
//! Behavior:
//! - LOG_LEVEL controls the filter (e.g. "debug" or detailed directives like
//!   "info,daily=debug,telegram=debug"). Unset, `DEFAULT_FILTER` applies.
//! - LOG_FORMAT selects "pretty" (default) or "json" structured logs.
//! - teloxide reports through the `log` facade; those records land under the
//!   `teloxide` target.

use tracing_subscriber::EnvFilter;

/// Our own targets at debug, transport noise at info.
pub const DEFAULT_FILTER: &str = "info,boardwhite=debug,daily=debug,telegram=info,store=info,teloxide=info,tower_http=info";

pub fn init_tracing() {
    let filter = EnvFilter::try_from_env("LOG_LEVEL").unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(true)
        .with_line_number(true);

    match std::env::var("LOG_FORMAT").as_deref() {
        Ok("json") => {
            builder.json().init();
        }
        _ => {
            builder.init();
        }
    }
}
