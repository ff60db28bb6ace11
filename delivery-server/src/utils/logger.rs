//! Logging setup
//!
//! `RUST_LOG` wins when set; otherwise the configured level applies to this
//! crate and `tower_http`, with `warn` for everything else. When the log
//! directory exists, output goes to a daily rolling file instead of stdout.

use std::path::Path;
use tracing_subscriber::EnvFilter;

/// Initialize the global subscriber
pub fn init_logger(level: &str, json: bool, log_dir: Option<&str>) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "warn,delivery_server={level},shared={level},tower_http={level}"
        ))
    });

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_file(false)
        .with_line_number(false)
        .with_thread_ids(false)
        .with_target(false);

    let file_dir = log_dir
        .map(Path::new)
        .filter(|p| p.is_dir())
        .and_then(Path::to_str);

    match (file_dir, json) {
        (Some(dir), true) => builder
            .json()
            .with_writer(tracing_appender::rolling::daily(dir, "delivery-server"))
            .init(),
        (Some(dir), false) => builder
            .with_ansi(false)
            .with_writer(tracing_appender::rolling::daily(dir, "delivery-server"))
            .init(),
        (None, true) => builder.json().init(),
        (None, false) => builder.init(),
    }
}
