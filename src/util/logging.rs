// CrashSleuth - util/logging.rs
//
// Structured logging via `tracing` + `tracing-subscriber`.
//
// Priority: RUST_LOG env var > explicit `level` argument > default "info".
// Output goes to stderr. Never logs secrets or raw log-file contents —
// only file paths, counts, and durations.

use tracing_subscriber::EnvFilter;

/// Initialise the logging subsystem.
///
/// `level` is an explicit override (e.g. from an embedding application's own
/// CLI flag); pass `None` to fall through to the default level.
pub fn init(level: Option<&str>) {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if let Some(level) = level {
        EnvFilter::new(level)
    } else {
        EnvFilter::new(super::constants::DEFAULT_LOG_LEVEL)
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .compact()
        .init();

    tracing::debug!(
        app = super::constants::APP_NAME,
        version = super::constants::APP_VERSION,
        "logging initialised"
    );
}
