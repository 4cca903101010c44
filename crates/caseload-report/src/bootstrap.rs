use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

// ── Directory bootstrap ────────────────────────────────────────────────────────

/// Ensure the standard `~/.caseload-report/` directory hierarchy exists.
///
/// Creates the following directories if absent (including any missing parents):
/// - `~/.caseload-report/`
/// - `~/.caseload-report/logs/`
pub fn ensure_directories() -> anyhow::Result<()> {
    ensure_directories_in(&home_dir())
}

/// Create the app directories rooted at `base_dir` (used for testing).
pub fn ensure_directories_in(base_dir: &Path) -> anyhow::Result<()> {
    let app_dir = base_dir.join(".caseload-report");
    std::fs::create_dir_all(&app_dir)?;
    std::fs::create_dir_all(app_dir.join("logs"))?;
    Ok(())
}

fn home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

// ── Logging bootstrap ──────────────────────────────────────────────────────────

/// Initialise the global `tracing` subscriber.
///
/// `log_level` is mapped to a [`tracing_subscriber::EnvFilter`] directive.
/// Falls back to `"info"` if the level string is not recognised.
///
/// With `log_file` set, output goes to that file (bare names land in
/// `~/.caseload-report/logs/`); otherwise everything goes to stderr.
pub fn setup_logging(log_level: &str, log_file: Option<&PathBuf>) -> anyhow::Result<()> {
    // Map logging-style level names (WARNING, CRITICAL) to tracing directives
    // (tracing uses lowercase).
    let upper = log_level.to_uppercase();
    let normalised = match upper.as_str() {
        "DEBUG" => "debug",
        "INFO" => "info",
        "WARNING" => "warn",
        "ERROR" | "CRITICAL" => "error",
        other => other,
    };

    let filter = EnvFilter::try_new(normalised).unwrap_or_else(|_| EnvFilter::new("info"));

    match log_file {
        Some(name) => {
            let path = resolve_log_path_in(&home_dir(), name);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new().create(true).append(true).open(&path)?;
            let subscriber = fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_ansi(false)
                .with_writer(Arc::new(file));
            tracing_subscriber::registry()
                .with(filter)
                .with(subscriber)
                .init();
        }
        None => {
            let subscriber = fmt::layer().with_target(false).with_thread_ids(false);
            tracing_subscriber::registry()
                .with(filter)
                .with(subscriber)
                .init();
        }
    }

    Ok(())
}

/// Where a `--log-file` value lands: absolute paths are honored as given,
/// bare names go to the logs directory rooted at `base_dir`.
pub fn resolve_log_path_in(base_dir: &Path, log_file: &Path) -> PathBuf {
    if log_file.is_absolute() {
        log_file.to_path_buf()
    } else {
        base_dir.join(".caseload-report").join("logs").join(log_file)
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
