use std::path::PathBuf;
use thiserror::Error;

/// All batch-fatal errors produced by the caseload pipeline.
///
/// Row-level problems (a malformed note, a bad hours value) are not errors:
/// they are collected as [`crate::models::RowFailure`] records and returned
/// alongside the clean rows. Only conditions that make the whole batch
/// meaningless surface through this enum.
#[derive(Error, Debug)]
pub enum CaseloadError {
    /// A file could not be opened or read from disk.
    #[error("Failed to read file {}: {}", .path.display(), .source)]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A delimited file could not be read or written.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A JSON document (config file, saved parameters) could not be parsed.
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// A required column is absent from an export after header mapping.
    #[error("Missing required column(s) in {input}: {cols}", cols = .columns.join(", "))]
    MissingColumns { input: String, columns: Vec<String> },

    /// An export produced zero data rows.
    #[error("No data rows found in {0}")]
    EmptyInput(String),

    /// The expected input file does not exist.
    #[error("Input file not found: {}", .0.display())]
    InputNotFound(PathBuf),

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Pass-through for any raw I/O error that does not carry a path.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Catch-all for errors from third-party crates via `anyhow`.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Convenience alias used throughout the caseload crates.
pub type Result<T> = std::result::Result<T, CaseloadError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_file_read() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let err = CaseloadError::FileRead {
            path: PathBuf::from("/some/hours.csv"),
            source: io_err,
        };
        let msg = err.to_string();
        assert!(msg.contains("Failed to read file"));
        assert!(msg.contains("/some/hours.csv"));
        assert!(msg.contains("no such file"));
    }

    #[test]
    fn test_error_display_missing_columns() {
        let err = CaseloadError::MissingColumns {
            input: "accounting export".to_string(),
            columns: vec!["Date".to_string(), "Amount".to_string()],
        };
        let msg = err.to_string();
        assert_eq!(
            msg,
            "Missing required column(s) in accounting export: Date, Amount"
        );
    }

    #[test]
    fn test_error_display_empty_input() {
        let err = CaseloadError::EmptyInput("time-tracking export".to_string());
        let msg = err.to_string();
        assert_eq!(msg, "No data rows found in time-tracking export");
    }

    #[test]
    fn test_error_display_input_not_found() {
        let err = CaseloadError::InputNotFound(PathBuf::from("/missing/hours.csv"));
        let msg = err.to_string();
        assert_eq!(msg, "Input file not found: /missing/hours.csv");
    }

    #[test]
    fn test_error_display_config() {
        let err = CaseloadError::Config("cost rate must be positive".to_string());
        let msg = err.to_string();
        assert_eq!(msg, "Configuration error: cost rate must be positive");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: CaseloadError = io_err.into();
        let msg = err.to_string();
        assert!(msg.contains("denied"));
    }

    #[test]
    fn test_error_from_serde_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{invalid}").unwrap_err();
        let err: CaseloadError = json_err.into();
        let msg = err.to_string();
        assert!(msg.contains("Failed to parse JSON"));
    }
}
