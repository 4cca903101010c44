use chrono::NaiveDate;
use clap::{CommandFactory, Parser};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{CaseloadError, Result};
use crate::matching::{DistrictCatalog, DEFAULT_MATCH_THRESHOLD};
use crate::models::FilterSpec;
use crate::rates::RateBook;
use crate::vocab::{TaskRule, TaskVocabulary};

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// District caseload, revenue, and margin reporting from time-tracking and
/// accounting exports
#[derive(Parser, Debug, Clone)]
#[command(
    name = "caseload-report",
    about = "District caseload, revenue, and margin reporting from time-tracking and accounting exports",
    version
)]
pub struct Settings {
    /// Time-tracking export (CSV)
    #[arg(long, value_name = "FILE")]
    pub time_export: Option<PathBuf>,

    /// Accounting export (CSV); revenue stays zero when omitted
    #[arg(long, value_name = "FILE")]
    pub finance_export: Option<PathBuf>,

    /// Directory for cleaned tables, metrics, and failure reports
    #[arg(long, default_value = "out", value_name = "DIR")]
    pub out_dir: PathBuf,

    /// JSON config file (roster, aliases, rates, column names)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Keep only work dated on or after this day (YYYY-MM-DD)
    #[arg(long, value_name = "DATE")]
    pub from: Option<NaiveDate>,

    /// Keep only work dated on or before this day (YYYY-MM-DD)
    #[arg(long, value_name = "DATE")]
    pub to: Option<NaiveDate>,

    /// Keep only this district; repeat for several
    #[arg(long = "district", value_name = "NAME")]
    pub districts: Vec<String>,

    /// Keep only this psychologist and break metrics out per psychologist;
    /// repeat for several
    #[arg(long = "psychologist", value_name = "NAME")]
    pub psychologists: Vec<String>,

    /// Flat labor cost per hour, overriding the built-in rate book
    #[arg(long, value_name = "DOLLARS")]
    pub cost_per_hour: Option<f64>,

    /// Write a Markdown summary report alongside the CSV exports
    #[arg(long)]
    pub report: bool,

    /// Logging level
    #[arg(long, default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"])]
    pub log_level: String,

    /// Log file path
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Clear saved configuration
    #[arg(long)]
    pub clear: bool,
}

// ── Column maps ────────────────────────────────────────────────────────────────

/// Accepted header spellings for the time-tracking export.
///
/// `date` and `contractor` match a header exactly (case-insensitive, trimmed);
/// `note` is a prefix so repeated columns like `Notes`, `Notes.1` are all
/// picked up.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeColumns {
    #[serde(default = "default_time_date")]
    pub date: Vec<String>,
    #[serde(default = "default_time_contractor")]
    pub contractor: Vec<String>,
    #[serde(default = "default_time_note")]
    pub note: Vec<String>,
}

fn default_time_date() -> Vec<String> {
    vec!["date".into(), "work date".into(), "day".into()]
}

fn default_time_contractor() -> Vec<String> {
    vec![
        "psychologist".into(),
        "contractor".into(),
        "employee".into(),
        "name".into(),
    ]
}

fn default_time_note() -> Vec<String> {
    vec!["note".into(), "memo".into()]
}

impl Default for TimeColumns {
    fn default() -> Self {
        Self {
            date: default_time_date(),
            contractor: default_time_contractor(),
            note: default_time_note(),
        }
    }
}

/// Accepted header spellings for the accounting export, keyed to the
/// QuickBooks transaction-list layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinanceColumns {
    #[serde(default = "default_finance_date")]
    pub date: Vec<String>,
    #[serde(default = "default_finance_service_date")]
    pub service_date: Vec<String>,
    #[serde(default = "default_finance_transaction_type")]
    pub transaction_type: Vec<String>,
    #[serde(default = "default_finance_transaction_id")]
    pub transaction_id: Vec<String>,
    #[serde(default = "default_finance_customer")]
    pub customer: Vec<String>,
    #[serde(default = "default_finance_description")]
    pub description: Vec<String>,
    #[serde(default = "default_finance_amount")]
    pub amount: Vec<String>,
}

fn default_finance_date() -> Vec<String> {
    vec!["transaction date".into(), "date".into()]
}

fn default_finance_service_date() -> Vec<String> {
    vec!["service date".into()]
}

fn default_finance_transaction_type() -> Vec<String> {
    vec!["transaction type".into(), "type".into()]
}

fn default_finance_transaction_id() -> Vec<String> {
    vec!["num".into(), "transaction id".into(), "invoice".into()]
}

fn default_finance_customer() -> Vec<String> {
    vec![
        "customer".into(),
        "customer full name".into(),
        "client".into(),
    ]
}

fn default_finance_description() -> Vec<String> {
    vec![
        "line description".into(),
        "memo/description".into(),
        "description".into(),
        "memo".into(),
    ]
}

fn default_finance_amount() -> Vec<String> {
    vec!["amount".into(), "total".into()]
}

impl Default for FinanceColumns {
    fn default() -> Self {
        Self {
            date: default_finance_date(),
            service_date: default_finance_service_date(),
            transaction_type: default_finance_transaction_type(),
            transaction_id: default_finance_transaction_id(),
            customer: default_finance_customer(),
            description: default_finance_description(),
            amount: default_finance_amount(),
        }
    }
}

/// Index of the first header equal to any of `names`, case-insensitive on
/// trimmed text.
pub fn find_header(headers: &[String], names: &[String]) -> Option<usize> {
    headers.iter().position(|header| {
        let header = header.trim();
        names.iter().any(|name| header.eq_ignore_ascii_case(name))
    })
}

/// Indices of every header starting with any of `prefixes`, case-insensitive
/// on trimmed text. Preserves file order.
pub fn find_headers_with_prefix(headers: &[String], prefixes: &[String]) -> Vec<usize> {
    headers
        .iter()
        .enumerate()
        .filter(|(_, header)| {
            let lowered = header.trim().to_lowercase();
            prefixes
                .iter()
                .any(|prefix| lowered.starts_with(&prefix.to_lowercase()))
        })
        .map(|(index, _)| index)
        .collect()
}

// ── AppConfig ──────────────────────────────────────────────────────────────────

/// Optional JSON configuration file: roster, aliases, vocabulary, rates, and
/// column-name overrides. Every field has a compiled-in default, so a partial
/// file is fine and no file at all is fine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Canonical district roster. Replaces the built-in roster when set.
    pub districts: Option<Vec<String>>,
    /// Extra alias -> canonical district pairs, tried before fuzzy matching.
    pub aliases: Option<HashMap<String, String>>,
    /// Similarity floor for fuzzy district matching.
    pub match_threshold: Option<f64>,
    /// Custom task keyword rules, tried before the built-in ones.
    pub task_rules: Option<Vec<TaskRule>>,
    /// Contractor first name -> hourly rate overrides.
    pub rates: Option<HashMap<String, f64>>,
    /// Hourly rate for contractors absent from the rate map.
    pub default_rate: Option<f64>,
    /// Column-name overrides for the time-tracking export.
    pub time_columns: TimeColumns,
    /// Column-name overrides for the accounting export.
    pub finance_columns: FinanceColumns,
}

impl AppConfig {
    /// Default config file location, `~/.caseload-report/config.json`.
    pub fn default_path() -> PathBuf {
        Self::default_path_in(&dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
    }

    /// The config path rooted at `base_dir` (used for testing).
    pub fn default_path_in(base_dir: &Path) -> PathBuf {
        base_dir.join(".caseload-report").join("config.json")
    }

    /// Load a config file. Unreadable files and malformed JSON are hard
    /// errors; a config the user pointed at must not be silently ignored.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| CaseloadError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Resolve the effective config: an explicit path must load, the default
    /// location is used when present, and otherwise the compiled-in defaults
    /// apply.
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::load_from(path),
            None => {
                let default = Self::default_path();
                if default.exists() {
                    Self::load_from(&default)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Build the district catalog this config describes.
    pub fn district_catalog(&self) -> DistrictCatalog {
        let extra: Vec<(String, String)> = self
            .aliases
            .clone()
            .unwrap_or_default()
            .into_iter()
            .collect();
        let catalog = match &self.districts {
            Some(roster) => DistrictCatalog::new(roster.clone(), extra, DEFAULT_MATCH_THRESHOLD),
            None => DistrictCatalog::with_defaults().with_aliases(extra),
        };
        match self.match_threshold {
            Some(threshold) => catalog.with_threshold(threshold),
            None => catalog,
        }
    }

    /// Build the task vocabulary this config describes.
    pub fn task_vocabulary(&self) -> TaskVocabulary {
        TaskVocabulary::new(self.task_rules.clone())
    }

    /// Build the contractor rate book this config describes.
    pub fn rate_book(&self) -> RateBook {
        RateBook::new(self.rates.clone()).with_default_rate(self.default_rate)
    }
}

// ── LastUsedParams ─────────────────────────────────────────────────────────────

/// Persisted last-used parameters saved to `~/.caseload-report/last_used.json`.
#[derive(Debug, Serialize, Deserialize, Default, Clone)]
pub struct LastUsedParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub out_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_per_hour: Option<f64>,
}

impl LastUsedParams {
    /// Return the default path to the persisted config file.
    /// Uses `~/.caseload-report/last_used.json`.
    pub fn config_path() -> PathBuf {
        Self::config_path_in(&dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
    }

    /// Return the config path rooted at `base_dir` (used for testing).
    pub fn config_path_in(base_dir: &Path) -> PathBuf {
        base_dir.join(".caseload-report").join("last_used.json")
    }

    /// Load persisted params from the default path.
    /// Returns `Default` when the file is absent or cannot be parsed.
    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    /// Load persisted params from an explicit path.
    pub fn load_from(path: &Path) -> Self {
        let Ok(content) = std::fs::read_to_string(path) else {
            return Self::default();
        };
        serde_json::from_str(&content).unwrap_or_default()
    }

    /// Atomically write params to the default path, creating parent
    /// directories if needed.
    pub fn save(&self) -> std::io::Result<()> {
        self.save_to(&Self::config_path())
    }

    /// Atomically write params to an explicit path.
    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;

        // Write to a temp file then rename for atomicity.
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, &json)?;
        std::fs::rename(&tmp, path)?;

        Ok(())
    }

    /// Delete the default config file if it exists.
    pub fn clear() -> std::io::Result<()> {
        Self::clear_at(&Self::config_path())
    }

    /// Delete the config file at an explicit path if it exists.
    pub fn clear_at(path: &Path) -> std::io::Result<()> {
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }
}

// ── Settings impl ──────────────────────────────────────────────────────────────

impl Settings {
    /// Parse CLI arguments, merge with last-used params where no explicit CLI
    /// value was provided, and persist the result.
    pub fn load_with_last_used() -> Self {
        Self::load_with_last_used_impl(
            std::env::args_os().collect(),
            &LastUsedParams::config_path(),
        )
    }

    /// Same as [`load_with_last_used`](Self::load_with_last_used) but accepts
    /// an explicit argument list, enabling unit-testing without spawning
    /// subprocesses.
    pub fn load_with_last_used_from_args(args: Vec<std::ffi::OsString>) -> Self {
        Self::load_with_last_used_impl(args, &LastUsedParams::config_path())
    }

    /// Full implementation – accepts args and an explicit config path so that
    /// tests can redirect to a temporary directory.
    pub fn load_with_last_used_impl(
        args: Vec<std::ffi::OsString>,
        config_path: &Path,
    ) -> Self {
        // Build raw ArgMatches so we can query ValueSource.
        let matches = Settings::command().get_matches_from(args.clone());

        // Parse into the typed struct using the same args.
        let mut settings = Settings::parse_from(args);

        if settings.clear {
            let _ = LastUsedParams::clear_at(config_path);
            return Self::apply_flag_overrides(settings);
        }

        let last = LastUsedParams::load_from(config_path);

        // Merge last-used values for fields that were NOT explicitly set on
        // the command line (CLI always wins). Input paths and filters are
        // never loaded from last-used; they describe one run, not the setup.
        if !is_arg_explicitly_set(&matches, "out_dir") {
            if let Some(v) = last.out_dir {
                settings.out_dir = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "config") && settings.config.is_none() {
            settings.config = last.config;
        }
        if !is_arg_explicitly_set(&matches, "cost_per_hour") && settings.cost_per_hour.is_none() {
            settings.cost_per_hour = last.cost_per_hour;
        }

        settings = Self::apply_flag_overrides(settings);

        // Persist current settings for next run.
        let params = LastUsedParams::from(&settings);
        let _ = params.save_to(config_path);

        settings
    }

    /// Apply the `--debug` flag to the log level.
    fn apply_flag_overrides(mut settings: Settings) -> Settings {
        if settings.debug {
            settings.log_level = "DEBUG".to_string();
        }
        settings
    }

    /// Translate the CLI filter flags into a [`FilterSpec`].
    pub fn filter_spec(&self) -> FilterSpec {
        let date_range = match (self.from, self.to) {
            (None, None) => None,
            (from, to) => Some((
                from.unwrap_or(NaiveDate::MIN),
                to.unwrap_or(NaiveDate::MAX),
            )),
        };
        FilterSpec {
            date_range,
            districts: if self.districts.is_empty() {
                None
            } else {
                Some(self.districts.iter().cloned().collect())
            },
            psychologists: if self.psychologists.is_empty() {
                None
            } else {
                Some(self.psychologists.iter().cloned().collect())
            },
            cost_per_hour: self.cost_per_hour,
        }
    }
}

// ── Conversion ─────────────────────────────────────────────────────────────────

impl From<&Settings> for LastUsedParams {
    fn from(s: &Settings) -> Self {
        LastUsedParams {
            out_dir: Some(s.out_dir.clone()),
            config: s.config.clone(),
            cost_per_hour: s.cost_per_hour,
        }
    }
}

// ── Helper: check if an arg was explicitly set on the command line ─────────────

/// Returns `true` when `name` was supplied explicitly on the command line
/// (not via default value or environment variable).
fn is_arg_explicitly_set(matches: &clap::ArgMatches, name: &str) -> bool {
    matches.value_source(name) == Some(clap::parser::ValueSource::CommandLine)
}

// ── Tests ──────────────────────────────────────────────────────────────────────
