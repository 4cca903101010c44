//! Main analysis pipeline for caseload reporting.
//!
//! Orchestrates reading the two exports, normalizing them, joining them into
//! metric rows and case summaries, and rolling up headline totals, returning
//! an [`AnalysisResult`] ready for the report and export layers.

use std::path::Path;

use caseload_core::error::Result;
use caseload_core::metrics::MetricsCalculator;
use caseload_core::models::{
    AggregatedMetric, CleanOutcome, FilterSpec, KpiTotals, RevenueLine, TimeEntry,
};
use caseload_core::settings::AppConfig;
use chrono::Utc;
use tracing::info;

use crate::aggregator::Aggregator;
use crate::cases::{summarize_cases, CaseSummary};
use crate::finance_normalizer::FinanceNormalizer;
use crate::reader::{read_finance_export, read_time_export};
use crate::time_normalizer::TimeNormalizer;

// ── Public types ──────────────────────────────────────────────────────────────

/// Metadata produced alongside the analysis result.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AnalysisMetadata {
    /// ISO-8601 timestamp when this result was generated.
    pub generated_at: String,
    /// Raw data rows read from the time export.
    pub time_rows_read: usize,
    /// Raw data rows read from the accounting export (0 when none given).
    pub finance_rows_read: usize,
    /// Clean [`TimeEntry`] rows after normalization.
    pub clean_time_entries: usize,
    /// Clean [`RevenueLine`] rows after normalization.
    pub clean_revenue_lines: usize,
    /// Time rows rejected with a reason.
    pub time_failures: usize,
    /// Accounting rows rejected with a reason.
    pub finance_failures: usize,
    /// Wall-clock seconds spent reading the input files.
    pub load_time_seconds: f64,
    /// Wall-clock seconds spent normalizing and joining.
    pub transform_time_seconds: f64,
}

/// The complete output of [`analyze_exports`].
#[derive(Debug, Clone)]
pub struct AnalysisResult {
    /// Clean time entries and the rows that failed cleaning.
    pub time: CleanOutcome<TimeEntry>,
    /// Clean revenue lines and the rows that failed cleaning.
    pub revenue: CleanOutcome<RevenueLine>,
    /// Joined per-district, per-period metric rows.
    pub metrics: Vec<AggregatedMetric>,
    /// Per-student case summaries.
    pub cases: Vec<CaseSummary>,
    /// Headline totals over all metric rows.
    pub totals: KpiTotals,
    /// Metadata about this analysis run.
    pub metadata: AnalysisMetadata,
}

// ── Public function ───────────────────────────────────────────────────────────

/// Run the full analysis pipeline.
///
/// 1. Read the time export, and the accounting export when one was given.
/// 2. Normalize both against the configured catalog and vocabularies.
/// 3. Join into [`AggregatedMetric`] rows under the filter.
/// 4. Roll up case summaries and headline totals.
///
/// Without an accounting export, revenue is zero everywhere and margins are
/// pure labor cost; the time side of the report still works.
pub fn analyze_exports(
    time_path: &Path,
    finance_path: Option<&Path>,
    config: &AppConfig,
    filter: &FilterSpec,
) -> Result<AnalysisResult> {
    // ── Step 1: Read the exports ──────────────────────────────────────────────
    let load_start = std::time::Instant::now();
    let time_table = read_time_export(time_path)?;
    let finance_table = finance_path
        .map(|path| read_finance_export(path, &config.finance_columns))
        .transpose()?;
    let load_time = load_start.elapsed().as_secs_f64();

    // ── Step 2: Normalize ─────────────────────────────────────────────────────
    let transform_start = std::time::Instant::now();
    let catalog = config.district_catalog();
    let vocabulary = config.task_vocabulary();

    let time = TimeNormalizer::new(&catalog, &vocabulary).normalize(
        &time_table,
        &config.time_columns,
        &time_path.display().to_string(),
    )?;
    let revenue = match (&finance_table, finance_path) {
        (Some(table), Some(path)) => FinanceNormalizer::new(&catalog).normalize(
            table,
            &config.finance_columns,
            &path.display().to_string(),
        )?,
        _ => CleanOutcome::default(),
    };

    // ── Step 3: Join ──────────────────────────────────────────────────────────
    let rates = config.rate_book();
    let metrics = Aggregator::new(&rates).aggregate(&time.rows, &revenue.rows, filter);

    // ── Step 4: Cases and totals ──────────────────────────────────────────────
    let cases = summarize_cases(&time.rows, &revenue.rows, &rates, filter);
    let totals = MetricsCalculator::summarize(&metrics);
    let transform_time = transform_start.elapsed().as_secs_f64();

    let metadata = AnalysisMetadata {
        generated_at: Utc::now().to_rfc3339(),
        time_rows_read: time_table.len(),
        finance_rows_read: finance_table.as_ref().map_or(0, |table| table.len()),
        clean_time_entries: time.rows.len(),
        clean_revenue_lines: revenue.rows.len(),
        time_failures: time.failures.len(),
        finance_failures: revenue.failures.len(),
        load_time_seconds: load_time,
        transform_time_seconds: transform_time,
    };

    info!(
        "analysis complete: {} time entries ({} rejected), {} revenue lines ({} rejected), {} metric rows",
        metadata.clean_time_entries,
        metadata.time_failures,
        metadata.clean_revenue_lines,
        metadata.finance_failures,
        metrics.len()
    );

    Ok(AnalysisResult {
        time,
        revenue,
        metrics,
        cases,
        totals,
        metadata,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
