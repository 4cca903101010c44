//! Flat-file exports of the analysis tables.
//!
//! Every value is written machine-readable (unformatted numbers, ISO dates);
//! human formatting belongs to the report layer. Absent ratios export as
//! empty cells, not zeros.

use std::path::{Path, PathBuf};

use caseload_core::error::Result;
use caseload_core::models::{AggregatedMetric, RevenueLine, RowFailure, TimeEntry};
use tracing::{debug, info};

use crate::analysis::AnalysisResult;
use crate::cases::CaseSummary;

// ── Per-table writers ─────────────────────────────────────────────────────────

/// Write the cleaned time entries.
pub fn export_time_entries(path: &Path, entries: &[TimeEntry]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record([
        "date",
        "contractor",
        "district",
        "student_id",
        "task_category",
        "detail",
        "hours",
    ])?;
    for entry in entries {
        writer.write_record(&[
            entry.date.to_string(),
            entry.contractor.clone(),
            entry.district.clone(),
            entry.student_id.clone(),
            entry.task_category.clone(),
            entry.detail_text.clone(),
            entry.hours.to_string(),
        ])?;
    }
    writer.flush()?;
    debug!("wrote {} time entries to {}", entries.len(), path.display());
    Ok(())
}

/// Write the cleaned revenue lines.
pub fn export_revenue_lines(path: &Path, lines: &[RevenueLine]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record([
        "date",
        "district",
        "customer",
        "service_type",
        "amount",
        "transaction_id",
        "student_initials",
        "evaluation_number",
        "description",
    ])?;
    for line in lines {
        writer.write_record(&[
            line.date.to_string(),
            line.district.clone(),
            line.customer_raw.clone(),
            line.service_type.clone(),
            line.amount.to_string(),
            line.transaction_id.clone(),
            line.student_initials.clone().unwrap_or_default(),
            line.evaluation_number.clone().unwrap_or_default(),
            line.detail_text.clone(),
        ])?;
    }
    writer.flush()?;
    debug!("wrote {} revenue lines to {}", lines.len(), path.display());
    Ok(())
}

/// Write the joined metric rows in their mandated column order.
pub fn export_metrics(path: &Path, metrics: &[AggregatedMetric]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record([
        "district",
        "period",
        "hours",
        "evaluations",
        "revenue",
        "margin",
        "hours_per_evaluation",
    ])?;
    for row in metrics {
        writer.write_record(&[
            row.district.clone(),
            row.period.clone(),
            row.total_hours.to_string(),
            row.evaluations.to_string(),
            row.total_revenue.to_string(),
            row.margin.to_string(),
            optional_number(row.hours_per_evaluation),
        ])?;
    }
    writer.flush()?;
    debug!("wrote {} metric rows to {}", metrics.len(), path.display());
    Ok(())
}

/// Write the per-case rollup.
pub fn export_cases(path: &Path, cases: &[CaseSummary]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record([
        "district",
        "student_id",
        "hours",
        "labor_cost",
        "psychologists",
        "first_activity",
        "last_activity",
        "matched_revenue",
        "margin",
    ])?;
    for case in cases {
        writer.write_record(&[
            case.district.clone(),
            case.student_id.clone(),
            case.total_hours.to_string(),
            case.labor_cost.to_string(),
            case.psychologists.join("; "),
            case.first_activity.to_string(),
            case.last_activity.to_string(),
            case.matched_revenue.to_string(),
            case.margin.to_string(),
        ])?;
    }
    writer.flush()?;
    debug!("wrote {} case rows to {}", cases.len(), path.display());
    Ok(())
}

/// Write the failure report, labelling which export each failure came from.
pub fn export_failures(path: &Path, time: &[RowFailure], finance: &[RowFailure]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["source", "row_number", "reason", "detail"])?;
    for (source, failures) in [("time", time), ("finance", finance)] {
        for failure in failures {
            writer.write_record(&[
                source.to_string(),
                failure.row_number.to_string(),
                failure.reason.to_string(),
                failure.detail.clone(),
            ])?;
        }
    }
    writer.flush()?;
    debug!(
        "wrote {} failure rows to {}",
        time.len() + finance.len(),
        path.display()
    );
    Ok(())
}

// ── Bundle export ─────────────────────────────────────────────────────────────

/// Write every table of an analysis result under `out_dir`, creating the
/// directory when needed. Returns the written paths.
pub fn export_all(out_dir: &Path, result: &AnalysisResult) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(out_dir)?;

    let time_path = out_dir.join("time_entries.csv");
    let revenue_path = out_dir.join("revenue_lines.csv");
    let metrics_path = out_dir.join("metrics.csv");
    let cases_path = out_dir.join("cases.csv");
    let failures_path = out_dir.join("failures.csv");

    export_time_entries(&time_path, &result.time.rows)?;
    export_revenue_lines(&revenue_path, &result.revenue.rows)?;
    export_metrics(&metrics_path, &result.metrics)?;
    export_cases(&cases_path, &result.cases)?;
    export_failures(&failures_path, &result.time.failures, &result.revenue.failures)?;

    info!("exported analysis tables to {}", out_dir.display());
    Ok(vec![
        time_path,
        revenue_path,
        metrics_path,
        cases_path,
        failures_path,
    ])
}

fn optional_number(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
