//! Markdown summary report.
//!
//! Renders an [`AnalysisResult`] into a plain markdown document: headline
//! totals, the district/period table, hours by task category, school-day
//! efficiency, the largest cases, and the data-quality section. All number
//! formatting goes through [`caseload_core::formatting`].

use std::collections::BTreeMap;
use std::fmt::Write;

use caseload_core::calendar::school_days_in_period;
use caseload_core::formatting::{
    format_currency, format_hours, format_optional, percentage, period_label,
};
use caseload_core::metrics::MetricsCalculator;
use caseload_core::models::{FilterSpec, RowFailure};
use caseload_core::vocab::{category_of, TaskCategory};
use chrono::NaiveDate;

use crate::analysis::AnalysisResult;

// ── Report ────────────────────────────────────────────────────────────────────

/// Build the full markdown report for one analysis run.
pub fn build_report(result: &AnalysisResult, filter: &FilterSpec) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Caseload Report");
    let _ = writeln!(
        output,
        "Generated {} ({})",
        result.metadata.generated_at,
        window_label(filter)
    );

    write_key_figures(&mut output, result);
    write_district_table(&mut output, result);
    write_category_hours(&mut output, result);
    write_school_day_efficiency(&mut output, result);
    write_cases(&mut output, result);
    write_data_quality(&mut output, result);

    output
}

fn write_key_figures(output: &mut String, result: &AnalysisResult) {
    let totals = &result.totals;
    let _ = writeln!(output);
    let _ = writeln!(output, "## Key Figures");
    let _ = writeln!(output, "- Hours: {}", format_hours(totals.total_hours));
    let _ = writeln!(output, "- Evaluations: {}", totals.total_evaluations);
    let _ = writeln!(output, "- Revenue: {}", format_currency(totals.total_revenue));
    let _ = writeln!(
        output,
        "- Labor cost: {}",
        format_currency(totals.total_labor_cost)
    );
    let _ = writeln!(output, "- Margin: {}", format_currency(totals.total_margin));
    let _ = writeln!(
        output,
        "- Hours per evaluation: {}",
        format_optional(totals.hours_per_evaluation, 1)
    );
    let _ = writeln!(output, "- Districts: {}", totals.districts);
}

fn write_district_table(output: &mut String, result: &AnalysisResult) {
    let _ = writeln!(output);
    let _ = writeln!(output, "## District Metrics");

    if result.metrics.is_empty() {
        let _ = writeln!(output, "No activity matched the filters.");
        return;
    }

    let _ = writeln!(
        output,
        "| District | Period | Hours | Evaluations | Revenue | Margin | Hours/Eval |"
    );
    let _ = writeln!(output, "|---|---|---|---|---|---|---|");
    for row in &result.metrics {
        let district = match &row.psychologist {
            Some(psychologist) => format!("{} / {}", row.district, psychologist),
            None => row.district.clone(),
        };
        let _ = writeln!(
            output,
            "| {} | {} | {} | {} | {} | {} | {} |",
            district,
            period_label(&row.period),
            format_hours(row.total_hours),
            row.evaluations,
            format_currency(row.total_revenue),
            format_currency(row.margin),
            format_optional(row.hours_per_evaluation, 1)
        );
    }
}

fn write_category_hours(output: &mut String, result: &AnalysisResult) {
    let _ = writeln!(output);
    let _ = writeln!(output, "## Hours by Category");

    if result.time.rows.is_empty() {
        let _ = writeln!(output, "No time entries in this window.");
        return;
    }

    let mut evaluation = 0.0;
    let mut admin = 0.0;
    let mut uncategorized = 0.0;
    for entry in &result.time.rows {
        match category_of(&entry.task_category) {
            TaskCategory::Evaluation => evaluation += entry.hours,
            TaskCategory::Admin => admin += entry.hours,
            TaskCategory::Uncategorized => uncategorized += entry.hours,
        }
    }
    let total = evaluation + admin + uncategorized;

    for (label, hours) in [
        ("Evaluation", evaluation),
        ("Admin", admin),
        ("Uncategorized", uncategorized),
    ] {
        let _ = writeln!(
            output,
            "- {}: {} hours ({}%)",
            label,
            format_hours(hours),
            percentage(hours, total, 1)
        );
    }
}

fn write_school_day_efficiency(output: &mut String, result: &AnalysisResult) {
    let _ = writeln!(output);
    let _ = writeln!(output, "## School-Day Efficiency");

    if result.metrics.is_empty() {
        let _ = writeln!(output, "No activity matched the filters.");
        return;
    }

    // Revenue per period across all districts. Per-psychologist rows carry
    // no revenue, so summing every row never double-counts.
    let mut revenue_by_period: BTreeMap<&str, f64> = BTreeMap::new();
    for row in &result.metrics {
        *revenue_by_period.entry(row.period.as_str()).or_default() += row.total_revenue;
    }

    for (period, revenue) in revenue_by_period {
        let days = school_days_in_period(period);
        if days == 0 {
            let _ = writeln!(
                output,
                "- {}: no school days, {} revenue",
                period_label(period),
                format_currency(revenue)
            );
            continue;
        }
        let per_day = MetricsCalculator::revenue_per_school_day(revenue, days);
        let _ = writeln!(
            output,
            "- {}: {} school days, {} revenue ({} per school day)",
            period_label(period),
            days,
            format_currency(revenue),
            format_currency(per_day)
        );
    }
}

fn write_cases(output: &mut String, result: &AnalysisResult) {
    let _ = writeln!(output);
    let _ = writeln!(output, "## Largest Cases");

    if result.cases.is_empty() {
        let _ = writeln!(output, "No cases in this window.");
        return;
    }

    let mut by_hours = result.cases.clone();
    by_hours.sort_by(|a, b| b.total_hours.total_cmp(&a.total_hours));

    for case in by_hours.iter().take(10) {
        let _ = writeln!(
            output,
            "- {} / {}: {} hours ({}), margin {}",
            case.district,
            case.student_id,
            format_hours(case.total_hours),
            case.psychologists.join(", "),
            format_currency(case.margin)
        );
    }
}

fn write_data_quality(output: &mut String, result: &AnalysisResult) {
    let _ = writeln!(output);
    let _ = writeln!(output, "## Data Quality");
    write_quality_line(
        output,
        "Time export",
        result.time.rows.len(),
        &result.time.failures,
    );
    write_quality_line(
        output,
        "Accounting export",
        result.revenue.rows.len(),
        &result.revenue.failures,
    );
}

fn write_quality_line(output: &mut String, label: &str, clean: usize, failures: &[RowFailure]) {
    if failures.is_empty() {
        let _ = writeln!(output, "- {}: {} clean rows, 0 rejected", label, clean);
        return;
    }
    let mut by_reason: BTreeMap<&str, usize> = BTreeMap::new();
    for failure in failures {
        *by_reason.entry(failure.reason.as_str()).or_default() += 1;
    }
    let reasons = by_reason
        .into_iter()
        .map(|(reason, count)| format!("{reason} {count}"))
        .collect::<Vec<_>>()
        .join(", ");
    let _ = writeln!(
        output,
        "- {}: {} clean rows, {} rejected ({})",
        label,
        clean,
        failures.len(),
        reasons
    );
}

/// Human label for the report's date window.
fn window_label(filter: &FilterSpec) -> String {
    let Some((start, end)) = filter.date_range else {
        return "all activity".to_string();
    };
    let from = (start != NaiveDate::MIN).then(|| start.to_string());
    let to = (end != NaiveDate::MAX).then(|| end.to_string());
    match (from, to) {
        (Some(from), Some(to)) => format!("{from} to {to}"),
        (Some(from), None) => format!("from {from}"),
        (None, Some(to)) => format!("through {to}"),
        (None, None) => "all activity".to_string(),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::AnalysisMetadata;
    use crate::cases::CaseSummary;
    use caseload_core::models::{
        AggregatedMetric, CleanOutcome, FailureReason, KpiTotals, TimeEntry,
    };

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn entry(task: &str, hours: f64) -> TimeEntry {
        TimeEntry {
            date: d(2024, 3, 7),
            contractor: "Nancy".to_string(),
            district: "Lakeview".to_string(),
            student_id: "AB".to_string(),
            task_category: task.to_string(),
            detail_text: String::new(),
            hours,
        }
    }

    fn metric(period: &str, revenue: f64) -> AggregatedMetric {
        AggregatedMetric {
            district: "Lakeview".to_string(),
            period: period.to_string(),
            psychologist: None,
            total_hours: 5.0,
            evaluations: 2,
            total_revenue: revenue,
            labor_cost: 500.0,
            hours_per_evaluation: Some(2.5),
            margin: revenue - 500.0,
        }
    }

    fn sample_result() -> AnalysisResult {
        let metrics = vec![metric("2024-03", 4200.0)];
        let totals = MetricsCalculator::summarize(&metrics);
        AnalysisResult {
            time: CleanOutcome {
                rows: vec![entry("Testing", 5.0), entry("Onboarding", 1.0)],
                failures: vec![
                    RowFailure::new(4, FailureReason::MalformedNote, "junk"),
                    RowFailure::new(9, FailureReason::MalformedNote, "more junk"),
                    RowFailure::new(12, FailureReason::InvalidHours, "abc"),
                ],
            },
            revenue: CleanOutcome::default(),
            metrics,
            cases: vec![CaseSummary {
                student_id: "AB".to_string(),
                district: "Lakeview".to_string(),
                total_hours: 6.0,
                labor_cost: 570.0,
                psychologists: vec!["Nancy".to_string()],
                first_activity: d(2024, 3, 7),
                last_activity: d(2024, 3, 21),
                matched_revenue: 1850.0,
                margin: 1280.0,
            }],
            totals,
            metadata: AnalysisMetadata {
                generated_at: "2024-03-31T00:00:00Z".to_string(),
                time_rows_read: 5,
                finance_rows_read: 0,
                clean_time_entries: 2,
                clean_revenue_lines: 0,
                time_failures: 3,
                finance_failures: 0,
                load_time_seconds: 0.0,
                transform_time_seconds: 0.0,
            },
        }
    }

    // ── build_report ──────────────────────────────────────────────────────────

    #[test]
    fn test_build_report_has_every_section() {
        let report = build_report(&sample_result(), &FilterSpec::default());
        for heading in [
            "# Caseload Report",
            "## Key Figures",
            "## District Metrics",
            "## Hours by Category",
            "## School-Day Efficiency",
            "## Largest Cases",
            "## Data Quality",
        ] {
            assert!(report.contains(heading), "missing section: {heading}");
        }
    }

    #[test]
    fn test_build_report_district_table_row() {
        let report = build_report(&sample_result(), &FilterSpec::default());
        assert!(report
            .contains("| Lakeview | Mar 2024 | 5 | 2 | $4,200.00 | $3,700.00 | 2.5 |"));
    }

    #[test]
    fn test_build_report_splits_hours_by_category() {
        let report = build_report(&sample_result(), &FilterSpec::default());
        assert!(report.contains("- Evaluation: 5 hours (83.3%)"));
        assert!(report.contains("- Admin: 1 hours (16.7%)"));
    }

    #[test]
    fn test_build_report_school_day_figures() {
        // March 2024 has 21 school days; 4200 / 21 = 200 per day.
        let report = build_report(&sample_result(), &FilterSpec::default());
        assert!(report.contains("- Mar 2024: 21 school days, $4,200.00 revenue ($200.00 per school day)"));
    }

    #[test]
    fn test_build_report_summer_period_has_no_school_days() {
        let mut result = sample_result();
        result.metrics = vec![metric("2024-07", 300.0)];
        let report = build_report(&result, &FilterSpec::default());
        assert!(report.contains("- Jul 2024: no school days, $300.00 revenue"));
    }

    #[test]
    fn test_build_report_data_quality_counts_reasons() {
        let report = build_report(&sample_result(), &FilterSpec::default());
        assert!(report.contains(
            "- Time export: 2 clean rows, 3 rejected (invalid_hours 1, malformed_note 2)"
        ));
        assert!(report.contains("- Accounting export: 0 clean rows, 0 rejected"));
    }

    #[test]
    fn test_build_report_empty_result_uses_fallbacks() {
        let mut result = sample_result();
        result.metrics.clear();
        result.cases.clear();
        result.time = CleanOutcome::default();
        result.totals = KpiTotals::default();

        let report = build_report(&result, &FilterSpec::default());
        assert!(report.contains("No activity matched the filters."));
        assert!(report.contains("No time entries in this window."));
        assert!(report.contains("No cases in this window."));
        assert!(report.contains("- Hours per evaluation: n/a"));
    }

    // ── window_label ──────────────────────────────────────────────────────────

    #[test]
    fn test_window_label_variants() {
        assert_eq!(window_label(&FilterSpec::default()), "all activity");

        let bounded = FilterSpec {
            date_range: Some((d(2024, 1, 1), d(2024, 6, 30))),
            ..Default::default()
        };
        assert_eq!(window_label(&bounded), "2024-01-01 to 2024-06-30");

        let from_only = FilterSpec {
            date_range: Some((d(2024, 1, 1), NaiveDate::MAX)),
            ..Default::default()
        };
        assert_eq!(window_label(&from_only), "from 2024-01-01");

        let to_only = FilterSpec {
            date_range: Some((NaiveDate::MIN, d(2024, 6, 30))),
            ..Default::default()
        };
        assert_eq!(window_label(&to_only), "through 2024-06-30");
    }
}
