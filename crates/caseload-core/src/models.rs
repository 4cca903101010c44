use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Why a raw row was rejected during normalization.
///
/// These are row-level conditions: the offending row is routed to the failure
/// report and the batch continues. Batch-fatal conditions live in
/// [`crate::error::CaseloadError`] instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// The note text did not match `TIME > DISTRICT > STUDENT > TASK`.
    MalformedNote,
    /// The hours value was non-numeric, non-positive, or an impossible range.
    InvalidHours,
    /// The date field did not match any accepted format.
    UnparseableDate,
    /// A required field was blank after mapping.
    MissingField,
}

impl FailureReason {
    /// Stable string form used in failure reports and exports.
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::MalformedNote => "malformed_note",
            FailureReason::InvalidHours => "invalid_hours",
            FailureReason::UnparseableDate => "unparseable_date",
            FailureReason::MissingField => "missing_field",
        }
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One rejected raw row, kept alongside the clean output so no data loss is
/// silent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowFailure {
    /// 1-based row number in the source export (header rows excluded).
    pub row_number: usize,
    /// Classification of what went wrong.
    pub reason: FailureReason,
    /// The offending text, preserved for auditing.
    pub detail: String,
}

impl RowFailure {
    pub fn new(row_number: usize, reason: FailureReason, detail: impl Into<String>) -> Self {
        Self {
            row_number,
            reason,
            detail: detail.into(),
        }
    }
}

/// The dual output of one normalization pass: every raw row ends up either as
/// a clean row or as a recorded failure, never silently dropped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanOutcome<T> {
    /// Rows that passed every check.
    pub rows: Vec<T>,
    /// Rows that did not, with the reason.
    pub failures: Vec<RowFailure>,
}

impl<T> Default for CleanOutcome<T> {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            failures: Vec::new(),
        }
    }
}

/// A single cleaned time-tracking entry, parsed from one logical note.
///
/// Invariant: `hours > 0`. Rows that violate this never reach a `TimeEntry`;
/// they are reported as [`RowFailure`]s by the normalizer. Immutable once
/// constructed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeEntry {
    /// Civil date the work was performed.
    pub date: NaiveDate,
    /// Contractor (psychologist) who logged the entry.
    pub contractor: String,
    /// Canonical district name, or `"Unassigned"` when no match cleared the
    /// similarity threshold.
    pub district: String,
    /// Student identifier (initials or case code) from the note.
    pub student_id: String,
    /// Canonical task name from the controlled vocabulary, `"Other"` when the
    /// raw task matched nothing.
    pub task_category: String,
    /// Free-text details; carries the original task text when the task fell
    /// back to `"Other"`.
    #[serde(default)]
    pub detail_text: String,
    /// Decimal hours worked. Always positive.
    pub hours: f64,
}

impl TimeEntry {
    /// Calendar month this entry falls in, formatted `YYYY-MM`.
    pub fn period(&self) -> String {
        format!("{:04}-{:02}", self.date.year(), self.date.month())
    }
}

/// A single cleaned accounting line item.
///
/// `amount` may be negative: credit memos and refunds are retained because
/// they affect net revenue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevenueLine {
    /// Transaction date.
    pub date: NaiveDate,
    /// Canonical district resolved from the customer name, or `"Unassigned"`.
    pub district: String,
    /// Customer string exactly as it appeared in the export.
    pub customer_raw: String,
    /// Canonical service type from the controlled vocabulary, `"Other"` when
    /// the description matched nothing.
    pub service_type: String,
    /// Signed amount in dollars.
    pub amount: f64,
    /// Transaction identifier (invoice number or similar).
    #[serde(default)]
    pub transaction_id: String,
    /// Student initials mined from the description, when present.
    #[serde(default)]
    pub student_initials: Option<String>,
    /// Evaluation number mined from the description, when present.
    #[serde(default)]
    pub evaluation_number: Option<String>,
    /// Original line-item description, retained for auditing.
    #[serde(default)]
    pub detail_text: String,
}

impl RevenueLine {
    /// Calendar month this line falls in, formatted `YYYY-MM`.
    pub fn period(&self) -> String {
        format!("{:04}-{:02}", self.date.year(), self.date.month())
    }
}

/// Grouping key for aggregation: district, period, and (optionally) the
/// psychologist dimension.
///
/// Derives `Ord` so a `BTreeMap` keyed by it yields the mandated output
/// order: district, then period. `None` sorts before `Some`, so the
/// district-level revenue row precedes per-psychologist rows for the same
/// district/period.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MetricKey {
    pub district: String,
    pub period: String,
    pub psychologist: Option<String>,
}

/// One derived, read-only aggregation row.
///
/// Produced fresh on every aggregation call; never mutated in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatedMetric {
    /// Canonical district name.
    pub district: String,
    /// Calendar month, `YYYY-MM`.
    pub period: String,
    /// Psychologist dimension, present only when grouping requested it.
    pub psychologist: Option<String>,
    /// Sum of entry hours in this group.
    pub total_hours: f64,
    /// Count of distinct students with time in this group.
    pub evaluations: u32,
    /// Net revenue (credits included) joined on (district, period).
    pub total_revenue: f64,
    /// Estimated labor cost for the grouped hours.
    pub labor_cost: f64,
    /// `total_hours / evaluations`; `None` when there are no evaluations.
    pub hours_per_evaluation: Option<f64>,
    /// `total_revenue - labor_cost`.
    pub margin: f64,
}

/// Headline totals rolled up from a full set of aggregation rows.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KpiTotals {
    /// Sum of hours across every row.
    pub total_hours: f64,
    /// Sum of distinct-student evaluation counts.
    pub total_evaluations: u32,
    /// Net revenue across every row.
    pub total_revenue: f64,
    /// Labor cost across every row.
    pub total_labor_cost: f64,
    /// `total_revenue - total_labor_cost`.
    pub total_margin: f64,
    /// Count of distinct districts seen.
    pub districts: usize,
    /// Overall `total_hours / total_evaluations`; `None` when no evaluations.
    pub hours_per_evaluation: Option<f64>,
}

/// Filter options applied before aggregation. All fields optional; the
/// default filters nothing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterSpec {
    /// Inclusive (start, end) date range.
    pub date_range: Option<(NaiveDate, NaiveDate)>,
    /// Restrict to these canonical districts. `None` = all.
    pub districts: Option<BTreeSet<String>>,
    /// Restrict to these contractors. `None` = all.
    pub psychologists: Option<BTreeSet<String>>,
    /// Flat cost-per-hour override. `None` = use the contractor rate book.
    pub cost_per_hour: Option<f64>,
}

impl FilterSpec {
    pub fn allows_date(&self, date: NaiveDate) -> bool {
        match self.date_range {
            Some((start, end)) => date >= start && date <= end,
            None => true,
        }
    }

    pub fn allows_district(&self, district: &str) -> bool {
        match &self.districts {
            Some(set) => set.iter().any(|d| d.eq_ignore_ascii_case(district)),
            None => true,
        }
    }

    pub fn allows_psychologist(&self, name: &str) -> bool {
        match &self.psychologists {
            Some(set) => set.iter().any(|p| p.eq_ignore_ascii_case(name)),
            None => true,
        }
    }

    /// Whether a psychologist restriction is present, which switches the
    /// aggregator into per-psychologist grouping.
    pub fn by_psychologist(&self) -> bool {
        self.psychologists.is_some()
    }
}

/// District label applied when no candidate clears the match threshold.
pub const UNASSIGNED_DISTRICT: &str = "Unassigned";

/// Task / service label applied when the vocabulary matched nothing.
pub const OTHER_CATEGORY: &str = "Other";

/// Contractor label applied when the export carries no contractor column.
pub const UNKNOWN_CONTRACTOR: &str = "Unknown";
