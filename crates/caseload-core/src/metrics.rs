use std::collections::BTreeSet;

use crate::models::{AggregatedMetric, KpiTotals};

// ── MetricsCalculator ────────────────────────────────────────────────────────

/// Stateless collection of derived-metric calculations.
pub struct MetricsCalculator;

impl MetricsCalculator {
    /// Average hours spent per evaluation.
    ///
    /// Returns `None` when there are no evaluations: a zero denominator is
    /// reported as absent, never as zero or infinity.
    pub fn hours_per_evaluation(total_hours: f64, evaluations: u32) -> Option<f64> {
        if evaluations == 0 {
            return None;
        }
        Some(total_hours / evaluations as f64)
    }

    /// Net margin: revenue minus labor cost.
    ///
    /// Either side may legitimately be zero when the outer join found no
    /// counterpart for the group.
    pub fn margin(revenue: f64, labor_cost: f64) -> f64 {
        revenue - labor_cost
    }

    /// Margin as a percentage of revenue. `None` when there is no revenue to
    /// take a percentage of.
    pub fn margin_percent(revenue: f64, labor_cost: f64) -> Option<f64> {
        if revenue == 0.0 {
            return None;
        }
        Some((revenue - labor_cost) / revenue * 100.0)
    }

    /// Revenue normalised by instructional days in the period.
    ///
    /// Periods with no school days (summer months) divide by 1 so the figure
    /// stays finite.
    pub fn revenue_per_school_day(revenue: f64, school_days: u32) -> f64 {
        revenue / school_days.max(1) as f64
    }

    /// Roll a full set of aggregation rows up into headline totals.
    pub fn summarize(metrics: &[AggregatedMetric]) -> KpiTotals {
        let mut totals = KpiTotals::default();
        let mut districts: BTreeSet<&str> = BTreeSet::new();

        for metric in metrics {
            totals.total_hours += metric.total_hours;
            totals.total_evaluations += metric.evaluations;
            totals.total_revenue += metric.total_revenue;
            totals.total_labor_cost += metric.labor_cost;
            districts.insert(metric.district.as_str());
        }

        totals.total_margin = Self::margin(totals.total_revenue, totals.total_labor_cost);
        totals.districts = districts.len();
        totals.hours_per_evaluation =
            Self::hours_per_evaluation(totals.total_hours, totals.total_evaluations);
        totals
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
