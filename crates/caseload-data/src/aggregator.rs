//! Joins the cleaned tables into per-district, per-period metric rows.
//!
//! The join is outer on (district, period): a district with time but no
//! revenue still appears, with the missing side zeroed, and vice versa.
//! Output order is fixed (district, then period) regardless of input order.

use std::collections::{BTreeMap, BTreeSet};

use caseload_core::metrics::MetricsCalculator;
use caseload_core::models::{AggregatedMetric, FilterSpec, MetricKey, RevenueLine, TimeEntry};
use caseload_core::rates::RateBook;

// ── Aggregator ────────────────────────────────────────────────────────────────

/// Running totals for one (district, period[, psychologist]) group.
#[derive(Default)]
struct GroupTotals {
    hours: f64,
    students: BTreeSet<String>,
    revenue: f64,
    labor_cost: f64,
}

/// Groups and joins cleaned rows under a filter specification.
pub struct Aggregator<'a> {
    rates: &'a RateBook,
}

impl<'a> Aggregator<'a> {
    pub fn new(rates: &'a RateBook) -> Self {
        Self { rates }
    }

    /// Aggregate the cleaned tables into metric rows.
    ///
    /// Time entries group by (district, period), plus the psychologist when
    /// the filter restricts by psychologist. An evaluation is a distinct
    /// student within the group; repeated tasks for the same student count
    /// once. Labor cost comes from the rate book per entry, unless the
    /// filter carries a flat cost-per-hour override.
    ///
    /// Revenue carries no psychologist identity, so it always lands on the
    /// group's district-level row; per-psychologist rows never double-count
    /// it.
    pub fn aggregate(
        &self,
        entries: &[TimeEntry],
        lines: &[RevenueLine],
        filter: &FilterSpec,
    ) -> Vec<AggregatedMetric> {
        let rates = self.rates.clone().with_flat_override(filter.cost_per_hour);
        let by_psychologist = filter.by_psychologist();

        let mut groups: BTreeMap<MetricKey, GroupTotals> = BTreeMap::new();

        for entry in entries {
            if !filter.allows_date(entry.date)
                || !filter.allows_district(&entry.district)
                || !filter.allows_psychologist(&entry.contractor)
            {
                continue;
            }
            let key = MetricKey {
                district: entry.district.clone(),
                period: entry.period(),
                psychologist: by_psychologist.then(|| entry.contractor.clone()),
            };
            let group = groups.entry(key).or_default();
            group.hours += entry.hours;
            group.students.insert(entry.student_id.clone());
            group.labor_cost += rates.cost_of(&entry.contractor, entry.hours);
        }

        for line in lines {
            if !filter.allows_date(line.date) || !filter.allows_district(&line.district) {
                continue;
            }
            let key = MetricKey {
                district: line.district.clone(),
                period: line.period(),
                psychologist: None,
            };
            groups.entry(key).or_default().revenue += line.amount;
        }

        groups
            .into_iter()
            .map(|(key, group)| {
                let evaluations = group.students.len() as u32;
                AggregatedMetric {
                    district: key.district,
                    period: key.period,
                    psychologist: key.psychologist,
                    total_hours: group.hours,
                    evaluations,
                    total_revenue: group.revenue,
                    labor_cost: group.labor_cost,
                    hours_per_evaluation: MetricsCalculator::hours_per_evaluation(
                        group.hours,
                        evaluations,
                    ),
                    margin: MetricsCalculator::margin(group.revenue, group.labor_cost),
                }
            })
            .collect()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
