//! Case-level rollup: one row per (student, district) pair.
//!
//! Revenue attaches to a case only when a line's mined student initials
//! match the case's student within the same district; everything else stays
//! at the district level and is untouched here.

use std::collections::{BTreeMap, BTreeSet};

use caseload_core::metrics::MetricsCalculator;
use caseload_core::models::{FilterSpec, RevenueLine, TimeEntry};
use caseload_core::rates::RateBook;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

// ── CaseSummary ───────────────────────────────────────────────────────────────

/// Rolled-up view of all work on one student in one district.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseSummary {
    pub student_id: String,
    pub district: String,
    /// Sum of entry hours across the case.
    pub total_hours: f64,
    /// Labor cost for those hours, from the rate book.
    pub labor_cost: f64,
    /// Every contractor who logged time on the case, sorted.
    pub psychologists: Vec<String>,
    pub first_activity: NaiveDate,
    pub last_activity: NaiveDate,
    /// Revenue lines whose student initials matched this case.
    pub matched_revenue: f64,
    /// `matched_revenue - labor_cost`.
    pub margin: f64,
}

/// Running totals for one case while folding entries.
struct CaseTotals {
    hours: f64,
    labor_cost: f64,
    psychologists: BTreeSet<String>,
    first_activity: NaiveDate,
    last_activity: NaiveDate,
    revenue: f64,
}

impl CaseTotals {
    fn new(date: NaiveDate) -> Self {
        Self {
            hours: 0.0,
            labor_cost: 0.0,
            psychologists: BTreeSet::new(),
            first_activity: date,
            last_activity: date,
            revenue: 0.0,
        }
    }
}

// ── Rollup ────────────────────────────────────────────────────────────────────

/// Fold cleaned tables into per-case summaries, sorted by district then
/// student.
///
/// The same filter the aggregator honors applies here, so report sections
/// agree with each other. A case exists only where time was logged; revenue
/// with initials matching no case is left out of the case view (it still
/// counts in the district metrics).
pub fn summarize_cases(
    entries: &[TimeEntry],
    lines: &[RevenueLine],
    rates: &RateBook,
    filter: &FilterSpec,
) -> Vec<CaseSummary> {
    let rates = rates.clone().with_flat_override(filter.cost_per_hour);
    let mut cases: BTreeMap<(String, String), CaseTotals> = BTreeMap::new();

    for entry in entries {
        if !filter.allows_date(entry.date)
            || !filter.allows_district(&entry.district)
            || !filter.allows_psychologist(&entry.contractor)
        {
            continue;
        }
        let key = (entry.district.clone(), entry.student_id.clone());
        let case = cases
            .entry(key)
            .or_insert_with(|| CaseTotals::new(entry.date));
        case.hours += entry.hours;
        case.labor_cost += rates.cost_of(&entry.contractor, entry.hours);
        case.psychologists.insert(entry.contractor.clone());
        case.first_activity = case.first_activity.min(entry.date);
        case.last_activity = case.last_activity.max(entry.date);
    }

    let mut unmatched = 0usize;
    for line in lines {
        if !filter.allows_date(line.date) || !filter.allows_district(&line.district) {
            continue;
        }
        let Some(initials) = line.student_initials.as_deref() else {
            continue;
        };
        // Initials only disambiguate within a district.
        let matched = cases.iter_mut().find_map(|(key, case)| {
            (key.0 == line.district && key.1.eq_ignore_ascii_case(initials)).then_some(case)
        });
        match matched {
            Some(case) => case.revenue += line.amount,
            None => unmatched += 1,
        }
    }
    if unmatched > 0 {
        debug!("{unmatched} revenue lines carried initials matching no case");
    }

    cases
        .into_iter()
        .map(|((district, student_id), case)| CaseSummary {
            student_id,
            district,
            total_hours: case.hours,
            labor_cost: case.labor_cost,
            psychologists: case.psychologists.into_iter().collect(),
            first_activity: case.first_activity,
            last_activity: case.last_activity,
            matched_revenue: case.revenue,
            margin: MetricsCalculator::margin(case.revenue, case.labor_cost),
        })
        .collect()
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn entry(
        date: NaiveDate,
        contractor: &str,
        district: &str,
        student: &str,
        hours: f64,
    ) -> TimeEntry {
        TimeEntry {
            date,
            contractor: contractor.to_string(),
            district: district.to_string(),
            student_id: student.to_string(),
            task_category: "Testing".to_string(),
            detail_text: String::new(),
            hours,
        }
    }

    fn line(date: NaiveDate, district: &str, initials: Option<&str>, amount: f64) -> RevenueLine {
        RevenueLine {
            date,
            district: district.to_string(),
            customer_raw: district.to_string(),
            service_type: "Full Evaluation".to_string(),
            amount,
            transaction_id: String::new(),
            student_initials: initials.map(|i| i.to_string()),
            evaluation_number: None,
            detail_text: String::new(),
        }
    }

    fn summarize(entries: &[TimeEntry], lines: &[RevenueLine]) -> Vec<CaseSummary> {
        summarize_cases(entries, lines, &RateBook::default(), &FilterSpec::default())
    }

    // ── Rollup ────────────────────────────────────────────────────────────────

    #[test]
    fn test_cases_fold_all_work_on_one_student() {
        let entries = vec![
            entry(d(2024, 3, 7), "Nancy", "Lakeview", "AB", 2.0),
            entry(d(2024, 3, 21), "Caroline", "Lakeview", "AB", 4.0),
        ];
        let lines = vec![line(d(2024, 3, 30), "Lakeview", Some("AB"), 1850.0)];

        let cases = summarize(&entries, &lines);
        assert_eq!(cases.len(), 1);
        let case = &cases[0];
        assert_eq!(case.student_id, "AB");
        assert_eq!(case.district, "Lakeview");
        assert!((case.total_hours - 6.0).abs() < 1e-9);
        // 2h at Nancy's 95 plus 4h at Caroline's 70.
        assert!((case.labor_cost - 470.0).abs() < 1e-9);
        assert_eq!(
            case.psychologists,
            vec!["Caroline".to_string(), "Nancy".to_string()]
        );
        assert_eq!(case.first_activity, d(2024, 3, 7));
        assert_eq!(case.last_activity, d(2024, 3, 21));
        assert!((case.matched_revenue - 1850.0).abs() < 1e-9);
        assert!((case.margin - 1380.0).abs() < 1e-9);
    }

    #[test]
    fn test_cases_same_student_id_in_two_districts_is_two_cases() {
        let entries = vec![
            entry(d(2024, 3, 7), "Nancy", "Lakeview", "AB", 2.0),
            entry(d(2024, 3, 8), "Nancy", "Riverbend", "AB", 1.0),
        ];

        let cases = summarize(&entries, &[]);
        assert_eq!(cases.len(), 2);
        assert_eq!(cases[0].district, "Lakeview");
        assert_eq!(cases[1].district, "Riverbend");
    }

    #[test]
    fn test_cases_revenue_needs_matching_initials_and_district() {
        let entries = vec![entry(d(2024, 3, 7), "Nancy", "Lakeview", "AB", 2.0)];
        let lines = vec![
            // No initials mined: stays at district level.
            line(d(2024, 3, 10), "Lakeview", None, 500.0),
            // Right initials, wrong district.
            line(d(2024, 3, 11), "Riverbend", Some("AB"), 700.0),
            // Matches.
            line(d(2024, 3, 12), "Lakeview", Some("AB"), 900.0),
        ];

        let cases = summarize(&entries, &lines);
        assert!((cases[0].matched_revenue - 900.0).abs() < 1e-9);
    }

    #[test]
    fn test_cases_initials_match_ignores_case() {
        let entries = vec![entry(d(2024, 3, 7), "Nancy", "Lakeview", "ab", 2.0)];
        let lines = vec![line(d(2024, 3, 10), "Lakeview", Some("AB"), 300.0)];

        let cases = summarize(&entries, &lines);
        assert!((cases[0].matched_revenue - 300.0).abs() < 1e-9);
    }

    #[test]
    fn test_cases_sorted_by_district_then_student() {
        let entries = vec![
            entry(d(2024, 3, 7), "Nancy", "Riverbend", "ZZ", 1.0),
            entry(d(2024, 3, 7), "Nancy", "Ashford", "MM", 1.0),
            entry(d(2024, 3, 7), "Nancy", "Ashford", "AA", 1.0),
        ];

        let cases = summarize(&entries, &[]);
        let order: Vec<(&str, &str)> = cases
            .iter()
            .map(|c| (c.district.as_str(), c.student_id.as_str()))
            .collect();
        assert_eq!(
            order,
            vec![("Ashford", "AA"), ("Ashford", "MM"), ("Riverbend", "ZZ")]
        );
    }

    #[test]
    fn test_cases_respect_filter() {
        let entries = vec![
            entry(d(2024, 3, 7), "Nancy", "Lakeview", "AB", 2.0),
            entry(d(2024, 5, 7), "Nancy", "Lakeview", "CD", 2.0),
        ];
        let filter = FilterSpec {
            date_range: Some((d(2024, 3, 1), d(2024, 3, 31))),
            ..Default::default()
        };

        let cases = summarize_cases(&entries, &[], &RateBook::default(), &filter);
        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0].student_id, "AB");
    }
}
