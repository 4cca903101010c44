//! Accounting normalizer.
//!
//! Turns a raw accounting export into clean [`RevenueLine`] rows plus a
//! failure report. Total rows and customer section headers are structural
//! and never become revenue lines; every remaining row either yields a
//! line or lands in the failure list with a reason.

use caseload_core::error::{CaseloadError, Result};
use caseload_core::matching::DistrictCatalog;
use caseload_core::models::{CleanOutcome, FailureReason, RevenueLine, RowFailure, OTHER_CATEGORY};
use caseload_core::note::DateParser;
use caseload_core::settings::{find_header, FinanceColumns};
use caseload_core::vocab::ServiceVocabulary;
use regex::Regex;
use tracing::debug;

use crate::reader::{RawRecord, RawTable};

// ── Column layout ─────────────────────────────────────────────────────────────

/// Mapped column indices for an accounting export.
struct FinanceLayout {
    date: usize,
    service_date: Option<usize>,
    transaction_type: Option<usize>,
    transaction_id: Option<usize>,
    customer: usize,
    description: usize,
    amount: usize,
}

impl FinanceLayout {
    /// True when the row carries neither a date nor an amount. Such rows are
    /// section headers or spacers, not data.
    fn is_structural(&self, record: &RawRecord) -> bool {
        record.cell(self.date).is_empty()
            && self
                .service_date
                .map_or(true, |index| record.cell(index).is_empty())
            && record.cell(self.amount).is_empty()
    }

    /// True for subtotal and total rows, which re-state amounts already
    /// present line by line. Exports put the "Total for ..." marker in the
    /// transaction-type column or the customer column depending on layout.
    fn is_total(&self, record: &RawRecord) -> bool {
        let type_cell = self
            .transaction_type
            .map(|index| record.cell(index))
            .unwrap_or("");
        starts_with_total(type_cell) || starts_with_total(record.cell(self.customer))
    }
}

fn starts_with_total(cell: &str) -> bool {
    cell.to_lowercase().starts_with("total")
}

/// Map the export's headers onto the logical columns, failing the batch when
/// a required column is absent.
fn map_columns(headers: &[String], columns: &FinanceColumns, source: &str) -> Result<FinanceLayout> {
    let date = find_header(headers, &columns.date);
    let customer = find_header(headers, &columns.customer);
    let description = find_header(headers, &columns.description);
    let amount = find_header(headers, &columns.amount);

    let mut missing = Vec::new();
    if date.is_none() {
        missing.push("date".to_string());
    }
    if customer.is_none() {
        missing.push("customer".to_string());
    }
    if description.is_none() {
        missing.push("description".to_string());
    }
    if amount.is_none() {
        missing.push("amount".to_string());
    }

    match (date, customer, description, amount) {
        (Some(date), Some(customer), Some(description), Some(amount)) => Ok(FinanceLayout {
            date,
            service_date: find_header(headers, &columns.service_date),
            transaction_type: find_header(headers, &columns.transaction_type),
            transaction_id: find_header(headers, &columns.transaction_id),
            customer,
            description,
            amount,
        }),
        _ => Err(CaseloadError::MissingColumns {
            input: source.to_string(),
            columns: missing,
        }),
    }
}

// ── Amount parsing ────────────────────────────────────────────────────────────

/// Parse a currency cell. Strips `$` and thousands separators; accounting
/// parentheses negate. `None` when the remainder is not a number.
fn clean_amount(raw: &str) -> Option<f64> {
    let mut text = raw.trim();
    let mut negative = false;
    if text.starts_with('(') && text.ends_with(')') {
        negative = true;
        text = &text[1..text.len() - 1];
    }
    let cleaned: String = text.chars().filter(|c| *c != '$' && *c != ',').collect();
    let value: f64 = cleaned.trim().parse().ok()?;
    Some(if negative { -value } else { value })
}

// ── FinanceNormalizer ─────────────────────────────────────────────────────────

/// Cleans raw accounting rows against a district catalog.
pub struct FinanceNormalizer<'a> {
    catalog: &'a DistrictCatalog,
    initials: Regex,
    evaluation_numbers: Vec<Regex>,
}

impl<'a> FinanceNormalizer<'a> {
    pub fn new(catalog: &'a DistrictCatalog) -> Self {
        // Ordered: explicit formats first, a bare run of digits as a last
        // resort.
        let evaluation_numbers = [
            r"Evaluation #?\s*(\d+)",
            r"Eval #?\s*(\d+)",
            r"#\s*(\d+)",
            r"\(#(\d+)\)",
            r"(\d{2,})",
        ]
        .iter()
        .map(|pattern| Regex::new(pattern).expect("regex is valid"))
        .collect();
        Self {
            catalog,
            initials: Regex::new(r"\(([A-Z]{2,3})\)").expect("regex is valid"),
            evaluation_numbers,
        }
    }

    /// Normalize a raw accounting export.
    ///
    /// Batch-fatal conditions are a table with no data rows and required
    /// columns that cannot be mapped. Everything else is row-level: the
    /// offending row goes to the failure list and the batch continues.
    ///
    /// Detail exports name the customer once per transaction block and leave
    /// the cells below blank, so the last seen customer carries forward.
    pub fn normalize(
        &self,
        table: &RawTable,
        columns: &FinanceColumns,
        source: &str,
    ) -> Result<CleanOutcome<RevenueLine>> {
        if table.is_empty() {
            return Err(CaseloadError::EmptyInput(source.to_string()));
        }
        let layout = map_columns(&table.headers, columns, source)?;

        let mut outcome = CleanOutcome::default();
        let mut current_customer = String::new();
        let mut structural = 0usize;
        for record in &table.rows {
            if layout.is_total(record) || layout.is_structural(record) {
                structural += 1;
                continue;
            }
            self.normalize_row(record, &layout, &mut current_customer, &mut outcome);
        }

        debug!(
            "{}: {} rows in, {} revenue lines, {} failures, {} structural rows skipped",
            source,
            table.len(),
            outcome.rows.len(),
            outcome.failures.len(),
            structural
        );
        Ok(outcome)
    }

    fn normalize_row(
        &self,
        record: &RawRecord,
        layout: &FinanceLayout,
        current_customer: &mut String,
        outcome: &mut CleanOutcome<RevenueLine>,
    ) {
        // The service date pins revenue to the month the work happened; the
        // transaction date is the fallback.
        let service_text = layout
            .service_date
            .map(|index| record.cell(index))
            .unwrap_or("");
        let date_text = if service_text.is_empty() {
            record.cell(layout.date)
        } else {
            service_text
        };
        if date_text.is_empty() {
            outcome.failures.push(RowFailure::new(
                record.row_number,
                FailureReason::MissingField,
                "date is blank",
            ));
            return;
        }
        let Some(date) = DateParser::parse(date_text) else {
            outcome.failures.push(RowFailure::new(
                record.row_number,
                FailureReason::UnparseableDate,
                date_text,
            ));
            return;
        };

        let customer_cell = record.cell(layout.customer);
        if !customer_cell.is_empty() {
            *current_customer = customer_cell.to_string();
        }
        let customer = current_customer.clone();
        if customer.is_empty() {
            outcome.failures.push(RowFailure::new(
                record.row_number,
                FailureReason::MissingField,
                "customer is blank",
            ));
            return;
        }

        let amount_text = record.cell(layout.amount);
        let Some(amount) = clean_amount(amount_text) else {
            outcome.failures.push(RowFailure::new(
                record.row_number,
                FailureReason::MissingField,
                if amount_text.is_empty() {
                    "amount is blank".to_string()
                } else {
                    format!("amount is not a number: {amount_text}")
                },
            ));
            return;
        };

        let description = record.cell(layout.description);
        let service_type = ServiceVocabulary::service_type(description)
            .unwrap_or_else(|| OTHER_CATEGORY.to_string());

        outcome.rows.push(RevenueLine {
            date,
            district: self.catalog.resolve(&customer),
            customer_raw: customer,
            service_type,
            amount,
            transaction_id: layout
                .transaction_id
                .map(|index| record.cell(index))
                .unwrap_or("")
                .to_string(),
            student_initials: self.student_initials(description),
            evaluation_number: self.evaluation_number(description),
            detail_text: description.to_string(),
        });
    }

    /// Student initials mined from the description, e.g. `"(AB)"`.
    fn student_initials(&self, description: &str) -> Option<String> {
        self.initials
            .captures(description)
            .map(|captures| captures[1].to_string())
    }

    /// Evaluation number mined from the description. The first pattern that
    /// matches wins.
    fn evaluation_number(&self, description: &str) -> Option<String> {
        self.evaluation_numbers
            .iter()
            .find_map(|pattern| pattern.captures(description))
            .map(|captures| captures[1].to_string())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use caseload_core::matching::DistrictCatalog;
    use caseload_core::models::UNASSIGNED_DISTRICT;

    // ── Helpers ───────────────────────────────────────────────────────────────

    const HEADERS: &[&str] = &[
        "Transaction date",
        "Transaction type",
        "Num",
        "Customer",
        "Product/Service full name",
        "Line description",
        "Amount",
        "Service date",
    ];

    fn table(headers: &[&str], rows: &[&[&str]]) -> RawTable {
        RawTable {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: rows
                .iter()
                .enumerate()
                .map(|(index, cells)| RawRecord {
                    row_number: index + 1,
                    cells: cells.iter().map(|c| c.to_string()).collect(),
                })
                .collect(),
        }
    }

    fn catalog() -> DistrictCatalog {
        DistrictCatalog::new(
            vec!["Lakeview".to_string(), "Riverbend".to_string()],
            Vec::new(),
            0.85,
        )
    }

    fn normalize(raw: &RawTable) -> Result<CleanOutcome<RevenueLine>> {
        let catalog = catalog();
        FinanceNormalizer::new(&catalog).normalize(raw, &FinanceColumns::default(), "finance export")
    }

    // ── Clean path ────────────────────────────────────────────────────────────

    #[test]
    fn test_normalize_invoice_line() {
        let raw = table(
            HEADERS,
            &[&[
                "03/07/2024",
                "Invoice",
                "1042",
                "Lakeview Public Schools",
                "Initial Evaluation",
                "Psychoeducational Evaluation #1042 (AB)",
                "$1,850.00",
                "03/05/2024",
            ]],
        );

        let outcome = normalize(&raw).unwrap();
        assert!(outcome.failures.is_empty());
        assert_eq!(outcome.rows.len(), 1);
        let line = &outcome.rows[0];
        assert_eq!(line.date.to_string(), "2024-03-05");
        assert_eq!(line.district, "Lakeview");
        assert_eq!(line.customer_raw, "Lakeview Public Schools");
        assert_eq!(line.service_type, "Full Evaluation");
        assert!((line.amount - 1850.0).abs() < 1e-9);
        assert_eq!(line.transaction_id, "1042");
        assert_eq!(line.student_initials.as_deref(), Some("AB"));
        assert_eq!(line.evaluation_number.as_deref(), Some("1042"));
        assert_eq!(line.detail_text, "Psychoeducational Evaluation #1042 (AB)");
    }

    #[test]
    fn test_normalize_falls_back_to_transaction_date() {
        let raw = table(
            HEADERS,
            &[&[
                "03/07/2024",
                "Invoice",
                "1042",
                "Lakeview Public Schools",
                "",
                "Psychoeducational evaluation (AB)",
                "1850",
                "",
            ]],
        );

        let outcome = normalize(&raw).unwrap();
        assert_eq!(outcome.rows[0].date.to_string(), "2024-03-07");
    }

    #[test]
    fn test_normalize_customer_carries_forward() {
        let raw = table(
            HEADERS,
            &[
                &[
                    "03/07/2024",
                    "Invoice",
                    "1042",
                    "Lakeview Public Schools",
                    "",
                    "Psychoeducational evaluation (AB)",
                    "1850",
                    "",
                ],
                &[
                    "03/08/2024",
                    "Invoice",
                    "1042",
                    "",
                    "",
                    "Rating scales (AB)",
                    "150",
                    "",
                ],
            ],
        );

        let outcome = normalize(&raw).unwrap();
        assert_eq!(outcome.rows.len(), 2);
        assert_eq!(outcome.rows[1].customer_raw, "Lakeview Public Schools");
        assert_eq!(outcome.rows[1].district, "Lakeview");
        assert_eq!(outcome.rows[1].service_type, "Rating Scales");
    }

    #[test]
    fn test_normalize_skips_total_rows() {
        let raw = table(
            HEADERS,
            &[
                &[
                    "03/07/2024",
                    "Invoice",
                    "1042",
                    "Lakeview Public Schools",
                    "",
                    "Psychoeducational evaluation (AB)",
                    "1850",
                    "",
                ],
                // Total rows neither become lines nor feed the customer
                // carry-forward, whether marked in the type or customer cell.
                &["", "Total", "", "Riverbend", "", "", "$1,850.00", ""],
                &[
                    "",
                    "",
                    "",
                    "Total for Lakeview Public Schools",
                    "",
                    "",
                    "$1,850.00",
                    "",
                ],
                &[
                    "03/09/2024",
                    "Invoice",
                    "1043",
                    "",
                    "",
                    "Academic testing add-on (CD)",
                    "400",
                    "",
                ],
            ],
        );

        let outcome = normalize(&raw).unwrap();
        assert!(outcome.failures.is_empty());
        assert_eq!(outcome.rows.len(), 2);
        assert_eq!(outcome.rows[1].district, "Lakeview");
    }

    #[test]
    fn test_normalize_skips_section_headers() {
        let raw = table(
            HEADERS,
            &[
                &["", "", "", "Lakeview Public Schools", "", "", "", ""],
                &[
                    "03/07/2024",
                    "Invoice",
                    "1042",
                    "Lakeview Public Schools",
                    "",
                    "Psychoeducational evaluation (AB)",
                    "1850",
                    "",
                ],
            ],
        );

        let outcome = normalize(&raw).unwrap();
        assert!(outcome.failures.is_empty());
        assert_eq!(outcome.rows.len(), 1);
    }

    #[test]
    fn test_normalize_keeps_negative_amounts() {
        let raw = table(
            HEADERS,
            &[
                &[
                    "03/07/2024",
                    "Credit Memo",
                    "CM-19",
                    "Lakeview Public Schools",
                    "",
                    "Refund for cancelled evaluation",
                    "-$950.00",
                    "",
                ],
                &[
                    "03/08/2024",
                    "Credit Memo",
                    "CM-20",
                    "Riverbend",
                    "",
                    "Adjustment",
                    "(1,200.00)",
                    "",
                ],
            ],
        );

        let outcome = normalize(&raw).unwrap();
        assert_eq!(outcome.rows.len(), 2);
        assert!((outcome.rows[0].amount + 950.0).abs() < 1e-9);
        assert!((outcome.rows[1].amount + 1200.0).abs() < 1e-9);
    }

    #[test]
    fn test_normalize_unknown_customer_goes_unassigned() {
        let raw = table(
            HEADERS,
            &[&[
                "03/07/2024",
                "Invoice",
                "1050",
                "Atlantis Regional",
                "",
                "Travel reimbursement",
                "75",
                "",
            ]],
        );

        let outcome = normalize(&raw).unwrap();
        let line = &outcome.rows[0];
        assert_eq!(line.district, UNASSIGNED_DISTRICT);
        assert_eq!(line.customer_raw, "Atlantis Regional");
        assert_eq!(line.service_type, OTHER_CATEGORY);
        assert_eq!(line.student_initials, None);
        assert_eq!(line.evaluation_number, None);
    }

    #[test]
    fn test_normalize_evaluation_number_formats() {
        let descriptions = [
            ("Psychoeducational Evaluation #1042 (AB)", "1042"),
            ("Eval 77 (CD)", "77"),
            ("Testing session (#55)", "55"),
            ("Scoring batch 2024", "2024"),
        ];
        for (description, expected) in descriptions {
            let raw = table(
                HEADERS,
                &[&[
                    "03/07/2024",
                    "Invoice",
                    "1",
                    "Lakeview",
                    "",
                    description,
                    "100",
                    "",
                ]],
            );
            let outcome = normalize(&raw).unwrap();
            assert_eq!(
                outcome.rows[0].evaluation_number.as_deref(),
                Some(expected),
                "description: {description}"
            );
        }
    }

    // ── Row-level failures ────────────────────────────────────────────────────

    #[test]
    fn test_normalize_blank_date_with_amount_is_reported() {
        let raw = table(
            HEADERS,
            &[&[
                "",
                "Invoice",
                "1043",
                "Lakeview Public Schools",
                "",
                "Psychoeducational evaluation (AB)",
                "$500.00",
                "",
            ]],
        );

        let outcome = normalize(&raw).unwrap();
        assert!(outcome.rows.is_empty());
        assert_eq!(outcome.failures[0].reason, FailureReason::MissingField);
        assert_eq!(outcome.failures[0].detail, "date is blank");
    }

    #[test]
    fn test_normalize_unparseable_date_is_reported() {
        let raw = table(
            HEADERS,
            &[&[
                "sometime in March",
                "Invoice",
                "1043",
                "Lakeview Public Schools",
                "",
                "Psychoeducational evaluation (AB)",
                "500",
                "",
            ]],
        );

        let outcome = normalize(&raw).unwrap();
        let failure = &outcome.failures[0];
        assert_eq!(failure.reason, FailureReason::UnparseableDate);
        assert_eq!(failure.detail, "sometime in March");
    }

    #[test]
    fn test_normalize_bad_amount_is_reported() {
        let raw = table(
            HEADERS,
            &[&[
                "03/07/2024",
                "Invoice",
                "1043",
                "Lakeview Public Schools",
                "",
                "Psychoeducational evaluation (AB)",
                "TBD",
                "",
            ]],
        );

        let outcome = normalize(&raw).unwrap();
        assert!(outcome.rows.is_empty());
        let failure = &outcome.failures[0];
        assert_eq!(failure.reason, FailureReason::MissingField);
        assert!(failure.detail.contains("TBD"));
    }

    #[test]
    fn test_normalize_blank_customer_without_carry_is_reported() {
        let raw = table(
            HEADERS,
            &[&[
                "03/07/2024",
                "Invoice",
                "1043",
                "",
                "",
                "Psychoeducational evaluation (AB)",
                "500",
                "",
            ]],
        );

        let outcome = normalize(&raw).unwrap();
        assert!(outcome.rows.is_empty());
        assert_eq!(outcome.failures[0].reason, FailureReason::MissingField);
        assert_eq!(outcome.failures[0].detail, "customer is blank");
    }

    // ── Batch-fatal conditions ────────────────────────────────────────────────

    #[test]
    fn test_normalize_empty_table_is_fatal() {
        let raw = table(HEADERS, &[]);
        let err = normalize(&raw).unwrap_err();
        assert!(matches!(err, CaseloadError::EmptyInput(_)));
    }

    #[test]
    fn test_normalize_missing_columns_is_fatal() {
        let raw = table(&["Foo", "Bar"], &[&["x", "y"]]);
        let err = normalize(&raw).unwrap_err();
        match err {
            CaseloadError::MissingColumns { columns, .. } => {
                assert_eq!(
                    columns,
                    vec![
                        "date".to_string(),
                        "customer".to_string(),
                        "description".to_string(),
                        "amount".to_string(),
                    ]
                );
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    // ── clean_amount ──────────────────────────────────────────────────────────

    #[test]
    fn test_clean_amount_formats() {
        assert_eq!(clean_amount("$1,850.00"), Some(1850.0));
        assert_eq!(clean_amount("1850"), Some(1850.0));
        assert_eq!(clean_amount("-$950.00"), Some(-950.0));
        assert_eq!(clean_amount("($1,200.00)"), Some(-1200.0));
        assert_eq!(clean_amount(" 42.5 "), Some(42.5));
        assert_eq!(clean_amount(""), None);
        assert_eq!(clean_amount("TBD"), None);
    }
}
