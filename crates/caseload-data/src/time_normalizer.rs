//! Time-tracking normalizer.
//!
//! Turns a raw time export into clean [`TimeEntry`] rows plus a failure
//! report. Every raw row is accounted for: it either yields one entry per
//! student named in its notes, or lands in the failure list with a reason.

use caseload_core::error::{CaseloadError, Result};
use caseload_core::matching::DistrictCatalog;
use caseload_core::models::{
    CleanOutcome, FailureReason, RowFailure, TimeEntry, OTHER_CATEGORY, UNKNOWN_CONTRACTOR,
};
use caseload_core::note::{DateParser, NoteParser};
use caseload_core::settings::{find_header, find_headers_with_prefix, TimeColumns};
use caseload_core::vocab::TaskVocabulary;
use tracing::debug;

use crate::reader::RawTable;

// ── Column layout ─────────────────────────────────────────────────────────────

/// Mapped column indices for a time export.
struct TimeLayout {
    date: usize,
    contractor: Option<usize>,
    notes: Vec<usize>,
}

/// Map the export's headers onto the logical columns, failing the batch when
/// a required column is absent. The contractor column is optional; rows
/// without one are attributed to [`UNKNOWN_CONTRACTOR`].
fn map_columns(headers: &[String], columns: &TimeColumns, source: &str) -> Result<TimeLayout> {
    let date = find_header(headers, &columns.date);
    let notes = find_headers_with_prefix(headers, &columns.note);

    let mut missing = Vec::new();
    if date.is_none() {
        missing.push("date".to_string());
    }
    if notes.is_empty() {
        missing.push("note".to_string());
    }

    match (date, missing.is_empty()) {
        (Some(date), true) => Ok(TimeLayout {
            date,
            contractor: find_header(headers, &columns.contractor),
            notes,
        }),
        _ => Err(CaseloadError::MissingColumns {
            input: source.to_string(),
            columns: missing,
        }),
    }
}

// ── TimeNormalizer ────────────────────────────────────────────────────────────

/// Cleans raw time-tracking rows against a district catalog and task
/// vocabulary.
pub struct TimeNormalizer<'a> {
    catalog: &'a DistrictCatalog,
    vocabulary: &'a TaskVocabulary,
    parser: NoteParser,
}

impl<'a> TimeNormalizer<'a> {
    pub fn new(catalog: &'a DistrictCatalog, vocabulary: &'a TaskVocabulary) -> Self {
        Self {
            catalog,
            vocabulary,
            parser: NoteParser::new(),
        }
    }

    /// Normalize a raw time export.
    ///
    /// Batch-fatal conditions are a table with no data rows and required
    /// columns that cannot be mapped. Everything else is row-level: the
    /// offending row goes to the failure list and the batch continues.
    ///
    /// A note naming several students splits the entry's hours evenly
    /// between them; a cell holding several clock-range entries yields one
    /// entry each.
    pub fn normalize(
        &self,
        table: &RawTable,
        columns: &TimeColumns,
        source: &str,
    ) -> Result<CleanOutcome<TimeEntry>> {
        if table.is_empty() {
            return Err(CaseloadError::EmptyInput(source.to_string()));
        }
        let layout = map_columns(&table.headers, columns, source)?;

        let mut outcome = CleanOutcome::default();
        for record in &table.rows {
            self.normalize_row(record, &layout, &mut outcome);
        }

        debug!(
            "{}: {} rows in, {} clean entries, {} failures",
            source,
            table.len(),
            outcome.rows.len(),
            outcome.failures.len()
        );
        Ok(outcome)
    }

    fn normalize_row(
        &self,
        record: &crate::reader::RawRecord,
        layout: &TimeLayout,
        outcome: &mut CleanOutcome<TimeEntry>,
    ) {
        let date_text = record.cell(layout.date);
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

        let contractor = layout
            .contractor
            .map(|index| record.cell(index))
            .filter(|name| !name.is_empty())
            .unwrap_or(UNKNOWN_CONTRACTOR)
            .to_string();

        let mut saw_note = false;
        for &note_index in &layout.notes {
            let cell = record.cell(note_index);
            if cell.is_empty() {
                continue;
            }
            saw_note = true;
            for entry_text in self.parser.split_entries(cell) {
                self.normalize_entry(record.row_number, date, &contractor, &entry_text, outcome);
            }
        }

        if !saw_note {
            outcome.failures.push(RowFailure::new(
                record.row_number,
                FailureReason::MissingField,
                "note is blank",
            ));
        }
    }

    /// Clean one logical note entry into zero or more [`TimeEntry`] rows.
    fn normalize_entry(
        &self,
        row_number: usize,
        date: chrono::NaiveDate,
        contractor: &str,
        entry_text: &str,
        outcome: &mut CleanOutcome<TimeEntry>,
    ) {
        let parsed = match self.parser.parse(entry_text) {
            Ok(parsed) => parsed,
            Err(reason) => {
                outcome
                    .failures
                    .push(RowFailure::new(row_number, reason, entry_text));
                return;
            }
        };

        let district = self.catalog.resolve(&parsed.district_raw);
        let (task_category, detail_text) = match self.vocabulary.canonicalize(&parsed.task_raw) {
            Some(name) => (name, parsed.details.clone()),
            None => (
                OTHER_CATEGORY.to_string(),
                if parsed.details.is_empty() {
                    parsed.task_raw.clone()
                } else {
                    format!("{} - {}", parsed.task_raw, parsed.details)
                },
            ),
        };

        // Hours split evenly across the students named in the entry.
        let share = parsed.hours / parsed.students.len() as f64;
        for student in &parsed.students {
            outcome.rows.push(TimeEntry {
                date,
                contractor: contractor.to_string(),
                district: district.clone(),
                student_id: student.clone(),
                task_category: task_category.clone(),
                detail_text: detail_text.clone(),
                hours: share,
            });
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
