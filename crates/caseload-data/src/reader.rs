//! CSV ingestion for caseload reporting.
//!
//! Reads time-tracking and accounting exports into raw tables for the
//! normalizers, absorbing the quirks of real exports along the way: repeated
//! column pairs, per-contractor section banners, and report preamble ahead of
//! the header row.

use std::collections::HashMap;
use std::path::Path;

use caseload_core::error::{CaseloadError, Result};
use caseload_core::settings::{find_header, FinanceColumns};
use regex::Regex;
use tracing::{debug, warn};

/// Header of the synthetic contractor column injected when a time export is
/// stitched together from per-contractor sections.
pub const CONTRACTOR_COLUMN: &str = "Psychologist";

/// How many leading lines to scan for the real header row of a finance
/// export.
const HEADER_SCAN_LINES: usize = 50;

// ── Raw tables ────────────────────────────────────────────────────────────────

/// One parsed export: headers plus rows of cell text, nothing interpreted.
#[derive(Debug, Clone, Default)]
pub struct RawTable {
    /// Headers as read, with repeats deduplicated to `Name.1`, `Name.2`.
    pub headers: Vec<String>,
    /// Data rows in file order.
    pub rows: Vec<RawRecord>,
}

impl RawTable {
    /// Number of data rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// One raw data row.
#[derive(Debug, Clone)]
pub struct RawRecord {
    /// 1-based position among the kept data rows of the source file (header,
    /// banner, and blank rows excluded).
    pub row_number: usize,
    /// Cell text aligned to the table headers.
    pub cells: Vec<String>,
}

impl RawRecord {
    /// Trimmed cell text at `index`; empty when the row is short.
    pub fn cell(&self, index: usize) -> &str {
        self.cells.get(index).map(|c| c.trim()).unwrap_or("")
    }
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Read a plain headered CSV file into a raw table.
pub fn read_table(path: &Path) -> Result<RawTable> {
    let content = read_file(path)?;
    parse_csv(&content)
}

/// Read a time-tracking export.
///
/// Payroll exports often arrive split into per-contractor sections, each
/// introduced by a banner like `Hours for Jane Doe (Contractor)` and carrying
/// its own header row. Those are stitched into one table with a synthetic
/// [`CONTRACTOR_COLUMN`]; a plain headered CSV passes through unchanged.
pub fn read_time_export(path: &Path) -> Result<RawTable> {
    let content = read_file(path)?;
    let banner = Regex::new(r"Hours for (.+?) \(Contractor\)").expect("regex is valid");
    if banner.is_match(&content) {
        read_contractor_blocks(&content, &banner)
    } else {
        parse_csv(&content)
    }
}

/// Read an accounting export.
///
/// QuickBooks transaction lists put a report title and company name ahead of
/// the real header row. Scan for the first line naming both the date and
/// amount columns and parse from there; when no such line exists the file is
/// parsed as-is and column validation reports what is missing.
pub fn read_finance_export(path: &Path, columns: &FinanceColumns) -> Result<RawTable> {
    let content = read_file(path)?;
    match find_finance_header(&content, columns) {
        Some(0) | None => parse_csv(&content),
        Some(offset) => {
            debug!("skipping {} preamble line(s) ahead of the header row", offset);
            let body = content.lines().skip(offset).collect::<Vec<_>>().join("\n");
            parse_csv(&body)
        }
    }
}

// ── Internal helpers ──────────────────────────────────────────────────────────

fn read_file(path: &Path) -> Result<String> {
    if !path.exists() {
        return Err(CaseloadError::InputNotFound(path.to_path_buf()));
    }
    std::fs::read_to_string(path).map_err(|source| CaseloadError::FileRead {
        path: path.to_path_buf(),
        source,
    })
}

/// Parse CSV text with a header row into a raw table. Blank rows are
/// dropped; short rows are padded when read back.
fn parse_csv(content: &str) -> Result<RawTable> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers = dedupe_headers(reader.headers()?.iter());
    let mut table = RawTable {
        headers,
        rows: Vec::new(),
    };

    for record in reader.records() {
        let record = record?;
        let mut cells: Vec<String> = record.iter().map(|c| c.to_string()).collect();
        if cells.iter().all(|c| c.trim().is_empty()) {
            continue;
        }
        cells.resize(table.headers.len(), String::new());
        table.rows.push(RawRecord {
            row_number: table.rows.len() + 1,
            cells,
        });
    }

    Ok(table)
}

/// Deduplicate repeated headers with `.N` suffixes so `Hours, Notes, Hours,
/// Notes` keeps all four columns addressable.
fn dedupe_headers<'a>(raw: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut headers = Vec::new();
    for name in raw {
        let name = name.trim().to_string();
        let count = seen.entry(name.clone()).or_insert(0);
        if *count == 0 {
            headers.push(name);
        } else {
            headers.push(format!("{}.{}", name, count));
        }
        *count += 1;
    }
    headers
}

/// Split per-contractor sections out of a payroll export and stitch them into
/// one table. Lines ahead of the first banner are preamble and dropped.
fn read_contractor_blocks(content: &str, banner: &Regex) -> Result<RawTable> {
    let mut blocks: Vec<(String, Vec<&str>)> = Vec::new();
    let mut current: Option<(String, Vec<&str>)> = None;

    for line in content.lines() {
        if let Some(caps) = banner.captures(line) {
            if let Some(block) = current.take() {
                blocks.push(block);
            }
            current = Some((caps[1].trim().to_string(), Vec::new()));
        } else if !line.trim().is_empty() {
            if let Some((_, lines)) = current.as_mut() {
                lines.push(line);
            }
        }
    }
    if let Some(block) = current.take() {
        blocks.push(block);
    }

    let mut merged = RawTable::default();
    merged.headers.push(CONTRACTOR_COLUMN.to_string());
    let section_count = blocks.len();

    for (contractor, lines) in blocks {
        if lines.is_empty() {
            warn!("contractor section for {} has no rows", contractor);
            continue;
        }
        let block = parse_csv(&lines.join("\n"))?;
        merge_block(&mut merged, &contractor, block);
    }

    debug!(
        "stitched {} contractor section(s) into {} rows",
        section_count,
        merged.rows.len()
    );
    Ok(merged)
}

/// Append a block's rows to the merged table, aligning columns by header name
/// and growing the header set as new columns appear. Earlier rows stay short;
/// [`RawRecord::cell`] reads missing cells as empty.
fn merge_block(merged: &mut RawTable, contractor: &str, block: RawTable) {
    let mut index_map = Vec::with_capacity(block.headers.len());
    for header in &block.headers {
        let target = match merged.headers.iter().position(|h| h == header) {
            Some(position) => position,
            None => {
                merged.headers.push(header.clone());
                merged.headers.len() - 1
            }
        };
        index_map.push(target);
    }

    for record in block.rows {
        let mut cells = vec![String::new(); merged.headers.len()];
        cells[0] = contractor.to_string();
        for (from, to) in index_map.iter().enumerate() {
            if let Some(cell) = record.cells.get(from) {
                cells[*to] = cell.clone();
            }
        }
        merged.rows.push(RawRecord {
            row_number: merged.rows.len() + 1,
            cells,
        });
    }
}

/// Locate the header row of a finance export: the first line whose cells
/// include both a date column and an amount column.
fn find_finance_header(content: &str, columns: &FinanceColumns) -> Option<usize> {
    for (index, line) in content.lines().enumerate().take(HEADER_SCAN_LINES) {
        let cells: Vec<String> = line
            .split(',')
            .map(|c| c.trim().trim_matches('"').to_string())
            .collect();
        if find_header(&cells, &columns.date).is_some()
            && find_header(&cells, &columns.amount).is_some()
        {
            return Some(index);
        }
    }
    None
}

// ── Tests ─────────────────────────────────────────────────────────────────────
