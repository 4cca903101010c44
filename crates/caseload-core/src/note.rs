use chrono::NaiveDate;
use regex::Regex;

use crate::models::FailureReason;

// ── ParsedNote ────────────────────────────────────────────────────────────────

/// The four logical fields of one note, split but not yet canonicalized.
///
/// Field values are trimmed verbatim slices of the source text: district and
/// task are resolved against their vocabularies downstream, so a parsed note
/// can be reconstructed as `TIME > DISTRICT > STUDENT > TASK - DETAILS` up to
/// whitespace.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedNote {
    /// Decimal hours, from a plain number or a clock range. Always positive.
    pub hours: f64,
    /// District text exactly as written (pre-resolution).
    pub district_raw: String,
    /// One or more student identifiers; comma-separated lists expand here.
    pub students: Vec<String>,
    /// Task text exactly as written (pre-vocabulary).
    pub task_raw: String,
    /// Everything after the first `-` of the fourth segment.
    pub details: String,
}

// ── NoteParser ────────────────────────────────────────────────────────────────

/// Parses the note micro-format `TIME > DISTRICT > STUDENT > TASK - DETAILS`.
///
/// Holds its compiled patterns, so construct once per batch and reuse.
pub struct NoteParser {
    entry_start: Regex,
    clock_range: Regex,
}

impl NoteParser {
    pub fn new() -> Self {
        // A clock range like "9:00 - 11:30" or "1:00 PM - 3:15 PM" marks the
        // start of a new logical entry inside a single cell.
        let entry_start = Regex::new(r"\d{1,2}:\d{2}(?:\s?[APMapm]{2})?\s*-\s*\d{1,2}:\d{2}")
            .expect("regex is valid");
        let clock_range = Regex::new(
            r"^(\d{1,2})(?::(\d{2}))?\s*([APap][Mm])?\s*-\s*(\d{1,2})(?::(\d{2}))?\s*([APap][Mm])?$",
        )
        .expect("regex is valid");
        Self {
            entry_start,
            clock_range,
        }
    }

    /// Split one physical note cell into its logical entries.
    ///
    /// Entries are separated by newlines, or by a new clock range beginning
    /// mid-line. Blank input yields an empty list.
    pub fn split_entries(&self, cell: &str) -> Vec<String> {
        let mut entries = Vec::new();
        for line in cell.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let mut prev = 0;
            for m in self.entry_start.find_iter(line) {
                if m.start() > prev {
                    let head = line[prev..m.start()].trim();
                    if !head.is_empty() {
                        entries.push(head.to_string());
                    }
                    prev = m.start();
                }
            }
            let tail = line[prev..].trim();
            if !tail.is_empty() {
                entries.push(tail.to_string());
            }
        }
        entries
    }

    /// Parse one logical note into its four fields.
    ///
    /// Fewer than four `>`-separated segments is a malformed note. Hours must
    /// coerce to a positive number (plain decimal or clock range). A blank
    /// district or student segment is a missing required field.
    pub fn parse(&self, note: &str) -> Result<ParsedNote, FailureReason> {
        let note = note.trim();
        if note.is_empty() {
            return Err(FailureReason::MalformedNote);
        }

        let segments: Vec<&str> = note.splitn(4, '>').map(str::trim).collect();
        if segments.len() < 4 {
            return Err(FailureReason::MalformedNote);
        }

        let hours = self
            .parse_hours(segments[0])
            .ok_or(FailureReason::InvalidHours)?;
        if hours <= 0.0 {
            return Err(FailureReason::InvalidHours);
        }

        let district_raw = segments[1].to_string();
        if district_raw.is_empty() {
            return Err(FailureReason::MissingField);
        }

        let students: Vec<String> = segments[2]
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        if students.is_empty() {
            return Err(FailureReason::MissingField);
        }

        let (task_raw, details) = match segments[3].split_once('-') {
            Some((task, details)) => (task.trim().to_string(), details.trim().to_string()),
            None => (segments[3].to_string(), String::new()),
        };

        Ok(ParsedNote {
            hours,
            district_raw,
            students,
            task_raw,
            details,
        })
    }

    /// Coerce an hours field to decimal hours.
    ///
    /// Accepts a plain number (`2.5`) or a clock range (`9:00 - 11:30`,
    /// `1 PM - 3:15 PM`, `11-1:30`). A range whose end does not follow its
    /// start is assumed to cross noon (or midnight) and wraps forward in
    /// 12-hour steps. Returns `None` for anything non-numeric, an equal-ended
    /// range, or a duration outside (0, 24) hours.
    pub fn parse_hours(&self, text: &str) -> Option<f64> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        if let Ok(value) = text.parse::<f64>() {
            return value.is_finite().then_some(value);
        }
        self.parse_clock_range(text)
    }

    fn parse_clock_range(&self, text: &str) -> Option<f64> {
        let caps = self.clock_range.captures(text)?;
        let start = minutes_of_day(
            caps.get(1)?.as_str(),
            caps.get(2).map(|m| m.as_str()),
            caps.get(3).map(|m| m.as_str()),
        )?;
        let end = minutes_of_day(
            caps.get(4)?.as_str(),
            caps.get(5).map(|m| m.as_str()),
            caps.get(6).map(|m| m.as_str()),
        )?;

        let mut duration = end - start;
        if duration == 0 {
            return None;
        }
        while duration < 0 {
            duration += 12 * 60;
        }

        let hours = duration as f64 / 60.0;
        if hours >= 24.0 {
            return None;
        }
        Some((hours * 1000.0).round() / 1000.0)
    }
}

impl Default for NoteParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Convert one side of a clock range to minutes since midnight.
fn minutes_of_day(hour: &str, minute: Option<&str>, meridiem: Option<&str>) -> Option<i32> {
    let hour: i32 = hour.parse().ok()?;
    let minute: i32 = match minute {
        Some(m) => m.parse().ok()?,
        None => 0,
    };
    if minute >= 60 {
        return None;
    }

    let hour = match meridiem {
        Some(m) => {
            // 12-hour clock: "12 AM" is midnight, "12 PM" is noon.
            if !(1..=12).contains(&hour) {
                return None;
            }
            if m.eq_ignore_ascii_case("pm") {
                hour % 12 + 12
            } else {
                hour % 12
            }
        }
        None => {
            if !(0..=23).contains(&hour) {
                return None;
            }
            hour
        }
    };
    Some(hour * 60 + minute)
}

// ── DateParser ────────────────────────────────────────────────────────────────

/// Parses civil dates from the variety of formats found in exports.
pub struct DateParser;

impl DateParser {
    /// Attempt to parse a date string under the accepted formats.
    ///
    /// Tries date-only patterns first (`2024-03-07`, `03/07/2024`,
    /// `Mar 7, 2024`, ...), then date-time patterns whose date part is kept.
    /// Returns `None` when nothing matches.
    pub fn parse(text: &str) -> Option<NaiveDate> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }

        const DATE_FORMATS: &[&str] = &[
            "%Y-%m-%d",
            "%m/%d/%Y",
            "%m/%d/%y",
            "%Y/%m/%d",
            "%b %d, %Y",
            "%B %d, %Y",
            "%d %b %Y",
        ];
        for fmt in DATE_FORMATS {
            if let Ok(date) = NaiveDate::parse_from_str(text, fmt) {
                return Some(date);
            }
        }

        const DATETIME_FORMATS: &[&str] = &[
            "%Y-%m-%dT%H:%M:%S%.f",
            "%Y-%m-%dT%H:%M:%S",
            "%Y-%m-%d %H:%M:%S",
            "%m/%d/%Y %H:%M:%S",
        ];
        for fmt in DATETIME_FORMATS {
            if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(text, fmt) {
                return Some(dt.date());
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── NoteParser::parse ─────────────────────────────────────────────────

    #[test]
    fn test_parse_canonical_note() {
        let parser = NoteParser::new();
        let note = " 2.5 > Lakeview > S-102 > Testing - WISC-V administration ";
        let parsed = parser.parse(note).unwrap();
        assert!((parsed.hours - 2.5).abs() < f64::EPSILON);
        assert_eq!(parsed.district_raw, "Lakeview");
        assert_eq!(parsed.students, vec!["S-102".to_string()]);
        assert_eq!(parsed.task_raw, "Testing");
        assert_eq!(parsed.details, "WISC-V administration");
    }

    #[test]
    fn test_parse_round_trips_field_values() {
        let parser = NoteParser::new();
        let note = "1.75 > Riverbend > AB > Report Writing - draft sections";
        let parsed = parser.parse(note).unwrap();
        let rebuilt = format!(
            "{} > {} > {} > {} - {}",
            parsed.hours, parsed.district_raw, parsed.students[0], parsed.task_raw, parsed.details
        );
        assert_eq!(rebuilt, note);
    }

    #[test]
    fn test_parse_no_dash_keeps_whole_task() {
        let parser = NoteParser::new();
        let parsed = parser.parse("1 > Lakeview > AB > Scheduling").unwrap();
        assert_eq!(parsed.task_raw, "Scheduling");
        assert_eq!(parsed.details, "");
    }

    #[test]
    fn test_parse_splits_on_first_dash_only() {
        let parser = NoteParser::new();
        let parsed = parser
            .parse("1 > Lakeview > AB > Testing - WISC-V - subtests 1-3")
            .unwrap();
        assert_eq!(parsed.task_raw, "Testing");
        assert_eq!(parsed.details, "WISC-V - subtests 1-3");
    }

    #[test]
    fn test_parse_too_few_segments_is_malformed() {
        let parser = NoteParser::new();
        assert_eq!(
            parser.parse("2.5 > Lakeview > S-102"),
            Err(FailureReason::MalformedNote)
        );
        assert_eq!(parser.parse("just a comment"), Err(FailureReason::MalformedNote));
        assert_eq!(parser.parse(""), Err(FailureReason::MalformedNote));
    }

    #[test]
    fn test_parse_non_numeric_hours() {
        let parser = NoteParser::new();
        assert_eq!(
            parser.parse("lots > Lakeview > AB > Testing"),
            Err(FailureReason::InvalidHours)
        );
    }

    #[test]
    fn test_parse_non_positive_hours() {
        let parser = NoteParser::new();
        assert_eq!(
            parser.parse("0 > Lakeview > AB > Testing"),
            Err(FailureReason::InvalidHours)
        );
        assert_eq!(
            parser.parse("-2 > Lakeview > AB > Testing"),
            Err(FailureReason::InvalidHours)
        );
    }

    #[test]
    fn test_parse_blank_district_or_student() {
        let parser = NoteParser::new();
        assert_eq!(
            parser.parse("1 >  > AB > Testing"),
            Err(FailureReason::MissingField)
        );
        assert_eq!(
            parser.parse("1 > Lakeview >  > Testing"),
            Err(FailureReason::MissingField)
        );
    }

    #[test]
    fn test_parse_multiple_students() {
        let parser = NoteParser::new();
        let parsed = parser
            .parse("3 > Lakeview > AB, CD, EF > Rating Scales - BASC")
            .unwrap();
        assert_eq!(
            parsed.students,
            vec!["AB".to_string(), "CD".to_string(), "EF".to_string()]
        );
    }

    #[test]
    fn test_parse_extra_gt_stays_in_details() {
        // Only the first three ">" delimiters split; the rest is task text.
        let parser = NoteParser::new();
        let parsed = parser.parse("1 > Lakeview > AB > Testing - score > 90").unwrap();
        assert_eq!(parsed.details, "score > 90");
    }

    // ── Hours coercion ────────────────────────────────────────────────────

    #[test]
    fn test_parse_hours_decimal() {
        let parser = NoteParser::new();
        assert_eq!(parser.parse_hours("2.5"), Some(2.5));
        assert_eq!(parser.parse_hours(" 4 "), Some(4.0));
    }

    #[test]
    fn test_parse_hours_clock_range() {
        let parser = NoteParser::new();
        assert_eq!(parser.parse_hours("9:00 - 11:30"), Some(2.5));
        assert_eq!(parser.parse_hours("9-11:30"), Some(2.5));
        assert_eq!(parser.parse_hours("9:00 AM - 11:30 AM"), Some(2.5));
    }

    #[test]
    fn test_parse_hours_range_wraps_past_noon() {
        let parser = NoteParser::new();
        // 11:00 to 1:30 reads as crossing noon, not minus 9.5 hours.
        assert_eq!(parser.parse_hours("11 - 1:30"), Some(2.5));
    }

    #[test]
    fn test_parse_hours_range_wraps_past_midnight() {
        let parser = NoteParser::new();
        assert_eq!(parser.parse_hours("10:00 PM - 1:00 AM"), Some(3.0));
    }

    #[test]
    fn test_parse_hours_rejects_garbage() {
        let parser = NoteParser::new();
        assert_eq!(parser.parse_hours(""), None);
        assert_eq!(parser.parse_hours("abc"), None);
        assert_eq!(parser.parse_hours("9:00 -"), None);
        assert_eq!(parser.parse_hours("25:00 - 26:00"), None);
    }

    #[test]
    fn test_parse_hours_equal_ends_rejected() {
        let parser = NoteParser::new();
        assert_eq!(parser.parse_hours("9:00 - 9:00"), None);
    }

    // ── split_entries ─────────────────────────────────────────────────────

    #[test]
    fn test_split_entries_blank() {
        let parser = NoteParser::new();
        assert!(parser.split_entries("").is_empty());
        assert!(parser.split_entries("  \n \n").is_empty());
    }

    #[test]
    fn test_split_entries_newlines() {
        let parser = NoteParser::new();
        let cell = "2 > Lakeview > AB > Testing\n\n1 > Riverbend > CD > Scheduling";
        let entries = parser.split_entries(cell);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], "2 > Lakeview > AB > Testing");
        assert_eq!(entries[1], "1 > Riverbend > CD > Scheduling");
    }

    #[test]
    fn test_split_entries_inline_clock_ranges() {
        let parser = NoteParser::new();
        let cell = "9:00-10:30 > Lakeview > AB > Testing 1:00-2:00 > Lakeview > CD > Scoring";
        let entries = parser.split_entries(cell);
        assert_eq!(entries.len(), 2);
        assert!(entries[0].starts_with("9:00-10:30"));
        assert!(entries[1].starts_with("1:00-2:00"));
    }

    #[test]
    fn test_split_entries_single() {
        let parser = NoteParser::new();
        let entries = parser.split_entries("2.5 > Lakeview > S-102 > Testing");
        assert_eq!(entries, vec!["2.5 > Lakeview > S-102 > Testing".to_string()]);
    }

    // ── DateParser ────────────────────────────────────────────────────────

    #[test]
    fn test_date_parser_iso() {
        assert_eq!(
            DateParser::parse("2024-03-07"),
            NaiveDate::from_ymd_opt(2024, 3, 7)
        );
    }

    #[test]
    fn test_date_parser_us_slash() {
        assert_eq!(
            DateParser::parse("03/07/2024"),
            NaiveDate::from_ymd_opt(2024, 3, 7)
        );
        assert_eq!(
            DateParser::parse("3/7/2024"),
            NaiveDate::from_ymd_opt(2024, 3, 7)
        );
    }

    #[test]
    fn test_date_parser_month_name() {
        assert_eq!(
            DateParser::parse("Mar 7, 2024"),
            NaiveDate::from_ymd_opt(2024, 3, 7)
        );
        assert_eq!(
            DateParser::parse("March 7, 2024"),
            NaiveDate::from_ymd_opt(2024, 3, 7)
        );
    }

    #[test]
    fn test_date_parser_datetime_keeps_date() {
        assert_eq!(
            DateParser::parse("2024-03-07T14:30:00"),
            NaiveDate::from_ymd_opt(2024, 3, 7)
        );
    }

    #[test]
    fn test_date_parser_rejects_garbage() {
        assert_eq!(DateParser::parse(""), None);
        assert_eq!(DateParser::parse("yesterday"), None);
        assert_eq!(DateParser::parse("2024-13-40"), None);
    }
}
