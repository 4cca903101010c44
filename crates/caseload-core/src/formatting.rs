/// Format a floating-point number with thousands separators and a fixed number
/// of decimal places.
///
/// # Examples
///
/// ```
/// use caseload_core::formatting::format_number;
///
/// assert_eq!(format_number(1234.5, 1), "1,234.5");
/// assert_eq!(format_number(1234567.0, 0), "1,234,567");
/// assert_eq!(format_number(0.0, 2), "0.00");
/// assert_eq!(format_number(-9876.5, 1), "-9,876.5");
/// ```
pub fn format_number(value: f64, decimals: usize) -> String {
    let formatted = format!("{:.*}", decimals, value.abs());
    let (int_part, frac_part) = match formatted.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (formatted.as_str(), None),
    };

    let mut out = String::with_capacity(formatted.len() + 4);
    if value < 0.0 {
        out.push('-');
    }
    out.push_str(&group_thousands(int_part));
    if let Some(frac) = frac_part {
        out.push('.');
        out.push_str(frac);
    }
    out
}

/// Format a dollar amount with two decimal places and thousands separators.
/// Negative amounts carry the sign ahead of the dollar sign.
///
/// # Examples
///
/// ```
/// use caseload_core::formatting::format_currency;
///
/// assert_eq!(format_currency(1234.56), "$1,234.56");
/// assert_eq!(format_currency(0.0), "$0.00");
/// assert_eq!(format_currency(-950.0), "-$950.00");
/// ```
pub fn format_currency(amount: f64) -> String {
    if amount < 0.0 {
        format!("-${}", format_number(amount.abs(), 2))
    } else {
        format!("${}", format_number(amount, 2))
    }
}

/// Format decimal hours, trimming trailing zeros so whole and half hours read
/// naturally.
///
/// # Examples
///
/// ```
/// use caseload_core::formatting::format_hours;
///
/// assert_eq!(format_hours(2.5), "2.5");
/// assert_eq!(format_hours(8.0), "8");
/// assert_eq!(format_hours(1.25), "1.25");
/// assert_eq!(format_hours(1200.0), "1,200");
/// ```
pub fn format_hours(hours: f64) -> String {
    let full = format_number(hours, 2);
    let trimmed = full.trim_end_matches('0').trim_end_matches('.');
    trimmed.to_string()
}

/// Format an optional figure, writing `n/a` for an absent value.
///
/// Used for ratios like hours-per-evaluation that are undefined rather than
/// zero when the denominator is empty.
pub fn format_optional(value: Option<f64>, decimals: usize) -> String {
    match value {
        Some(v) => format_number(v, decimals),
        None => "n/a".to_string(),
    }
}

/// Calculate `(part / whole) * 100`, rounded to `decimal_places`.
///
/// Returns `0.0` if `whole` is zero to avoid division by zero.
pub fn percentage(part: f64, whole: f64, decimal_places: u32) -> f64 {
    if whole == 0.0 {
        return 0.0;
    }
    let raw = (part / whole) * 100.0;
    let factor = 10_f64.powi(decimal_places as i32);
    (raw * factor).round() / factor
}

/// Render a `YYYY-MM` period as a readable month label.
///
/// # Examples
///
/// ```
/// use caseload_core::formatting::period_label;
///
/// assert_eq!(period_label("2024-03"), "Mar 2024");
/// assert_eq!(period_label("2023-11"), "Nov 2023");
/// assert_eq!(period_label("not-a-period"), "not-a-period");
/// ```
pub fn period_label(period: &str) -> String {
    const MONTHS: [&str; 12] = [
        "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
    ];
    let mut parts = period.splitn(2, '-');
    let year = parts.next().and_then(|y| y.parse::<i32>().ok());
    let month = parts.next().and_then(|m| m.parse::<usize>().ok());
    match (year, month) {
        (Some(year), Some(month)) if (1..=12).contains(&month) => {
            format!("{} {}", MONTHS[month - 1], year)
        }
        _ => period.to_string(),
    }
}

// ── Internal helpers ──────────────────────────────────────────────────────────

/// Insert commas every three digits from the right of an integer string.
fn group_thousands(digits: &str) -> String {
    let len = digits.len();
    if len <= 3 {
        return digits.to_string();
    }
    let mut out = String::with_capacity(len + len / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

// ── Tests ──────────────────────────────────────────────────────────────────────
