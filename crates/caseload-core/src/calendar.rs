use chrono::{Datelike, NaiveDate, Weekday};

// ── School-day calendar ───────────────────────────────────────────────────────

/// Whether `date` is a school day on a typical Massachusetts public school
/// calendar.
///
/// Weekends are out, as are the fixed holidays and the standard break weeks:
/// Labor Day, Indigenous Peoples Day, Veterans Day, Thanksgiving Thursday and
/// Friday, winter break (Dec 24 - Jan 1), MLK Day, February and April
/// vacation weeks, Memorial Day, and summer (June 20 onward, July, August).
pub fn is_school_day(date: NaiveDate) -> bool {
    let weekday = date.weekday();
    if weekday == Weekday::Sat || weekday == Weekday::Sun {
        return false;
    }

    let month = date.month();
    let day = date.day();
    let monday = weekday == Weekday::Mon;

    let holiday = (month == 9 && monday && day <= 7)
        || (month == 10 && monday && (8..=14).contains(&day))
        || (month == 11 && day == 11)
        || (month == 11 && weekday == Weekday::Thu && (22..=28).contains(&day))
        || (month == 11 && weekday == Weekday::Fri && (23..=29).contains(&day))
        || (month == 12 && day >= 24)
        || (month == 1 && day == 1)
        || (month == 1 && monday && (15..=21).contains(&day))
        || (month == 2 && (15..=23).contains(&day))
        || (month == 4 && (15..=23).contains(&day))
        || (month == 5 && monday && day >= 25)
        || (month == 6 && day >= 20)
        || month == 7
        || month == 8;

    !holiday
}

/// Count school days between `start` and `end`, inclusive.
pub fn school_days_in_range(start: NaiveDate, end: NaiveDate) -> u32 {
    let mut count = 0;
    let mut date = start;
    while date <= end {
        if is_school_day(date) {
            count += 1;
        }
        match date.succ_opt() {
            Some(next) => date = next,
            None => break,
        }
    }
    count
}

/// Count school days in one calendar month.
pub fn school_days_in_month(year: i32, month: u32) -> u32 {
    let Some(first) = NaiveDate::from_ymd_opt(year, month, 1) else {
        return 0;
    };
    let last = match month {
        12 => NaiveDate::from_ymd_opt(year + 1, 1, 1),
        _ => NaiveDate::from_ymd_opt(year, month + 1, 1),
    }
    .and_then(|d| d.pred_opt());
    match last {
        Some(last) => school_days_in_range(first, last),
        None => 0,
    }
}

/// Count school days in a month given as a `YYYY-MM` period string.
/// Unparseable periods count zero days.
pub fn school_days_in_period(period: &str) -> u32 {
    let mut parts = period.splitn(2, '-');
    let year = parts.next().and_then(|y| y.parse::<i32>().ok());
    let month = parts.next().and_then(|m| m.parse::<u32>().ok());
    match (year, month) {
        (Some(year), Some(month)) if (1..=12).contains(&month) => {
            school_days_in_month(year, month)
        }
        _ => 0,
    }
}
