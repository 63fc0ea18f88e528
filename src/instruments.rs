//! NSE index option reference data: lot sizes and the expiry calendar.

use chrono::{Datelike, Duration, NaiveDate, Weekday};

/// Contract lot size for a supported index, case-insensitive.
pub fn lot_size(instrument: &str) -> Option<u32> {
    match instrument.to_ascii_uppercase().as_str() {
        "NIFTY" => Some(50),
        "BANKNIFTY" => Some(25),
        "FINNIFTY" => Some(40),
        _ => None,
    }
}

/// Calendar days from `today` to `expiry`, zero once expiry has passed.
pub fn days_to_expiry(expiry: NaiveDate, today: NaiveDate) -> u32 {
    (expiry - today).num_days().clamp(0, u32::MAX as i64) as u32
}

/// Last Thursday of the given month.
pub fn last_thursday(year: i32, month: u32) -> Option<NaiveDate> {
    let first_of_next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    let last = first_of_next.pred_opt()?;
    let back = (last.weekday().num_days_from_monday() + 7 - Weekday::Thu.num_days_from_monday()) % 7;
    Some(last - Duration::days(back as i64))
}

/// The monthly expiry still ahead of (or on) `today`: this month's last
/// Thursday, or next month's once it has passed.
pub fn next_monthly_expiry(today: NaiveDate) -> Option<NaiveDate> {
    let this_month = last_thursday(today.year(), today.month())?;
    if this_month >= today {
        return Some(this_month);
    }
    let (y, m) = if today.month() == 12 {
        (today.year() + 1, 1)
    } else {
        (today.year(), today.month() + 1)
    };
    last_thursday(y, m)
}
