use chrono::NaiveDate;

use crate::error::{BlogError, Result};

/// Parses a front-matter date written either as `DD.MM.YYYY` or `YYYY-MM-DD`.
pub fn parse_post_date(raw: &str) -> Result<NaiveDate> {
    let trimmed = raw.trim();
    let format = if trimmed.contains('.') {
        "%d.%m.%Y"
    } else {
        "%Y-%m-%d"
    };
    NaiveDate::parse_from_str(trimmed, format).map_err(|_| BlogError::InvalidDate(raw.to_string()))
}

/// Long en-US display form, e.g. "March 29, 2024".
pub fn format_long(date: NaiveDate) -> String {
    date.format("%B %-d, %Y").to_string()
}

/// Display form for a raw date; unparseable input is shown as written.
pub fn display_date(raw: &str) -> String {
    parse_post_date(raw)
        .map(format_long)
        .unwrap_or_else(|_| raw.trim().to_string())
}

pub fn to_rfc3339(date: NaiveDate) -> String {
    format!("{}T00:00:00.000Z", date.format("%Y-%m-%d"))
}

pub fn to_iso_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}
