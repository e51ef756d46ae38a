use crate::invoice::InvoiceError;
use crate::spreadsheet::CellGrid;
use chrono::NaiveDate;
use chrono::NaiveDateTime;
use regex::Regex;
use std::sync::OnceLock;

/// Accepted date-time renderings of the month label cell
const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

fn period_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\d{4}-\d{2}$").expect("Hardcode regex pattern"))
}

/// Display text of cell (0, 0), `None` when blank.
pub fn invoicing_month<G: CellGrid + ?Sized>(sheet: &G) -> Option<String> {
    let text = sheet.cell_text(0, 0);
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Checks a declared period has the `YYYY-MM` shape.
pub fn validate_period(period: &str) -> Result<(), InvoiceError> {
    if period_pattern().is_match(period) {
        Ok(())
    } else {
        Err(InvoiceError::InvalidPeriod(period.to_owned()))
    }
}

/// Trims a declared period and checks it is present and well formed.
pub fn require_period(period: Option<&str>) -> Result<&str, InvoiceError> {
    let period = period
        .map(str::trim)
        .filter(|period| !period.is_empty())
        .ok_or(InvoiceError::MissingPeriod)?;
    validate_period(period)?;
    Ok(period)
}

/// Interprets a month label as a date and renders it as `YYYY-MM`.
///
/// Accepts `YYYY-MM`, `YYYY-MM-DD` and `YYYY-MM-DD HH:MM:SS` (space or `T`
/// separated, optional fraction), which covers both text labels and the
/// rendering of date-formatted cells.
pub fn normalize_month(label: &str) -> Option<String> {
    let label = label.trim();
    let date = NaiveDate::parse_from_str(label, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|format| NaiveDateTime::parse_from_str(label, format).ok())
                .map(|datetime| datetime.date())
        })
        .or_else(|| NaiveDate::parse_from_str(&format!("{label}-01"), "%Y-%m-%d").ok())?;
    Some(date.format("%Y-%m").to_string())
}
