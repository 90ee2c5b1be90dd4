//! Document name → weekday column dates.
//!
//! Schedule PDFs are named after the week they cover, e.g. `April 6th - 10th`
//! or `April 27th - May 1st.pdf`. The year is never printed; it follows from
//! the academic year in force.

use std::sync::LazyLock;

use bellgrid_shared::{BellgridError, Result};
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use regex::Regex;
use tracing::{debug, warn};

/// Full English month names, January first.
const MONTHS: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

/// Number of weekday columns in a schedule grid.
pub const MAX_COLUMNS: usize = 5;

/// Month (1-based) from which dates belong to the academic-year start year.
const ACADEMIC_YEAR_FIRST_MONTH: u32 = 7;

// ---------------------------------------------------------------------------
// ColumnDates
// ---------------------------------------------------------------------------

/// Dates of the weekday columns in a document, left to right.
///
/// Always strictly increasing, weekdays only, at most [`MAX_COLUMNS`] long.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnDates(Vec<NaiveDate>);

impl ColumnDates {
    /// Date of column `index`, if the document has that many columns.
    pub fn get(&self, index: usize) -> Option<NaiveDate> {
        self.0.get(index).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[NaiveDate] {
        &self.0
    }
}

/// A parsed `start - end` range from a document name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Weekdays from `start` to `end` inclusive, capped at [`MAX_COLUMNS`].
    pub fn weekdays(&self) -> ColumnDates {
        let mut dates = Vec::with_capacity(MAX_COLUMNS);
        let mut day = self.start;
        while day <= self.end && dates.len() < MAX_COLUMNS {
            if !matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
                dates.push(day);
            }
            day += Duration::days(1);
        }
        ColumnDates(dates)
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Resolve a document name to its column dates.
///
/// An unparseable name is not fatal: it is logged and yields no dates, so the
/// caller can skip the document.
pub fn resolve_column_dates(name: &str, academic_year_start: i32) -> ColumnDates {
    match parse_date_range(name, academic_year_start) {
        Ok(range) => {
            let dates = range.weekdays();
            debug!(
                name,
                start = %range.start,
                end = %range.end,
                columns = dates.len(),
                "resolved column dates"
            );
            dates
        }
        Err(e) => {
            warn!(name, error = %e, "skipping document with unparseable name");
            ColumnDates::default()
        }
    }
}

/// Parse the first/last day named in a document name.
pub fn parse_date_range(name: &str, academic_year_start: i32) -> Result<DateRange> {
    static MONTH_RE: LazyLock<Regex> = LazyLock::new(|| {
        let alternation = MONTHS.join("|");
        Regex::new(&format!(r"(?i)\b({alternation})\b")).expect("valid regex")
    });
    static DAY_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?i)\b(\d{1,2})(?:st|nd|rd|th)?\b").expect("valid regex")
    });

    let stem = strip_document_suffix(name);

    let months: Vec<u32> = MONTH_RE
        .captures_iter(stem)
        .filter_map(|caps| month_number(&caps[1]))
        .collect();
    let days: Vec<u32> = DAY_RE
        .captures_iter(stem)
        .filter_map(|caps| caps[1].parse().ok())
        .collect();

    if months.is_empty() {
        return Err(BellgridError::parse(format!("no month name in '{name}'")));
    }
    if days.len() < 2 {
        return Err(BellgridError::parse(format!(
            "expected two day numbers in '{name}', found {}",
            days.len()
        )));
    }

    let start_month = months[0];
    let end_month = months.get(1).copied().unwrap_or(start_month);

    let start = calendar_date(start_month, days[0], academic_year_start)
        .ok_or_else(|| BellgridError::parse(format!("invalid start date in '{name}'")))?;
    let end = calendar_date(end_month, days[1], academic_year_start)
        .ok_or_else(|| BellgridError::parse(format!("invalid end date in '{name}'")))?;
    if end < start {
        return Err(BellgridError::parse(format!(
            "range in '{name}' ends ({end}) before it starts ({start})"
        )));
    }

    Ok(DateRange { start, end })
}

/// Drop a trailing `.pdf` (any case) from a file name.
fn strip_document_suffix(name: &str) -> &str {
    let trimmed = name.trim();
    let len = trimmed.len();
    let is_pdf = len >= 4
        && trimmed.is_char_boundary(len - 4)
        && trimmed[len - 4..].eq_ignore_ascii_case(".pdf");
    if is_pdf {
        trimmed[..len - 4].trim_end()
    } else {
        trimmed
    }
}

fn month_number(name: &str) -> Option<u32> {
    let lower = name.to_ascii_lowercase();
    MONTHS
        .iter()
        .position(|m| *m == lower)
        .map(|i| i as u32 + 1)
}

/// Place a month/day in the academic year: July–December in the start year,
/// January–June in the following one.
fn calendar_date(month: u32, day: u32, academic_year_start: i32) -> Option<NaiveDate> {
    let year = if month >= ACADEMIC_YEAR_FIRST_MONTH {
        academic_year_start
    } else {
        academic_year_start + 1
    };
    NaiveDate::from_ymd_opt(year, month, day)
}
