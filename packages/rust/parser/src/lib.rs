//! Schedule parsing for Bellgrid.
//!
//! Turns the extracted contents of one weekly schedule PDF into dated
//! [`ScheduleEntry`] records:
//! - [`dates`]: document name → weekday column dates
//! - [`extract`]: stream or layout extraction of raw period occurrences
//! - [`resolve`]: one occurrence per (column, period) on A/B lunch days
//! - [`assemble`]: occurrences + dates → entries
//!
//! Everything here is pure. I/O lives in `bellgrid-pdf` and `bellgrid-core`.

pub mod assemble;
pub mod dates;
pub mod extract;
pub mod occurrence;
pub mod resolve;

use bellgrid_shared::{ExtractionInput, ScheduleConventions, ScheduleEntry};
use tracing::{debug, instrument};

pub use assemble::{assemble_entries, period_name};
pub use dates::{ColumnDates, DateRange, parse_date_range, resolve_column_dates};
pub use extract::{OccurrenceExtractor, extractor_for};
pub use occurrence::{Evidence, RawOccurrence, ResolvedOccurrence, TimeOfDay, TimeSpan};
pub use resolve::resolve_duplicates;

/// Everything parsed out of one document.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentSchedule {
    /// Document name with any `.pdf` suffix left as given.
    pub name: String,
    pub dates: ColumnDates,
    /// Sorted by start time, then name.
    pub entries: Vec<ScheduleEntry>,
}

impl DocumentSchedule {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Parse one document's extraction output into schedule entries.
///
/// Never fails: unreadable names, missing rosters, and missing times shrink
/// the output and are reported through `tracing`.
#[instrument(skip_all, fields(document = name, mode = %input.mode()))]
pub fn parse_document(
    name: &str,
    input: &ExtractionInput,
    conventions: &ScheduleConventions,
) -> DocumentSchedule {
    let dates = resolve_column_dates(name, conventions.academic_year_start);

    let extractor = extractor_for(input);
    let raw = extractor.extract(conventions);
    let raw_count = raw.len();

    let resolved = resolve_duplicates(raw, &conventions.lunch_rules);
    let mut entries = assemble_entries(&resolved, &dates, conventions.pm_cutoff_hour);
    entries.sort_by(|a, b| {
        a.start_time
            .cmp(&b.start_time)
            .then_with(|| a.name.cmp(&b.name))
    });

    debug!(
        strategy = extractor.name(),
        columns = dates.len(),
        raw = raw_count,
        resolved = resolved.len(),
        entries = entries.len(),
        "document parsed"
    );

    DocumentSchedule {
        name: name.to_string(),
        dates,
        entries,
    }
}
