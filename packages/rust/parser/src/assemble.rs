//! Resolved occurrences + column dates → schedule entries.

use bellgrid_shared::ScheduleEntry;
use tracing::warn;

use crate::dates::ColumnDates;
use crate::occurrence::ResolvedOccurrence;

/// Display name for a period.
pub fn period_name(period: u8) -> String {
    format!("Period {period}")
}

/// Build one entry per occurrence whose column has a date.
///
/// Printed hours below `pm_cutoff` are afternoon hours. Occurrences in
/// columns past the end of `dates`, or with impossible clock values, are
/// skipped with a warning. Order follows the input.
pub fn assemble_entries(
    occurrences: &[ResolvedOccurrence],
    dates: &ColumnDates,
    pm_cutoff: u32,
) -> Vec<ScheduleEntry> {
    occurrences
        .iter()
        .filter_map(|occurrence| {
            let Some(date) = dates.get(occurrence.column) else {
                warn!(
                    period = occurrence.period,
                    column = occurrence.column,
                    columns = dates.len(),
                    "no date for column, entry skipped"
                );
                return None;
            };

            let start = occurrence.span.start.to_naive_time(pm_cutoff);
            let end = occurrence.span.end.to_naive_time(pm_cutoff);
            let (Some(start), Some(end)) = (start, end) else {
                warn!(
                    period = occurrence.period,
                    %date,
                    span = %occurrence.span,
                    "invalid clock time, entry skipped"
                );
                return None;
            };

            Some(ScheduleEntry {
                name: period_name(occurrence.period),
                start_time: date.and_time(start),
                end_time: date.and_time(end),
            })
        })
        .collect()
}
