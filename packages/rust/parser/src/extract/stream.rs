//! Stream-mode extraction: regex scan over the linear text of the PDF.
//!
//! The text has no grid, only reading order. Column membership is recovered
//! from the day headers: each weekday name is followed by a roster line such
//! as `1-6` or `1,2,3,5,6` listing the periods that meet that day. Printed
//! occurrences of a period are then dealt out, in order, to the columns its
//! rosters name.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use bellgrid_shared::LunchBlock;
use regex::Regex;
use tracing::debug;

use crate::occurrence::{Evidence, RawOccurrence, TimeOfDay, TimeSpan};

/// Per-period position in that period's expected-column list.
pub(crate) type CursorMap = BTreeMap<u8, usize>;

/// Period → columns it is expected in, left to right.
pub(crate) type ExpectedColumns = BTreeMap<u8, Vec<usize>>;

static OCCURRENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Period\s+(\d{1,2})\s+(\d{1,2}:\d{2})\s*[-–]\s*(\d{1,2}:\d{2})\s*\((\d+)\)")
        .expect("valid regex")
});

static ROSTER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{1,2}(?:\s*[-–,]\s*\d{1,2})*$").expect("valid regex")
});

static LUNCH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b([AB])\s+lunch\b").expect("valid regex"));

/// Scan `text` for period occurrences and assign each to a column.
pub fn extract(text: &str, weekdays: &[String]) -> Vec<RawOccurrence> {
    let present = present_weekdays(text, weekdays);
    let rosters = read_rosters(text, weekdays);
    let expected = expected_columns(&present, &rosters);
    let markers = lunch_markers(text);

    debug!(
        present = present.len(),
        rosters = rosters.len(),
        periods = expected.len(),
        lunch_markers = markers.len(),
        "read day headers"
    );

    let (_, occurrences) = OCCURRENCE_RE.captures_iter(text).fold(
        (CursorMap::new(), Vec::new()),
        |(cursors, mut out), caps| {
            let offset = caps.get(0).map_or(0, |m| m.start());
            let Some(period) = caps[1].parse::<u8>().ok().filter(|p| *p > 0) else {
                return (cursors, out);
            };
            let span = match (TimeOfDay::parse(&caps[2]), TimeOfDay::parse(&caps[3])) {
                (Some(start), Some(end)) => TimeSpan::new(start, end),
                _ => return (cursors, out),
            };

            let columns = expected.get(&period).map(Vec::as_slice).unwrap_or_default();
            let (cursors, column) = next_column(cursors, period, columns);
            match column {
                Some(column) => out.push(RawOccurrence {
                    period,
                    column,
                    span: Some(span),
                    evidence: Evidence::Stream {
                        offset,
                        lunch: preceding_lunch(&markers, offset),
                    },
                }),
                None => debug!(period, offset, "period missing from every day roster, dropped"),
            }
            (cursors, out)
        },
    );

    occurrences
}

/// Advance the cursor for `period` and return the column it lands on.
///
/// Past the end of the list the cursor wraps to the first expected column:
/// extra printings are the A/B lunch duplicates of earlier days.
pub(crate) fn next_column(
    mut cursors: CursorMap,
    period: u8,
    columns: &[usize],
) -> (CursorMap, Option<usize>) {
    if columns.is_empty() {
        return (cursors, None);
    }
    let cursor = cursors.get(&period).copied().unwrap_or(0);
    let index = if cursor >= columns.len() { 0 } else { cursor };
    cursors.insert(period, index + 1);
    (cursors, Some(columns[index]))
}

// ---------------------------------------------------------------------------
// Day headers
// ---------------------------------------------------------------------------

/// Indexes (into `weekdays`) of the weekday names the text mentions, in
/// weekday order. Their positions in this list are the column indexes.
pub(crate) fn present_weekdays(text: &str, weekdays: &[String]) -> Vec<usize> {
    let lower = text.to_lowercase();
    weekdays
        .iter()
        .enumerate()
        .filter(|(_, day)| lower.contains(&day.to_lowercase()))
        .map(|(i, _)| i)
        .collect()
}

/// Weekday index → periods meeting that day, from the first line naming the
/// weekday that is followed by a roster line. Blank lines in between are
/// skipped.
pub(crate) fn read_rosters(text: &str, weekdays: &[String]) -> BTreeMap<usize, BTreeSet<u8>> {
    let lines: Vec<&str> = text.lines().collect();
    let mut rosters = BTreeMap::new();

    for (day_index, day) in weekdays.iter().enumerate() {
        let needle = day.to_lowercase();
        let roster = lines.iter().enumerate().find_map(|(i, line)| {
            if !line.to_lowercase().contains(&needle) {
                return None;
            }
            let next = lines[i + 1..].iter().find(|l| !l.trim().is_empty())?;
            parse_roster(next)
        });
        if let Some(periods) = roster {
            rosters.insert(day_index, periods);
        }
    }

    rosters
}

/// Parse a roster line such as `1-6`, `1,2,3,5,6`, or `1 - 3, 5`.
pub fn parse_roster(line: &str) -> Option<BTreeSet<u8>> {
    let line = line.trim();
    if !ROSTER_RE.is_match(line) {
        return None;
    }

    let mut periods = BTreeSet::new();
    for part in line.split(',') {
        let part = part.trim();
        match part.split_once(['-', '–']) {
            Some((from, to)) => {
                let from: u8 = from.trim().parse().ok()?;
                let to: u8 = to.trim().parse().ok()?;
                periods.extend(from..=to);
            }
            None => {
                periods.insert(part.parse().ok()?);
            }
        }
    }
    Some(periods)
}

/// Build each period's expected-column list from the present weekdays and
/// their rosters. Weekdays without a roster contribute no columns.
pub(crate) fn expected_columns(
    present: &[usize],
    rosters: &BTreeMap<usize, BTreeSet<u8>>,
) -> ExpectedColumns {
    let mut expected = ExpectedColumns::new();
    for (column, day_index) in present.iter().enumerate() {
        let Some(periods) = rosters.get(day_index) else {
            debug!(day_index, "no roster line for weekday");
            continue;
        };
        for period in periods {
            expected.entry(*period).or_default().push(column);
        }
    }
    expected
}

// ---------------------------------------------------------------------------
// Lunch markers
// ---------------------------------------------------------------------------

/// Offsets of every `A Lunch` / `B Lunch` marker, ascending.
fn lunch_markers(text: &str) -> Vec<(usize, LunchBlock)> {
    LUNCH_RE
        .captures_iter(text)
        .filter_map(|caps| {
            let start = caps.get(0)?.start();
            Some((start, LunchBlock::from_letter(&caps[1])?))
        })
        .collect()
}

/// The marker closest before `offset`.
fn preceding_lunch(markers: &[(usize, LunchBlock)], offset: usize) -> Option<LunchBlock> {
    let idx = markers.partition_point(|(at, _)| *at < offset);
    idx.checked_sub(1).map(|i| markers[i].1)
}
