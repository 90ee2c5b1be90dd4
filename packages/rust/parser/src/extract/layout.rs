//! Layout-mode extraction: coordinate clustering of positioned fragments.
//!
//! Weekday headers fix the column boundaries. Each `Period <n>` label is
//! placed in a column by its x coordinate, and its time range is read from the
//! fragments one row below it in the same column.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use bellgrid_shared::{ScheduleConventions, TextFragment};
use regex::Regex;
use tracing::{debug, warn};

use crate::occurrence::{Evidence, RawOccurrence, TimeSpan};

/// Column geometry recovered from the weekday headers.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnBounds {
    /// Left boundary of each column; the first is unbounded.
    lefts: Vec<f64>,
}

impl ColumnBounds {
    /// Build bounds from the weekday header fragments.
    ///
    /// Only the topmost header per weekday counts. Returns `None` when no
    /// header is found.
    pub fn from_headers(fragments: &[TextFragment], weekdays: &[String]) -> Option<Self> {
        let mut topmost: BTreeMap<usize, &TextFragment> = BTreeMap::new();
        for fragment in fragments {
            let text = fragment.text.to_lowercase();
            let Some(day) = weekdays
                .iter()
                .position(|d| text.contains(&d.to_lowercase()))
            else {
                continue;
            };
            topmost
                .entry(day)
                .and_modify(|best| {
                    if fragment.y > best.y {
                        *best = fragment;
                    }
                })
                .or_insert(fragment);
        }

        if topmost.is_empty() {
            return None;
        }

        let mut xs: Vec<f64> = topmost.values().map(|f| f.x).collect();
        xs.sort_by(f64::total_cmp);

        let lefts = xs
            .iter()
            .enumerate()
            .map(|(i, x)| match i {
                0 => f64::NEG_INFINITY,
                _ => (xs[i - 1] + x) / 2.0,
            })
            .collect();

        Some(Self { lefts })
    }

    pub fn len(&self) -> usize {
        self.lefts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lefts.is_empty()
    }

    /// Column index containing `x`.
    pub fn column_of(&self, x: f64) -> usize {
        self.lefts
            .iter()
            .rposition(|left| x >= *left)
            .unwrap_or(0)
    }
}

/// Read every period label on the page with the time printed under it.
///
/// Duplicates are kept; labels without a readable time carry `span: None`.
pub fn extract(fragments: &[TextFragment], conventions: &ScheduleConventions) -> Vec<RawOccurrence> {
    let Some(bounds) = ColumnBounds::from_headers(fragments, &conventions.weekdays) else {
        warn!(
            fragments = fragments.len(),
            "no weekday headers found, cannot place periods in columns"
        );
        return Vec::new();
    };

    let occurrences: Vec<RawOccurrence> = fragments
        .iter()
        .filter_map(|label| {
            let period = period_label(&label.text)?;
            let column = bounds.column_of(label.x);
            let span = time_below(label, column, fragments, &bounds, conventions);
            if span.is_none() {
                debug!(period, column, x = label.x, y = label.y, "no time range under label");
            }
            Some(RawOccurrence {
                period,
                column,
                span,
                evidence: Evidence::Layout {
                    x: label.x,
                    y: label.y,
                },
            })
        })
        .collect();

    debug!(
        columns = bounds.len(),
        labels = occurrences.len(),
        "placed period labels"
    );
    occurrences
}

/// Match a fragment that is exactly `Period <n>`, ignoring whitespace and case.
pub fn period_label(text: &str) -> Option<u8> {
    static LABEL_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?i)^period(\d{1,2})$").expect("valid regex"));

    let compact: String = text.split_whitespace().collect();
    let caps = LABEL_RE.captures(&compact)?;
    caps[1].parse().ok().filter(|p| *p > 0)
}

/// Concatenate the fragments one row under `label`, inside its column, and
/// read the first `h:mm - h:mm` range from them.
fn time_below(
    label: &TextFragment,
    column: usize,
    fragments: &[TextFragment],
    bounds: &ColumnBounds,
    conventions: &ScheduleConventions,
) -> Option<TimeSpan> {
    let row_y = label.y - conventions.row_height;

    let mut row: Vec<&TextFragment> = fragments
        .iter()
        .filter(|f| (f.y - row_y).abs() <= conventions.row_tolerance)
        .filter(|f| bounds.column_of(f.x) == column)
        .collect();
    row.sort_by(|a, b| a.x.total_cmp(&b.x));

    let joined: String = row.iter().map(|f| f.text.as_str()).collect();
    TimeSpan::find_in(&joined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::occurrence::TimeOfDay;

    fn frag(text: &str, x: f64, y: f64) -> TextFragment {
        TextFragment::new(text, x, y)
    }

    fn week_headers() -> Vec<TextFragment> {
        vec![
            frag("Wednesday", 300.0, 700.0),
            frag("Monday", 100.0, 700.0),
            frag("Friday", 500.0, 700.0),
            frag("Tuesday", 200.0, 700.0),
            frag("Thursday", 400.0, 700.0),
        ]
    }

    #[test]
    fn column_bounds_are_midpoints() {
        let conventions = ScheduleConventions::default();
        let bounds = ColumnBounds::from_headers(&week_headers(), &conventions.weekdays).unwrap();

        assert_eq!(bounds.len(), 5);
        assert_eq!(bounds.column_of(-50.0), 0);
        assert_eq!(bounds.column_of(149.9), 0);
        assert_eq!(bounds.column_of(150.0), 1);
        assert_eq!(bounds.column_of(310.0), 2);
        assert_eq!(bounds.column_of(9999.0), 4);
    }

    #[test]
    fn topmost_header_wins() {
        let conventions = ScheduleConventions::default();
        let fragments = vec![
            frag("Monday", 100.0, 700.0),
            frag("Tuesday", 200.0, 700.0),
            // A footer mentioning Monday far to the right, lower on the page.
            frag("No school Monday", 900.0, 40.0),
        ];
        let bounds = ColumnBounds::from_headers(&fragments, &conventions.weekdays).unwrap();
        assert_eq!(bounds.len(), 2);
        assert_eq!(bounds.column_of(180.0), 1);
    }

    #[test]
    fn no_headers_no_occurrences() {
        let conventions = ScheduleConventions::default();
        let fragments = vec![frag("Period 1", 100.0, 600.0), frag("8:00 - 8:50", 100.0, 588.0)];
        assert!(extract(&fragments, &conventions).is_empty());
    }

    #[test]
    fn labels_are_whitespace_insensitive() {
        assert_eq!(period_label("Period 3"), Some(3));
        assert_eq!(period_label("  Period\t4 "), Some(4));
        assert_eq!(period_label("PERIOD 2"), Some(2));
        assert_eq!(period_label("Period 3 A"), None);
        assert_eq!(period_label("Periods"), None);
        assert_eq!(period_label("Period 0"), None);
    }

    #[test]
    fn reads_time_from_row_below() {
        let conventions = ScheduleConventions::default();
        let mut fragments = week_headers();
        fragments.extend([
            frag("Period 1", 100.0, 660.0),
            // Split across fragments, out of x order.
            frag("8:50", 130.0, 648.5),
            frag("8:00 -", 95.0, 647.0),
            frag("Period 1", 200.0, 660.0),
            frag("9:00 - 9:50", 200.0, 648.0),
        ]);

        let out = extract(&fragments, &conventions);
        assert_eq!(out.len(), 2);

        assert_eq!(out[0].period, 1);
        assert_eq!(out[0].column, 0);
        assert_eq!(
            out[0].span,
            Some(TimeSpan::new(TimeOfDay::new(8, 0), TimeOfDay::new(8, 50)))
        );
        assert_eq!(out[0].evidence, Evidence::Layout { x: 100.0, y: 660.0 });

        assert_eq!(out[1].column, 1);
        assert_eq!(
            out[1].span,
            Some(TimeSpan::new(TimeOfDay::new(9, 0), TimeOfDay::new(9, 50)))
        );
    }

    #[test]
    fn time_outside_row_or_column_is_ignored() {
        let conventions = ScheduleConventions::default();
        let mut fragments = week_headers();
        fragments.extend([
            frag("Period 2", 300.0, 500.0),
            // Two rows down.
            frag("10:00 - 10:50", 300.0, 476.0),
            // Right row, neighbouring column.
            frag("11:00 - 11:50", 400.0, 488.0),
        ]);

        let out = extract(&fragments, &conventions);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].column, 2);
        assert_eq!(out[0].span, None);
    }
}
