//! Period occurrences as read off the page, before and after duplicate resolution.

use std::sync::LazyLock;

use bellgrid_shared::LunchBlock;
use chrono::NaiveTime;
use regex::Regex;
use serde::Serialize;

// ---------------------------------------------------------------------------
// TimeOfDay
// ---------------------------------------------------------------------------

/// An `h:mm` time as printed: 12-hour clock with no AM/PM marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeOfDay {
    pub hour: u32,
    pub minute: u32,
}

impl TimeOfDay {
    pub fn new(hour: u32, minute: u32) -> Self {
        Self { hour, minute }
    }

    /// Parse `h:mm` or `hh:mm`. Surrounding whitespace is ignored.
    pub fn parse(s: &str) -> Option<Self> {
        let (h, m) = s.trim().split_once(':')?;
        if h.is_empty() || h.len() > 2 || m.len() != 2 {
            return None;
        }
        Some(Self {
            hour: h.parse().ok()?,
            minute: m.parse().ok()?,
        })
    }

    /// Convert to a 24-hour time. Hours below `pm_cutoff` are afternoon hours.
    ///
    /// Returns `None` for values that are not a valid clock time.
    pub fn to_naive_time(self, pm_cutoff: u32) -> Option<NaiveTime> {
        let hour = if self.hour < pm_cutoff {
            self.hour + 12
        } else {
            self.hour
        };
        NaiveTime::from_hms_opt(hour, self.minute, 0)
    }
}

impl std::fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{:02}", self.hour, self.minute)
    }
}

// ---------------------------------------------------------------------------
// TimeSpan
// ---------------------------------------------------------------------------

/// A printed `h:mm - h:mm` range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeSpan {
    pub start: TimeOfDay,
    pub end: TimeOfDay,
}

impl TimeSpan {
    pub fn new(start: TimeOfDay, end: TimeOfDay) -> Self {
        Self { start, end }
    }

    /// Find the first `h:mm - h:mm` range anywhere in `text`.
    pub fn find_in(text: &str) -> Option<Self> {
        static RANGE_RE: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(r"(\d{1,2}:\d{2})\s*[-–]\s*(\d{1,2}:\d{2})").expect("valid regex")
        });

        let caps = RANGE_RE.captures(text)?;
        Some(Self {
            start: TimeOfDay::parse(&caps[1])?,
            end: TimeOfDay::parse(&caps[2])?,
        })
    }
}

impl std::fmt::Display for TimeSpan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} - {}", self.start, self.end)
    }
}

// ---------------------------------------------------------------------------
// Occurrences
// ---------------------------------------------------------------------------

/// Where on the page (or in the text) an occurrence was read.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum Evidence {
    /// Byte offset of the match in the text stream, plus the closest lunch
    /// marker printed before it.
    Stream {
        offset: usize,
        lunch: Option<LunchBlock>,
    },
    /// Page coordinates of the period label.
    Layout { x: f64, y: f64 },
}

/// One printed appearance of a period in one weekday column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawOccurrence {
    pub period: u8,
    pub column: usize,
    /// `None` when no time range could be found next to the label.
    pub span: Option<TimeSpan>,
    pub evidence: Evidence,
}

/// The single occurrence chosen for a (column, period) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResolvedOccurrence {
    pub period: u8,
    pub column: usize,
    pub span: TimeSpan,
}
