//! Core domain types shared by the parser, PDF, storage, and driver crates.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::BellgridError;

// ---------------------------------------------------------------------------
// ScheduleEntry
// ---------------------------------------------------------------------------

/// One finished class period: a name plus school-local start and end instants.
///
/// Serialized as `{ "name", "startTime", "endTime" }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleEntry {
    /// Display name, e.g. `Period 3`.
    pub name: String,
    /// Wall-clock start on the column's date.
    pub start_time: NaiveDateTime,
    /// Wall-clock end on the same date.
    pub end_time: NaiveDateTime,
}

// ---------------------------------------------------------------------------
// Extraction input
// ---------------------------------------------------------------------------

/// A run of text placed on a PDF page.
///
/// Coordinates are in PDF text space: `y` grows upward from the page bottom.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextFragment {
    pub text: String,
    pub x: f64,
    pub y: f64,
}

impl TextFragment {
    pub fn new(text: impl Into<String>, x: f64, y: f64) -> Self {
        Self {
            text: text.into(),
            x,
            y,
        }
    }
}

/// What a PDF extractor hands to the schedule parser.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionInput {
    /// The document's text as one newline-preserving string in reading order.
    Text(String),
    /// Positioned text fragments from every page, in content-stream order.
    Fragments(Vec<TextFragment>),
}

impl ExtractionInput {
    /// The mode that produced this input.
    pub fn mode(&self) -> ExtractionMode {
        match self {
            Self::Text(_) => ExtractionMode::Stream,
            Self::Fragments(_) => ExtractionMode::Layout,
        }
    }
}

/// Which extraction strategy to run against a PDF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionMode {
    /// Regex scan over the linear text stream.
    Stream,
    /// Coordinate clustering of positioned fragments.
    Layout,
    /// Layout first, falling back to stream when layout finds nothing.
    #[default]
    Auto,
}

impl std::fmt::Display for ExtractionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Stream => "stream",
            Self::Layout => "layout",
            Self::Auto => "auto",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for ExtractionMode {
    type Err = BellgridError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stream" | "text" => Ok(Self::Stream),
            "layout" | "fragments" => Ok(Self::Layout),
            "auto" => Ok(Self::Auto),
            other => Err(BellgridError::validation(format!(
                "unknown extraction mode '{other}': expected stream, layout, or auto"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// LunchBlock
// ---------------------------------------------------------------------------

/// The two lunch blocks that split periods 3 and 4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LunchBlock {
    A,
    B,
}

impl LunchBlock {
    /// Parse the letter of a printed "A Lunch" / "B Lunch" marker.
    pub fn from_letter(letter: &str) -> Option<Self> {
        match letter.trim() {
            "A" | "a" => Some(Self::A),
            "B" | "b" => Some(Self::B),
            _ => None,
        }
    }
}

impl std::fmt::Display for LunchBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::A => f.write_str("A Lunch"),
            Self::B => f.write_str("B Lunch"),
        }
    }
}

// ---------------------------------------------------------------------------
// DocumentRecord
// ---------------------------------------------------------------------------

/// Provenance for an ingested schedule document, stored in the database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    /// Display name, e.g. `April 6th - 10th`.
    pub name: String,
    /// Where the PDF was downloaded from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    /// SHA-256 of the PDF bytes.
    pub content_hash: String,
    /// Number of entries produced on the last ingest.
    pub entry_count: usize,
    /// Academic year the entries were dated with. `None` for records written
    /// before this was tracked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub academic_year_start: Option<i32>,
    /// When the document was last ingested.
    pub ingested_at: DateTime<Utc>,
}
