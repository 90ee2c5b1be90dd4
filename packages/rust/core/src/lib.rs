//! Ingest orchestration for Bellgrid.
//!
//! Ties fetching, PDF extraction, schedule parsing, and storage together:
//! - [`pipeline::ingest`]: source URL → stored schedule entries
//! - [`documents::parse_file`]: one local PDF → parsed schedule

pub mod documents;
pub mod pipeline;

pub use documents::{ParsedDocument, content_hash, extract_and_parse, parse_file, save_document};
pub use pipeline::{
    DocumentOutcome, DocumentReport, IngestConfig, IngestReport, ProgressReporter, SilentProgress,
    ingest,
};
