//! Per-document work: hashing, saving, extraction with mode fallback.

use std::path::{Path, PathBuf};

use bellgrid_parser::{DocumentSchedule, parse_document};
use bellgrid_shared::{BellgridError, ExtractionMode, Result, ScheduleConventions};
use sha2::{Digest, Sha256};
use tracing::{debug, instrument, warn};

/// A parsed document plus the extraction mode that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedDocument {
    pub schedule: DocumentSchedule,
    /// `Stream` or `Layout`, never `Auto`.
    pub mode: ExtractionMode,
}

/// SHA-256 of the raw document bytes, lowercase hex.
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Write `bytes` to `<dir>/<name>.pdf`, creating `dir` if needed.
pub fn save_document(dir: &Path, name: &str, bytes: &[u8]) -> Result<PathBuf> {
    std::fs::create_dir_all(dir).map_err(|e| BellgridError::io(dir, e))?;
    let path = dir.join(format!("{}.pdf", file_name_for(name)));
    std::fs::write(&path, bytes).map_err(|e| BellgridError::io(&path, e))?;
    Ok(path)
}

/// Extract and parse one PDF.
///
/// In [`ExtractionMode::Auto`] the layout strategy runs first; the stream
/// strategy runs when layout extraction fails or yields no entries.
#[instrument(skip_all, fields(document = name, mode = %mode))]
pub fn extract_and_parse(
    name: &str,
    bytes: &[u8],
    mode: ExtractionMode,
    conventions: &ScheduleConventions,
) -> Result<ParsedDocument> {
    let run = |mode: ExtractionMode| -> Result<ParsedDocument> {
        let input = bellgrid_pdf::extract(bytes, mode)?;
        Ok(ParsedDocument {
            schedule: parse_document(name, &input, conventions),
            mode: input.mode(),
        })
    };

    match mode {
        ExtractionMode::Stream | ExtractionMode::Layout => run(mode),
        ExtractionMode::Auto => {
            match run(ExtractionMode::Layout) {
                Ok(parsed) if !parsed.schedule.is_empty() => return Ok(parsed),
                Ok(_) => debug!("layout found no entries, trying stream"),
                Err(e) => warn!(error = %e, "layout extraction failed, trying stream"),
            }
            run(ExtractionMode::Stream)
        }
    }
}

/// Parse a local PDF. The document name defaults to the file stem.
pub fn parse_file(
    path: &Path,
    name: Option<&str>,
    mode: ExtractionMode,
    conventions: &ScheduleConventions,
) -> Result<ParsedDocument> {
    let bytes = std::fs::read(path).map_err(|e| BellgridError::io(path, e))?;
    let name = match name {
        Some(name) => name.to_string(),
        None => path
            .file_stem()
            .and_then(|s| s.to_str())
            .map(str::to_string)
            .ok_or_else(|| {
                BellgridError::validation(format!(
                    "cannot derive a document name from {}; pass one explicitly",
                    path.display()
                ))
            })?,
    };
    extract_and_parse(&name, &bytes, mode, conventions)
}

/// File-system-safe form of a document name.
fn file_name_for(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim().trim_start_matches('.');
    if cleaned.is_empty() {
        "document".to_string()
    } else {
        cleaned.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bellgrid_pdf::test_pdf::{render, two_day_week};
    use chrono::Timelike;
    use uuid::Uuid;

    fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("bellgrid_docs_{}", Uuid::now_v7()))
    }

    #[test]
    fn hash_is_stable_hex() {
        let hash = content_hash(b"abc");
        assert_eq!(
            hash,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_ne!(content_hash(b"abd"), hash);
    }

    #[test]
    fn names_are_made_file_safe() {
        assert_eq!(file_name_for("April 6th - 10th"), "April 6th - 10th");
        assert_eq!(file_name_for("a/b\\c:d"), "a_b_c_d");
        assert_eq!(file_name_for("../.."), "_..");
        assert_eq!(file_name_for("  "), "document");
    }

    #[test]
    fn save_writes_under_dir() {
        let dir = temp_dir();
        let path = save_document(&dir, "April 6th - 10th", b"%PDF").unwrap();
        assert_eq!(path, dir.join("April 6th - 10th.pdf"));
        assert_eq!(std::fs::read(&path).unwrap(), b"%PDF");
    }

    #[test]
    fn auto_uses_layout_when_it_finds_entries() {
        let bytes = two_day_week();
        let parsed = extract_and_parse(
            "April 6th - 10th",
            &bytes,
            ExtractionMode::Auto,
            &ScheduleConventions::default(),
        )
        .unwrap();

        assert_eq!(parsed.mode, ExtractionMode::Layout);
        assert_eq!(parsed.schedule.entries.len(), 2);
        assert_eq!(parsed.schedule.entries[0].start_time.hour(), 8);
        assert_eq!(parsed.schedule.entries[1].start_time.hour(), 9);
    }

    #[test]
    fn auto_falls_back_to_stream() {
        let bytes = render(&[(72, 700, "No classes this week")]);
        let parsed = extract_and_parse(
            "April 6th - 10th",
            &bytes,
            ExtractionMode::Auto,
            &ScheduleConventions::default(),
        )
        .unwrap();

        assert_eq!(parsed.mode, ExtractionMode::Stream);
        assert!(parsed.schedule.is_empty());
    }

    #[test]
    fn parse_file_names_document_after_file() {
        let dir = temp_dir();
        let path = save_document(&dir, "April 6th - 10th", &two_day_week()).unwrap();
        let conventions = ScheduleConventions::default();

        let parsed = parse_file(&path, None, ExtractionMode::Layout, &conventions).unwrap();
        assert_eq!(parsed.schedule.name, "April 6th - 10th");
        assert_eq!(parsed.schedule.dates.len(), 5);

        let renamed =
            parse_file(&path, Some("Weekly"), ExtractionMode::Layout, &conventions).unwrap();
        assert!(renamed.schedule.is_empty());
    }

    #[test]
    fn parse_file_reports_missing_file() {
        let err = parse_file(
            Path::new("/nonexistent/bellgrid.pdf"),
            None,
            ExtractionMode::Auto,
            &ScheduleConventions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, BellgridError::Io { .. }));
    }
}
