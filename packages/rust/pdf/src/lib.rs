//! PDF text extraction for Bellgrid.
//!
//! Produces the two inputs the schedule parser understands:
//! - linear text via `pdf-extract` ([`extract_text`])
//! - positioned fragments via a `lopdf` content-stream walk
//!   ([`extract_fragments`])

mod fragments;
#[cfg(any(test, feature = "test-util"))]
pub mod test_pdf;

use bellgrid_shared::{BellgridError, ExtractionInput, ExtractionMode, Result};
use tracing::{debug, instrument};

pub use fragments::extract_fragments;

/// The document's text in reading order, newlines preserved.
pub fn extract_text(bytes: &[u8]) -> Result<String> {
    pdf_extract::extract_text_from_mem(bytes)
        .map_err(|e| BellgridError::Extraction(format!("pdf-extract failed: {e}")))
}

/// Run the extractor for `mode`.
///
/// [`ExtractionMode::Auto`] reads fragments; falling back to text is the
/// caller's decision, made after parsing.
#[instrument(skip_all, fields(bytes = bytes.len(), mode = %mode))]
pub fn extract(bytes: &[u8], mode: ExtractionMode) -> Result<ExtractionInput> {
    let input = match mode {
        ExtractionMode::Stream => ExtractionInput::Text(extract_text(bytes)?),
        ExtractionMode::Layout | ExtractionMode::Auto => {
            ExtractionInput::Fragments(extract_fragments(bytes)?)
        }
    };

    match &input {
        ExtractionInput::Text(text) => debug!(chars = text.len(), "text extracted"),
        ExtractionInput::Fragments(fragments) => {
            debug!(fragments = fragments.len(), "fragments extracted")
        }
    }
    Ok(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_pdf::render;

    #[test]
    fn fragments_carry_positions() {
        let bytes = render(&[
            (100, 700, "Monday"),
            (100, 660, "Period 1"),
            (100, 648, "8:00 - 8:50"),
        ]);
        let fragments = extract_fragments(&bytes).unwrap();

        assert_eq!(fragments.len(), 3);
        assert_eq!(fragments[0].text, "Monday");
        assert_eq!((fragments[1].x, fragments[1].y), (100.0, 660.0));
        assert_eq!(fragments[2].text, "8:00 - 8:50");
    }

    #[test]
    fn stream_mode_reads_text() {
        let bytes = render(&[(72, 700, "Monday"), (72, 680, "1-6")]);
        let input = extract(&bytes, ExtractionMode::Stream).unwrap();
        let ExtractionInput::Text(text) = input else {
            panic!("expected text");
        };
        assert!(text.contains("Monday"));
    }

    #[test]
    fn auto_mode_reads_fragments() {
        let bytes = render(&[(72, 700, "Friday")]);
        let input = extract(&bytes, ExtractionMode::Auto).unwrap();
        assert_eq!(input.mode(), ExtractionMode::Layout);
    }

    #[test]
    fn invalid_bytes_fail_both_ways() {
        assert!(extract(b"not a pdf at all", ExtractionMode::Layout).is_err());
        assert!(extract(b"not a pdf at all", ExtractionMode::Stream).is_err());
    }
}
