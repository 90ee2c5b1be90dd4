//! Positioned text fragments from PDF content streams.
//!
//! A small text-state machine over each page's operators. Fragment positions
//! are the text-matrix origin mapped through the current transformation
//! matrix, so they land in page space (y up) even under a flipping or
//! scaling `cm`.
//!
//! | Operator | Action |
//! |----------|--------|
//! | `q`/`Q`  | Save/restore the CTM |
//! | `cm`     | Concatenate onto the CTM |
//! | `BT`     | Reset text and line matrices |
//! | `Tf`     | Set font size (used to estimate advance) |
//! | `Tm`     | Set text matrix |
//! | `Td`     | Translate line |
//! | `TD`     | Translate line and set leading |
//! | `T*`     | Next line |
//! | `TL`     | Set leading |
//! | `Tj`     | Show string |
//! | `TJ`     | Show strings with kerning |
//! | `'`      | Next line, show string |
//! | `"`      | Set spacing, next line, show string |

use bellgrid_shared::{BellgridError, Result, TextFragment};
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object};
use tracing::{debug, warn};

const IDENTITY: [f64; 6] = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

/// Average glyph width as a fraction of the font size.
const GLYPH_WIDTH_EM: f64 = 0.5;

/// A `TJ` kerning adjustment (thousandths of an em) more negative than this
/// is read as a word gap.
const WORD_GAP_KERN: f64 = -200.0;

/// `m × n` for PDF `[a b c d e f]` matrices (row-vector convention).
fn multiply(m: [f64; 6], n: [f64; 6]) -> [f64; 6] {
    let [a1, b1, c1, d1, e1, f1] = m;
    let [a2, b2, c2, d2, e2, f2] = n;
    [
        a1 * a2 + b1 * c2,
        a1 * b2 + b1 * d2,
        c1 * a2 + d1 * c2,
        c1 * b2 + d1 * d2,
        e1 * a2 + f1 * c2 + e2,
        e1 * b2 + f1 * d2 + f2,
    ]
}

fn matrix(operands: &[Object]) -> Option<[f64; 6]> {
    let values: Vec<f64> = operands.iter().take(6).filter_map(number).collect();
    <[f64; 6]>::try_from(values).ok()
}

#[derive(Debug, Clone)]
struct TextState {
    ctm: [f64; 6],
    saved: Vec<[f64; 6]>,
    text_matrix: [f64; 6],
    line_matrix: [f64; 6],
    leading: f64,
    font_size: f64,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            ctm: IDENTITY,
            saved: Vec::new(),
            text_matrix: IDENTITY,
            line_matrix: IDENTITY,
            leading: 0.0,
            font_size: 12.0,
        }
    }
}

impl TextState {
    /// Pen position in page space.
    fn origin(&self) -> (f64, f64) {
        let [a, b, c, d, e, f] = self.ctm;
        let (x, y) = (self.text_matrix[4], self.text_matrix[5]);
        (a * x + c * y + e, b * x + d * y + f)
    }

    /// Pre-multiply the line matrix by a translation and restart the line.
    fn translate_line(&mut self, tx: f64, ty: f64) {
        let [a, b, c, d, e, f] = self.line_matrix;
        self.line_matrix = [a, b, c, d, tx * a + ty * c + e, tx * b + ty * d + f];
        self.text_matrix = self.line_matrix;
    }

    fn next_line(&mut self) {
        self.translate_line(0.0, -self.leading);
    }

    /// Move the pen right by an estimate of the shown text's width.
    fn advance(&mut self, chars: usize) {
        let tx = chars as f64 * self.font_size * GLYPH_WIDTH_EM;
        let [a, b, ..] = self.text_matrix;
        self.text_matrix[4] += tx * a;
        self.text_matrix[5] += tx * b;
    }
}

/// Read every page of `bytes` into positioned fragments, in page then
/// content-stream order.
pub fn extract_fragments(bytes: &[u8]) -> Result<Vec<TextFragment>> {
    let doc = Document::load_mem(bytes)
        .map_err(|e| BellgridError::Extraction(format!("failed to load PDF: {e}")))?;

    if doc.is_encrypted() {
        return Err(BellgridError::Extraction("PDF is encrypted".into()));
    }

    let mut fragments = Vec::new();
    for (page_number, page_id) in doc.get_pages() {
        let raw = match doc.get_page_content(page_id) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(page = page_number, error = %e, "page content unreadable, skipped");
                continue;
            }
        };
        let content = match Content::decode(&raw) {
            Ok(content) => content,
            Err(e) => {
                warn!(page = page_number, error = %e, "page content undecodable, skipped");
                continue;
            }
        };

        let before = fragments.len();
        walk_operations(&content.operations, &mut fragments);
        debug!(page = page_number, fragments = fragments.len() - before, "page read");
    }

    Ok(fragments)
}

/// Run the text-state machine over one page's operations.
fn walk_operations(ops: &[Operation], out: &mut Vec<TextFragment>) {
    let mut state = TextState::default();

    for op in ops {
        let operands = op.operands.as_slice();
        match op.operator.as_str() {
            "q" => state.saved.push(state.ctm),
            "Q" => {
                if let Some(ctm) = state.saved.pop() {
                    state.ctm = ctm;
                }
            }
            "cm" => {
                if let Some(m) = matrix(operands) {
                    state.ctm = multiply(m, state.ctm);
                }
            }
            "BT" => {
                state.text_matrix = IDENTITY;
                state.line_matrix = IDENTITY;
            }
            "Tf" => {
                if let Some(size) = operands.get(1).and_then(number) {
                    state.font_size = size;
                }
            }
            "Tm" => {
                if let Some(m) = matrix(operands) {
                    state.text_matrix = m;
                    state.line_matrix = m;
                }
            }
            "Td" => {
                if let Some((tx, ty)) = offset(operands) {
                    state.translate_line(tx, ty);
                }
            }
            "TD" => {
                if let Some((tx, ty)) = offset(operands) {
                    state.leading = -ty;
                    state.translate_line(tx, ty);
                }
            }
            "T*" => state.next_line(),
            "TL" => {
                if let Some(leading) = operands.first().and_then(number) {
                    state.leading = leading;
                }
            }
            "Tj" => {
                if let Some(text) = operands.first().and_then(string) {
                    show(&mut state, text, out);
                }
            }
            "'" => {
                state.next_line();
                if let Some(text) = operands.first().and_then(string) {
                    show(&mut state, text, out);
                }
            }
            "\"" => {
                state.next_line();
                if let Some(text) = operands.get(2).and_then(string) {
                    show(&mut state, text, out);
                }
            }
            "TJ" => {
                if let Some(Object::Array(items)) = operands.first() {
                    show(&mut state, kerned_text(items), out);
                }
            }
            _ => {}
        }
    }
}

/// Emit a fragment at the pen position and advance past it.
fn show(state: &mut TextState, text: String, out: &mut Vec<TextFragment>) {
    let chars = text.chars().count();
    if !text.trim().is_empty() {
        let (x, y) = state.origin();
        out.push(TextFragment::new(text, x, y));
    }
    state.advance(chars);
}

/// Join the strings of a `TJ` array, turning wide kerning gaps into spaces.
fn kerned_text(items: &[Object]) -> String {
    items.iter().fold(String::new(), |mut text, item| {
        match item {
            Object::String(bytes, _) => text.push_str(&decode_pdf_string(bytes)),
            other => {
                if number(other).is_some_and(|kern| kern < WORD_GAP_KERN) && !text.ends_with(' ') {
                    text.push(' ');
                }
            }
        }
        text
    })
}

fn offset(operands: &[Object]) -> Option<(f64, f64)> {
    Some((number(operands.first()?)?, number(operands.get(1)?)?))
}

fn number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(f64::from(*r)),
        _ => None,
    }
}

fn string(obj: &Object) -> Option<String> {
    match obj {
        Object::String(bytes, _) => Some(decode_pdf_string(bytes)),
        _ => None,
    }
}

/// Decode a PDF string: UTF-16BE when it carries a BOM, Latin-1 otherwise.
pub(crate) fn decode_pdf_string(bytes: &[u8]) -> String {
    match bytes {
        [0xFE, 0xFF, rest @ ..] => {
            let units: Vec<u16> = rest
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                .collect();
            String::from_utf16_lossy(&units)
        }
        _ => bytes.iter().map(|&b| char::from(b)).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::StringFormat;

    fn op(operator: &str, operands: Vec<Object>) -> Operation {
        Operation::new(operator, operands)
    }

    fn text(s: &str) -> Object {
        Object::String(s.as_bytes().to_vec(), StringFormat::Literal)
    }

    fn walk(ops: Vec<Operation>) -> Vec<TextFragment> {
        let mut out = Vec::new();
        walk_operations(&ops, &mut out);
        out
    }

    #[test]
    fn td_positions_fragments() {
        let out = walk(vec![
            op("BT", vec![]),
            op("Tf", vec![Object::Name(b"F1".to_vec()), 10.into()]),
            op("Td", vec![100.into(), 700.into()]),
            op("Tj", vec![text("Monday")]),
            op("Td", vec![0.into(), (-12).into()]),
            op("Tj", vec![text("1-6")]),
            op("ET", vec![]),
        ]);

        assert_eq!(out.len(), 2);
        assert_eq!(out[0], TextFragment::new("Monday", 100.0, 700.0));
        assert_eq!(out[1], TextFragment::new("1-6", 100.0, 688.0));
    }

    #[test]
    fn tm_sets_absolute_position() {
        let out = walk(vec![
            op("BT", vec![]),
            op(
                "Tm",
                vec![1.into(), 0.into(), 0.into(), 1.into(), 250.into(), Object::Real(512.5)],
            ),
            op("Tj", vec![text("Period 3")]),
        ]);
        assert_eq!(out[0].x, 250.0);
        assert_eq!(out[0].y, 512.5);
    }

    #[test]
    fn leading_and_next_line_operators() {
        let out = walk(vec![
            op("BT", vec![]),
            op("TD", vec![50.into(), (-14).into()]),
            op("Tj", vec![text("a")]),
            op("T*", vec![]),
            op("Tj", vec![text("b")]),
            op("TL", vec![20.into()]),
            op("'", vec![text("c")]),
            op("\"", vec![0.into(), 0.into(), text("d")]),
        ]);

        let ys: Vec<f64> = out.iter().map(|f| f.y).collect();
        assert_eq!(ys, vec![-14.0, -28.0, -48.0, -68.0]);
        assert!(out.iter().all(|f| f.x == 50.0));
    }

    #[test]
    fn bt_resets_matrices() {
        let out = walk(vec![
            op("BT", vec![]),
            op("Td", vec![300.into(), 300.into()]),
            op("ET", vec![]),
            op("BT", vec![]),
            op("Td", vec![10.into(), 20.into()]),
            op("Tj", vec![text("x")]),
        ]);
        assert_eq!(out[0], TextFragment::new("x", 10.0, 20.0));
    }

    #[test]
    fn tj_array_with_word_gaps() {
        let out = walk(vec![
            op("BT", vec![]),
            op(
                "TJ",
                vec![Object::Array(vec![
                    text("8:00"),
                    (-250).into(),
                    text("-"),
                    (-300).into(),
                    text("8:5"),
                    (-20).into(),
                    text("0"),
                ])],
            ),
        ]);
        assert_eq!(out[0].text, "8:00 - 8:50");
    }

    #[test]
    fn consecutive_shows_advance_the_pen() {
        let out = walk(vec![
            op("BT", vec![]),
            op("Tf", vec![Object::Name(b"F1".to_vec()), 10.into()]),
            op("Tj", vec![text("8:00")]),
            op("Tj", vec![text(" - 8:50")]),
        ]);
        assert!(out[1].x > out[0].x);
        assert_eq!(out[1].y, out[0].y);
    }

    #[test]
    fn flipping_cm_maps_back_to_page_space() {
        let out = walk(vec![
            op("q", vec![]),
            op(
                "cm",
                vec![1.into(), 0.into(), 0.into(), (-1).into(), 0.into(), 792.into()],
            ),
            op("BT", vec![]),
            op("Td", vec![100.into(), 92.into()]),
            op("Tj", vec![text("Monday")]),
            op("Td", vec![0.into(), 40.into()]),
            op("Tj", vec![text("Period 1")]),
            op("ET", vec![]),
            op("Q", vec![]),
            op("BT", vec![]),
            op("Td", vec![100.into(), 648.into()]),
            op("Tj", vec![text("8:00 - 8:50")]),
        ]);

        assert_eq!(out[0], TextFragment::new("Monday", 100.0, 700.0));
        assert_eq!(out[1], TextFragment::new("Period 1", 100.0, 660.0));
        // Q restored the identity CTM.
        assert_eq!(out[2], TextFragment::new("8:00 - 8:50", 100.0, 648.0));
    }

    #[test]
    fn nested_cm_scales_and_translates() {
        let out = walk(vec![
            op("cm", vec![1.into(), 0.into(), 0.into(), 1.into(), 10.into(), 20.into()]),
            op("q", vec![]),
            op(
                "cm",
                vec![
                    Object::Real(0.75),
                    0.into(),
                    0.into(),
                    Object::Real(0.75),
                    0.into(),
                    0.into(),
                ],
            ),
            op("BT", vec![]),
            op("Td", vec![400.into(), 800.into()]),
            op("Tj", vec![text("Friday")]),
            op("Q", vec![]),
            op("Q", vec![]),
            op("BT", vec![]),
            op("Tj", vec![text("x")]),
        ]);

        assert_eq!(out[0], TextFragment::new("Friday", 310.0, 620.0));
        // An unbalanced Q keeps the outer CTM.
        assert_eq!(out[1], TextFragment::new("x", 10.0, 20.0));
    }

    #[test]
    fn blank_shows_are_not_emitted() {
        let out = walk(vec![op("BT", vec![]), op("Tj", vec![text("   ")])]);
        assert!(out.is_empty());
    }

    #[test]
    fn decodes_utf16_and_latin1() {
        assert_eq!(decode_pdf_string(&[0xFE, 0xFF, 0x00, 0x41, 0x20, 0x13]), "A\u{2013}");
        assert_eq!(decode_pdf_string(b"caf\xe9"), "café");
    }

    #[test]
    fn garbage_is_an_extraction_error() {
        let err = extract_fragments(b"not a pdf").unwrap_err();
        assert!(matches!(err, BellgridError::Extraction(_)));
    }
}
