//! Raw period occurrence extraction.
//!
//! Two strategies read the same schedule from different PDF extraction
//! outputs:
//! - [`StreamExtractor`] scans the linear text with regexes
//! - [`LayoutExtractor`] clusters positioned fragments into columns
//!
//! Both emit unresolved [`RawOccurrence`]s; duplicate resolution happens
//! afterwards in one shared stage ([`crate::resolve`]).

pub mod layout;
pub mod stream;

use bellgrid_shared::{ExtractionInput, ScheduleConventions, TextFragment};

use crate::occurrence::RawOccurrence;

/// A strategy that turns one kind of extraction output into raw occurrences.
pub trait OccurrenceExtractor {
    /// Read every printed period occurrence, duplicates included.
    fn extract(&self, conventions: &ScheduleConventions) -> Vec<RawOccurrence>;

    /// Strategy name for tracing.
    fn name(&self) -> &'static str;
}

/// Stream-mode strategy over the document's flat text.
pub struct StreamExtractor<'a> {
    pub text: &'a str,
}

impl OccurrenceExtractor for StreamExtractor<'_> {
    fn extract(&self, conventions: &ScheduleConventions) -> Vec<RawOccurrence> {
        stream::extract(self.text, &conventions.weekdays)
    }

    fn name(&self) -> &'static str {
        "stream"
    }
}

/// Layout-mode strategy over positioned text fragments.
pub struct LayoutExtractor<'a> {
    pub fragments: &'a [TextFragment],
}

impl OccurrenceExtractor for LayoutExtractor<'_> {
    fn extract(&self, conventions: &ScheduleConventions) -> Vec<RawOccurrence> {
        layout::extract(self.fragments, conventions)
    }

    fn name(&self) -> &'static str {
        "layout"
    }
}

/// Pick the strategy matching the shape of the extraction output.
pub fn extractor_for(input: &ExtractionInput) -> Box<dyn OccurrenceExtractor + '_> {
    match input {
        ExtractionInput::Text(text) => Box::new(StreamExtractor { text: text.as_str() }),
        ExtractionInput::Fragments(fragments) => Box::new(LayoutExtractor {
            fragments: fragments.as_slice(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_follows_input_shape() {
        let text = ExtractionInput::Text("Monday\n1\nPeriod 1 8:00 - 8:50 (50)".into());
        assert_eq!(extractor_for(&text).name(), "stream");

        let fragments = ExtractionInput::Fragments(vec![]);
        assert_eq!(extractor_for(&fragments).name(), "layout");
    }

    #[test]
    fn both_strategies_emit_the_same_occurrence() {
        let conventions = ScheduleConventions::default();

        let text = ExtractionInput::Text("Monday\n1\nPeriod 1 8:00 - 8:50 (50)".into());
        let fragments = ExtractionInput::Fragments(vec![
            TextFragment::new("Monday", 100.0, 700.0),
            TextFragment::new("Period 1", 100.0, 660.0),
            TextFragment::new("8:00 - 8:50", 100.0, 648.0),
        ]);

        let from_text = extractor_for(&text).extract(&conventions);
        let from_layout = extractor_for(&fragments).extract(&conventions);

        assert_eq!(from_text.len(), 1);
        assert_eq!(from_layout.len(), 1);
        assert_eq!(from_text[0].period, from_layout[0].period);
        assert_eq!(from_text[0].column, from_layout[0].column);
        assert_eq!(from_text[0].span, from_layout[0].span);
    }
}
