//! Sentence-level chunking of long units.
//!
//! Short texts pass through untouched. Longer texts are split after `.`,
//! `!` or `?` followed by whitespace. The threshold is not a hard cap: a
//! single sentence longer than the threshold is still emitted whole.

use crate::defaults;
use crate::speech::unit::SpeechUnit;
use regex::Regex;
use std::sync::LazyLock;

static SENTENCE_BOUNDARY: LazyLock<Regex> = LazyLock::new(|| {
    // SAFETY: hardcoded pattern, always valid
    #[allow(clippy::expect_used)]
    Regex::new(r"[.!?]\s+").expect("sentence boundary pattern")
});

/// Splits over-long units into ordered sentence units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunker {
    threshold: usize,
}

impl Default for Chunker {
    fn default() -> Self {
        Self::new(defaults::CHUNK_THRESHOLD)
    }
}

impl Chunker {
    /// `threshold` is measured in characters.
    pub fn new(threshold: usize) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Splits one unit. Always yields at least one unit; each sentence
    /// inherits the parent's voice, priority and source.
    pub fn chunk(&self, unit: SpeechUnit) -> Vec<SpeechUnit> {
        if unit.text().chars().count() <= self.threshold {
            return vec![unit];
        }

        let sentences = split_sentences(unit.text());
        if sentences.len() <= 1 {
            return vec![unit];
        }

        sentences.into_iter().map(|s| unit.derive(s)).collect()
    }

    /// Chunks a sequence of units lazily, preserving order.
    pub fn chunk_all<I>(&self, units: I) -> impl Iterator<Item = SpeechUnit>
    where
        I: IntoIterator<Item = SpeechUnit>,
    {
        let chunker = *self;
        units.into_iter().flat_map(move |unit| chunker.chunk(unit))
    }
}

/// Splits text into trimmed, non-empty sentences. Punctuation stays with
/// its sentence.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;

    for boundary in SENTENCE_BOUNDARY.find_iter(text) {
        // The punctuation mark is a single ASCII byte.
        let end = boundary.start() + 1;
        sentences.push(text[start..end].trim());
        start = boundary.end();
    }
    sentences.push(text[start..].trim());

    sentences.retain(|s| !s.is_empty());
    sentences
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::speech::unit::Voice;

    fn normalized(text: &str) -> String {
        text.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    fn texts(units: &[SpeechUnit]) -> Vec<&str> {
        units.iter().map(|u| u.text()).collect()
    }

    #[test]
    fn short_text_passes_through() {
        let unit = SpeechUnit::from_text("Short. Still short.");
        let chunks = Chunker::new(100).chunk(unit.clone());
        assert_eq!(chunks, vec![unit]);
    }

    #[test]
    fn text_at_threshold_passes_through() {
        let text = "a".repeat(100);
        let chunks = Chunker::new(100).chunk(SpeechUnit::from_text(text.clone()));
        assert_eq!(texts(&chunks), vec![text.as_str()]);
    }

    #[test]
    fn threshold_counts_characters_not_bytes() {
        let text = "é. ".repeat(30);
        assert!(text.len() > 60);
        let chunks = Chunker::new(90).chunk(SpeechUnit::from_text(text));
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn long_paragraph_splits_on_sentences() {
        let sentence = "This sentence is part of a long paragraph used for chunking. ";
        let text = sentence.repeat(4);
        let text = text.trim_end();
        assert!(text.chars().count() > 200);

        let chunks = Chunker::new(100).chunk(SpeechUnit::from_text(text));
        assert_eq!(chunks.len(), 4);
        for chunk in &chunks {
            assert!(chunk.text().ends_with('.'));
        }
        assert_eq!(texts(&chunks).join(" "), text);
    }

    #[test]
    fn mixed_punctuation_and_whitespace_is_lossless() {
        let text = "Is it working?  Yes!\nIt is working.\tThe pipeline splits text at sentence boundaries and keeps every word in order";
        let chunks = Chunker::new(40).chunk(SpeechUnit::from_text(text));
        assert_eq!(
            texts(&chunks),
            vec![
                "Is it working?",
                "Yes!",
                "It is working.",
                "The pipeline splits text at sentence boundaries and keeps every word in order",
            ]
        );
        assert_eq!(normalized(&texts(&chunks).join(" ")), normalized(text));
    }

    #[test]
    fn long_single_sentence_is_not_split() {
        let text = "word ".repeat(50) + "end.";
        let chunks = Chunker::new(100).chunk(SpeechUnit::from_text(text.clone()));
        assert_eq!(texts(&chunks), vec![text.as_str()]);
    }

    #[test]
    fn decimals_without_following_space_are_not_boundaries() {
        let parts = split_sentences("Version 1.5 ships today. Upgrade now.");
        assert_eq!(parts, vec!["Version 1.5 ships today.", "Upgrade now."]);
    }

    #[test]
    fn chunks_inherit_parent_attributes() {
        let parent = SpeechUnit::new(
            "First sentence is here. Second sentence follows it closely.",
            Voice {
                pitch: 0.7,
                ..Voice::default()
            },
            "lds:parent",
        )
        .with_priority(4);
        let chunks = Chunker::new(10).chunk(parent);
        assert_eq!(chunks.len(), 2);
        for chunk in chunks {
            assert_eq!(chunk.voice().pitch, 0.7);
            assert_eq!(chunk.source_id(), "lds:parent");
            assert_eq!(chunk.priority(), 4);
        }
    }

    #[test]
    fn chunk_all_preserves_order() {
        let units = vec![
            SpeechUnit::from_text("A one. A two."),
            SpeechUnit::from_text("B."),
        ];
        let out: Vec<SpeechUnit> = Chunker::new(5).chunk_all(units).collect();
        assert_eq!(
            out.iter().map(|u| u.text()).collect::<Vec<_>>(),
            vec!["A one.", "A two.", "B."]
        );
    }

    #[test]
    fn split_discards_empty_fragments() {
        assert_eq!(split_sentences("  .  "), vec!["."]);
        assert!(split_sentences("   ").is_empty());
    }
}
