//! Content extraction: entity in, speech unit out.

use crate::defaults;
use crate::entity::Entity;
use crate::speech::unit::{SpeechUnit, Voice};

/// Maps entities to speech units. Total and deterministic.
#[derive(Debug, Clone, Default)]
pub struct ContentExtractor {
    default_voice: Voice,
}

impl ContentExtractor {
    /// Creates an extractor whose units start from `default_voice`.
    pub fn new(default_voice: Voice) -> Self {
        Self { default_voice }
    }

    pub fn default_voice(&self) -> &Voice {
        &self.default_voice
    }

    /// Extracts the speakable unit of an entity.
    pub fn extract(&self, entity: &Entity) -> SpeechUnit {
        let source_id = entity.id().unwrap_or(defaults::UNKNOWN_SOURCE);
        SpeechUnit::new(extract_text(entity), self.extract_voice(entity), source_id)
    }

    /// Engine defaults, then the nested content voice, then the top-level voice.
    pub fn extract_voice(&self, entity: &Entity) -> Voice {
        let mut voice = self.default_voice.clone();
        if let Some(ref nested) = entity.content.voice {
            voice.apply(nested);
        }
        if let Some(ref top) = entity.voice {
            voice.apply(top);
        }
        voice
    }
}

/// Selects the text to speak. Never returns an empty string.
///
/// Order: explicit speech field, then name and description joined with
/// `". "`, then the first string field longer than five characters, then a
/// raw rendering of the content block.
pub fn extract_text(entity: &Entity) -> String {
    let content = &entity.content;

    if let Some(ref speech) = content.speech {
        return speech.clone();
    }

    match (&content.name, &content.description) {
        (Some(name), Some(desc)) => return format!("{name}. {desc}"),
        (Some(name), None) => return name.clone(),
        (None, Some(desc)) => return desc.clone(),
        (None, None) => {}
    }

    if let Some(ref text) = content.first_long_string {
        return text.clone();
    }

    content.render_raw()
}
