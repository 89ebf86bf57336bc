//! Voice parameters and speech units.

use crate::defaults;
use crate::entity::VoiceOverrides;
use serde::{Deserialize, Serialize};

/// How a unit sounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Voice {
    /// Speed multiplier: 0.5 is slow, 2.0 is fast.
    pub rate: f32,
    /// Pitch multiplier.
    pub pitch: f32,
    /// Volume from 0.0 to 1.0.
    pub volume: f32,
    /// Named voice, interpreted by the sink.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice_id: Option<String>,
}

impl Default for Voice {
    fn default() -> Self {
        Self {
            rate: defaults::RATE,
            pitch: defaults::PITCH,
            volume: defaults::VOLUME,
            voice_id: None,
        }
    }
}

impl Voice {
    /// Applies overrides field by field.
    ///
    /// Non-positive rate or pitch overrides are ignored; volume is clamped to
    /// `0.0..=1.0`.
    pub fn apply(&mut self, overrides: &VoiceOverrides) {
        if let Some(rate) = overrides.rate.filter(|r| *r > 0.0) {
            self.rate = rate;
        }
        if let Some(pitch) = overrides.pitch.filter(|p| *p > 0.0) {
            self.pitch = pitch;
        }
        if let Some(volume) = overrides.volume {
            self.volume = volume.clamp(0.0, 1.0);
        }
        if let Some(ref id) = overrides.voice_id {
            self.voice_id = Some(id.clone());
        }
    }

    /// Returns a copy with the overrides applied.
    pub fn with_overrides(mut self, overrides: &VoiceOverrides) -> Self {
        self.apply(overrides);
        self
    }
}

/// An immutable piece of text, fully resolved and ready to render.
///
/// Units are created by the extractor, chunker or assembler and consumed
/// exactly once by dispatch. Creation order is stamped by the dispatch
/// queue, so two units built from the same input compare equal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpeechUnit {
    text: String,
    voice: Voice,
    priority: i32,
    source_id: String,
}

impl SpeechUnit {
    pub fn new(text: impl Into<String>, voice: Voice, source_id: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            voice,
            priority: 0,
            source_id: source_id.into(),
        }
    }

    /// A unit with the default voice and no known source.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self::new(text, Voice::default(), defaults::UNKNOWN_SOURCE)
    }

    /// Sets the priority. Higher speaks first.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// A sibling unit carrying different text but the same voice, priority
    /// and source.
    pub fn derive(&self, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            voice: self.voice.clone(),
            priority: self.priority,
            source_id: self.source_id.clone(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn voice(&self) -> &Voice {
        &self.voice
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }
}
