//! Typed, permissive entity schema.
//!
//! Entities are JSON objects of the form
//! `{"_lds": {"id": .., "type": ..}, "core": {..}, "voice": {..}}`, but any
//! shape is accepted. Candidate speech fields are resolved once, when the
//! entity is parsed, so extraction never has to walk untyped maps.

use serde_json::{Map, Value};

/// Content fields searched for explicit speech, highest priority first.
pub const SPEECH_FIELDS: [&str; 6] = ["speak", "say", "message", "text", "utterance", "speech"];

/// Key of the identity/type envelope.
pub const ENVELOPE_KEY: &str = "_lds";

/// Key of the content block.
pub const CONTENT_KEY: &str = "core";

/// Key of the voice configuration block (top level or nested in content).
pub const VOICE_KEY: &str = "voice";

/// Strings must be longer than this many characters to be picked up by the
/// last-chance field scan.
const MIN_FALLBACK_CHARS: usize = 5;

/// Identity/type envelope.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Envelope {
    pub id: Option<String>,
    pub kind: Option<String>,
}

impl Envelope {
    fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        Some(Self {
            id: obj.get("id").and_then(Value::as_str).map(str::to_string),
            kind: obj.get("type").and_then(Value::as_str).map(str::to_string),
        })
    }
}

/// Partial voice settings. Every field is optional; unset fields leave the
/// underlying value untouched when applied.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VoiceOverrides {
    pub rate: Option<f32>,
    pub pitch: Option<f32>,
    pub volume: Option<f32>,
    pub voice_id: Option<String>,
}

impl VoiceOverrides {
    /// Parses a voice block leniently. Values of the wrong type are ignored.
    ///
    /// `speed` is accepted for `rate` and `id` for `voice_id`; the canonical
    /// name wins when both are present.
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        Some(Self {
            rate: number(obj, "rate").or_else(|| number(obj, "speed")),
            pitch: number(obj, "pitch"),
            volume: number(obj, "volume"),
            voice_id: obj
                .get("voice_id")
                .or_else(|| obj.get("id"))
                .and_then(Value::as_str)
                .map(str::to_string),
        })
    }

    /// Returns true if no field is set.
    pub fn is_empty(&self) -> bool {
        self.rate.is_none() && self.pitch.is_none() && self.volume.is_none() && self.voice_id.is_none()
    }
}

fn number(obj: &Map<String, Value>, key: &str) -> Option<f32> {
    obj.get(key)
        .and_then(Value::as_f64)
        .map(|n| n as f32)
        .filter(|n| n.is_finite())
}

/// The speakable part of an entity, with candidate fields already resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentBlock {
    /// First present speech field (see [`SPEECH_FIELDS`]), lists joined with spaces.
    pub speech: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    /// First string field longer than five characters, in document order.
    pub first_long_string: Option<String>,
    /// Voice block nested inside the content.
    pub voice: Option<VoiceOverrides>,
    /// The block as it was received, for last-resort rendering.
    pub raw: Value,
}

impl ContentBlock {
    /// Resolves a content block from any JSON value.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self::from_map(map),
            Value::String(s) => Self {
                speech: non_blank(s.clone()),
                name: None,
                description: None,
                first_long_string: None,
                voice: None,
                raw: Value::String(s),
            },
            other => Self {
                speech: None,
                name: None,
                description: None,
                first_long_string: None,
                voice: None,
                raw: other,
            },
        }
    }

    fn from_map(map: Map<String, Value>) -> Self {
        let speech = SPEECH_FIELDS
            .iter()
            .find_map(|field| map.get(*field).and_then(speech_text));

        let name = map.get("name").and_then(Value::as_str).and_then(|s| non_blank(s.to_string()));
        let description = map
            .get("description")
            .and_then(Value::as_str)
            .and_then(|s| non_blank(s.to_string()));

        let first_long_string = map.values().find_map(|v| match v {
            Value::String(s) if s.chars().count() > MIN_FALLBACK_CHARS => Some(s.clone()),
            _ => None,
        });

        let voice = map.get(VOICE_KEY).and_then(VoiceOverrides::from_value);

        Self {
            speech,
            name,
            description,
            first_long_string,
            voice,
            raw: Value::Object(map),
        }
    }

    /// Raw textual rendering of the block. Never empty.
    pub fn render_raw(&self) -> String {
        match &self.raw {
            Value::String(s) if !s.trim().is_empty() => s.clone(),
            Value::Null => "null".to_string(),
            other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
        }
    }
}

/// Text of a speech field: a non-blank string, or a list joined with single spaces.
fn speech_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => non_blank(s.clone()),
        Value::Array(items) => {
            let joined = items
                .iter()
                .map(|item| match item {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join(" ");
            non_blank(joined)
        }
        _ => None,
    }
}

fn non_blank(s: String) -> Option<String> {
    if s.trim().is_empty() { None } else { Some(s) }
}

/// A structured data record that may carry speakable content.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub envelope: Option<Envelope>,
    pub content: ContentBlock,
    /// Top-level voice block; overrides the nested one field by field.
    pub voice: Option<VoiceOverrides>,
}

impl Entity {
    /// Builds an entity from any JSON value. Never fails.
    ///
    /// Without a `core` object, the top-level object itself (minus the
    /// envelope) is treated as the content block.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(mut map) => {
                let envelope = map.get(ENVELOPE_KEY).and_then(Envelope::from_value);
                let voice = map.get(VOICE_KEY).and_then(VoiceOverrides::from_value);
                let content = match map.shift_remove(CONTENT_KEY) {
                    Some(core) => ContentBlock::from_value(core),
                    None => {
                        map.shift_remove(ENVELOPE_KEY);
                        ContentBlock::from_value(Value::Object(map))
                    }
                };
                Self {
                    envelope,
                    content,
                    voice,
                }
            }
            other => Self {
                envelope: None,
                content: ContentBlock::from_value(other),
                voice: None,
            },
        }
    }

    /// Parses one raw fragment. Anything that is not valid JSON becomes a
    /// plain-text entity (`{"core": {"speak": fragment}}`).
    pub fn from_fragment(fragment: &str) -> Self {
        match serde_json::from_str::<Value>(fragment) {
            Ok(value) => Self::from_value(value),
            Err(_) => Self::plain_text(fragment),
        }
    }

    /// Wraps literal text as a minimal entity.
    pub fn plain_text(text: &str) -> Self {
        Self::from_value(serde_json::json!({ "core": { "speak": text } }))
    }

    /// Envelope id, if any.
    pub fn id(&self) -> Option<&str> {
        self.envelope.as_ref().and_then(|e| e.id.as_deref())
    }
}
