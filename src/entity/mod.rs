//! Entities: the structured records the pipeline turns into speech.

pub mod fragments;
pub mod model;
pub mod source;

pub use fragments::{FragmentSource, LineFragments, fragment_stream};
pub use model::{ContentBlock, Entity, Envelope, SPEECH_FIELDS, VoiceOverrides};
pub use source::{EntitySource, PatternEntities, is_entity_file};
