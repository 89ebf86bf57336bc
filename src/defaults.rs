//! Default configuration constants for ldsvoice.
//!
//! Shared by the config types, the engine and the sinks so that every layer
//! agrees on the same fallbacks.

/// Texts at or under this many characters are dispatched as a single unit.
pub const CHUNK_THRESHOLD: usize = 100;

/// How long the dispatch worker waits for new work before exiting, in milliseconds.
pub const POLL_INTERVAL_MS: u64 = 100;

/// Default speed multiplier.
pub const RATE: f32 = 1.0;

/// Default pitch multiplier.
pub const PITCH: f32 = 1.0;

/// Default volume (0.0 to 1.0).
pub const VOLUME: f32 = 1.0;

/// Source identity used when an entity carries no envelope id.
pub const UNKNOWN_SOURCE: &str = "unknown";

/// Speaking rate of the local synthesizer at rate 1.0, in words per minute.
pub const WORDS_PER_MINUTE: u32 = 150;

/// Synthesizer binaries looked up on PATH for the local sink, in order.
pub const LOCAL_SYNTH_PROGRAMS: &[&str] = &["espeak-ng", "espeak"];

/// Default OpenAI-compatible endpoint for the cloud sink.
pub const CLOUD_BASE_URL: &str = "https://api.openai.com/v1";

/// Default cloud synthesis model.
pub const CLOUD_MODEL: &str = "tts-1";

/// Default cloud voice when the unit carries no voice id.
pub const CLOUD_VOICE: &str = "alloy";

/// Default player for synthesized audio files.
pub const AUDIO_PLAYER: &str = "mpg123";

/// Request timeout for cloud synthesis, in seconds.
pub const CLOUD_TIMEOUT_SECS: u64 = 60;

/// Environment variable holding the cloud API key.
pub const CLOUD_API_KEY_ENV: &str = "LDSVOICE_CLOUD_API_KEY";
