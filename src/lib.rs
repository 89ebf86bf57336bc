//! ldsvoice - Zero-latency speech output for structured data entities
//!
//! Entities and live text fragments become speech units that are rendered
//! by a local synthesizer, a cloud synthesis API, or the console.

// Enforce error handling discipline
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod defaults;
pub mod engine;
pub mod entity;
pub mod error;
pub mod pipeline;
pub mod sink;
pub mod speech;

// Core types (entity -> speech unit -> sink)
pub use entity::{Entity, EntitySource, FragmentSource};
pub use sink::{CollectorSink, ConsoleSink, OutputSink, SinkKind, build_sink};
pub use speech::{SpeechUnit, StreamAssembler, Voice};

// Dispatch
pub use engine::{DispatchMode, EngineState, SpeechEngine};
pub use pipeline::{Pipeline, PipelineConfig};

// Error handling
pub use error::{Result, SpeechError};

// Config
pub use config::Config;

// Dispatch failures (for custom reporters)
pub use engine::{DispatchError, ErrorReporter};

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.0+abc1234"` when git hash is available, `"0.1.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}
