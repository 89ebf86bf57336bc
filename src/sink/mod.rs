//! Output sinks: where speech units finally become sound (or text).
//!
//! The engine guarantees at most one in-flight `render` call per sink, so
//! implementations need no internal synchronization.

#[cfg(feature = "cloud")]
pub mod cloud;
pub mod local;
mod process;

#[cfg(feature = "cloud")]
pub use cloud::CloudSynthesisSink;
pub use local::LocalSynthesisSink;

use crate::config::Config;
use crate::error::Result;
use crate::speech::Voice;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};

/// Interrupts a render in progress from another thread. Best effort.
pub type SinkCanceller = Arc<dyn Fn() + Send + Sync>;

/// Renders one unit of text at a time.
pub trait OutputSink: Send + 'static {
    /// Renders `text` with `voice`. Returns once rendering has finished.
    fn render(&mut self, text: &str, voice: &Voice) -> Result<()>;

    /// Name for logging.
    fn name(&self) -> &'static str {
        "sink"
    }

    /// A handle that can cut short the current render, if the sink supports it.
    fn canceller(&self) -> Option<SinkCanceller> {
        None
    }
}

/// Sink selection in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    #[default]
    Local,
    Cloud,
    Console,
}

impl fmt::Display for SinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SinkKind::Local => "local",
            SinkKind::Cloud => "cloud",
            SinkKind::Console => "console",
        };
        f.write_str(name)
    }
}

impl FromStr for SinkKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(SinkKind::Local),
            "cloud" => Ok(SinkKind::Cloud),
            "console" => Ok(SinkKind::Console),
            other => Err(format!(
                "unknown sink '{other}' (expected local, cloud or console)"
            )),
        }
    }
}

/// Builds the configured sink, degrading to [`ConsoleSink`] when it cannot
/// be initialized.
pub fn build_sink(config: &Config) -> Box<dyn OutputSink> {
    let built: Result<Box<dyn OutputSink>> = match config.engine.sink {
        SinkKind::Console => return Box::new(ConsoleSink),
        SinkKind::Local => LocalSynthesisSink::from_config(&config.local)
            .map(|sink| Box::new(sink) as Box<dyn OutputSink>),
        #[cfg(feature = "cloud")]
        SinkKind::Cloud => CloudSynthesisSink::from_config(&config.cloud)
            .map(|sink| Box::new(sink) as Box<dyn OutputSink>),
        #[cfg(not(feature = "cloud"))]
        SinkKind::Cloud => Err(crate::error::SpeechError::SinkUnavailable {
            sink: "cloud".to_string(),
            reason: "built without the 'cloud' feature".to_string(),
        }),
    };

    match built {
        Ok(sink) => {
            tracing::info!(sink = sink.name(), "output sink ready");
            sink
        }
        Err(e) => {
            tracing::warn!(error = %e, "falling back to console output");
            Box::new(ConsoleSink)
        }
    }
}

/// Textual fallback: echoes each unit to stdout.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleSink;

impl ConsoleSink {
    pub fn format(text: &str) -> String {
        format!("[SPEAK]: {text}")
    }
}

impl OutputSink for ConsoleSink {
    fn render(&mut self, text: &str, _voice: &Voice) -> Result<()> {
        println!("{}", Self::format(text));
        Ok(())
    }

    fn name(&self) -> &'static str {
        "console"
    }
}

/// One render call recorded by [`CollectorSink`].
#[derive(Debug, Clone, PartialEq)]
pub struct Rendered {
    pub text: String,
    pub voice: Voice,
}

/// Records every render. The collected list stays readable through
/// [`CollectorSink::handle`] after the sink is moved into an engine.
#[derive(Debug, Clone, Default)]
pub struct CollectorSink {
    rendered: Arc<Mutex<Vec<Rendered>>>,
}

impl CollectorSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A second view onto the same recording.
    pub fn handle(&self) -> Self {
        self.clone()
    }

    pub fn rendered(&self) -> Vec<Rendered> {
        self.lock().clone()
    }

    /// Rendered texts in render order.
    pub fn texts(&self) -> Vec<String> {
        self.lock().iter().map(|r| r.text.clone()).collect()
    }

    /// All rendered texts joined with spaces, or `None` if nothing rendered.
    pub fn joined(&self) -> Option<String> {
        let texts = self.texts();
        if texts.is_empty() {
            None
        } else {
            Some(texts.join(" "))
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Rendered>> {
        self.rendered.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl OutputSink for CollectorSink {
    fn render(&mut self, text: &str, voice: &Voice) -> Result<()> {
        self.lock().push(Rendered {
            text: text.to_string(),
            voice: voice.clone(),
        });
        Ok(())
    }

    fn name(&self) -> &'static str {
        "collector"
    }
}
