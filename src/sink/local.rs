//! Local speech synthesis through an espeak-compatible command-line tool.

use crate::config::LocalConfig;
use crate::defaults;
use crate::error::{Result, SpeechError};
use crate::sink::process::{ChildSlot, find_program};
use crate::sink::{OutputSink, SinkCanceller};
use crate::speech::Voice;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

/// Words-per-minute range accepted by espeak-ng.
const MIN_WPM: f32 = 80.0;
const MAX_WPM: f32 = 450.0;

/// Pitch at rate 1.0 on espeak's 0-99 scale.
const BASE_PITCH: f32 = 50.0;

/// Amplitude at volume 1.0 on espeak's 0-200 scale.
const BASE_AMPLITUDE: f32 = 100.0;

/// Renders each unit by running the synthesizer to completion.
pub struct LocalSynthesisSink {
    program: PathBuf,
    words_per_minute: u32,
    running: ChildSlot,
}

impl LocalSynthesisSink {
    pub fn new(program: impl Into<PathBuf>, words_per_minute: u32) -> Self {
        Self {
            program: program.into(),
            words_per_minute,
            running: ChildSlot::default(),
        }
    }

    /// Locates the configured program, or the first known synthesizer on PATH.
    pub fn from_config(config: &LocalConfig) -> Result<Self> {
        let program = match config.program.as_deref() {
            Some(explicit) => find_program(explicit).ok_or_else(|| SpeechError::SinkUnavailable {
                sink: "local".to_string(),
                reason: format!("synthesizer '{explicit}' not found"),
            })?,
            None => defaults::LOCAL_SYNTH_PROGRAMS
                .iter()
                .find_map(|name| find_program(name))
                .ok_or_else(|| SpeechError::SinkUnavailable {
                    sink: "local".to_string(),
                    reason: format!(
                        "none of {} found on PATH",
                        defaults::LOCAL_SYNTH_PROGRAMS.join(", ")
                    ),
                })?,
        };

        tracing::debug!(program = %program.display(), "local synthesizer found");
        Ok(Self::new(program, config.words_per_minute))
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Command-line arguments for one unit.
    pub fn args(&self, text: &str, voice: &Voice) -> Vec<String> {
        let wpm = (self.words_per_minute as f32 * voice.rate).clamp(MIN_WPM, MAX_WPM);
        let pitch = (BASE_PITCH * voice.pitch).clamp(0.0, 99.0);
        let amplitude = (BASE_AMPLITUDE * voice.volume).clamp(0.0, 200.0);

        let mut args = vec![
            "-s".to_string(),
            format!("{}", wpm.round() as u32),
            "-p".to_string(),
            format!("{}", pitch.round() as u32),
            "-a".to_string(),
            format!("{}", amplitude.round() as u32),
        ];
        if let Some(ref id) = voice.voice_id {
            args.push("-v".to_string());
            args.push(id.clone());
        }
        args.push("--".to_string());
        args.push(text.to_string());
        args
    }
}

impl OutputSink for LocalSynthesisSink {
    fn render(&mut self, text: &str, voice: &Voice) -> Result<()> {
        let mut command = Command::new(&self.program);
        command.args(self.args(text, voice));
        self.running.run(command, self.name())
    }

    fn name(&self) -> &'static str {
        "local"
    }

    fn canceller(&self) -> Option<SinkCanceller> {
        let running = self.running.clone();
        Some(Arc::new(move || running.kill()))
    }
}
