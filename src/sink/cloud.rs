//! Cloud speech synthesis against an OpenAI-compatible `/audio/speech` API.
//!
//! The synthesized MP3 is written to a temporary file and handed to an
//! external player.

use crate::config::CloudConfig;
use crate::defaults;
use crate::error::{Result, SpeechError};
use crate::sink::process::{ChildSlot, find_program, program_name};
use crate::sink::{OutputSink, SinkCanceller};
use crate::speech::Voice;
use std::io::Write;
use std::path::PathBuf;
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;

/// Speed range accepted by the speech endpoint.
const MIN_SPEED: f32 = 0.25;
const MAX_SPEED: f32 = 4.0;

/// mpg123 output scale at full volume.
const MPG123_FULL_SCALE: f32 = 32768.0;

pub struct CloudSynthesisSink {
    client: reqwest::blocking::Client,
    base_url: String,
    api_key: String,
    model: String,
    voice: String,
    player: PathBuf,
    running: ChildSlot,
}

impl CloudSynthesisSink {
    /// Builds the sink from config and the API key in the environment.
    pub fn from_config(config: &CloudConfig) -> Result<Self> {
        let api_key = std::env::var(defaults::CLOUD_API_KEY_ENV)
            .ok()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| SpeechError::SinkUnavailable {
                sink: "cloud".to_string(),
                reason: format!("{} is not set", defaults::CLOUD_API_KEY_ENV),
            })?;

        let player = find_program(&config.player).ok_or_else(|| SpeechError::SinkUnavailable {
            sink: "cloud".to_string(),
            reason: format!("audio player '{}' not found", config.player),
        })?;

        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SpeechError::SinkUnavailable {
                sink: "cloud".to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            api_key,
            model: config.model.clone(),
            voice: config.voice.clone(),
            player,
            running: ChildSlot::default(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/audio/speech", self.base_url.trim_end_matches('/'))
    }

    /// JSON body for one synthesis request.
    pub fn request_body(&self, text: &str, voice: &Voice) -> serde_json::Value {
        request_body(&self.model, &self.voice, text, voice)
    }

    /// Requests MP3 audio for `text`.
    pub fn synthesize(&self, text: &str, voice: &Voice) -> Result<Vec<u8>> {
        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&self.request_body(text, voice))
            .send()
            .map_err(|e| SpeechError::CloudRequest {
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(SpeechError::CloudRequest {
                message: format!("{status}: {body}"),
            });
        }

        let bytes = response.bytes().map_err(|e| SpeechError::CloudRequest {
            message: e.to_string(),
        })?;
        Ok(bytes.to_vec())
    }

    fn play(&self, audio: &[u8], voice: &Voice) -> Result<()> {
        let mut file = tempfile::Builder::new()
            .prefix("ldsvoice-")
            .suffix(".mp3")
            .tempfile()?;
        file.write_all(audio)?;
        file.flush()?;

        let mut command = Command::new(&self.player);
        command.args(player_args(program_name(&self.player), voice));
        command.arg(file.path());
        self.running.run(command, self.name())
    }
}

fn request_body(model: &str, default_voice: &str, text: &str, voice: &Voice) -> serde_json::Value {
    serde_json::json!({
        "model": model,
        "input": text,
        "voice": voice.voice_id.as_deref().unwrap_or(default_voice),
        "speed": voice.rate.clamp(MIN_SPEED, MAX_SPEED),
        "response_format": "mp3",
    })
}

/// Player flags. Only mpg123 gets quiet mode and volume scaling.
fn player_args(player: &str, voice: &Voice) -> Vec<String> {
    if player != defaults::AUDIO_PLAYER {
        return Vec::new();
    }
    let scale = (MPG123_FULL_SCALE * voice.volume).round() as u32;
    vec!["-q".to_string(), "-f".to_string(), scale.to_string()]
}

impl OutputSink for CloudSynthesisSink {
    fn render(&mut self, text: &str, voice: &Voice) -> Result<()> {
        let text = text.trim();
        if text.is_empty() {
            tracing::debug!("blank text, skipping synthesis request");
            return Ok(());
        }
        let audio = self.synthesize(text, voice)?;
        tracing::debug!(bytes = audio.len(), "cloud audio received");
        self.play(&audio, voice)
    }

    fn name(&self) -> &'static str {
        "cloud"
    }

    fn canceller(&self) -> Option<SinkCanceller> {
        let running = self.running.clone();
        Some(Arc::new(move || running.kill()))
    }
}
