use crate::defaults;
use crate::error::{Result, SpeechError};
use crate::sink::SinkKind;
use crate::speech::Voice;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub engine: EngineConfig,
    pub voice: Voice,
    pub local: LocalConfig,
    pub cloud: CloudConfig,
}

/// Dispatch and chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    pub sink: SinkKind,
    pub poll_interval_ms: u64,
    pub chunk_threshold: usize,
}

/// Local synthesizer configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LocalConfig {
    /// Explicit synthesizer binary. Searched for on PATH when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub program: Option<String>,
    pub words_per_minute: u32,
}

/// Cloud synthesizer configuration. The API key comes from the environment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CloudConfig {
    pub base_url: String,
    pub model: String,
    pub voice: String,
    pub player: String,
    pub timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sink: SinkKind::default(),
            poll_interval_ms: defaults::POLL_INTERVAL_MS,
            chunk_threshold: defaults::CHUNK_THRESHOLD,
        }
    }
}

impl EngineConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            program: None,
            words_per_minute: defaults::WORDS_PER_MINUTE,
        }
    }
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::CLOUD_BASE_URL.to_string(),
            model: defaults::CLOUD_MODEL.to_string(),
            voice: defaults::CLOUD_VOICE.to_string(),
            player: defaults::AUDIO_PLAYER.to_string(),
            timeout_secs: defaults::CLOUD_TIMEOUT_SECS,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Missing fields use default values.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SpeechError::ConfigFileNotFound {
                    path: path.display().to_string(),
                }
            } else {
                SpeechError::Io(e)
            }
        })?;
        let config: Config = toml::from_str(&contents).map_err(|e| SpeechError::ConfigParse {
            message: format!("{}: {}", path.display(), e),
        })?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if it doesn't exist
    ///
    /// Only a missing file yields defaults; malformed TOML is an error.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Err(SpeechError::ConfigFileNotFound { .. }) => Ok(Self::default()),
            other => other,
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - LDSVOICE_SINK → engine.sink
    /// - LDSVOICE_VOICE → voice.voice_id
    /// - LDSVOICE_RATE → voice.rate
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(sink) = std::env::var("LDSVOICE_SINK")
            && !sink.is_empty()
        {
            match sink.parse() {
                Ok(kind) => self.engine.sink = kind,
                Err(e) => tracing::warn!(error = %e, "ignoring LDSVOICE_SINK"),
            }
        }

        if let Ok(voice) = std::env::var("LDSVOICE_VOICE")
            && !voice.is_empty()
        {
            self.voice.voice_id = Some(voice);
        }

        if let Ok(rate) = std::env::var("LDSVOICE_RATE")
            && !rate.is_empty()
        {
            match rate.parse::<f32>() {
                Ok(r) if r.is_finite() && r > 0.0 => self.voice.rate = r,
                _ => tracing::warn!(value = %rate, "ignoring LDSVOICE_RATE"),
            }
        }

        self
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        fn invalid(key: &str, message: &str) -> SpeechError {
            SpeechError::ConfigInvalidValue {
                key: key.to_string(),
                message: message.to_string(),
            }
        }

        if !(self.voice.rate.is_finite() && self.voice.rate > 0.0) {
            return Err(invalid("voice.rate", "must be greater than 0"));
        }
        if !(self.voice.pitch.is_finite() && self.voice.pitch > 0.0) {
            return Err(invalid("voice.pitch", "must be greater than 0"));
        }
        if !(0.0..=1.0).contains(&self.voice.volume) {
            return Err(invalid("voice.volume", "must be between 0.0 and 1.0"));
        }
        if self.engine.poll_interval_ms == 0 {
            return Err(invalid("engine.poll_interval_ms", "must be greater than 0"));
        }
        if self.engine.chunk_threshold == 0 {
            return Err(invalid("engine.chunk_threshold", "must be greater than 0"));
        }
        if self.local.words_per_minute == 0 {
            return Err(invalid("local.words_per_minute", "must be greater than 0"));
        }
        Ok(())
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/ldsvoice/config.toml on Linux
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("ldsvoice")
            .join("config.toml")
    }

    /// Look up a single value by dotted path, e.g. `engine.sink`.
    pub fn get_value_by_path(&self, key: &str) -> Result<String> {
        let root = toml::Value::try_from(self).map_err(|e| SpeechError::Other(e.to_string()))?;

        let mut current = &root;
        for part in key.split('.') {
            current = current
                .get(part)
                .ok_or_else(|| SpeechError::ConfigInvalidValue {
                    key: key.to_string(),
                    message: "unknown configuration key".to_string(),
                })?;
        }

        Ok(match current {
            toml::Value::String(s) => s.clone(),
            toml::Value::Table(_) => toml::to_string_pretty(current)
                .map_err(|e| SpeechError::Other(e.to_string()))?
                .trim_end()
                .to_string(),
            other => other.to_string(),
        })
    }

    /// The effective configuration as TOML.
    pub fn to_display_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| SpeechError::Other(e.to_string()))
    }

    /// A commented configuration file with every default spelled out.
    pub fn dump_template() -> String {
        format!(
            r#"# ldsvoice configuration
# Location: {path}

[engine]
# Output sink: "local", "cloud" or "console"
sink = "local"
# How long the dispatch worker idles before exiting (milliseconds)
poll_interval_ms = {poll}
# Texts longer than this many characters are split into sentences
chunk_threshold = {chunk}

[voice]
# Engine defaults; entities may override them per unit
rate = {rate:.1}
pitch = {pitch:.1}
volume = {volume:.1}
# voice_id = "en-us"

[local]
# program = "/usr/bin/espeak-ng"
words_per_minute = {wpm}

[cloud]
# API key is read from ${key_env}
base_url = "{base_url}"
model = "{model}"
voice = "{voice}"
player = "{player}"
timeout_secs = {timeout}
"#,
            path = Self::default_path().display(),
            poll = defaults::POLL_INTERVAL_MS,
            chunk = defaults::CHUNK_THRESHOLD,
            rate = defaults::RATE,
            pitch = defaults::PITCH,
            volume = defaults::VOLUME,
            wpm = defaults::WORDS_PER_MINUTE,
            key_env = defaults::CLOUD_API_KEY_ENV,
            base_url = defaults::CLOUD_BASE_URL,
            model = defaults::CLOUD_MODEL,
            voice = defaults::CLOUD_VOICE,
            player = defaults::AUDIO_PLAYER,
            timeout = defaults::CLOUD_TIMEOUT_SECS,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::NamedTempFile;

    // Mutex to serialize tests that modify environment variables
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    // SAFETY: These helpers are only used in tests with ENV_LOCK held,
    // ensuring no concurrent access to environment variables.
    fn set_env(key: &str, value: &str) {
        unsafe { std::env::set_var(key, value) }
    }

    fn remove_env(key: &str) {
        unsafe { std::env::remove_var(key) }
    }

    fn clear_ldsvoice_env() {
        remove_env("LDSVOICE_SINK");
        remove_env("LDSVOICE_VOICE");
        remove_env("LDSVOICE_RATE");
    }

    fn write_config(contents: &str) -> NamedTempFile {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(contents.as_bytes()).unwrap();
        temp_file
    }

    #[test]
    fn test_default_config_has_correct_values() {
        let config = Config::default();

        assert_eq!(config.engine.sink, SinkKind::Local);
        assert_eq!(config.engine.poll_interval_ms, 100);
        assert_eq!(config.engine.chunk_threshold, 100);
        assert_eq!(config.engine.poll_interval(), Duration::from_millis(100));

        assert_eq!(config.voice, Voice::default());

        assert_eq!(config.local.program, None);
        assert_eq!(config.local.words_per_minute, 150);

        assert_eq!(config.cloud.model, "tts-1");
        assert_eq!(config.cloud.player, "mpg123");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_toml_file() {
        let temp_file = write_config(
            r#"
            [engine]
            sink = "console"
            poll_interval_ms = 250
            chunk_threshold = 80

            [voice]
            rate = 1.2
            volume = 0.5
            voice_id = "en-gb"

            [local]
            program = "/opt/espeak/bin/espeak-ng"
            words_per_minute = 175

            [cloud]
            model = "tts-1-hd"
            voice = "nova"
        "#,
        );

        let config = Config::load(temp_file.path()).unwrap();

        assert_eq!(config.engine.sink, SinkKind::Console);
        assert_eq!(config.engine.poll_interval_ms, 250);
        assert_eq!(config.engine.chunk_threshold, 80);
        assert_eq!(config.voice.rate, 1.2);
        assert_eq!(config.voice.pitch, 1.0);
        assert_eq!(config.voice.volume, 0.5);
        assert_eq!(config.voice.voice_id.as_deref(), Some("en-gb"));
        assert_eq!(
            config.local.program.as_deref(),
            Some("/opt/espeak/bin/espeak-ng")
        );
        assert_eq!(config.local.words_per_minute, 175);
        assert_eq!(config.cloud.model, "tts-1-hd");
        assert_eq!(config.cloud.voice, "nova");
        assert_eq!(config.cloud.base_url, "https://api.openai.com/v1");
    }

    #[test]
    fn test_load_partial_config_uses_defaults() {
        let temp_file = write_config(
            r#"
            [engine]
            chunk_threshold = 60
        "#,
        );

        let config = Config::load(temp_file.path()).unwrap();

        assert_eq!(config.engine.chunk_threshold, 60);
        assert_eq!(config.engine.sink, SinkKind::Local);
        assert_eq!(config.engine.poll_interval_ms, 100);
        assert_eq!(config.voice, Voice::default());
        assert_eq!(config.cloud, CloudConfig::default());
    }

    #[test]
    fn test_unknown_sink_is_parse_error() {
        let temp_file = write_config("[engine]\nsink = \"speaker\"\n");
        let err = Config::load(temp_file.path()).unwrap_err();
        assert!(matches!(err, SpeechError::ConfigParse { .. }));
    }

    #[test]
    fn test_env_override_sink() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_ldsvoice_env();

        set_env("LDSVOICE_SINK", "console");
        let config = Config::default().with_env_overrides();

        assert_eq!(config.engine.sink, SinkKind::Console);
        assert_eq!(config.voice, Voice::default()); // Not overridden

        clear_ldsvoice_env();
    }

    #[test]
    fn test_env_override_voice_and_rate() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_ldsvoice_env();

        set_env("LDSVOICE_VOICE", "en-us");
        set_env("LDSVOICE_RATE", "1.5");
        let config = Config::default().with_env_overrides();

        assert_eq!(config.voice.voice_id.as_deref(), Some("en-us"));
        assert_eq!(config.voice.rate, 1.5);

        clear_ldsvoice_env();
    }

    #[test]
    fn test_env_override_invalid_values_ignored() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_ldsvoice_env();

        set_env("LDSVOICE_SINK", "speaker");
        set_env("LDSVOICE_RATE", "fast");
        let config = Config::default().with_env_overrides();

        assert_eq!(config.engine.sink, SinkKind::Local);
        assert_eq!(config.voice.rate, 1.0);

        set_env("LDSVOICE_RATE", "-2");
        let config = Config::default().with_env_overrides();
        assert_eq!(config.voice.rate, 1.0);

        clear_ldsvoice_env();
    }

    #[test]
    fn test_env_override_empty_string_ignored() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_ldsvoice_env();

        set_env("LDSVOICE_VOICE", "");
        let config = Config::default().with_env_overrides();

        assert_eq!(config.voice.voice_id, None);

        clear_ldsvoice_env();
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let temp_file = write_config(
            r#"
            [engine
            sink = "broken
        "#,
        );

        let result = Config::load(temp_file.path());

        assert!(matches!(result, Err(SpeechError::ConfigParse { .. })));
    }

    #[test]
    fn test_default_path_is_xdg_compliant() {
        let path = Config::default_path();
        let path_str = path.to_string_lossy();

        assert!(path_str.contains("ldsvoice"));
        assert!(path_str.ends_with("config.toml"));
    }

    #[test]
    fn test_load_missing_file_is_not_found() {
        let missing_path = Path::new("/tmp/nonexistent_ldsvoice_config_12345.toml");
        let err = Config::load(missing_path).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_load_or_default_returns_default_for_missing_file() {
        let missing_path = Path::new("/tmp/nonexistent_ldsvoice_config_12345.toml");
        let config = Config::load_or_default(missing_path).unwrap();

        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_or_default_errors_on_invalid_toml() {
        let temp_file = write_config("[engine\nsink = \"broken\n");

        // Invalid TOML must not silently fall back to defaults
        assert!(Config::load_or_default(temp_file.path()).is_err());
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let mut config = Config::default();
        config.voice.volume = 1.5;
        assert!(matches!(
            config.validate(),
            Err(SpeechError::ConfigInvalidValue { ref key, .. }) if key == "voice.volume"
        ));

        let mut config = Config::default();
        config.voice.rate = 0.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.engine.poll_interval_ms = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.engine.chunk_threshold = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_get_value_by_path() {
        let config = Config::default();
        assert_eq!(config.get_value_by_path("engine.sink").unwrap(), "local");
        assert_eq!(
            config.get_value_by_path("engine.chunk_threshold").unwrap(),
            "100"
        );
        assert_eq!(config.get_value_by_path("cloud.voice").unwrap(), "alloy");
        assert!(
            config
                .get_value_by_path("engine")
                .unwrap()
                .contains("poll_interval_ms")
        );
    }

    #[test]
    fn test_get_value_by_path_unknown_key() {
        let err = Config::default()
            .get_value_by_path("engine.missing")
            .unwrap_err();
        assert!(err.to_string().contains("engine.missing"));
    }

    #[test]
    fn test_display_toml_round_trips() {
        let mut config = Config::default();
        config.engine.sink = SinkKind::Cloud;
        config.voice.voice_id = Some("en-gb".to_string());

        let text = config.to_display_toml().unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_dump_template_parses_to_defaults() {
        let parsed: Config = toml::from_str(&Config::dump_template()).unwrap();
        assert_eq!(parsed, Config::default());
    }
}
