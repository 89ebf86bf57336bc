//! Command-line interface for ldsvoice
//!
//! Provides argument parsing using clap derive macros, plus the small
//! input-classification helpers the binary shares with its tests.

use crate::config::Config;
use crate::entity::Entity;
use crate::sink::SinkKind;
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Speak structured entities with minimal latency
#[derive(Parser, Debug)]
#[command(
    name = "ldsvoice",
    version,
    about = "Speak structured entities with minimal latency",
    args_conflicts_with_subcommands = true
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Text to speak, an entity file, or inline entity JSON. Interactive when omitted
    #[arg(value_name = "TEXT_OR_FILE")]
    pub input: Vec<String>,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose logging (-v: info, -vv: debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Output sink override (local, cloud, console)
    #[arg(long, global = true, value_name = "SINK")]
    pub sink: Option<SinkKind>,

    /// Named voice override
    #[arg(long, global = true, value_name = "VOICE")]
    pub voice: Option<String>,

    /// Speaking rate multiplier (e.g., 0.8, 1.3)
    #[arg(long, global = true, value_name = "RATE", value_parser = parse_rate)]
    pub rate: Option<f32>,

    /// Split texts longer than this many characters into sentences
    #[arg(long, global = true, value_name = "CHARS")]
    pub chunk_threshold: Option<usize>,

    /// Worker idle poll interval. Examples: 100ms, 1s (bare numbers are milliseconds)
    #[arg(long, global = true, value_name = "DURATION", value_parser = parse_poll_interval)]
    pub poll_interval: Option<Duration>,
}

/// Parse a poll interval.
///
/// Supports any duration format accepted by `humantime`; a bare number is
/// taken as milliseconds.
fn parse_poll_interval(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    let interval = match s.parse::<u64>() {
        Ok(ms) => Duration::from_millis(ms),
        Err(_) => humantime::parse_duration(s).map_err(|e| e.to_string())?,
    };
    if interval.is_zero() {
        return Err("poll interval must be greater than zero".to_string());
    }
    Ok(interval)
}

fn parse_rate(s: &str) -> Result<f32, String> {
    let rate: f32 = s.trim().parse().map_err(|e| format!("{e}"))?;
    if rate.is_finite() && rate > 0.0 {
        Ok(rate)
    } else {
        Err("rate must be greater than zero".to_string())
    }
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Speak stdin as it arrives, sentence by sentence
    Stream {
        /// Treat each stdin line as an entity instead of free text
        #[arg(long)]
        entities: bool,
    },

    /// Speak every entity file (*.lds*.json) matching a glob pattern
    Files {
        /// Glob pattern (e.g., "entities/*.json")
        pattern: String,
    },

    /// Print the speech units an input would produce, as JSON
    Extract {
        /// Text, entity file, or inline entity JSON
        input: String,
    },

    /// Manage configuration
    Config {
        /// Action to perform
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

/// Configuration management actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Get a configuration value by key (e.g., engine.sink)
    Get {
        /// Dotted key path (e.g., engine.sink, voice.rate)
        key: String,
    },
    /// List the effective configuration
    List,
    /// Dump a commented configuration template
    Dump,
    /// Print the configuration file path
    Path,
}

impl Cli {
    /// Apply command-line overrides on top of file and environment config.
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(sink) = self.sink {
            config.engine.sink = sink;
        }
        if let Some(ref voice) = self.voice {
            config.voice.voice_id = Some(voice.clone());
        }
        if let Some(rate) = self.rate {
            config.voice.rate = rate;
        }
        if let Some(threshold) = self.chunk_threshold {
            config.engine.chunk_threshold = threshold;
        }
        if let Some(interval) = self.poll_interval {
            config.engine.poll_interval_ms = u64::try_from(interval.as_millis())
                .unwrap_or(u64::MAX)
                .max(1);
        }
    }
}

/// Default log filter for the given verbosity flags.
pub fn log_level(quiet: bool, verbose: u8) -> &'static str {
    match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, _) => "debug",
    }
}

/// What a piece of user input refers to.
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    /// An existing file.
    File(PathBuf),
    /// Inline entity JSON.
    Entity(Entity),
    /// Literal text.
    Text(String),
}

/// Classifies input: an existing file path, inline entity JSON, or text.
/// Blank input classifies as nothing.
pub fn classify_input(input: &str) -> Option<Input> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }
    let path = Path::new(trimmed);
    if path.is_file() {
        return Some(Input::File(path.to_path_buf()));
    }
    if trimmed.starts_with('{')
        && let Ok(value) = serde_json::from_str(trimmed)
    {
        return Some(Input::Entity(Entity::from_value(value)));
    }
    Some(Input::Text(trimmed.to_string()))
}

/// One line of interactive input.
#[derive(Debug, Clone, PartialEq)]
pub enum InteractiveCommand {
    Quit,
    Stop,
    File(PathBuf),
    Speak(Input),
    Empty,
}

/// Parses an interactive line. Unknown `/commands` are spoken as text.
pub fn parse_interactive(line: &str) -> InteractiveCommand {
    let line = line.trim();
    if line.is_empty() {
        return InteractiveCommand::Empty;
    }
    match line {
        "/quit" | "/exit" => return InteractiveCommand::Quit,
        "/stop" => return InteractiveCommand::Stop,
        _ => {}
    }
    if let Some(path) = line.strip_prefix("/file ") {
        let path = path.trim();
        if !path.is_empty() {
            return InteractiveCommand::File(PathBuf::from(path));
        }
    }
    match classify_input(line) {
        Some(input) => InteractiveCommand::Speak(input),
        None => InteractiveCommand::Empty,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_default_command() {
        let cli = Cli::try_parse_from(["ldsvoice"]).unwrap();
        assert!(cli.command.is_none());
        assert!(cli.input.is_empty());
        assert!(cli.sink.is_none());
        assert!(cli.voice.is_none());
        assert!(cli.rate.is_none());
        assert!(cli.chunk_threshold.is_none());
        assert!(cli.poll_interval.is_none());
        assert!(!cli.quiet);
        assert_eq!(cli.verbose, 0);
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_parse_positional_words() {
        let cli = Cli::try_parse_from(["ldsvoice", "Hello", "there."]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.input, vec!["Hello", "there."]);
    }

    #[test]
    fn test_parse_verbose_double() {
        let cli = Cli::try_parse_from(["ldsvoice", "-vv"]).unwrap();
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_parse_sink_and_voice_flags() {
        let cli = Cli::try_parse_from([
            "ldsvoice", "--sink", "console", "--voice", "en-gb", "--rate", "1.3", "hi",
        ])
        .unwrap();
        assert_eq!(cli.sink, Some(SinkKind::Console));
        assert_eq!(cli.voice.as_deref(), Some("en-gb"));
        assert_eq!(cli.rate, Some(1.3));
    }

    #[test]
    fn test_parse_invalid_sink_fails() {
        assert!(Cli::try_parse_from(["ldsvoice", "--sink", "speaker"]).is_err());
    }

    #[test]
    fn test_parse_invalid_rate_fails() {
        assert!(Cli::try_parse_from(["ldsvoice", "--rate", "0"]).is_err());
        assert!(Cli::try_parse_from(["ldsvoice", "--rate", "fast"]).is_err());
    }

    #[test]
    fn test_parse_poll_interval_formats() {
        assert_eq!(parse_poll_interval("250"), Ok(Duration::from_millis(250)));
        assert_eq!(parse_poll_interval("1s"), Ok(Duration::from_secs(1)));
        assert_eq!(parse_poll_interval("50ms"), Ok(Duration::from_millis(50)));
        assert!(parse_poll_interval("0").is_err());
        assert!(parse_poll_interval("soon").is_err());
    }

    #[test]
    fn test_parse_stream_command() {
        let cli = Cli::try_parse_from(["ldsvoice", "stream", "--entities"]).unwrap();
        match cli.command {
            Some(Commands::Stream { entities }) => assert!(entities),
            _ => panic!("Expected Stream command"),
        }
    }

    #[test]
    fn test_parse_files_command() {
        let cli = Cli::try_parse_from(["ldsvoice", "files", "data/*.json"]).unwrap();
        match cli.command {
            Some(Commands::Files { pattern }) => assert_eq!(pattern, "data/*.json"),
            _ => panic!("Expected Files command"),
        }
    }

    #[test]
    fn test_parse_config_get() {
        let cli = Cli::try_parse_from(["ldsvoice", "config", "get", "engine.sink"]).unwrap();
        match cli.command {
            Some(Commands::Config {
                action: ConfigAction::Get { key },
            }) => assert_eq!(key, "engine.sink"),
            _ => panic!("Expected Config Get"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli =
            Cli::try_parse_from(["ldsvoice", "files", "*.json", "--sink", "console", "-q"]).unwrap();
        assert_eq!(cli.sink, Some(SinkKind::Console));
        assert!(cli.quiet);
    }

    #[test]
    fn test_parse_completions() {
        let cli = Cli::try_parse_from(["ldsvoice", "completions", "bash"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Completions { shell: Shell::Bash })
        ));
    }

    #[test]
    fn test_apply_overrides() {
        let cli = Cli::try_parse_from([
            "ldsvoice",
            "--sink",
            "cloud",
            "--rate",
            "0.8",
            "--chunk-threshold",
            "60",
            "--poll-interval",
            "2s",
        ])
        .unwrap();
        let mut config = Config::default();
        cli.apply_overrides(&mut config);
        assert_eq!(config.engine.sink, SinkKind::Cloud);
        assert_eq!(config.voice.rate, 0.8);
        assert_eq!(config.engine.chunk_threshold, 60);
        assert_eq!(config.engine.poll_interval_ms, 2000);
    }

    #[test]
    fn test_log_level() {
        assert_eq!(log_level(true, 2), "error");
        assert_eq!(log_level(false, 0), "warn");
        assert_eq!(log_level(false, 1), "info");
        assert_eq!(log_level(false, 3), "debug");
    }

    #[test]
    fn test_classify_text_and_entity() {
        assert_eq!(
            classify_input("  Hello there. "),
            Some(Input::Text("Hello there.".to_string()))
        );
        match classify_input(r#"{"core":{"speak":"Hi"}}"#) {
            Some(Input::Entity(entity)) => {
                assert_eq!(entity.content.speech.as_deref(), Some("Hi"))
            }
            other => panic!("Expected entity, got {other:?}"),
        }
        // Looks like JSON but isn't: spoken literally.
        assert_eq!(
            classify_input("{not json"),
            Some(Input::Text("{not json".to_string()))
        );
    }

    #[test]
    fn test_classify_blank_is_nothing() {
        assert_eq!(classify_input(""), None);
        assert_eq!(classify_input("  \t "), None);
    }

    #[test]
    fn test_classify_existing_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let path = file.path().to_str().unwrap();
        assert_eq!(
            classify_input(path),
            Some(Input::File(file.path().to_path_buf()))
        );
    }

    #[test]
    fn test_parse_interactive_commands() {
        assert_eq!(parse_interactive("/quit"), InteractiveCommand::Quit);
        assert_eq!(parse_interactive(" /stop "), InteractiveCommand::Stop);
        assert_eq!(parse_interactive(""), InteractiveCommand::Empty);
        assert_eq!(parse_interactive("   \t"), InteractiveCommand::Empty);
        assert_eq!(
            parse_interactive("/file notes.lds.json"),
            InteractiveCommand::File(PathBuf::from("notes.lds.json"))
        );
        assert_eq!(
            parse_interactive("/file"),
            InteractiveCommand::Speak(Input::Text("/file".to_string()))
        );
        assert_eq!(
            parse_interactive("good morning"),
            InteractiveCommand::Speak(Input::Text("good morning".to_string()))
        );
    }
}
