use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use ldsvoice::cli::{
    Cli, Commands, ConfigAction, Input, InteractiveCommand, classify_input, log_level,
    parse_interactive,
};
use ldsvoice::config::Config;
use ldsvoice::engine::{DispatchMode, SpeechEngine};
use ldsvoice::entity::{Entity, EntitySource, LineFragments, fragment_stream};
use ldsvoice::pipeline::{Pipeline, PipelineConfig};
use ldsvoice::speech::{Chunker, ContentExtractor, SpeechUnit};
use owo_colors::OwoColorize;
use std::io::{BufRead, IsTerminal, Write};
use std::path::Path;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// How long each wait for queued speech lasts before checking again.
const DRAIN_WAIT: Duration = Duration::from_secs(60);

// Sync on purpose: the cloud sink's blocking HTTP client must not run inside
// an async context. A runtime is built only for the streaming commands.
fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.quiet, cli.verbose);
    tracing::debug!(version = %ldsvoice::version_string(), "starting");

    match &cli.command {
        None => {
            let config = load_config(&cli)?;
            if cli.input.is_empty() {
                run_interactive(&config, cli.quiet)?;
            } else {
                speak_input(&config, &cli.input.join(" "))?;
            }
        }
        Some(Commands::Stream { entities }) => {
            let config = load_config(&cli)?;
            run_stream(&config, *entities, cli.quiet)?;
        }
        Some(Commands::Files { pattern }) => {
            let config = load_config(&cli)?;
            speak_files(&config, pattern, cli.quiet)?;
        }
        Some(Commands::Extract { input }) => {
            let config = load_config(&cli)?;
            print_units(&config, input)?;
        }
        Some(Commands::Config { action }) => {
            handle_config_command(action, &cli)?;
        }
        Some(Commands::Completions { shell }) => {
            clap_complete::generate(*shell, &mut Cli::command(), "ldsvoice", &mut std::io::stdout());
        }
    }

    Ok(())
}

/// Install the tracing subscriber. `RUST_LOG` wins over -q/-v.
fn init_logging(quiet: bool, verbose: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("ldsvoice={}", log_level(quiet, verbose))));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Load configuration from file or use defaults.
///
/// Priority order:
/// 1. Command-line flags
/// 2. Environment variables (LDSVOICE_*)
/// 3. Custom config path from CLI (--config), which must exist
/// 4. Default config path (~/.config/ldsvoice/config.toml), if present
/// 5. Built-in defaults
fn load_config(cli: &Cli) -> Result<Config> {
    let config = match cli.config.as_deref() {
        Some(path) => Config::load(path)?,
        None => Config::load_or_default(&Config::default_path())?,
    };

    let mut config = config.with_env_overrides();
    cli.apply_overrides(&mut config);
    config.validate()?;
    Ok(config)
}

fn blocking_pipeline(config: &Config) -> Pipeline {
    let engine = SpeechEngine::from_config(config);
    Pipeline::new(
        engine,
        PipelineConfig::from_config(config, DispatchMode::Blocking),
    )
}

/// Speak one positional input and return when it has been spoken.
fn speak_input(config: &Config, input: &str) -> Result<()> {
    let Some(input) = classify_input(input) else {
        tracing::debug!("blank input, nothing to speak");
        return Ok(());
    };
    let pipeline = blocking_pipeline(config);
    speak_classified(&pipeline, input)?;
    Ok(())
}

fn speak_classified(pipeline: &Pipeline, input: Input) -> Result<usize> {
    let spoken = match input {
        Input::File(path) => pipeline
            .speak_file(&path)
            .with_context(|| format!("Failed to speak {}", path.display()))?,
        Input::Entity(entity) => pipeline.speak_entity(&entity),
        Input::Text(text) => pipeline.speak_entity(&Entity::plain_text(&text)),
    };
    Ok(spoken)
}

/// Read lines until /quit or end of input. Speech is queued so /stop can
/// interrupt it.
fn run_interactive(config: &Config, quiet: bool) -> Result<()> {
    let engine = SpeechEngine::from_config(config);
    let pipeline = Pipeline::new(
        engine.clone(),
        PipelineConfig::from_config(config, DispatchMode::Queued),
    );
    let interactive = std::io::stdin().is_terminal();

    if interactive && !quiet {
        eprintln!(
            "{}",
            "Type text or entity JSON to speak. /file <path>, /stop, /quit".dimmed()
        );
    }

    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        if interactive {
            eprint!("{} ", ">".cyan());
            std::io::stderr().flush()?;
        }

        let Some(line) = lines.next() else {
            // End of input: let queued speech finish.
            while !engine.wait_idle(DRAIN_WAIT) {}
            break;
        };

        match parse_interactive(&line?) {
            InteractiveCommand::Quit => {
                engine.stop();
                break;
            }
            InteractiveCommand::Stop => engine.stop(),
            InteractiveCommand::Empty => {}
            InteractiveCommand::File(path) => {
                if let Err(e) = speak_classified(&pipeline, Input::File(path)) {
                    eprintln!("{} {:#}", "Error:".red(), e);
                }
            }
            InteractiveCommand::Speak(input) => {
                if let Err(e) = speak_classified(&pipeline, input) {
                    eprintln!("{} {:#}", "Error:".red(), e);
                }
            }
        }
    }

    engine.shutdown();
    Ok(())
}

/// Speak stdin as it arrives.
fn run_stream(config: &Config, entities: bool, quiet: bool) -> Result<()> {
    let engine = SpeechEngine::from_config(config);
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    let spoken = runtime.block_on(async {
        let fragments = fragment_stream(LineFragments::stdin());
        if entities {
            let pipeline = Pipeline::new(
                engine.clone(),
                PipelineConfig::from_config(config, DispatchMode::Blocking),
            );
            pipeline.speak_stream(fragments).await
        } else {
            engine
                .stream_speak_async(fragments, config.voice.clone())
                .await
        }
    });

    if !quiet {
        eprintln!("{}", format!("Spoke {spoken} unit(s)").dimmed());
    }
    engine.shutdown();
    Ok(())
}

fn speak_files(config: &Config, pattern: &str, quiet: bool) -> Result<()> {
    let pipeline = blocking_pipeline(config);
    let spoken = pipeline.speak_files(pattern)?;
    if !quiet {
        if spoken == 0 {
            eprintln!("{}", format!("No entity files matched '{pattern}'").yellow());
        } else {
            eprintln!("{}", format!("Spoke {spoken} unit(s)").green());
        }
    }
    Ok(())
}

/// Print the units an input would be spoken as, without speaking them.
fn print_units(config: &Config, input: &str) -> Result<()> {
    let entity = match classify_input(input) {
        Some(Input::File(path)) => EntitySource::from_file(&path)?,
        Some(Input::Entity(entity)) => entity,
        Some(Input::Text(text)) => Entity::plain_text(&text),
        None => anyhow::bail!("Nothing to extract: input is blank"),
    };
    let extractor = ContentExtractor::new(config.voice.clone());
    let units: Vec<SpeechUnit> =
        Chunker::new(config.engine.chunk_threshold).chunk(extractor.extract(&entity));
    println!("{}", serde_json::to_string_pretty(&units)?);
    Ok(())
}

/// Handle configuration commands.
fn handle_config_command(action: &ConfigAction, cli: &Cli) -> Result<()> {
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(Config::default_path);

    match action {
        ConfigAction::Get { key } => {
            let config = load_config(cli)?;
            match config.get_value_by_path(key) {
                Ok(value) => println!("{}", value),
                Err(e) => {
                    eprintln!("Error: {}", e);
                    std::process::exit(1);
                }
            }
        }
        ConfigAction::List => {
            let config = load_config(cli)?;
            print!("{}", config.to_display_toml()?);
        }
        ConfigAction::Dump => {
            print!("{}", Config::dump_template());
        }
        ConfigAction::Path => {
            let exists = Path::new(&config_path).exists();
            println!("{}", config_path.display());
            if !exists && !cli.quiet {
                eprintln!("{}", "(file does not exist; built-in defaults apply)".dimmed());
            }
        }
    }
    Ok(())
}
