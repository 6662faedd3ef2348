use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use encodec_relay::cli::{Cli, Commands, ConfigAction, EncodeArgs, log_filter};
use encodec_relay::audio::FfmpegDecoder;
use encodec_relay::config::{Config, DecoderBackend};
use encodec_relay::defaults::execution_backend;
use encodec_relay::inference::{InferenceEngine, OnnxEngine};
use encodec_relay::{AudioAsset, PipelineEvent, PipelineOrchestrator};
use owo_colors::OwoColorize;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.quiet, cli.verbose);

    match cli.command {
        Commands::Encode(args) => {
            let config = load_config(cli.config.as_deref())?;
            run_encode(config, args, cli.quiet).await?;
        }
        Commands::Inspect { model } => {
            let mut config = load_config(cli.config.as_deref())?;
            if let Some(model) = model {
                config.model.path = model;
            }
            inspect_model(&config)?;
        }
        Commands::Config { action } => {
            handle_config_command(action, cli.config.as_deref())?;
        }
        Commands::Completions { shell } => {
            clap_complete::generate(
                shell,
                &mut Cli::command(),
                "encodec-relay",
                &mut std::io::stdout(),
            );
        }
    }

    Ok(())
}

fn init_logging(quiet: bool, verbose: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("encodec_relay={}", log_filter(quiet, verbose))));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Load configuration from file or use defaults.
///
/// Priority order:
/// 1. Custom config path from CLI (--config)
/// 2. Default config path (~/.config/encodec-relay/config.toml)
/// 3. Built-in defaults
///
/// Environment variable overrides are applied on top.
fn load_config(custom_path: Option<&std::path::Path>) -> Result<Config> {
    let config = match custom_path {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::load_or_default(&Config::default_path())?,
    };
    Ok(config.with_env_overrides()?)
}

async fn run_encode(config: Config, args: EncodeArgs, quiet: bool) -> Result<()> {
    let config = args.apply(config);
    config.validate()?;

    if config.audio.decoder == DecoderBackend::Ffmpeg {
        let version = FfmpegDecoder::new(config.audio.ffmpeg_path.clone()).probe()?;
        tracing::debug!(%version, "using external decoder");
    }

    let asset = AudioAsset::from_path(&args.file)
        .with_context(|| format!("Failed to read {}", args.file.display()))?;

    tracing::info!(
        file = %args.file.display(),
        bytes = asset.len(),
        backend = execution_backend(),
        "encoding"
    );

    let (event_tx, event_rx) = crossbeam_channel::unbounded();
    let orchestrator = PipelineOrchestrator::from_config(&config)?.with_event_sender(event_tx);

    let progress = std::thread::spawn(move || {
        for event in event_rx {
            if let PipelineEvent::StageStarted(stage) = event
                && !quiet
            {
                eprintln!("{} {}", "→".dimmed(), stage.dimmed());
            }
        }
    });

    let outcome = orchestrator.run(asset).await;
    drop(orchestrator);
    let _ = progress.join();

    match outcome {
        Ok(locator) => {
            if args.locator_only {
                println!("{}", locator);
            } else {
                println!("{}", locator.url(&config.service.base_url));
            }
            Ok(())
        }
        Err(failure) => {
            eprintln!(
                "{} {} ({})",
                "Error:".red().bold(),
                failure,
                failure.category()
            );
            std::process::exit(1);
        }
    }
}

fn inspect_model(config: &Config) -> Result<()> {
    let engine = OnnxEngine::load(&config.model.path, config.model.intra_threads)?;

    println!("{}  {}", "Model:".dimmed(), config.model.path.display());
    println!("{}  {}", "Backend:".dimmed(), execution_backend());
    println!("{}", "Inputs:".dimmed());
    for (i, name) in engine.input_names().iter().enumerate() {
        println!("  [{i}] {name}");
    }
    println!("{}", "Outputs:".dimmed());
    for (i, name) in engine.output_names().iter().enumerate() {
        let role = match i {
            0 => " (tokens)",
            1 => " (scales)",
            _ => "",
        };
        println!("  [{i}] {name}{}", role.green());
    }
    Ok(())
}

fn handle_config_command(action: ConfigAction, custom_path: Option<&std::path::Path>) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = load_config(custom_path)?;
            print!("{}", config.to_toml()?);
        }
        ConfigAction::Path => {
            let path = custom_path
                .map(std::path::Path::to_path_buf)
                .unwrap_or_else(Config::default_path);
            println!("{}", path.display());
        }
    }
    Ok(())
}
