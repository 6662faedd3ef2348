//! Command-line interface for encodec-relay
//!
//! Provides argument parsing using clap derive macros.

use crate::config::{Config, DecoderBackend, parse_duration};
use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;
use std::time::Duration;

/// Encode audio to EnCodec tokens and relay them to a decoding service
#[derive(Parser, Debug)]
#[command(
    name = "encodec-relay",
    version,
    about = "Encode audio to EnCodec tokens and relay them to a decoding service"
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Only print errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose output (-v: debug, -vv: trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Encode an audio file and submit it to the decoding service
    Encode(EncodeArgs),

    /// Print the model's declared inputs and outputs
    Inspect {
        /// Model file (default: from config)
        #[arg(long, value_name = "PATH")]
        model: Option<PathBuf>,
    },

    /// View configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

/// Arguments of the `encode` command.
#[derive(Args, Debug)]
pub struct EncodeArgs {
    /// Audio file to encode (any format the decoder backend understands)
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Model file (default: from config)
    #[arg(long, value_name = "PATH")]
    pub model: Option<PathBuf>,

    /// Base URL of the decoding service
    #[arg(long, value_name = "URL")]
    pub service_url: Option<String>,

    /// Decoder backend: symphonia or ffmpeg
    #[arg(long, value_name = "BACKEND")]
    pub decoder: Option<DecoderBackend>,

    /// Request timeout. Examples: 30, 45s, 2m
    #[arg(long, value_name = "DURATION", value_parser = parse_duration)]
    pub timeout: Option<Duration>,

    /// Print the service's relative path instead of the full URL
    #[arg(long)]
    pub locator_only: bool,
}

impl EncodeArgs {
    /// Apply command-line overrides on top of file and environment settings.
    pub fn apply(&self, mut config: Config) -> Config {
        if let Some(ref model) = self.model {
            config.model.path = model.clone();
        }
        if let Some(ref url) = self.service_url {
            config.service.base_url = url.clone();
        }
        if let Some(decoder) = self.decoder {
            config.audio.decoder = decoder;
        }
        if let Some(timeout) = self.timeout {
            config.service.timeout = timeout;
        }
        config
    }
}

/// Configuration management actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
    /// Print the default configuration file path
    Path,
}

/// Default log filter for the given verbosity flags.
///
/// `RUST_LOG` takes precedence when set.
pub fn log_filter(quiet: bool, verbose: u8) -> &'static str {
    if quiet {
        return "error";
    }
    match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}
