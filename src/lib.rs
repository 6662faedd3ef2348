//! encodec-relay - Encode audio to EnCodec tokens and relay them to a decoding service
//!
//! Normalizes any audio file to 24 kHz mono PCM, runs the EnCodec encoder,
//! and submits the range-checked tokens and scales over HTTP.

// Enforce error handling discipline
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod audio;
#[cfg(feature = "cli")]
pub mod cli;
pub mod codec;
pub mod config;
pub mod defaults;
pub mod error;
pub mod inference;
pub mod pipeline;
pub mod remote;
pub mod tensor;

// Core traits (decode → infer → submit)
pub use audio::Decoder;
pub use inference::InferenceEngine;
pub use remote::Submitter;

// Pipeline
pub use audio::{AudioAsset, AudioNormalizer, PcmBuffer};
pub use codec::SafePayload;
pub use pipeline::{PipelineEvent, PipelineFailure, PipelineOrchestrator, PipelineState, Stage};
pub use remote::ResourceLocator;
pub use tensor::{OutputBinding, TensorAdapter};

// Error handling
pub use error::{ErrorKind, FailureCategory, RelayError, Result};

// Config
pub use config::Config;

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
