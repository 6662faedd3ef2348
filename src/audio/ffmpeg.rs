//! External-tool decoder driving an `ffmpeg` binary.
//!
//! ffmpeg handles containers symphonia does not (Opus, WMA, AMR, ...). The
//! asset is written into a scratch directory owned by the call, converted
//! straight to the target profile, and read back with hound. The directory is
//! removed when the call returns, on every path.

use crate::audio::asset::AudioAsset;
use crate::audio::decoder::{DecodedAudio, Decoder};
use crate::audio::wav;
use crate::defaults::{FFMPEG_BINARY, TARGET_CHANNELS, TARGET_SAMPLE_RATE};
use crate::error::{RelayError, Result};
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::process::Command;

const OUTPUT_FILE: &str = "output_24khz.wav";

#[derive(Debug, Clone)]
pub struct FfmpegDecoder {
    binary: PathBuf,
}

impl Default for FfmpegDecoder {
    fn default() -> Self {
        Self::new(FFMPEG_BINARY)
    }
}

impl FfmpegDecoder {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Check that the binary can be started at all.
    pub fn probe(&self) -> Result<String> {
        let output = Command::new(&self.binary)
            .arg("-version")
            .output()
            .map_err(|e| self.unavailable(e))?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(stdout.lines().next().unwrap_or_default().to_string())
    }

    fn unavailable(&self, e: std::io::Error) -> RelayError {
        RelayError::ToolUnavailable {
            message: format!("failed to run {}: {e}", self.binary.display()),
        }
    }

    fn convert(&self, input: &Path, output: &Path) -> Result<()> {
        let result = Command::new(&self.binary)
            .args(["-nostdin", "-hide_banner", "-loglevel", "error", "-y", "-i"])
            .arg(input)
            .args([
                "-ar",
                &TARGET_SAMPLE_RATE.to_string(),
                "-ac",
                &TARGET_CHANNELS.to_string(),
                "-sample_fmt",
                "s16",
            ])
            .arg(output)
            .output()
            .map_err(|e| self.unavailable(e))?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            let reason = stderr.trim();
            return Err(RelayError::Decode {
                message: if reason.is_empty() {
                    format!("ffmpeg exited with {}", result.status)
                } else {
                    format!("ffmpeg failed: {reason}")
                },
            });
        }
        Ok(())
    }
}

impl Decoder for FfmpegDecoder {
    fn decode(&self, asset: &AudioAsset) -> Result<DecodedAudio> {
        let scratch = tempfile::Builder::new()
            .prefix("encodec-relay-")
            .tempdir()
            .map_err(|e| RelayError::ToolUnavailable {
                message: format!("failed to create scratch directory: {e}"),
            })?;

        let input = scratch
            .path()
            .join(format!("input.{}", asset.extension().unwrap_or("bin")));
        let output = scratch.path().join(OUTPUT_FILE);
        fs::write(&input, asset.bytes())?;

        self.convert(&input, &output)?;

        let file = File::open(&output).map_err(|e| RelayError::Decode {
            message: format!("ffmpeg produced no output: {e}"),
        })?;
        let decoded = wav::read_wav(BufReader::new(file))?;

        tracing::debug!(
            decoder = self.name(),
            scratch = %scratch.path().display(),
            samples = decoded.samples.len(),
            "decoded audio"
        );

        Ok(decoded)
    }

    fn name(&self) -> &str {
        "ffmpeg"
    }
}
