//! Audio normalization to the model's fixed input profile.

use crate::audio::asset::AudioAsset;
use crate::audio::decoder::{Decoder, SymphoniaDecoder};
use crate::audio::ffmpeg::FfmpegDecoder;
use crate::audio::pcm::PcmBuffer;
use crate::config::{AudioConfig, DecoderBackend};
use crate::defaults::{TARGET_BITS_PER_SAMPLE, TARGET_CHANNELS, TARGET_SAMPLE_RATE};
use crate::error::{RelayError, Result};

/// Decodes any supported input and re-encodes it as 24 kHz mono 16-bit PCM.
///
/// Conversion is deterministic: the same bytes always produce the same
/// samples, regardless of backend state.
pub struct AudioNormalizer {
    decoder: Box<dyn Decoder>,
}

impl AudioNormalizer {
    pub fn new(decoder: Box<dyn Decoder>) -> Self {
        Self { decoder }
    }

    /// Build the normalizer for the configured decoder backend.
    pub fn from_config(config: &AudioConfig) -> Self {
        let decoder: Box<dyn Decoder> = match config.decoder {
            DecoderBackend::Symphonia => Box::new(SymphoniaDecoder::new()),
            DecoderBackend::Ffmpeg => Box::new(FfmpegDecoder::new(config.ffmpeg_path.clone())),
        };
        Self::new(decoder)
    }

    pub fn decoder_name(&self) -> &str {
        self.decoder.name()
    }

    /// Decode, down-mix, resample and quantize.
    ///
    /// # Errors
    /// `Decode` if the input is not audio, `ToolUnavailable` if the decoder
    /// backend cannot start.
    pub fn normalize(&self, asset: &AudioAsset) -> Result<PcmBuffer> {
        let decoded = self.decoder.decode(asset)?;

        if decoded.channels == 0 {
            return Err(RelayError::Decode {
                message: "audio has no channels".to_string(),
            });
        }
        if decoded.sample_rate == 0 {
            return Err(RelayError::Decode {
                message: "audio declares a sample rate of 0 Hz".to_string(),
            });
        }

        let mono = downmix(&decoded.samples, decoded.channels);
        let resampled = resample(&mono, decoded.sample_rate, TARGET_SAMPLE_RATE);
        let samples = quantize(&resampled);

        let pcm = PcmBuffer::from_profile(
            samples,
            TARGET_SAMPLE_RATE,
            TARGET_CHANNELS,
            TARGET_BITS_PER_SAMPLE,
        )?;

        tracing::debug!(
            source_rate = decoded.sample_rate,
            source_channels = decoded.channels,
            samples = pcm.len(),
            duration_ms = pcm.duration().as_millis() as u64,
            "normalized audio"
        );

        Ok(pcm)
    }
}

/// Average interleaved channels into one.
pub fn downmix(samples: &[f32], channels: u16) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    let channels = channels as usize;
    samples
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Linear interpolation resampling.
///
/// Positions are computed with integer arithmetic so the output length is
/// exactly `ceil(len * to_rate / from_rate)`.
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let from = u64::from(from_rate);
    let to = u64::from(to_rate);
    let output_len = (samples.len() as u64 * to).div_ceil(from) as usize;

    (0..output_len)
        .map(|i| {
            let numerator = i as u64 * from;
            let source_idx = (numerator / to) as usize;
            let fraction = (numerator % to) as f64 / to as f64;

            if source_idx + 1 >= samples.len() {
                samples[samples.len() - 1]
            } else {
                let left = f64::from(samples[source_idx]);
                let right = f64::from(samples[source_idx + 1]);
                (left + (right - left) * fraction) as f32
            }
        })
        .collect()
}

/// Convert `[-1, 1]` floats to 16-bit signed samples, saturating at the ends.
pub fn quantize(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|&s| (s * 32768.0).round().clamp(-32768.0, 32767.0) as i16)
        .collect()
}
