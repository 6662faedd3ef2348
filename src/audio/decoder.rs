//! Container/codec decoding.

use crate::audio::asset::AudioAsset;
use crate::error::{RelayError, Result};
use std::io::Cursor;
use std::sync::Arc;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CODEC_TYPE_NULL, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Raw decoded audio at its native rate and channel layout.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    /// Interleaved samples in `[-1, 1]`.
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl DecodedAudio {
    /// Number of frames (samples per channel).
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / self.channels as usize
        }
    }
}

/// Trait for turning an audio file into raw samples.
///
/// This trait allows swapping implementations (in-process vs external tool vs mock).
pub trait Decoder: Send + Sync {
    /// Decode the whole asset.
    ///
    /// # Errors
    /// `Decode` if the bytes are not audio, `ToolUnavailable` if the
    /// decoding engine itself cannot be started.
    fn decode(&self, asset: &AudioAsset) -> Result<DecodedAudio>;

    /// Short name for logs.
    fn name(&self) -> &str;
}

impl<T: Decoder> Decoder for Arc<T> {
    fn decode(&self, asset: &AudioAsset) -> Result<DecodedAudio> {
        (**self).decode(asset)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// In-process decoder backed by symphonia.
#[derive(Debug, Clone, Copy, Default)]
pub struct SymphoniaDecoder;

impl SymphoniaDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl Decoder for SymphoniaDecoder {
    fn decode(&self, asset: &AudioAsset) -> Result<DecodedAudio> {
        let source = Cursor::new(asset.shared_bytes());
        let mss = MediaSourceStream::new(Box::new(source), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = asset.extension() {
            hint.with_extension(ext);
        }
        if let Some(mime) = asset.mime() {
            hint.mime_type(mime);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| RelayError::Decode {
                message: format!("unrecognized audio format: {e}"),
            })?;
        let mut format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| RelayError::Decode {
                message: "no decodable audio track".to_string(),
            })?;
        let track_id = track.id;
        let mut sample_rate = track.codec_params.sample_rate;
        let mut channels = track.codec_params.channels.map(|c| c.count() as u16);

        let mut decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| RelayError::Decode {
                message: format!("unsupported codec: {e}"),
            })?;

        let mut samples = Vec::new();
        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                Err(SymphoniaError::ResetRequired) => break,
                Err(e) => {
                    return Err(RelayError::Decode {
                        message: format!("failed to read packet: {e}"),
                    });
                }
            };

            if packet.track_id() != track_id {
                continue;
            }

            match decoder.decode(&packet) {
                Ok(decoded) => {
                    let spec = *decoded.spec();
                    sample_rate.get_or_insert(spec.rate);
                    channels.get_or_insert(spec.channels.count() as u16);

                    let mut buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                    buf.copy_interleaved_ref(decoded);
                    samples.extend_from_slice(buf.samples());
                }
                Err(SymphoniaError::DecodeError(msg)) => {
                    tracing::warn!(reason = msg, "skipping undecodable packet");
                }
                Err(e) => {
                    return Err(RelayError::Decode {
                        message: format!("decoder failed: {e}"),
                    });
                }
            }
        }

        let sample_rate = sample_rate.ok_or_else(|| RelayError::Decode {
            message: "stream does not declare a sample rate".to_string(),
        })?;
        let channels = channels.unwrap_or(1);

        tracing::debug!(
            decoder = self.name(),
            sample_rate,
            channels,
            samples = samples.len(),
            "decoded audio"
        );

        Ok(DecodedAudio {
            samples,
            sample_rate,
            channels,
        })
    }

    fn name(&self) -> &str {
        "symphonia"
    }
}

/// Decoder returning fixed audio, for tests and dry runs.
#[derive(Debug, Clone)]
pub struct MockDecoder {
    audio: DecodedAudio,
    failure: Option<String>,
}

impl MockDecoder {
    /// Create a mock that returns the given audio for every asset.
    pub fn new(audio: DecodedAudio) -> Self {
        Self {
            audio,
            failure: None,
        }
    }

    /// Configure the mock to fail with a decode error.
    pub fn with_failure(mut self, message: &str) -> Self {
        self.failure = Some(message.to_string());
        self
    }
}

impl Decoder for MockDecoder {
    fn decode(&self, _asset: &AudioAsset) -> Result<DecodedAudio> {
        match &self.failure {
            Some(message) => Err(RelayError::Decode {
                message: message.clone(),
            }),
            None => Ok(self.audio.clone()),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}
