//! Audio intake: raw asset → decoded samples → fixed-profile PCM.
//!
//! Every run goes through [`AudioNormalizer`], which guarantees the
//! 24 kHz / mono / 16-bit profile the model was exported for.

pub mod asset;
pub mod decoder;
pub mod ffmpeg;
pub mod normalizer;
pub mod pcm;
pub mod wav;

pub use asset::AudioAsset;
pub use decoder::{DecodedAudio, Decoder, SymphoniaDecoder};
pub use ffmpeg::FfmpegDecoder;
pub use normalizer::AudioNormalizer;
pub use pcm::PcmBuffer;
