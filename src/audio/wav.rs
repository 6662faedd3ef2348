//! WAV reading and writing.
//!
//! Used to read back the external decoder's output and to synthesize
//! in-memory fixtures.

use crate::audio::decoder::DecodedAudio;
use crate::error::{RelayError, Result};
use std::io::{Cursor, Read};

/// Parse a WAV stream into interleaved `f32` samples in `[-1, 1]`.
///
/// Accepts integer PCM from 8 to 32 bits and 32-bit float.
pub fn read_wav<R: Read>(reader: R) -> Result<DecodedAudio> {
    let wav_reader = hound::WavReader::new(reader).map_err(|e| RelayError::Decode {
        message: format!("Failed to parse WAV file: {}", e),
    })?;

    let spec = wav_reader.spec();
    if spec.channels == 0 {
        return Err(RelayError::Decode {
            message: "WAV file declares zero channels".to_string(),
        });
    }

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => wav_reader
            .into_samples::<f32>()
            .collect::<std::result::Result<Vec<_>, _>>(),
        hound::SampleFormat::Int => {
            let scale = int_scale(spec.bits_per_sample)?;
            wav_reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<std::result::Result<Vec<_>, _>>()
        }
    }
    .map_err(|e| RelayError::Decode {
        message: format!("Failed to read WAV samples: {}", e),
    })?;

    Ok(DecodedAudio {
        samples,
        sample_rate: spec.sample_rate,
        channels: spec.channels,
    })
}

/// Full-scale magnitude of a signed integer sample of the given width.
fn int_scale(bits_per_sample: u16) -> Result<f32> {
    match bits_per_sample {
        1..=32 => Ok((1i64 << (bits_per_sample - 1)) as f32),
        other => Err(RelayError::Decode {
            message: format!("WAV file declares unsupported bit depth {other}"),
        }),
    }
}

/// Encode 16-bit interleaved samples as an in-memory WAV file.
pub fn encode_wav(samples: &[i16], sample_rate: u32, channels: u16) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    let mut writer = hound::WavWriter::new(&mut cursor, spec).map_err(wav_write_error)?;
    for &s in samples {
        writer.write_sample(s).map_err(wav_write_error)?;
    }
    writer.finalize().map_err(wav_write_error)?;
    Ok(cursor.into_inner())
}

fn wav_write_error(e: hound::Error) -> RelayError {
    match e {
        hound::Error::IoError(io) => RelayError::Io(io),
        other => RelayError::Decode {
            message: format!("Failed to write WAV data: {}", other),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_wav_16bit_mono_scales_to_unit_range() {
        let wav_data = encode_wav(&[0, 16384, -32768], 24000, 1).unwrap();

        let decoded = read_wav(Cursor::new(wav_data)).unwrap();

        assert_eq!(decoded.sample_rate, 24000);
        assert_eq!(decoded.channels, 1);
        assert_eq!(decoded.samples, vec![0.0, 0.5, -1.0]);
    }

    #[test]
    fn read_wav_keeps_stereo_interleaved() {
        let wav_data = encode_wav(&[100, 200, 300, 400], 44100, 2).unwrap();

        let decoded = read_wav(Cursor::new(wav_data)).unwrap();

        assert_eq!(decoded.channels, 2);
        assert_eq!(decoded.sample_rate, 44100);
        assert_eq!(decoded.samples.len(), 4);
        assert!(decoded.samples[0] < decoded.samples[1]);
    }

    #[test]
    fn read_wav_float_samples() {
        let mut cursor = Cursor::new(Vec::new());
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 48000,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for s in [0.25f32, -0.75] {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();

        let decoded = read_wav(Cursor::new(cursor.into_inner())).unwrap();
        assert_eq!(decoded.samples, vec![0.25, -0.75]);
    }

    #[test]
    fn read_wav_24bit_samples() {
        let mut cursor = Cursor::new(Vec::new());
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 96000,
            bits_per_sample: 24,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        writer.write_sample(4_194_304i32).unwrap();
        writer.finalize().unwrap();

        let decoded = read_wav(Cursor::new(cursor.into_inner())).unwrap();
        assert_eq!(decoded.samples, vec![0.5]);
    }

    #[test]
    fn int_scale_rejects_zero_and_oversized_bit_depths() {
        assert_eq!(int_scale(16).unwrap(), 32768.0);
        assert_eq!(int_scale(8).unwrap(), 128.0);
        for bits in [0, 33, 64] {
            match int_scale(bits) {
                Err(RelayError::Decode { message }) => {
                    assert!(message.contains("unsupported bit depth"), "{message}");
                }
                other => panic!("expected Decode error for {bits} bits, got {other:?}"),
            }
        }
    }

    #[test]
    fn invalid_wav_data_returns_error() {
        let invalid_data = vec![0u8, 1, 2, 3, 4, 5];

        let result = read_wav(Cursor::new(invalid_data));

        match result {
            Err(RelayError::Decode { message }) => {
                assert!(message.contains("Failed to parse WAV file"));
            }
            _ => panic!("Expected Decode error"),
        }
    }

    #[test]
    fn empty_wav_data_returns_error() {
        assert!(read_wav(Cursor::new(Vec::new())).is_err());
    }

    #[test]
    fn test_malformed_wav_missing_riff_header() {
        let bad_data = b"XXXX\x00\x00\x00\x00WAVEfmt ";
        let result = read_wav(Cursor::new(bad_data.to_vec()));

        assert!(result.is_err(), "Should reject WAV without RIFF header");
    }

    #[test]
    fn test_malformed_wav_missing_fmt_chunk() {
        let no_fmt = b"RIFF\x24\x00\x00\x00WAVEdata\x10\x00\x00\x00\x00\x00\x00\x00";
        let result = read_wav(Cursor::new(no_fmt.to_vec()));

        assert!(result.is_err(), "Should reject WAV without fmt chunk");
    }

    #[test]
    fn test_malformed_wav_random_garbage() {
        let garbage: Vec<u8> = (0..500).map(|i| ((i * 17 + 42) % 256) as u8).collect();

        let result = read_wav(Cursor::new(garbage));

        assert!(result.is_err(), "Should reject random garbage as WAV");
    }

    #[test]
    fn encode_wav_empty_is_valid() {
        let wav_data = encode_wav(&[], 24000, 1).unwrap();
        let decoded = read_wav(Cursor::new(wav_data)).unwrap();
        assert!(decoded.samples.is_empty());
    }
}
