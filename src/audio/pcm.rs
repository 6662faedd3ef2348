//! Fixed-profile PCM buffer handed from the normalizer to the tensor adapter.

use crate::defaults::{TARGET_BITS_PER_SAMPLE, TARGET_CHANNELS, TARGET_SAMPLE_RATE};
use crate::error::{RelayError, Result};
use std::time::Duration;

/// Decoded audio at exactly 24000 Hz, one channel, 16-bit signed samples.
///
/// The profile is not stored: it is a property of the type. A buffer at any
/// other rate or channel count cannot be constructed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PcmBuffer {
    samples: Vec<i16>,
}

impl PcmBuffer {
    /// Wrap samples that are already at the target profile.
    pub fn from_samples(samples: Vec<i16>) -> Self {
        Self { samples }
    }

    /// Wrap samples whose profile is reported by an external source.
    ///
    /// Fails with [`RelayError::Decode`] if the reported profile differs from
    /// the target in any way.
    pub fn from_profile(
        samples: Vec<i16>,
        sample_rate: u32,
        channels: u16,
        bits_per_sample: u16,
    ) -> Result<Self> {
        if sample_rate != TARGET_SAMPLE_RATE
            || channels != TARGET_CHANNELS
            || bits_per_sample != TARGET_BITS_PER_SAMPLE
        {
            return Err(RelayError::Decode {
                message: format!(
                    "expected {TARGET_SAMPLE_RATE} Hz, {TARGET_CHANNELS} channel, \
                     {TARGET_BITS_PER_SAMPLE}-bit PCM, got {sample_rate} Hz, \
                     {channels} channel(s), {bits_per_sample}-bit"
                ),
            });
        }
        Ok(Self { samples })
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn sample_rate(&self) -> u32 {
        TARGET_SAMPLE_RATE
    }

    pub fn channels(&self) -> u16 {
        TARGET_CHANNELS
    }

    pub fn bits_per_sample(&self) -> u16 {
        TARGET_BITS_PER_SAMPLE
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.samples.len() as f64 / f64::from(TARGET_SAMPLE_RATE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_is_fixed() {
        let pcm = PcmBuffer::from_samples(vec![0; 10]);
        assert_eq!(pcm.sample_rate(), 24000);
        assert_eq!(pcm.channels(), 1);
        assert_eq!(pcm.bits_per_sample(), 16);
        assert_eq!(pcm.len(), 10);
    }

    #[test]
    fn from_profile_accepts_exact_match() {
        let pcm = PcmBuffer::from_profile(vec![1, 2, 3], 24000, 1, 16).unwrap();
        assert_eq!(pcm.samples(), &[1, 2, 3]);
    }

    #[test]
    fn from_profile_rejects_any_deviation() {
        for (rate, channels, bits) in [(16000, 1, 16), (24000, 2, 16), (24000, 1, 24)] {
            let result = PcmBuffer::from_profile(vec![0; 4], rate, channels, bits);
            match result {
                Err(RelayError::Decode { message }) => {
                    assert!(message.contains("expected 24000 Hz"), "{message}");
                }
                other => panic!("expected Decode error, got {other:?}"),
            }
        }
    }

    #[test]
    fn duration_matches_sample_count() {
        let pcm = PcmBuffer::from_samples(vec![0; 36000]);
        assert_eq!(pcm.duration(), Duration::from_millis(1500));
    }
}
