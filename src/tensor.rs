//! Conversion between PCM buffers and model tensors.

use crate::audio::pcm::PcmBuffer;
use crate::config::ModelConfig;
use crate::error::{RelayError, Result};
use crate::inference::{InferenceOutput, OutputTensor};
use ndarray::Array3;

/// Model input of shape `[1, 1, N]`: batch, channel, samples.
///
/// Sample values are the raw 16-bit integers cast to `f32`, not rescaled.
#[derive(Debug, Clone, PartialEq)]
pub struct InputTensor {
    array: Array3<f32>,
}

impl InputTensor {
    pub fn shape(&self) -> [usize; 3] {
        let (batch, channels, samples) = self.array.dim();
        [batch, channels, samples]
    }

    pub fn len(&self) -> usize {
        self.array.len()
    }

    pub fn is_empty(&self) -> bool {
        self.array.is_empty()
    }

    pub fn values(&self) -> impl Iterator<Item = &f32> {
        self.array.iter()
    }

    pub fn into_array(self) -> Array3<f32> {
        self.array
    }
}

/// Build the `[1, 1, N]` input tensor for a normalized buffer.
///
/// # Errors
/// `Shape` if the buffer is empty.
pub fn to_input_tensor(pcm: &PcmBuffer) -> Result<InputTensor> {
    if pcm.is_empty() {
        return Err(RelayError::Shape {
            message: "cannot build an input tensor from zero samples".to_string(),
        });
    }

    let values: Vec<f32> = pcm.samples().iter().map(|&s| f32::from(s)).collect();
    let array = Array3::from_shape_vec((1, 1, values.len()), values).map_err(|e| {
        RelayError::Shape {
            message: e.to_string(),
        }
    })?;

    Ok(InputTensor { array })
}

/// The two model outputs the downstream service expects.
#[derive(Debug, Clone, PartialEq)]
pub struct CodecOutputs {
    pub tokens: OutputTensor,
    pub scales: OutputTensor,
}

/// How raw outputs map onto tokens and scales.
///
/// Outputs are always taken by position (tokens first, scales second). A
/// configured name additionally asserts what the model calls that position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputBinding {
    pub tokens: Option<String>,
    pub scales: Option<String>,
}

impl OutputBinding {
    pub fn positional() -> Self {
        Self::default()
    }

    pub fn named(tokens: &str, scales: &str) -> Self {
        Self {
            tokens: Some(tokens.to_string()),
            scales: Some(scales.to_string()),
        }
    }

    pub fn from_config(config: &ModelConfig) -> Self {
        Self {
            tokens: config.tokens_output.clone(),
            scales: config.scales_output.clone(),
        }
    }
}

/// Converts between pipeline buffers and the engine's tensor types.
#[derive(Debug, Clone, Default)]
pub struct TensorAdapter {
    binding: OutputBinding,
}

impl TensorAdapter {
    pub fn new(binding: OutputBinding) -> Self {
        Self { binding }
    }

    pub fn binding(&self) -> &OutputBinding {
        &self.binding
    }

    pub fn to_input_tensor(&self, pcm: &PcmBuffer) -> Result<InputTensor> {
        to_input_tensor(pcm)
    }

    /// Split raw outputs into tokens and scales.
    ///
    /// # Errors
    /// `MissingOutput` if fewer than two outputs exist or a configured name
    /// does not match the output at its position.
    pub fn from_outputs(&self, raw: InferenceOutput) -> Result<CodecOutputs> {
        let total = raw.len();
        let mut outputs = raw.into_vec().into_iter();

        let tokens = take_output(outputs.next(), 0, "tokens", self.binding.tokens.as_deref(), total)?;
        let scales = take_output(outputs.next(), 1, "scales", self.binding.scales.as_deref(), total)?;

        let extra: Vec<String> = outputs.map(|(name, _)| name).collect();
        if !extra.is_empty() {
            tracing::debug!(?extra, "ignoring additional model outputs");
        }

        Ok(CodecOutputs { tokens, scales })
    }
}

fn take_output(
    entry: Option<(String, OutputTensor)>,
    position: usize,
    role: &str,
    expected: Option<&str>,
    total: usize,
) -> Result<OutputTensor> {
    let (name, tensor) = entry.ok_or_else(|| RelayError::MissingOutput {
        message: format!(
            "model produced {total} output(s), {role} expected at position {position}"
        ),
    })?;

    if let Some(expected) = expected
        && expected != name
    {
        return Err(RelayError::MissingOutput {
            message: format!(
                "expected {role} output '{expected}' at position {position}, model declares '{name}'"
            ),
        });
    }

    Ok(tensor)
}
