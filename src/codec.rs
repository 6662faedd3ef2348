//! Range-checked conversion of model outputs into JSON numbers.
//!
//! JSON consumers parse numbers as IEEE doubles, so integers outside
//! `[-(2^53 - 1), 2^53 - 1]` would arrive corrupted. Every value is checked
//! here; out-of-range values fail the whole conversion instead of being
//! clamped or wrapped.

use crate::defaults::{MAX_SAFE_INTEGER, MIN_SAFE_INTEGER};
use crate::error::{RelayError, Result};
use crate::inference::TensorData;
use crate::tensor::CodecOutputs;
use serde::{Deserialize, Serialize};
use serde_json::Number;
use std::fmt::Display;

/// An element type that may be converted to a JSON-safe number.
pub trait SafeNumber: Copy + Display {
    /// `None` if the value cannot be represented without loss.
    fn to_safe(self) -> Option<Number>;
}

impl SafeNumber for i64 {
    fn to_safe(self) -> Option<Number> {
        (MIN_SAFE_INTEGER..=MAX_SAFE_INTEGER)
            .contains(&self)
            .then(|| Number::from(self))
    }
}

impl SafeNumber for u64 {
    fn to_safe(self) -> Option<Number> {
        (self <= MAX_SAFE_INTEGER as u64).then(|| Number::from(self))
    }
}

impl SafeNumber for i32 {
    fn to_safe(self) -> Option<Number> {
        Some(Number::from(self))
    }
}

impl SafeNumber for f64 {
    fn to_safe(self) -> Option<Number> {
        if !self.is_finite() || self.abs() > MAX_SAFE_INTEGER as f64 {
            return None;
        }
        Number::from_f64(self)
    }
}

impl SafeNumber for f32 {
    fn to_safe(self) -> Option<Number> {
        f64::from(self).to_safe()
    }
}

/// Convert every element, failing on the first one outside the safe range.
///
/// # Errors
/// `RangeOverflow` naming the offending index and value.
pub fn to_safe_numbers<T: SafeNumber>(values: &[T]) -> Result<Vec<Number>> {
    values
        .iter()
        .enumerate()
        .map(|(index, &value)| {
            value.to_safe().ok_or_else(|| RelayError::RangeOverflow {
                index,
                value: value.to_string(),
            })
        })
        .collect()
}

/// [`to_safe_numbers`] over whatever element type the model produced.
pub fn tensor_to_safe_numbers(data: &TensorData) -> Result<Vec<Number>> {
    match data {
        TensorData::I64(v) => to_safe_numbers(v),
        TensorData::U64(v) => to_safe_numbers(v),
        TensorData::I32(v) => to_safe_numbers(v),
        TensorData::F32(v) => to_safe_numbers(v),
        TensorData::F64(v) => to_safe_numbers(v),
    }
}

/// Request body of the encode endpoint.
///
/// Field order is part of the wire format: `encoded_data` first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafePayload {
    pub encoded_data: Vec<Number>,
    pub audio_scales: Vec<Number>,
}

impl SafePayload {
    /// Build the payload from tokens and scales, checking every value.
    pub fn from_outputs(outputs: &CodecOutputs) -> Result<Self> {
        let encoded_data = tensor_to_safe_numbers(&outputs.tokens.data)?;
        let audio_scales = tensor_to_safe_numbers(&outputs.scales.data)?;

        tracing::debug!(
            tokens = encoded_data.len(),
            scales = audio_scales.len(),
            "payload serialized"
        );

        Ok(Self {
            encoded_data,
            audio_scales,
        })
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| RelayError::Shape {
            message: format!("failed to serialize payload: {e}"),
        })
    }
}
