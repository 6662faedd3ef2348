//! Neural codec inference.
//!
//! The model is an opaque function: one audio input, two ordered outputs
//! (codec tokens, then audio scales).

pub mod engine;
pub mod onnx;

pub use engine::{InferenceEngine, InferenceOutput, OutputTensor, StubEngine, TensorData};
pub use onnx::OnnxEngine;
