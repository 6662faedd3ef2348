use crate::error::{RelayError, Result};
use crate::tensor::InputTensor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Element storage of one model output, kept in its native width.
#[derive(Debug, Clone, PartialEq)]
pub enum TensorData {
    I64(Vec<i64>),
    U64(Vec<u64>),
    I32(Vec<i32>),
    F32(Vec<f32>),
    F64(Vec<f64>),
}

impl TensorData {
    pub fn len(&self) -> usize {
        match self {
            TensorData::I64(v) => v.len(),
            TensorData::U64(v) => v.len(),
            TensorData::I32(v) => v.len(),
            TensorData::F32(v) => v.len(),
            TensorData::F64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn element_type(&self) -> &'static str {
        match self {
            TensorData::I64(_) => "int64",
            TensorData::U64(_) => "uint64",
            TensorData::I32(_) => "int32",
            TensorData::F32(_) => "float32",
            TensorData::F64(_) => "float64",
        }
    }
}

/// One named model output: row-major data plus its shape.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputTensor {
    pub shape: Vec<usize>,
    pub data: TensorData,
}

impl OutputTensor {
    pub fn new(shape: Vec<usize>, data: TensorData) -> Self {
        Self { shape, data }
    }

    /// 1-D int64 tensor.
    pub fn from_i64(values: Vec<i64>) -> Self {
        Self::new(vec![values.len()], TensorData::I64(values))
    }

    /// 1-D float32 tensor.
    pub fn from_f32(values: Vec<f32>) -> Self {
        Self::new(vec![values.len()], TensorData::F32(values))
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Model outputs in the order the model declares them.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InferenceOutput {
    outputs: Vec<(String, OutputTensor)>,
}

impl InferenceOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_output(mut self, name: &str, tensor: OutputTensor) -> Self {
        self.push(name.to_string(), tensor);
        self
    }

    pub fn push(&mut self, name: String, tensor: OutputTensor) {
        self.outputs.push((name, tensor));
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.outputs.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    pub fn into_vec(self) -> Vec<(String, OutputTensor)> {
        self.outputs
    }
}

/// Trait for running the neural codec encoder.
///
/// This trait allows swapping implementations (real ONNX session vs stub).
pub trait InferenceEngine: Send + Sync {
    /// Run one forward pass.
    ///
    /// The tensor is bound to the model's first declared input. Outputs are
    /// returned in declared order. Identical inputs produce identical outputs.
    fn run(&self, input: InputTensor) -> Result<InferenceOutput>;

    /// Declared input names, in order.
    fn input_names(&self) -> &[String];

    /// Declared output names, in order.
    fn output_names(&self) -> &[String];

    /// Get the name of the loaded model
    fn model_name(&self) -> &str;
}

/// Implement InferenceEngine for Arc<T> to allow sharing across runs.
impl<T: InferenceEngine> InferenceEngine for Arc<T> {
    fn run(&self, input: InputTensor) -> Result<InferenceOutput> {
        (**self).run(input)
    }

    fn input_names(&self) -> &[String] {
        (**self).input_names()
    }

    fn output_names(&self) -> &[String] {
        (**self).output_names()
    }

    fn model_name(&self) -> &str {
        (**self).model_name()
    }
}

/// Engine returning canned outputs, for tests and offline runs.
#[derive(Debug)]
pub struct StubEngine {
    input_names: Vec<String>,
    output_names: Vec<String>,
    outputs: InferenceOutput,
    failure: Option<String>,
    calls: AtomicUsize,
    last_shape: Mutex<Option<[usize; 3]>>,
}

impl StubEngine {
    /// Create a stub whose outputs are `tokens` (int64) and `scales` (float32).
    pub fn new(tokens: Vec<i64>, scales: Vec<f32>) -> Self {
        Self::with_outputs(
            InferenceOutput::new()
                .with_output("encoded_frames", OutputTensor::from_i64(tokens))
                .with_output("encoded_scales", OutputTensor::from_f32(scales)),
        )
    }

    /// Create a stub returning arbitrary outputs.
    pub fn with_outputs(outputs: InferenceOutput) -> Self {
        Self {
            input_names: vec!["input_values".to_string()],
            output_names: outputs.names().map(str::to_string).collect(),
            outputs,
            failure: None,
            calls: AtomicUsize::new(0),
            last_shape: Mutex::new(None),
        }
    }

    /// Configure the stub to fail every run with an inference error.
    pub fn with_failure(mut self, message: &str) -> Self {
        self.failure = Some(message.to_string());
        self
    }

    /// How many times `run` was called.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Shape of the most recent input tensor.
    pub fn last_input_shape(&self) -> Option<[usize; 3]> {
        self.last_shape.lock().ok().and_then(|guard| *guard)
    }
}

impl InferenceEngine for StubEngine {
    fn run(&self, input: InputTensor) -> Result<InferenceOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut guard) = self.last_shape.lock() {
            *guard = Some(input.shape());
        }
        match &self.failure {
            Some(message) => Err(RelayError::Inference {
                message: message.clone(),
            }),
            None => Ok(self.outputs.clone()),
        }
    }

    fn input_names(&self) -> &[String] {
        &self.input_names
    }

    fn output_names(&self) -> &[String] {
        &self.output_names
    }

    fn model_name(&self) -> &str {
        "stub"
    }
}
