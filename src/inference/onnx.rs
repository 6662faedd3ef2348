//! ONNX Runtime backed engine.

use crate::error::{RelayError, Result};
use crate::inference::engine::{InferenceEngine, InferenceOutput, OutputTensor, TensorData};
use crate::tensor::InputTensor;
use ort::session::Session;
use ort::session::builder::{GraphOptimizationLevel, SessionBuilder};
use ort::value::{DynValue, Tensor};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Loaded encoder session.
///
/// The session is guarded by a mutex, so concurrent callers queue instead of
/// overlapping inside ONNX Runtime.
pub struct OnnxEngine {
    session: Mutex<Session>,
    path: PathBuf,
    model_name: String,
    input_names: Vec<String>,
    output_names: Vec<String>,
}

impl std::fmt::Debug for OnnxEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxEngine")
            .field("path", &self.path)
            .field("input_names", &self.input_names)
            .field("output_names", &self.output_names)
            .finish_non_exhaustive()
    }
}

impl OnnxEngine {
    /// Load a model from disk.
    ///
    /// # Errors
    /// `ModelLoad` if the file is missing, corrupt, or declares no input.
    /// `MissingOutput` if it declares fewer than two outputs.
    pub fn load(path: &Path, intra_threads: Option<usize>) -> Result<Self> {
        if !path.is_file() {
            return Err(load_error(path, "model file not found"));
        }

        tracing::info!(model = %path.display(), "loading model");

        let session = session_builder(path, intra_threads)?
            .commit_from_file(path)
            .map_err(|e| load_error(path, e))?;

        let input_names: Vec<String> = session.inputs.iter().map(|i| i.name.clone()).collect();
        let output_names: Vec<String> = session.outputs.iter().map(|o| o.name.clone()).collect();

        if input_names.is_empty() {
            return Err(load_error(path, "model declares no inputs"));
        }
        if output_names.len() < 2 {
            return Err(RelayError::MissingOutput {
                message: format!(
                    "{} declares {} output(s), expected tokens and scales",
                    path.display(),
                    output_names.len()
                ),
            });
        }

        let model_name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        tracing::debug!(?input_names, ?output_names, "model loaded");

        Ok(Self {
            session: Mutex::new(session),
            path: path.to_path_buf(),
            model_name,
            input_names,
            output_names,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn load_error(path: &Path, message: impl std::fmt::Display) -> RelayError {
    RelayError::ModelLoad {
        path: path.display().to_string(),
        message: message.to_string(),
    }
}

fn inference_error(message: impl std::fmt::Display) -> RelayError {
    RelayError::Inference {
        message: message.to_string(),
    }
}

fn session_builder(path: &Path, intra_threads: Option<usize>) -> Result<SessionBuilder> {
    let mut builder = Session::builder()
        .map_err(|e| load_error(path, e))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| load_error(path, e))?;

    if let Some(threads) = intra_threads {
        builder = builder
            .with_intra_threads(threads)
            .map_err(|e| load_error(path, e))?;
    }

    builder
        .with_execution_providers([
            #[cfg(feature = "cuda")]
            ort::execution_providers::CUDAExecutionProvider::default().build(),
            #[cfg(feature = "directml")]
            ort::execution_providers::DirectMLExecutionProvider::default().build(),
            #[cfg(feature = "coreml")]
            ort::execution_providers::CoreMLExecutionProvider::default().build(),
        ])
        .map_err(|e| load_error(path, e))
}

/// Copy an output out of the session, keeping its element type.
fn extract(name: &str, value: &DynValue) -> Result<OutputTensor> {
    if let Ok(view) = value.try_extract_array::<i64>() {
        return Ok(OutputTensor::new(
            view.shape().to_vec(),
            TensorData::I64(view.iter().copied().collect()),
        ));
    }
    if let Ok(view) = value.try_extract_array::<f32>() {
        return Ok(OutputTensor::new(
            view.shape().to_vec(),
            TensorData::F32(view.iter().copied().collect()),
        ));
    }
    if let Ok(view) = value.try_extract_array::<i32>() {
        return Ok(OutputTensor::new(
            view.shape().to_vec(),
            TensorData::I32(view.iter().copied().collect()),
        ));
    }
    if let Ok(view) = value.try_extract_array::<u64>() {
        return Ok(OutputTensor::new(
            view.shape().to_vec(),
            TensorData::U64(view.iter().copied().collect()),
        ));
    }
    if let Ok(view) = value.try_extract_array::<f64>() {
        return Ok(OutputTensor::new(
            view.shape().to_vec(),
            TensorData::F64(view.iter().copied().collect()),
        ));
    }
    Err(inference_error(format!(
        "output '{name}' has an unsupported element type"
    )))
}

impl InferenceEngine for OnnxEngine {
    fn run(&self, input: InputTensor) -> Result<InferenceOutput> {
        let input_name = self
            .input_names
            .first()
            .ok_or_else(|| inference_error("model declares no inputs"))?;
        let shape = input.shape();
        let tensor = Tensor::from_array(input.into_array()).map_err(inference_error)?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| inference_error("session lock poisoned"))?;
        let mut outputs = session
            .run(ort::inputs![input_name.as_str() => tensor])
            .map_err(|e| inference_error(format!("forward pass failed for input {shape:?}: {e}")))?;

        let mut result = InferenceOutput::new();
        for name in &self.output_names {
            let value = outputs
                .remove(name.as_str())
                .ok_or_else(|| RelayError::MissingOutput {
                    message: format!("session returned no value for output '{name}'"),
                })?;
            result.push(name.clone(), extract(name, &value)?);
        }

        Ok(result)
    }

    fn input_names(&self) -> &[String] {
        &self.input_names
    }

    fn output_names(&self) -> &[String] {
        &self.output_names
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::PcmBuffer;
    use crate::tensor::to_input_tensor;

    #[test]
    fn missing_model_is_model_load_error() {
        let path = Path::new("/nonexistent/encodec_model.onnx");

        match OnnxEngine::load(path, None) {
            Err(RelayError::ModelLoad { path: p, message }) => {
                assert_eq!(p, "/nonexistent/encodec_model.onnx");
                assert!(message.contains("not found"), "{message}");
            }
            other => panic!("expected ModelLoad, got {other:?}"),
        }
    }

    #[test]
    fn directory_is_not_a_model() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            OnnxEngine::load(dir.path(), None),
            Err(RelayError::ModelLoad { .. })
        ));
    }

    #[test]
    fn corrupt_model_is_model_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("encodec_model.onnx");
        std::fs::write(&path, b"this is not a protobuf graph").unwrap();

        assert!(matches!(
            OnnxEngine::load(&path, None),
            Err(RelayError::ModelLoad { .. })
        ));
    }

    // Hand-encoded ONNX protobuf: field numbers follow onnx.proto.
    fn varint(mut value: u64, out: &mut Vec<u8>) {
        loop {
            let byte = (value & 0x7f) as u8;
            value >>= 7;
            if value == 0 {
                out.push(byte);
                return;
            }
            out.push(byte | 0x80);
        }
    }

    fn int_field(field: u64, value: u64) -> Vec<u8> {
        let mut out = Vec::new();
        varint(field << 3, &mut out);
        varint(value, &mut out);
        out
    }

    fn bytes_field(field: u64, payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        varint((field << 3) | 2, &mut out);
        varint(payload.len() as u64, &mut out);
        out.extend_from_slice(payload);
        out
    }

    fn str_field(field: u64, value: &str) -> Vec<u8> {
        bytes_field(field, value.as_bytes())
    }

    const FLOAT: u64 = 1;
    const INT64: u64 = 7;

    /// Tensor value info of shape `[1, 1, samples]`.
    fn value_info(name: &str, elem_type: u64) -> Vec<u8> {
        let shape = [
            bytes_field(1, &int_field(1, 1)),
            bytes_field(1, &int_field(1, 1)),
            bytes_field(1, &str_field(2, "samples")),
        ]
        .concat();
        let tensor_type = [int_field(1, elem_type), bytes_field(2, &shape)].concat();
        [str_field(1, name), bytes_field(2, &bytes_field(1, &tensor_type))].concat()
    }

    fn node(op_type: &str, input: &str, output: &str, attribute: Option<Vec<u8>>) -> Vec<u8> {
        let mut node = [
            str_field(1, input),
            str_field(2, output),
            str_field(3, output),
            str_field(4, op_type),
        ]
        .concat();
        if let Some(attribute) = attribute {
            node.extend(bytes_field(5, &attribute));
        }
        node
    }

    /// `audio_in` (float) -> `codes` (Cast to int64), `scales` (Identity).
    fn fixture_model(with_scales: bool) -> Vec<u8> {
        let cast_to = [str_field(1, "to"), int_field(3, INT64), int_field(20, 2)].concat();
        let mut graph = [
            bytes_field(1, &node("Cast", "audio_in", "codes", Some(cast_to))),
            str_field(2, "encoder_fixture"),
            bytes_field(11, &value_info("audio_in", FLOAT)),
            bytes_field(12, &value_info("codes", INT64)),
        ]
        .concat();
        if with_scales {
            graph.extend(bytes_field(1, &node("Identity", "audio_in", "scales", None)));
            graph.extend(bytes_field(12, &value_info("scales", FLOAT)));
        }
        [
            int_field(1, 8),
            str_field(2, "encodec-relay-tests"),
            bytes_field(7, &graph),
            bytes_field(8, &int_field(2, 13)),
        ]
        .concat()
    }

    fn write_fixture(dir: &tempfile::TempDir, with_scales: bool) -> PathBuf {
        let path = dir.path().join("encoder_fixture.onnx");
        std::fs::write(&path, fixture_model(with_scales)).unwrap();
        path
    }

    #[test]
    fn fixture_model_runs_with_declared_names_and_types() {
        let dir = tempfile::tempdir().unwrap();
        let engine = OnnxEngine::load(&write_fixture(&dir, true), Some(1)).unwrap();

        assert_eq!(engine.input_names().to_vec(), vec!["audio_in".to_string()]);
        assert_eq!(
            engine.output_names().to_vec(),
            vec!["codes".to_string(), "scales".to_string()]
        );
        assert_eq!(engine.model_name(), "encoder_fixture");

        let input = to_input_tensor(&PcmBuffer::from_samples(vec![1, -2, 3])).unwrap();
        let outputs = engine.run(input).unwrap().into_vec();

        assert_eq!(outputs.len(), 2);
        assert_eq!(outputs[0].0, "codes");
        assert_eq!(outputs[0].1.shape, vec![1, 1, 3]);
        assert_eq!(outputs[0].1.data, TensorData::I64(vec![1, -2, 3]));
        assert_eq!(outputs[1].0, "scales");
        assert_eq!(outputs[1].1.shape, vec![1, 1, 3]);
        assert_eq!(outputs[1].1.data, TensorData::F32(vec![1.0, -2.0, 3.0]));
    }

    #[test]
    fn loaded_session_is_reused_across_runs() {
        let dir = tempfile::tempdir().unwrap();
        let engine = OnnxEngine::load(&write_fixture(&dir, true), None).unwrap();

        let first = engine
            .run(to_input_tensor(&PcmBuffer::from_samples(vec![7; 5])).unwrap())
            .unwrap();
        let second = engine
            .run(to_input_tensor(&PcmBuffer::from_samples(vec![7; 5])).unwrap())
            .unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn single_output_model_is_missing_output() {
        let dir = tempfile::tempdir().unwrap();

        match OnnxEngine::load(&write_fixture(&dir, false), None) {
            Err(RelayError::MissingOutput { message }) => {
                assert!(message.contains("1 output(s)"), "{message}");
            }
            other => panic!("expected MissingOutput, got {other:?}"),
        }
    }

    #[test]
    fn load_error_keeps_path_and_message() {
        let err = load_error(Path::new("m.onnx"), "bad magic");
        assert_eq!(
            err.to_string(),
            "Failed to load model from m.onnx: bad magic"
        );
    }
}
