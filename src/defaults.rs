//! Default configuration constants for encodec-relay.
//!
//! Shared by the config types, the normalizer, and the codec so the fixed
//! audio profile and service contract live in one place.

/// Sample rate the EnCodec model was exported for, in Hz.
pub const TARGET_SAMPLE_RATE: u32 = 24000;

/// Channel count the model expects.
pub const TARGET_CHANNELS: u16 = 1;

/// Bit depth of normalized PCM samples.
pub const TARGET_BITS_PER_SAMPLE: u16 = 16;

/// Largest integer that survives a round trip through a JSON number (2^53 - 1).
pub const MAX_SAFE_INTEGER: i64 = (1 << 53) - 1;

/// Smallest integer that survives a round trip through a JSON number.
pub const MIN_SAFE_INTEGER: i64 = -MAX_SAFE_INTEGER;

/// Default path of the pretrained model artifact.
pub const DEFAULT_MODEL_PATH: &str = "encodec_model.onnx";

/// Default base address of the decoding/storage service.
pub const DEFAULT_SERVICE_URL: &str = "http://127.0.0.1:8000";

/// Path of the encode endpoint, relative to the service base address.
pub const ENCODE_ENDPOINT: &str = "encode";

/// Default timeout for the encode request, in seconds.
///
/// Large inputs produce large payloads; the service decodes before replying.
pub const REQUEST_TIMEOUT_SECS: u64 = 60;

/// Default external decoder binary.
pub const FFMPEG_BINARY: &str = "ffmpeg";

/// Report the execution provider compiled into this build.
///
/// Returns a human-readable name based on the compile-time feature flags.
/// If no accelerator feature is enabled, returns "CPU".
pub fn execution_backend() -> &'static str {
    if cfg!(feature = "cuda") {
        "CUDA"
    } else if cfg!(feature = "coreml") {
        "CoreML"
    } else if cfg!(feature = "directml") {
        "DirectML"
    } else {
        "CPU"
    }
}
