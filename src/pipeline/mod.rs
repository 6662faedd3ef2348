//! Encoding pipeline: one asset in, one resource locator (or one failure) out.
//!
//! Stages run strictly in order on a single logical task; CPU-bound stages
//! are moved to the blocking pool so the caller's executor stays responsive.

pub mod orchestrator;
pub mod state;

pub use orchestrator::PipelineOrchestrator;
pub use state::{PipelineEvent, PipelineFailure, PipelineState, Stage};
