//! Run states, stages, and events of the encoding pipeline.

use crate::error::{ErrorKind, FailureCategory, RelayError};
use crate::remote::ResourceLocator;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// One step of a run. Stages execute strictly in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Admission of a new run.
    Trigger,
    Normalize,
    PrepareTensor,
    Inference,
    Serialize,
    Submit,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Trigger => "trigger",
            Stage::Normalize => "normalize",
            Stage::PrepareTensor => "prepare tensor",
            Stage::Inference => "inference",
            Stage::Serialize => "serialize",
            Stage::Submit => "submit",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The single surfaced failure of a run: which stage failed and why.
#[derive(Debug, Clone, Error)]
#[error("{stage} failed: {error}")]
pub struct PipelineFailure {
    pub stage: Stage,
    pub error: Arc<RelayError>,
}

impl PipelineFailure {
    pub fn new(stage: Stage, error: RelayError) -> Self {
        Self {
            stage,
            error: Arc::new(error),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.error.kind()
    }

    pub fn category(&self) -> FailureCategory {
        self.error.category()
    }
}

/// Orchestrator state machine.
///
/// `Idle -> Running -> Succeeded | Failed`; terminal states return to `Idle`
/// on acknowledgement or move straight to `Running` on the next trigger.
#[derive(Debug, Clone, Default)]
pub enum PipelineState {
    #[default]
    Idle,
    Running,
    Succeeded(ResourceLocator),
    Failed(PipelineFailure),
}

impl PipelineState {
    pub fn is_running(&self) -> bool {
        matches!(self, PipelineState::Running)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Succeeded(_) | PipelineState::Failed(_))
    }

    pub fn name(&self) -> &'static str {
        match self {
            PipelineState::Idle => "idle",
            PipelineState::Running => "running",
            PipelineState::Succeeded(_) => "succeeded",
            PipelineState::Failed(_) => "failed",
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineState::Succeeded(locator) => write!(f, "succeeded ({locator})"),
            PipelineState::Failed(failure) => write!(f, "failed ({failure})"),
            other => f.write_str(other.name()),
        }
    }
}

/// Transition notifications published to an optional observer channel.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    Started,
    StageStarted(Stage),
    StageCompleted { stage: Stage, elapsed: Duration },
    Succeeded(ResourceLocator),
    Failed(PipelineFailure),
    /// The caller dropped the run before it finished.
    Cancelled,
    /// A terminal state was acknowledged.
    Reset,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_display_names_stage_and_cause() {
        let failure = PipelineFailure::new(
            Stage::Serialize,
            RelayError::RangeOverflow {
                index: 3,
                value: "1152921504606846976".to_string(),
            },
        );

        assert_eq!(
            failure.to_string(),
            "serialize failed: Value 1152921504606846976 at index 3 exceeds the safe integer range"
        );
        assert_eq!(failure.kind().as_str(), "RangeOverflowError");
        assert_eq!(failure.category(), FailureCategory::Invariant);
    }

    #[test]
    fn busy_failure_is_trigger_stage() {
        let failure = PipelineFailure::new(Stage::Trigger, RelayError::Busy);
        assert_eq!(
            failure.to_string(),
            "trigger failed: A pipeline run is already in progress"
        );
        assert_eq!(failure.kind(), ErrorKind::Busy);
    }

    #[test]
    fn state_predicates() {
        assert!(!PipelineState::Idle.is_running());
        assert!(PipelineState::Running.is_running());
        assert!(!PipelineState::Running.is_terminal());
        assert!(PipelineState::Succeeded(ResourceLocator::new("a.wav")).is_terminal());
        assert!(
            PipelineState::Failed(PipelineFailure::new(Stage::Submit, RelayError::Busy))
                .is_terminal()
        );
    }

    #[test]
    fn state_display() {
        assert_eq!(PipelineState::default().to_string(), "idle");
        assert_eq!(
            PipelineState::Succeeded(ResourceLocator::new("out/x.wav")).to_string(),
            "succeeded (out/x.wav)"
        );
    }

    #[test]
    fn stage_names() {
        assert_eq!(Stage::PrepareTensor.to_string(), "prepare tensor");
        assert_eq!(Stage::Inference.as_str(), "inference");
    }
}
