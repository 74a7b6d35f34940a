//! Signals and their execution records.

pub mod execution;
pub mod model;

pub use execution::{ExecutionRecord, ExecutionStatus, ExecutionUpdate};
pub use model::{
    ArtifactLinks, IntakeResponse, IntakeStatus, RawSignal, Signal, SignalMetadata, SignalSource,
    SignalStatus, SignalUpdate, StepSummary,
};
