//! Signal orchestration: the per-signal pipeline, its step payloads, and
//! the background monitor.

pub mod engine;
pub mod fanout;
pub mod monitor;

pub use engine::OrchestrationEngine;
pub use monitor::{MonitorHandle, run_cycle, spawn_monitor};
