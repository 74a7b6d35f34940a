//! Ops Command: signal scoring and multi-tool orchestration.

pub mod api;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod scoring;
pub mod signal;
pub mod sources;
pub mod store;
pub mod tools;
