//! Persistence layer: libSQL-backed storage for signals and execution records.

pub mod libsql_backend;
pub mod migrations;
pub mod traits;

pub use libsql_backend::LibSqlBackend;
pub use traits::{SignalFilter, SignalStats, SignalStore};
