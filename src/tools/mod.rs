//! External tool capability: closed action set, adapters, retry.

pub mod action;
pub mod adapter;
pub mod retry;
pub mod router;
pub mod simulated;
pub mod toolset;

pub use action::{ToolAction, ToolKind};
pub use adapter::{ToolAdapter, ToolResponse};
pub use retry::{Retried, RetryExhausted, RetryOn, RetryPolicy, with_retry};
pub use router::ToolRouterAdapter;
pub use simulated::SimulatedAdapter;
pub use toolset::ToolSet;
