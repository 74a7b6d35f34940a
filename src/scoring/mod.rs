//! Priority scoring and score bands.

pub mod band;
pub mod scorer;

pub use band::PriorityBand;
pub use scorer::{PriorityScorer, RuleScorer, ScoreOutcome};
