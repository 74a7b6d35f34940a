//! Score bands: presentation and routing keyed off the final score.

use serde::{Deserialize, Serialize};

/// Critical ≥ 9, High ≥ 7, Medium ≥ 5, Low otherwise. Lower bounds are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorityBand {
    Low,
    Medium,
    High,
    Critical,
}

impl PriorityBand {
    pub fn from_score(score: f64) -> Self {
        if score >= 9.0 {
            Self::Critical
        } else if score >= 7.0 {
            Self::High
        } else if score >= 5.0 {
            Self::Medium
        } else {
            Self::Low
        }
    }

    /// Prefix of the generated summary.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Critical => "CRITICAL",
            Self::High => "HIGH PRIORITY",
            Self::Medium => "MEDIUM",
            Self::Low => "LOW",
        }
    }

    pub fn recommended_action(&self) -> &'static str {
        match self {
            Self::Critical => "Immediate executive escalation and emergency response required",
            Self::High => "Urgent team action required within 1 hour",
            Self::Medium => "Standard response required within 4 hours",
            Self::Low => "Standard review and response",
        }
    }

    /// Task-board lane name.
    pub fn lane(&self) -> &'static str {
        match self {
            Self::Critical => "Critical",
            Self::High => "High Priority",
            Self::Medium => "Medium Priority",
            Self::Low => "Low Priority",
        }
    }

    /// Chat alert emoji.
    pub fn emoji(&self) -> &'static str {
        match self {
            Self::Critical => "🚨",
            Self::High => "⚠️",
            Self::Medium => "📌",
            Self::Low => "ℹ️",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundaries_are_inclusive_lower() {
        assert_eq!(PriorityBand::from_score(10.0), PriorityBand::Critical);
        assert_eq!(PriorityBand::from_score(9.0), PriorityBand::Critical);
        assert_eq!(PriorityBand::from_score(8.99), PriorityBand::High);
        assert_eq!(PriorityBand::from_score(7.0), PriorityBand::High);
        assert_eq!(PriorityBand::from_score(6.99), PriorityBand::Medium);
        assert_eq!(PriorityBand::from_score(5.0), PriorityBand::Medium);
        assert_eq!(PriorityBand::from_score(4.99), PriorityBand::Low);
        assert_eq!(PriorityBand::from_score(0.0), PriorityBand::Low);
    }

    #[test]
    fn emoji_and_lane_follow_band() {
        assert_eq!(PriorityBand::Critical.emoji(), "🚨");
        assert_eq!(PriorityBand::High.emoji(), "⚠️");
        assert_eq!(PriorityBand::Medium.lane(), "Medium Priority");
        assert_eq!(PriorityBand::Low.label(), "LOW");
    }
}
