//! Rule-based priority scoring.
//!
//! Base score 5.0 plus fixed weights for each independent rule that fires,
//! capped at 10.0. Summary and recommended action come from the band of
//! the capped score.

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ScoringError;
use crate::scoring::band::PriorityBand;
use crate::signal::model::{Signal, truncate_chars};

pub const BASE_SCORE: f64 = 5.0;
pub const MAX_SCORE: f64 = 10.0;

/// Score used when a scorer faults.
pub const FALLBACK_SCORE: f64 = 5.0;

const DEFAULT_REASONING: &str = "Standard priority based on content analysis";
const SUMMARY_SUBJECT_CHARS: usize = 100;

/// Scorer output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreOutcome {
    pub score: f64,
    pub summary: String,
    pub reasoning: String,
    pub recommended_action: String,
}

impl ScoreOutcome {
    /// Neutral outcome substituted when scoring fails.
    pub fn fallback() -> Self {
        Self {
            score: FALLBACK_SCORE,
            summary: "Analysis failed".into(),
            reasoning: "Priority analysis failed".into(),
            recommended_action: "Manual review required".into(),
        }
    }

    pub fn band(&self) -> PriorityBand {
        PriorityBand::from_score(self.score)
    }
}

/// Maps a signal to a score, summary, reasoning and action.
///
/// Implementations are synchronous and free of I/O; the engine runs them on
/// the blocking pool and absorbs any error or panic.
pub trait PriorityScorer: Send + Sync {
    fn name(&self) -> &str;

    fn score(&self, signal: &Signal) -> Result<ScoreOutcome, ScoringError>;
}

// ── Rules ───────────────────────────────────────────────────────────

/// What makes a rule fire.
#[derive(Debug, Clone)]
pub enum RuleTrigger {
    /// Case-insensitive substring match on subject or description.
    Keywords(Regex),
    /// Numeric metadata value strictly greater than the threshold.
    MetadataAbove { key: &'static str, threshold: f64 },
    /// `escalation_level == "executive"` or an executive sender.
    ExecutiveEscalation,
}

/// How a fired rule describes itself in the reasoning.
#[derive(Debug, Clone)]
pub enum RuleReason {
    Fixed(&'static str),
    /// "High revenue impact: ${value}/hour"
    RevenuePerHour,
    /// "{value} users affected"
    UsersAffected,
}

/// One additive scoring rule.
#[derive(Debug, Clone)]
pub struct ScoringRule {
    pub name: &'static str,
    pub trigger: RuleTrigger,
    pub weight: f64,
    pub reason: RuleReason,
}

fn keywords(words: &[&str]) -> Regex {
    let alternation = words
        .iter()
        .map(|w| regex::escape(w))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!("(?i)({alternation})")).expect("keyword regex is valid")
}

/// Executive senders: "ceo" or "cto" anywhere in the sender.
fn executive_sender() -> Regex {
    Regex::new(r"(?i)(ceo|cto)").expect("sender regex is valid")
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

/// Deterministic rule table scorer.
pub struct RuleScorer {
    rules: Vec<ScoringRule>,
    executive_sender: Regex,
}

impl RuleScorer {
    /// The standard operations rule table, applied in this order.
    pub fn default_rules() -> Self {
        let rules = vec![
            ScoringRule {
                name: "critical_keywords",
                trigger: RuleTrigger::Keywords(keywords(&[
                    "emergency",
                    "critical",
                    "down",
                    "outage",
                    "crash",
                    "failed",
                ])),
                weight: 4.0,
                reason: RuleReason::Fixed("Critical system issue detected"),
            },
            ScoringRule {
                name: "urgent_keywords",
                trigger: RuleTrigger::Keywords(keywords(&["urgent", "asap", "immediate", "escalation"])),
                weight: 3.0,
                reason: RuleReason::Fixed("Urgent action required"),
            },
            ScoringRule {
                name: "negative_sentiment",
                trigger: RuleTrigger::Keywords(keywords(&[
                    "angry",
                    "unacceptable",
                    "disappointed",
                    "terrible",
                    "awful",
                    "frustrated",
                ])),
                weight: 2.0,
                reason: RuleReason::Fixed("Negative customer sentiment"),
            },
            ScoringRule {
                name: "revenue_impact",
                trigger: RuleTrigger::MetadataAbove {
                    key: "revenue_loss_per_hour",
                    threshold: 5000.0,
                },
                weight: 2.0,
                reason: RuleReason::RevenuePerHour,
            },
            ScoringRule {
                name: "executive_escalation",
                trigger: RuleTrigger::ExecutiveEscalation,
                weight: 1.0,
                reason: RuleReason::Fixed("Executive escalation"),
            },
            ScoringRule {
                name: "wide_impact",
                trigger: RuleTrigger::MetadataAbove {
                    key: "affected_users",
                    threshold: 100.0,
                },
                weight: 1.0,
                reason: RuleReason::UsersAffected,
            },
            ScoringRule {
                name: "repeat_complaint",
                trigger: RuleTrigger::MetadataAbove {
                    key: "complaint_count",
                    threshold: 2.0,
                },
                weight: 1.0,
                reason: RuleReason::Fixed("Repeat complaint"),
            },
        ];

        Self {
            rules,
            executive_sender: executive_sender(),
        }
    }

    /// Scorer with no rules: every signal gets the base score.
    pub fn empty() -> Self {
        Self {
            rules: Vec::new(),
            executive_sender: executive_sender(),
        }
    }

    pub fn with_rule(mut self, rule: ScoringRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn rules(&self) -> &[ScoringRule] {
        &self.rules
    }

    fn fires(&self, rule: &ScoringRule, signal: &Signal) -> bool {
        match &rule.trigger {
            RuleTrigger::Keywords(re) => re.is_match(&signal.subject) || re.is_match(&signal.description),
            RuleTrigger::MetadataAbove { key, threshold } => signal
                .metadata
                .number(key)
                .is_some_and(|v| v > *threshold),
            RuleTrigger::ExecutiveEscalation => {
                signal.metadata.text("escalation_level") == Some("executive")
                    || self.executive_sender.is_match(&signal.sender)
            }
        }
    }

    fn describe(rule: &ScoringRule, signal: &Signal) -> String {
        match &rule.reason {
            RuleReason::Fixed(text) => (*text).to_string(),
            RuleReason::RevenuePerHour => format!(
                "High revenue impact: ${}/hour",
                format_number(signal.metadata.number("revenue_loss_per_hour").unwrap_or(0.0))
            ),
            RuleReason::UsersAffected => format!(
                "{} users affected",
                format_number(signal.metadata.number("affected_users").unwrap_or(0.0))
            ),
        }
    }

    /// Infallible scoring; [`PriorityScorer::score`] wraps this.
    pub fn evaluate(&self, signal: &Signal) -> ScoreOutcome {
        let mut score = BASE_SCORE;
        let mut reasons = Vec::new();

        for rule in &self.rules {
            if self.fires(rule, signal) {
                score += rule.weight;
                reasons.push(Self::describe(rule, signal));
                debug!(signal_id = %signal.id, rule = rule.name, weight = rule.weight, "Scoring rule fired");
            }
        }

        let score = score.min(MAX_SCORE);
        let band = PriorityBand::from_score(score);
        let subject = truncate_chars(&signal.subject.to_lowercase(), SUMMARY_SUBJECT_CHARS);

        let reasoning = if reasons.is_empty() {
            DEFAULT_REASONING.to_string()
        } else {
            reasons.join(" | ")
        };

        ScoreOutcome {
            score,
            summary: format!("{}: {subject}", band.label()),
            reasoning,
            recommended_action: band.recommended_action().to_string(),
        }
    }
}

impl Default for RuleScorer {
    fn default() -> Self {
        Self::default_rules()
    }
}

impl PriorityScorer for RuleScorer {
    fn name(&self) -> &str {
        "rules"
    }

    fn score(&self, signal: &Signal) -> Result<ScoreOutcome, ScoringError> {
        Ok(self.evaluate(signal))
    }
}
