//! Grading results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::agent::AgentId;

/// Weight of the objective-achievement score in the overall grade.
pub const WEIGHT_OBJECTIVE: f64 = 0.35;
/// Weight of the conversation-quality score.
pub const WEIGHT_QUALITY: f64 = 0.30;
/// Weight of the human-interaction score.
pub const WEIGHT_HUMAN: f64 = 0.20;
/// Weight of the volume/activity score.
pub const WEIGHT_VOLUME: f64 = 0.15;

/// The four rubric scores, each on a 0-100 scale.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RubricScores {
    pub objective: f64,
    pub quality: f64,
    pub human: f64,
    pub volume: f64,
}

impl RubricScores {
    /// Weighted overall score.
    pub fn overall(&self) -> f64 {
        self.objective * WEIGHT_OBJECTIVE
            + self.quality * WEIGHT_QUALITY
            + self.human * WEIGHT_HUMAN
            + self.volume * WEIGHT_VOLUME
    }
}

/// A persisted grade for one agent in one grading run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grade {
    pub id: i64,
    pub agent_id: AgentId,
    pub run_id: String,
    pub objective_score: f64,
    pub quality_score: f64,
    pub human_score: f64,
    pub volume_score: f64,
    pub overall_score: f64,
    pub reasoning: String,
    pub total_messages: i64,
    pub total_conversations: i64,
    pub human_interactions: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewGrade {
    pub agent_id: AgentId,
    pub run_id: String,
    pub scores: RubricScores,
    pub reasoning: String,
    pub total_messages: i64,
    pub total_conversations: i64,
    pub human_interactions: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weights_sum_to_one() {
        let sum = WEIGHT_OBJECTIVE + WEIGHT_QUALITY + WEIGHT_HUMAN + WEIGHT_VOLUME;
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_overall_is_weighted() {
        let scores = RubricScores { objective: 80.0, quality: 60.0, human: 50.0, volume: 100.0 };
        let expected = 80.0 * 0.35 + 60.0 * 0.30 + 50.0 * 0.20 + 100.0 * 0.15;
        assert!((scores.overall() - expected).abs() < 1e-9);
        assert!((RubricScores::default().overall()).abs() < f64::EPSILON);
    }
}
