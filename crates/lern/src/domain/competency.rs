use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{CompetencyId, OrganizationId, UserId};
use super::rating::RatingScore;

/// Whether the competency describes a technical or an interpersonal skill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompetencyType {
    Hard,
    Soft,
}

/// Descriptions attached to each point of the 0-4 scale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RubricScale {
    pub no_evidence: String,
    pub beginning: String,
    pub developing: String,
    pub proficient: String,
    pub expert: String,
}

impl RubricScale {
    pub fn describe(&self, score: RatingScore) -> &str {
        match score.value() {
            0 => &self.no_evidence,
            1 => &self.beginning,
            2 => &self.developing,
            3 => &self.proficient,
            _ => &self.expert,
        }
    }
}

impl Default for RubricScale {
    fn default() -> Self {
        Self {
            no_evidence: "No evidence".to_string(),
            beginning: "Beginning".to_string(),
            developing: "Developing".to_string(),
            proficient: "Proficient".to_string(),
            expert: "Expert".to_string(),
        }
    }
}

/// A skill or trait an educator defined for rating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Competency {
    pub id: CompetencyId,
    pub org_id: OrganizationId,
    pub created_by: UserId,
    pub title: String,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: CompetencyType,
    #[serde(default)]
    pub rubric: RubricScale,
    pub created_at: DateTime<Utc>,
}
