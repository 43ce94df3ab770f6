use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{CompetencyId, RatingId, UserId};

/// Score on the 0-4 rubric scale. Defaults to 0 (no evidence).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "u8", into = "u8")]
pub struct RatingScore(u8);

impl RatingScore {
    pub const MAX: u8 = 4;

    pub fn new(value: u8) -> Result<Self, InvalidScore> {
        if value <= Self::MAX {
            Ok(Self(value))
        } else {
            Err(InvalidScore(i64::from(value)))
        }
    }

    pub const fn value(self) -> u8 {
        self.0
    }

    pub const fn label(self) -> &'static str {
        match self.0 {
            0 => "No evidence",
            1 => "Beginning",
            2 => "Developing",
            3 => "Proficient",
            _ => "Expert",
        }
    }
}

impl TryFrom<u8> for RatingScore {
    type Error = InvalidScore;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<i64> for RatingScore {
    type Error = InvalidScore;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        u8::try_from(value)
            .map_err(|_| InvalidScore(value))
            .and_then(Self::new)
    }
}

impl From<RatingScore> for u8 {
    fn from(score: RatingScore) -> Self {
        score.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("rating score {0} is outside the 0-4 scale")]
pub struct InvalidScore(pub i64);

/// Who provided the rating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RaterType {
    #[serde(rename = "self")]
    SelfAssessment,
    #[serde(rename = "mentor")]
    Mentor,
    #[serde(rename = "master")]
    Master,
}

impl RaterType {
    pub const fn label(self) -> &'static str {
        match self {
            RaterType::SelfAssessment => "self",
            RaterType::Mentor => "mentor",
            RaterType::Master => "master",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "self" => Some(RaterType::SelfAssessment),
            "mentor" | "educator" => Some(RaterType::Mentor),
            "master" | "industry_expert" => Some(RaterType::Master),
            _ => None,
        }
    }
}

/// Lifecycle of a rating. A score only exists once the rating is completed.
///
/// Persisted flat next to the other rating fields as `status`, `score`, and `comment`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RatingState {
    Pending,
    Completed {
        score: RatingScore,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        comment: Option<String>,
    },
}

impl RatingState {
    pub const fn label(&self) -> &'static str {
        match self {
            RatingState::Pending => "pending",
            RatingState::Completed { .. } => "completed",
        }
    }
}

/// One rater's assessment of one learner on one competency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub id: RatingId,
    pub learner_id: UserId,
    pub competency_id: CompetencyId,
    pub rater_id: UserId,
    pub rater_type: RaterType,
    #[serde(flatten)]
    pub state: RatingState,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Rating {
    pub fn score(&self) -> Option<RatingScore> {
        match &self.state {
            RatingState::Completed { score, .. } => Some(*score),
            RatingState::Pending => None,
        }
    }

    pub fn comment(&self) -> Option<&str> {
        match &self.state {
            RatingState::Completed { comment, .. } => comment.as_deref(),
            RatingState::Pending => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, RatingState::Pending)
    }
}
