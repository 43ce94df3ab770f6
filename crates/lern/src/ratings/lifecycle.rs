use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{CompetencyId, RaterType, Rating, RatingId, RatingScore, RatingState, UserId};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RatingError {
    #[error("rating '{0}' is already completed")]
    AlreadyCompleted(RatingId),
    #[error("a rating request must ask for a self rating or name a master rater")]
    NothingRequested,
}

/// Blank comments are not stored.
pub fn normalize_comment(comment: Option<String>) -> Option<String> {
    comment
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

impl Rating {
    pub fn pending(
        id: RatingId,
        learner_id: UserId,
        competency_id: CompetencyId,
        rater_id: UserId,
        rater_type: RaterType,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            learner_id,
            competency_id,
            rater_id,
            rater_type,
            state: RatingState::Pending,
            created_at: now,
            updated_at: None,
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn completed(
        id: RatingId,
        learner_id: UserId,
        competency_id: CompetencyId,
        rater_id: UserId,
        rater_type: RaterType,
        score: RatingScore,
        comment: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            learner_id,
            competency_id,
            rater_id,
            rater_type,
            state: RatingState::Completed {
                score,
                comment: normalize_comment(comment),
            },
            created_at: now,
            updated_at: None,
        }
    }

    /// Move a pending rating to completed. A completed rating is left untouched.
    pub fn complete(
        &mut self,
        score: RatingScore,
        comment: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), RatingError> {
        if !self.is_pending() {
            return Err(RatingError::AlreadyCompleted(self.id.clone()));
        }

        self.state = RatingState::Completed {
            score,
            comment: normalize_comment(comment),
        };
        self.updated_at = Some(now);
        Ok(())
    }
}

/// Ask the learner and/or a master to rate one competency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingRequest {
    pub learner_id: UserId,
    pub competency_id: CompetencyId,
    #[serde(default)]
    pub request_self: bool,
    #[serde(default)]
    pub master_id: Option<UserId>,
}

impl RatingRequest {
    pub fn is_empty(&self) -> bool {
        !self.request_self && self.master_id.is_none()
    }

    /// Pending ratings for each requested rater; ids are drawn from `next_id` in order.
    pub fn into_pending<F, E>(self, now: DateTime<Utc>, mut next_id: F) -> Result<Vec<Rating>, E>
    where
        F: FnMut() -> Result<RatingId, E>,
        E: From<RatingError>,
    {
        if self.is_empty() {
            return Err(RatingError::NothingRequested.into());
        }

        let mut ratings = Vec::with_capacity(2);
        if self.request_self {
            ratings.push(Rating::pending(
                next_id()?,
                self.learner_id.clone(),
                self.competency_id.clone(),
                self.learner_id.clone(),
                RaterType::SelfAssessment,
                now,
            ));
        }
        if let Some(master_id) = self.master_id {
            ratings.push(Rating::pending(
                next_id()?,
                self.learner_id,
                self.competency_id,
                master_id,
                RaterType::Master,
                now,
            ));
        }

        Ok(ratings)
    }
}

/// An educator's immediate rating, optionally asking for self and master ratings too.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MentorRating {
    pub learner_id: UserId,
    pub competency_id: CompetencyId,
    pub score: RatingScore,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub request_self: bool,
    #[serde(default)]
    pub master_id: Option<UserId>,
}

impl MentorRating {
    /// The completed mentor rating first, followed by any requested pending ratings.
    pub fn into_ratings<F, E>(
        self,
        educator_id: &UserId,
        now: DateTime<Utc>,
        mut next_id: F,
    ) -> Result<Vec<Rating>, E>
    where
        F: FnMut() -> Result<RatingId, E>,
        E: From<RatingError>,
    {
        let mentor = Rating::completed(
            next_id()?,
            self.learner_id.clone(),
            self.competency_id.clone(),
            educator_id.clone(),
            RaterType::Mentor,
            self.score,
            self.comment,
            now,
        );

        let request = RatingRequest {
            learner_id: self.learner_id,
            competency_id: self.competency_id,
            request_self: self.request_self,
            master_id: self.master_id,
        };

        let mut ratings = vec![mentor];
        if !request.is_empty() {
            ratings.extend(request.into_pending(now, next_id)?);
        }
        Ok(ratings)
    }
}
