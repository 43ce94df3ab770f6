use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::{
    Artifact, Competency, CompetencyId, CompetencyType, Organization, RaterType, Rating,
    RatingScore, User, UserId,
};

use super::aggregate::{aggregate_by_competency, CompetencyAggregate};
use super::ordering::apply_display_order;
use super::visibility::filter_hidden;

/// Public header information for a learner.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LearnerSummary {
    pub learner_id: UserId,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
}

/// Rating as shown publicly; rater identities are not exposed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RatingView {
    pub rater_type: RaterType,
    pub score: RatingScore,
    pub score_label: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioEntry {
    pub competency_id: CompetencyId,
    pub title: String,
    pub description: String,
    pub kind: CompetencyType,
    pub average: f64,
    pub rating_count: usize,
    pub rater_types: Vec<RaterType>,
    pub ratings: Vec<RatingView>,
    pub artifacts: Vec<Artifact>,
}

impl PortfolioEntry {
    fn from_aggregate(aggregate: CompetencyAggregate, artifacts: &[Artifact]) -> Self {
        let rater_types = aggregate.rater_types();
        let rating_count = aggregate.count();
        let artifacts = artifacts
            .iter()
            .filter(|artifact| artifact.evidences(&aggregate.competency.id))
            .cloned()
            .collect();
        let ratings = aggregate
            .ratings
            .iter()
            .filter_map(|rating| {
                let score = rating.score()?;
                Some(RatingView {
                    rater_type: rating.rater_type,
                    score,
                    score_label: score.label(),
                    comment: rating.comment().map(str::to_string),
                    created_at: rating.created_at,
                })
            })
            .collect();

        let Competency {
            id,
            title,
            description,
            kind,
            ..
        } = aggregate.competency;

        Self {
            competency_id: id,
            title,
            description,
            kind,
            average: aggregate.average,
            rating_count,
            rater_types,
            ratings,
            artifacts,
        }
    }
}

/// A learner's public profile: visible competencies in display order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublicPortfolio {
    pub learner: LearnerSummary,
    pub competencies: Vec<PortfolioEntry>,
}

impl PublicPortfolio {
    /// Aggregate the learner's ratings, drop hidden competencies, then apply the
    /// learner's display order. Ratings and artifacts for other learners are ignored.
    pub fn build(
        learner: &User,
        organization: Option<&Organization>,
        ratings: &[Rating],
        competencies: &[Competency],
        artifacts: &[Artifact],
    ) -> Self {
        let own_ratings: Vec<Rating> = ratings
            .iter()
            .filter(|rating| rating.learner_id == learner.id)
            .cloned()
            .collect();
        let own_artifacts: Vec<Artifact> = artifacts
            .iter()
            .filter(|artifact| artifact.learner_id == learner.id)
            .cloned()
            .collect();

        let aggregates = aggregate_by_competency(&own_ratings, competencies);
        let visible = filter_hidden(aggregates, learner.hidden_competency_ids.as_deref());
        let ordered = apply_display_order(visible, learner.competency_display_order.as_deref());

        Self {
            learner: LearnerSummary {
                learner_id: learner.id.clone(),
                display_name: learner.display_name.clone(),
                organization: organization.map(|organization| organization.name.clone()),
            },
            competencies: ordered
                .into_iter()
                .map(|aggregate| PortfolioEntry::from_aggregate(aggregate, &own_artifacts))
                .collect(),
        }
    }
}
