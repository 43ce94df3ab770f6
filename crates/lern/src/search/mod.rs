//! Talent search: learners whose averages meet every requested threshold.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::domain::{Competency, CompetencyId, Rating, RatingScore, User, UserId};
use crate::portfolio::{aggregate_by_competency, is_hidden};

/// Minimum average a learner must hold on one competency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchCriterion {
    pub competency_id: CompetencyId,
    pub min_rating: f64,
}

/// How hidden competencies take part in search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HiddenPolicy {
    /// A hidden competency never satisfies a criterion.
    #[default]
    ExcludeHidden,
    /// Hidden competencies are matched like visible ones.
    IgnoreHidden,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SearchOptions {
    #[serde(default)]
    pub hidden_policy: HiddenPolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchedCompetency {
    pub competency: Competency,
    pub average: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LearnerMatch {
    pub learner: User,
    pub matched_competencies: Vec<MatchedCompetency>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SearchError {
    #[error("at least one search criterion is required")]
    NoCriteria,
    #[error("competency '{0}' appears in more than one criterion")]
    DuplicateCriterion(CompetencyId),
    #[error("minimum rating {min_rating} for '{competency_id}' is outside 0-4")]
    ThresholdOutOfRange {
        competency_id: CompetencyId,
        min_rating: f64,
    },
}

pub fn validate_criteria(criteria: &[SearchCriterion]) -> Result<(), SearchError> {
    if criteria.is_empty() {
        return Err(SearchError::NoCriteria);
    }

    let mut seen = HashSet::with_capacity(criteria.len());
    for criterion in criteria {
        if !(0.0..=f64::from(RatingScore::MAX)).contains(&criterion.min_rating) {
            return Err(SearchError::ThresholdOutOfRange {
                competency_id: criterion.competency_id.clone(),
                min_rating: criterion.min_rating,
            });
        }
        if !seen.insert(&criterion.competency_id) {
            return Err(SearchError::DuplicateCriterion(
                criterion.competency_id.clone(),
            ));
        }
    }

    Ok(())
}

/// Learners satisfying every criterion, each with the matched averages.
///
/// A criterion holds when the learner has a defined average for the competency, the
/// competency is not hidden (unless the policy ignores hiding), and the average is at
/// least the threshold. An empty criteria list matches nobody.
pub fn match_learners(
    learners: &[User],
    ratings: &[Rating],
    competencies: &[Competency],
    criteria: &[SearchCriterion],
    options: &SearchOptions,
) -> Vec<LearnerMatch> {
    if criteria.is_empty() {
        return Vec::new();
    }

    let mut ratings_by_learner: HashMap<&UserId, Vec<Rating>> = HashMap::new();
    for rating in ratings {
        ratings_by_learner
            .entry(&rating.learner_id)
            .or_default()
            .push(rating.clone());
    }

    learners
        .iter()
        .filter_map(|learner| {
            let own = ratings_by_learner
                .get(&learner.id)
                .map(Vec::as_slice)
                .unwrap_or_default();
            let aggregates = aggregate_by_competency(own, competencies);
            let hidden = match options.hidden_policy {
                HiddenPolicy::ExcludeHidden => learner.hidden_competency_ids.as_deref(),
                HiddenPolicy::IgnoreHidden => None,
            };

            let mut matched = Vec::with_capacity(criteria.len());
            for criterion in criteria {
                if is_hidden(&criterion.competency_id, hidden) {
                    return None;
                }
                let aggregate = aggregates
                    .iter()
                    .find(|aggregate| aggregate.competency_id() == &criterion.competency_id)?;
                if aggregate.average < criterion.min_rating {
                    return None;
                }
                matched.push(MatchedCompetency {
                    competency: aggregate.competency.clone(),
                    average: aggregate.average,
                });
            }

            Some(LearnerMatch {
                learner: learner.clone(),
                matched_competencies: matched,
            })
        })
        .collect()
}
