use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::{Competency, CompetencyId, RaterType, Rating};

/// Completed ratings for one competency together with their mean score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompetencyAggregate {
    pub competency: Competency,
    pub ratings: Vec<Rating>,
    pub average: f64,
}

impl CompetencyAggregate {
    pub fn competency_id(&self) -> &CompetencyId {
        &self.competency.id
    }

    pub fn count(&self) -> usize {
        self.ratings.len()
    }

    /// Distinct rater types behind this aggregate, in the order they first appear.
    pub fn rater_types(&self) -> Vec<RaterType> {
        let mut seen = Vec::new();
        for rating in &self.ratings {
            if !seen.contains(&rating.rater_type) {
                seen.push(rating.rater_type);
            }
        }
        seen
    }
}

/// Group completed ratings by competency and compute the unweighted mean score.
///
/// Pending ratings are skipped entirely, as are ratings whose competency is not in
/// `competencies`. A competency appears in the output only when it has at least one
/// qualifying rating, in the order its first qualifying rating was seen.
pub fn aggregate_by_competency(
    ratings: &[Rating],
    competencies: &[Competency],
) -> Vec<CompetencyAggregate> {
    let catalog: HashMap<&CompetencyId, &Competency> = competencies
        .iter()
        .map(|competency| (&competency.id, competency))
        .collect();

    let mut discovery: Vec<&CompetencyId> = Vec::new();
    let mut grouped: HashMap<&CompetencyId, Vec<&Rating>> = HashMap::new();

    for rating in ratings {
        if rating.score().is_none() || !catalog.contains_key(&rating.competency_id) {
            continue;
        }

        grouped
            .entry(&rating.competency_id)
            .or_insert_with(|| {
                discovery.push(&rating.competency_id);
                Vec::new()
            })
            .push(rating);
    }

    discovery
        .into_iter()
        .filter_map(|competency_id| {
            let competency = catalog.get(competency_id)?;
            let group = grouped.remove(competency_id)?;
            let sum: u32 = group
                .iter()
                .filter_map(|rating| rating.score())
                .map(|score| u32::from(score.value()))
                .sum();
            let average = f64::from(sum) / group.len() as f64;

            Some(CompetencyAggregate {
                competency: (*competency).clone(),
                ratings: group.into_iter().cloned().collect(),
                average,
            })
        })
        .collect()
}

/// Running average after each completed rating, oldest first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressPoint {
    pub at: DateTime<Utc>,
    pub running_average: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompetencyProgress {
    pub competency_id: CompetencyId,
    pub title: String,
    pub points: Vec<ProgressPoint>,
}

/// Per-competency running-average series for progress charts.
pub fn progress_series(ratings: &[Rating], competencies: &[Competency]) -> Vec<CompetencyProgress> {
    aggregate_by_competency(ratings, competencies)
        .into_iter()
        .map(|aggregate| {
            let mut timeline = aggregate.ratings;
            timeline.sort_by_key(|rating| rating.created_at);

            let mut running_sum = 0u32;
            let points = timeline
                .iter()
                .enumerate()
                .filter_map(|(index, rating)| {
                    let score = rating.score()?;
                    running_sum += u32::from(score.value());
                    Some(ProgressPoint {
                        at: rating.created_at,
                        running_average: f64::from(running_sum) / (index + 1) as f64,
                    })
                })
                .collect();

            CompetencyProgress {
                competency_id: aggregate.competency.id,
                title: aggregate.competency.title,
                points,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{competency, completed, pending};

    #[test]
    fn pending_ratings_do_not_contribute() {
        let competencies = vec![competency("A")];
        let ratings = vec![completed("r1", "learner", "A", 3), pending("r2", "learner", "A")];

        let aggregates = aggregate_by_competency(&ratings, &competencies);

        assert_eq!(aggregates.len(), 1);
        assert_eq!(aggregates[0].competency_id().as_str(), "A");
        assert_eq!(aggregates[0].average, 3.0);
        assert_eq!(aggregates[0].count(), 1);
    }

    #[test]
    fn competencies_without_completed_ratings_are_absent() {
        let competencies = vec![competency("A"), competency("B")];
        let ratings = vec![completed("r1", "learner", "A", 2), pending("r2", "learner", "B")];

        let aggregates = aggregate_by_competency(&ratings, &competencies);

        assert!(aggregates.iter().all(|aggregate| aggregate.count() > 0));
        assert!(aggregates
            .iter()
            .all(|aggregate| aggregate.competency_id().as_str() != "B"));
    }

    #[test]
    fn orphaned_ratings_are_dropped() {
        let competencies = vec![competency("A")];
        let ratings = vec![completed("r1", "learner", "Z", 4), completed("r2", "learner", "A", 1)];

        let aggregates = aggregate_by_competency(&ratings, &competencies);

        assert_eq!(aggregates.len(), 1);
        assert_eq!(aggregates[0].competency_id().as_str(), "A");
    }

    #[test]
    fn average_times_count_equals_sum() {
        let competencies = vec![competency("A"), competency("B")];
        let ratings = vec![
            completed("r1", "learner", "A", 1),
            completed("r2", "learner", "B", 4),
            completed("r3", "learner", "A", 2),
            completed("r4", "learner", "A", 4),
        ];

        for aggregate in aggregate_by_competency(&ratings, &competencies) {
            let sum: u32 = aggregate
                .ratings
                .iter()
                .filter_map(Rating::score)
                .map(|score| u32::from(score.value()))
                .sum();
            assert!((aggregate.average * aggregate.count() as f64 - f64::from(sum)).abs() < 1e-9);
        }
    }

    #[test]
    fn output_follows_discovery_order_and_is_repeatable() {
        let competencies = vec![competency("A"), competency("B"), competency("C")];
        let ratings = vec![
            completed("r1", "learner", "C", 1),
            completed("r2", "learner", "A", 2),
            completed("r3", "learner", "C", 3),
        ];

        let first = aggregate_by_competency(&ratings, &competencies);
        let second = aggregate_by_competency(&ratings, &competencies);

        let ids: Vec<&str> = first.iter().map(|a| a.competency_id().as_str()).collect();
        assert_eq!(ids, vec!["C", "A"]);
        assert_eq!(first, second);
    }

    #[test]
    fn rater_types_are_distinct() {
        let competencies = vec![competency("A")];
        let mut master = completed("r2", "learner", "A", 4);
        master.rater_type = RaterType::Master;
        let ratings = vec![
            completed("r1", "learner", "A", 3),
            master,
            completed("r3", "learner", "A", 2),
        ];

        let aggregates = aggregate_by_competency(&ratings, &competencies);

        assert_eq!(
            aggregates[0].rater_types(),
            vec![RaterType::Mentor, RaterType::Master]
        );
    }

    #[test]
    fn progress_series_tracks_running_average_by_date() {
        let competencies = vec![competency("A")];
        let mut later = completed("r1", "learner", "A", 4);
        later.created_at += chrono::Duration::days(3);
        let earlier = completed("r2", "learner", "A", 2);

        let series = progress_series(&[later, earlier], &competencies);

        assert_eq!(series.len(), 1);
        let averages: Vec<f64> = series[0]
            .points
            .iter()
            .map(|point| point.running_average)
            .collect();
        assert_eq!(averages, vec![2.0, 3.0]);
    }
}
