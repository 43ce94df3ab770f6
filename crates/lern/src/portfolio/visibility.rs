use crate::domain::CompetencyId;

use super::aggregate::CompetencyAggregate;

pub fn is_hidden(competency_id: &CompetencyId, hidden: Option<&[CompetencyId]>) -> bool {
    hidden.is_some_and(|hidden| hidden.contains(competency_id))
}

/// Drop aggregates for competencies the learner hid. A missing list hides nothing.
pub fn filter_hidden(
    aggregates: Vec<CompetencyAggregate>,
    hidden: Option<&[CompetencyId]>,
) -> Vec<CompetencyAggregate> {
    aggregates
        .into_iter()
        .filter(|aggregate| !is_hidden(aggregate.competency_id(), hidden))
        .collect()
}
