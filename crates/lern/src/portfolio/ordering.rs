use std::collections::HashMap;

use crate::domain::CompetencyId;

use super::aggregate::CompetencyAggregate;

/// Stable reorder: ids listed in `order` first, by their first position in the list,
/// everything else afterwards in its original relative order.
pub fn sort_by_display_order<T, F>(items: &mut [T], order: Option<&[CompetencyId]>, key: F)
where
    F: Fn(&T) -> &CompetencyId,
{
    let Some(order) = order.filter(|order| !order.is_empty()) else {
        return;
    };

    let mut positions: HashMap<&CompetencyId, usize> = HashMap::with_capacity(order.len());
    for (index, competency_id) in order.iter().enumerate() {
        positions.entry(competency_id).or_insert(index);
    }

    items.sort_by_key(|item| positions.get(key(item)).copied().unwrap_or(usize::MAX));
}

pub fn apply_display_order(
    mut aggregates: Vec<CompetencyAggregate>,
    order: Option<&[CompetencyId]>,
) -> Vec<CompetencyAggregate> {
    sort_by_display_order(&mut aggregates, order, CompetencyAggregate::competency_id);
    aggregates
}
