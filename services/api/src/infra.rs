use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use lern::artifacts::MemoryBlobStore;
use lern::config::SuggestionConfig;
use lern::domain::CompetencyId;
use lern::search::SearchCriterion;
use lern::store::MemoryStore;
use lern::suggestions::{DisabledSuggester, OpenAiSuggester, RatingSuggester};
use lern::LernService;
use tracing::{info, warn};

pub(crate) type MemoryLernService = LernService<MemoryStore, MemoryBlobStore>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// OpenAI-backed suggestions when a key is configured; otherwise analysis reports
/// that it is unavailable.
pub(crate) fn build_suggester(config: &SuggestionConfig) -> Arc<dyn RatingSuggester> {
    match OpenAiSuggester::from_config(config) {
        Ok(suggester) => {
            info!(model = suggester.model(), base_url = %config.base_url, "transcript analysis enabled");
            Arc::new(suggester)
        }
        Err(_) => {
            warn!("OPENAI_API_KEY not set; transcript analysis disabled");
            Arc::new(DisabledSuggester)
        }
    }
}

/// Parses `competency_id:min_rating`, e.g. `comp-python:3`.
pub(crate) fn parse_criterion(raw: &str) -> Result<SearchCriterion, String> {
    let (competency_id, min_rating) = raw
        .rsplit_once(':')
        .ok_or_else(|| format!("expected COMPETENCY:MIN, got '{raw}'"))?;

    let competency_id = competency_id.trim();
    if competency_id.is_empty() {
        return Err(format!("missing competency id in '{raw}'"));
    }

    let min_rating = min_rating
        .trim()
        .parse::<f64>()
        .map_err(|err| format!("failed to parse minimum rating in '{raw}' ({err})"))?;

    Ok(SearchCriterion {
        competency_id: CompetencyId::from(competency_id),
        min_rating,
    })
}
