//! AI-assisted rating suggestions from learner transcripts.

mod openai;

pub use openai::OpenAiSuggester;

use std::collections::HashSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::domain::{Competency, CompetencyId, RatingScore};

/// A proposed rating the educator reviews before anything is saved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestedRating {
    pub competency_id: CompetencyId,
    pub score: RatingScore,
    #[serde(default)]
    pub comment: String,
}

#[derive(Debug, thiserror::Error)]
pub enum SuggestionError {
    #[error("transcript is empty")]
    EmptyTranscript,
    #[error("no competencies to assess")]
    EmptyCatalog,
    #[error("transcript analysis is not configured (set OPENAI_API_KEY)")]
    NotConfigured,
    #[error("suggestion request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("malformed suggestion response: {0}")]
    MalformedResponse(String),
}

#[async_trait]
pub trait RatingSuggester: Send + Sync {
    async fn suggest(
        &self,
        transcript: &str,
        catalog: &[Competency],
    ) -> Result<Vec<SuggestedRating>, SuggestionError>;
}

/// Reject inputs no suggester can work with.
pub fn validate_input(transcript: &str, catalog: &[Competency]) -> Result<(), SuggestionError> {
    if transcript.trim().is_empty() {
        return Err(SuggestionError::EmptyTranscript);
    }
    if catalog.is_empty() {
        return Err(SuggestionError::EmptyCatalog);
    }
    Ok(())
}

/// Read `{"suggestions": [...]}` from the model output.
///
/// Entries naming a competency outside `catalog`, carrying a score outside 0-4, or
/// repeating an already accepted competency are dropped with a warning.
pub fn parse_suggestions(
    content: &str,
    catalog: &[Competency],
) -> Result<Vec<SuggestedRating>, SuggestionError> {
    let payload: Value = serde_json::from_str(content)
        .map_err(|err| SuggestionError::MalformedResponse(err.to_string()))?;

    let entries = match payload.get("suggestions") {
        Some(Value::Array(entries)) => entries,
        Some(Value::Null) | None => return Ok(Vec::new()),
        Some(_) => {
            return Err(SuggestionError::MalformedResponse(
                "`suggestions` is not an array".to_string(),
            ))
        }
    };

    let known: HashSet<&CompetencyId> = catalog.iter().map(|competency| &competency.id).collect();
    let mut seen = HashSet::new();
    let mut suggestions = Vec::with_capacity(entries.len());

    for entry in entries {
        let suggestion = match serde_json::from_value::<SuggestedRating>(entry.clone()) {
            Ok(suggestion) => suggestion,
            Err(err) => {
                warn!(error = %err, "dropping unreadable suggestion");
                continue;
            }
        };

        if !known.contains(&suggestion.competency_id) {
            warn!(
                competency_id = %suggestion.competency_id,
                "dropping suggestion for unknown competency"
            );
            continue;
        }
        if !seen.insert(suggestion.competency_id.clone()) {
            warn!(
                competency_id = %suggestion.competency_id,
                "dropping repeated suggestion"
            );
            continue;
        }

        suggestions.push(suggestion);
    }

    Ok(suggestions)
}

/// Returns a fixed list, filtered to the catalog. Used by the demo and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticSuggester {
    suggestions: Vec<SuggestedRating>,
}

impl StaticSuggester {
    pub fn new(suggestions: Vec<SuggestedRating>) -> Self {
        Self { suggestions }
    }
}

#[async_trait]
impl RatingSuggester for StaticSuggester {
    async fn suggest(
        &self,
        transcript: &str,
        catalog: &[Competency],
    ) -> Result<Vec<SuggestedRating>, SuggestionError> {
        validate_input(transcript, catalog)?;
        Ok(self
            .suggestions
            .iter()
            .filter(|suggestion| {
                catalog
                    .iter()
                    .any(|competency| competency.id == suggestion.competency_id)
            })
            .cloned()
            .collect())
    }
}

/// Stand-in when no API key is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledSuggester;

#[async_trait]
impl RatingSuggester for DisabledSuggester {
    async fn suggest(
        &self,
        transcript: &str,
        catalog: &[Competency],
    ) -> Result<Vec<SuggestedRating>, SuggestionError> {
        validate_input(transcript, catalog)?;
        Err(SuggestionError::NotConfigured)
    }
}
