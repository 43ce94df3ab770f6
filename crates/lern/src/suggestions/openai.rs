use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::config::SuggestionConfig;
use crate::domain::{Competency, RatingScore, RubricScale};

use super::{parse_suggestions, validate_input, RatingSuggester, SuggestedRating, SuggestionError};

const TEMPERATURE: f64 = 0.3;

/// Chat-completions client for any OpenAI-compatible endpoint.
pub struct OpenAiSuggester {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiSuggester {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    pub fn from_config(config: &SuggestionConfig) -> Result<Self, SuggestionError> {
        let api_key = config
            .api_key
            .clone()
            .ok_or(SuggestionError::NotConfigured)?;
        Ok(Self::new(config.base_url.clone(), api_key, config.model.clone()))
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub(crate) fn request_body(&self, transcript: &str, catalog: &[Competency]) -> Value {
        json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system_prompt() },
                { "role": "user", "content": user_prompt(transcript, catalog) },
            ],
            "temperature": TEMPERATURE,
            "response_format": { "type": "json_object" },
        })
    }
}

fn system_prompt() -> String {
    let rubric = RubricScale::default();
    let scale = (0..=RatingScore::MAX)
        .filter_map(|value| RatingScore::new(value).ok())
        .map(|score| format!("{}: {}", score.value(), rubric.describe(score)))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Assess the competencies a student demonstrates in a transcript.\n\
         Score each competency with clear evidence on this scale:\n{scale}\n\
         Use only competency ids from the provided list and omit competencies without evidence.\n\
         Keep comments about the evidence and never name the student.\n\
         Reply with JSON only: {{\"suggestions\":[{{\"competency_id\":\"...\",\"score\":0,\"comment\":\"...\"}}]}}"
    )
}

fn user_prompt(transcript: &str, catalog: &[Competency]) -> String {
    let competencies = catalog
        .iter()
        .map(|competency| {
            format!(
                "- ID: \"{}\" | Title: {} | Description: {}",
                competency.id, competency.title, competency.description
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!("TRANSCRIPT:\n{transcript}\n\nCOMPETENCIES:\n{competencies}")
}

#[async_trait]
impl RatingSuggester for OpenAiSuggester {
    async fn suggest(
        &self,
        transcript: &str,
        catalog: &[Competency],
    ) -> Result<Vec<SuggestedRating>, SuggestionError> {
        validate_input(transcript, catalog)?;

        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        debug!(%url, model = %self.model, competencies = catalog.len(), "requesting suggestions");

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&self.request_body(transcript, catalog))
            .send()
            .await?
            .error_for_status()?;
        let payload: Value = response.json().await?;

        let content = payload["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| {
                SuggestionError::MalformedResponse("response has no message content".to_string())
            })?;

        let suggestions = parse_suggestions(content, catalog)?;
        info!(count = suggestions.len(), "transcript analyzed");
        Ok(suggestions)
    }
}
