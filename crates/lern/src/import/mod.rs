//! Rating exports in CSV form, for offline portfolio and search reports.

use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer};
use tracing::info;

use crate::domain::{CompetencyId, RaterType, Rating, RatingId, RatingScore, RatingState, UserId};
use crate::ratings::normalize_comment;

#[derive(Debug)]
pub enum ImportError {
    Io(std::io::Error),
    Csv(csv::Error),
    InvalidRow { line: u64, reason: String },
}

impl fmt::Display for ImportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportError::Io(err) => write!(f, "failed to read rating export: {}", err),
            ImportError::Csv(err) => write!(f, "invalid rating CSV data: {}", err),
            ImportError::InvalidRow { line, reason } => {
                write!(f, "rating export line {}: {}", line, reason)
            }
        }
    }
}

impl std::error::Error for ImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ImportError::Io(err) => Some(err),
            ImportError::Csv(err) => Some(err),
            ImportError::InvalidRow { .. } => None,
        }
    }
}

impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

/// Reads `rating_id,learner_id,competency_id,rater_id,rater_type,status,score,comment,created_at`.
pub struct RatingCsvImporter;

impl RatingCsvImporter {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Vec<Rating>, ImportError> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let ratings = Self::from_reader(file)?;
        info!(path = %path.display(), count = ratings.len(), "imported ratings");
        Ok(ratings)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Vec<Rating>, ImportError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let headers = csv_reader.headers()?.clone();
        let mut ratings = Vec::new();

        for record in csv_reader.records() {
            let record = record?;
            let line = record.position().map_or(0, |position| position.line());
            let row: RatingRow = record.deserialize(Some(&headers))?;
            ratings.push(row.into_rating(line)?);
        }

        Ok(ratings)
    }
}

#[derive(Debug, Deserialize)]
struct RatingRow {
    rating_id: String,
    learner_id: String,
    competency_id: String,
    rater_id: String,
    rater_type: String,
    status: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    score: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    comment: Option<String>,
    created_at: String,
}

impl RatingRow {
    fn into_rating(self, line: u64) -> Result<Rating, ImportError> {
        let invalid = |reason: String| ImportError::InvalidRow { line, reason };

        let rater_type = RaterType::parse(&self.rater_type)
            .ok_or_else(|| invalid(format!("unknown rater type '{}'", self.rater_type)))?;
        let created_at = parse_timestamp(&self.created_at)
            .ok_or_else(|| invalid(format!("unreadable timestamp '{}'", self.created_at)))?;

        let state = match (self.status.to_ascii_lowercase().as_str(), self.score) {
            ("pending", None) => RatingState::Pending,
            ("pending", Some(_)) => {
                return Err(invalid("pending rating carries a score".to_string()));
            }
            ("completed", Some(raw)) => {
                let value: i64 = raw
                    .parse()
                    .map_err(|_| invalid(format!("score '{raw}' is not a number")))?;
                let score = RatingScore::try_from(value).map_err(|err| invalid(err.to_string()))?;
                RatingState::Completed {
                    score,
                    comment: normalize_comment(self.comment),
                }
            }
            ("completed", None) => {
                return Err(invalid("completed rating has no score".to_string()));
            }
            (other, _) => return Err(invalid(format!("unknown status '{other}'"))),
        };

        Ok(Rating {
            id: RatingId::new(self.rating_id),
            learner_id: UserId::new(self.learner_id),
            competency_id: CompetencyId::new(self.competency_id),
            rater_id: UserId::new(self.rater_id),
            rater_type,
            state,
            created_at,
            updated_at: None,
        })
    }
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let trimmed = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }

    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
