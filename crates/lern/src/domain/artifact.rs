use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{ArtifactId, CompetencyId, UserId};

/// Largest accepted upload, in bytes.
pub const MAX_ARTIFACT_SIZE: u64 = 50 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactFileType {
    Pdf,
    Jpg,
    Png,
    Mp4,
}

impl ArtifactFileType {
    pub const fn content_type(self) -> &'static str {
        match self {
            ArtifactFileType::Pdf => "application/pdf",
            ArtifactFileType::Jpg => "image/jpeg",
            ArtifactFileType::Png => "image/png",
            ArtifactFileType::Mp4 => "video/mp4",
        }
    }
}

/// Uploaded evidence file. One artifact may evidence several competencies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub id: ArtifactId,
    pub learner_id: UserId,
    pub uploaded_by: UserId,
    pub file_url: String,
    pub file_type: ArtifactFileType,
    pub file_size: u64,
    pub file_name: String,
    pub competency_ids: Vec<CompetencyId>,
    pub created_at: DateTime<Utc>,
}

impl Artifact {
    pub fn evidences(&self, competency_id: &CompetencyId) -> bool {
        self.competency_ids.contains(competency_id)
    }
}
