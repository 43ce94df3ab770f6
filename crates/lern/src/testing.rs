//! Shared record builders for unit tests.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use crate::domain::{
    Artifact, ArtifactFileType, ArtifactId, Competency, CompetencyId, CompetencyType,
    OrganizationId, RaterType, Rating, RatingId, RatingScore, RatingState, Role, RubricScale,
    User, UserId,
};

pub(crate) fn timestamp() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2025-09-01T09:00:00Z")
        .expect("valid timestamp")
        .with_timezone(&Utc)
}

pub(crate) fn competency(id: &str) -> Competency {
    Competency {
        id: CompetencyId::from(id),
        org_id: OrganizationId::from("org-demo"),
        created_by: UserId::from("educator-1"),
        title: format!("Competency {id}"),
        description: format!("Description of {id}"),
        kind: CompetencyType::Hard,
        rubric: RubricScale::default(),
        created_at: timestamp(),
    }
}

pub(crate) fn completed(id: &str, learner: &str, competency: &str, score: u8) -> Rating {
    Rating {
        id: RatingId::from(id),
        learner_id: UserId::from(learner),
        competency_id: CompetencyId::from(competency),
        rater_id: UserId::from("educator-1"),
        rater_type: RaterType::Mentor,
        state: RatingState::Completed {
            score: RatingScore::new(score).expect("valid score"),
            comment: None,
        },
        created_at: timestamp(),
        updated_at: None,
    }
}

pub(crate) fn pending(id: &str, learner: &str, competency: &str) -> Rating {
    Rating {
        id: RatingId::from(id),
        learner_id: UserId::from(learner),
        competency_id: CompetencyId::from(competency),
        rater_id: UserId::from(learner),
        rater_type: RaterType::SelfAssessment,
        state: RatingState::Pending,
        created_at: timestamp(),
        updated_at: None,
    }
}

pub(crate) fn learner(id: &str) -> User {
    User {
        id: UserId::from(id),
        display_name: format!("Learner {id}"),
        email: format!("{id}@demo.edu"),
        org_id: OrganizationId::from("org-demo"),
        roles: BTreeSet::from([Role::Learner]),
        hidden_competency_ids: None,
        competency_display_order: None,
        created_at: timestamp(),
    }
}

pub(crate) fn artifact(id: &str, learner: &str, competencies: &[&str]) -> Artifact {
    Artifact {
        id: ArtifactId::from(id),
        learner_id: UserId::from(learner),
        uploaded_by: UserId::from(learner),
        file_url: format!("memory://artifacts/{learner}/{id}.pdf"),
        file_type: ArtifactFileType::Pdf,
        file_size: 1024,
        file_name: format!("{id}.pdf"),
        competency_ids: competencies.iter().map(|id| CompetencyId::from(*id)).collect(),
        created_at: timestamp(),
    }
}
