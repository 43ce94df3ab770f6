use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{CompetencyId, OrganizationId, UserId};

/// Role tags attached to an account. A user may hold several.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Learner,
    Educator,
    #[serde(alias = "industry_expert")]
    Master,
    Admin,
}

/// User account. Learner-specific profile preferences are optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub display_name: String,
    pub email: String,
    pub org_id: OrganizationId,
    pub roles: BTreeSet<Role>,
    /// Competencies the learner keeps off their public profile.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hidden_competency_ids: Option<Vec<CompetencyId>>,
    /// Custom ordering of competencies on the public profile.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub competency_display_order: Option<Vec<CompetencyId>>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn is_learner(&self) -> bool {
        self.has_role(Role::Learner)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrgType {
    Education,
    Employment,
}

/// A school or an employer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Organization {
    pub id: OrganizationId,
    pub name: String,
    pub org_type: OrgType,
    pub created_at: DateTime<Utc>,
}
