//! Learner onboarding: details, optional transcript analysis, rating review, one commit.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::AppContext;
use crate::domain::{CompetencyId, RaterType, Rating, RatingId, RatingScore, Role, User, UserId};
use crate::store::{Document, WriteBatch};
use crate::suggestions::SuggestedRating;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardStep {
    Info,
    Upload,
    Review,
    Submitted,
}

impl WizardStep {
    pub const fn label(self) -> &'static str {
        match self {
            WizardStep::Info => "info",
            WizardStep::Upload => "upload",
            WizardStep::Review => "review",
            WizardStep::Submitted => "submitted",
        }
    }
}

impl fmt::Display for WizardStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OnboardingError {
    #[error("display name is required")]
    MissingName,
    #[error("'{0}' is not a valid email address")]
    InvalidEmail(String),
    #[error("cannot {action} during the {step} step")]
    WrongStep {
        action: &'static str,
        step: WizardStep,
    },
    #[error("no rating draft at position {0}")]
    NoSuchDraft(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearnerInfo {
    pub display_name: String,
    pub email: String,
}

impl LearnerInfo {
    pub fn new(display_name: &str, email: &str) -> Result<Self, OnboardingError> {
        let display_name = display_name.trim();
        let email = email.trim();
        if display_name.is_empty() {
            return Err(OnboardingError::MissingName);
        }
        if !is_plausible_email(email) {
            return Err(OnboardingError::InvalidEmail(email.to_string()));
        }
        Ok(Self {
            display_name: display_name.to_string(),
            email: email.to_string(),
        })
    }
}

fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && !domain.is_empty() && !domain.contains('@'),
        None => false,
    }
}

/// A rating under review. Drafts without a competency are discarded on submit.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RatingDraft {
    #[serde(default)]
    pub competency_id: Option<CompetencyId>,
    #[serde(default)]
    pub score: RatingScore,
    #[serde(default)]
    pub comment: String,
}

impl From<SuggestedRating> for RatingDraft {
    fn from(suggestion: SuggestedRating) -> Self {
        Self {
            competency_id: Some(suggestion.competency_id),
            score: suggestion.score,
            comment: suggestion.comment,
        }
    }
}

/// New learner plus their initial mentor ratings, committed together.
#[derive(Debug, Clone, PartialEq)]
pub struct OnboardingBatch {
    pub learner: User,
    pub ratings: Vec<Rating>,
}

impl OnboardingBatch {
    pub fn into_write_batch(self) -> WriteBatch {
        let mut batch = WriteBatch::new().create(Document::User(self.learner));
        for rating in self.ratings {
            batch = batch.create(Document::Rating(rating));
        }
        batch
    }
}

/// Linear wizard: `Info -> Upload -> Review -> Submitted`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnboardingWizard {
    step: WizardStep,
    info: Option<LearnerInfo>,
    drafts: Vec<RatingDraft>,
}

impl Default for OnboardingWizard {
    fn default() -> Self {
        Self::new()
    }
}

impl OnboardingWizard {
    pub fn new() -> Self {
        Self {
            step: WizardStep::Info,
            info: None,
            drafts: Vec::new(),
        }
    }

    pub fn step(&self) -> WizardStep {
        self.step
    }

    pub fn info(&self) -> Option<&LearnerInfo> {
        self.info.as_ref()
    }

    pub fn drafts(&self) -> &[RatingDraft] {
        &self.drafts
    }

    fn expect_step(&self, step: WizardStep, action: &'static str) -> Result<(), OnboardingError> {
        if self.step == step {
            Ok(())
        } else {
            Err(OnboardingError::WrongStep {
                action,
                step: self.step,
            })
        }
    }

    pub fn set_info(&mut self, display_name: &str, email: &str) -> Result<(), OnboardingError> {
        self.expect_step(WizardStep::Info, "enter learner details")?;
        self.info = Some(LearnerInfo::new(display_name, email)?);
        self.step = WizardStep::Upload;
        Ok(())
    }

    /// Step back one screen. Entered details and drafts are kept.
    pub fn back(&mut self) -> Result<(), OnboardingError> {
        self.step = match self.step {
            WizardStep::Upload => WizardStep::Info,
            WizardStep::Review => WizardStep::Upload,
            step => return Err(OnboardingError::WrongStep { action: "go back", step }),
        };
        Ok(())
    }

    /// Replace the drafts with transcript suggestions and move to review.
    pub fn attach_suggestions(
        &mut self,
        suggestions: Vec<SuggestedRating>,
    ) -> Result<(), OnboardingError> {
        self.expect_step(WizardStep::Upload, "attach suggestions")?;
        self.drafts = suggestions.into_iter().map(RatingDraft::from).collect();
        self.step = WizardStep::Review;
        Ok(())
    }

    pub fn skip_upload(&mut self) -> Result<(), OnboardingError> {
        self.expect_step(WizardStep::Upload, "skip the upload")?;
        self.step = WizardStep::Review;
        Ok(())
    }

    /// Insert an empty draft at the top of the review list.
    pub fn add_rating(&mut self) -> Result<(), OnboardingError> {
        self.expect_step(WizardStep::Review, "add a rating")?;
        self.drafts.insert(0, RatingDraft::default());
        Ok(())
    }

    pub fn update_rating(&mut self, index: usize, draft: RatingDraft) -> Result<(), OnboardingError> {
        self.expect_step(WizardStep::Review, "edit a rating")?;
        let slot = self
            .drafts
            .get_mut(index)
            .ok_or(OnboardingError::NoSuchDraft(index))?;
        *slot = draft;
        Ok(())
    }

    pub fn remove_rating(&mut self, index: usize) -> Result<RatingDraft, OnboardingError> {
        self.expect_step(WizardStep::Review, "remove a rating")?;
        if index >= self.drafts.len() {
            return Err(OnboardingError::NoSuchDraft(index));
        }
        Ok(self.drafts.remove(index))
    }

    /// Build the learner and their mentor ratings and hand them to `persist`. Drafts
    /// without a competency are skipped. The wizard stays at review unless persisting
    /// succeeds.
    pub fn finish<F, P, E>(
        &mut self,
        learner_id: UserId,
        context: &AppContext,
        now: DateTime<Utc>,
        mut next_rating_id: F,
        persist: P,
    ) -> Result<OnboardingBatch, E>
    where
        F: FnMut() -> Result<RatingId, E>,
        P: FnOnce(&OnboardingBatch) -> Result<(), E>,
        E: From<OnboardingError>,
    {
        self.expect_step(WizardStep::Review, "submit")?;
        let info = self.info.clone().ok_or(OnboardingError::MissingName)?;

        let learner = User {
            id: learner_id,
            display_name: info.display_name,
            email: info.email,
            org_id: context.org_id.clone(),
            roles: BTreeSet::from([Role::Learner]),
            hidden_competency_ids: None,
            competency_display_order: None,
            created_at: now,
        };

        let mut ratings = Vec::with_capacity(self.drafts.len());
        for draft in &self.drafts {
            let Some(competency_id) = draft.competency_id.clone() else {
                continue;
            };
            ratings.push(Rating::completed(
                next_rating_id()?,
                learner.id.clone(),
                competency_id,
                context.educator_id.clone(),
                RaterType::Mentor,
                draft.score,
                Some(draft.comment.clone()),
                now,
            ));
        }

        let batch = OnboardingBatch { learner, ratings };
        persist(&batch)?;

        self.step = WizardStep::Submitted;
        Ok(batch)
    }
}

/// Onboarding submitted in one request: details plus reviewed drafts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnboardingRequest {
    pub display_name: String,
    pub email: String,
    #[serde(default)]
    pub ratings: Vec<RatingDraft>,
}

impl OnboardingRequest {
    /// A wizard already at the review step holding these drafts.
    pub fn into_wizard(self) -> Result<OnboardingWizard, OnboardingError> {
        let mut wizard = OnboardingWizard::new();
        wizard.set_info(&self.display_name, &self.email)?;
        wizard.skip_upload()?;
        wizard.drafts = self.ratings;
        Ok(wizard)
    }
}
