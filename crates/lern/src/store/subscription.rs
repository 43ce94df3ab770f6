use serde::Serialize;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tracing::warn;

use crate::domain::{Rating, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RatingChange {
    Created,
    Updated,
}

/// A committed change to one rating document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RatingEvent {
    pub change: RatingChange,
    pub rating: Rating,
}

/// Which rating changes a subscriber wants to see.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RatingFilter {
    pub learner_id: Option<UserId>,
    pub rater_id: Option<UserId>,
    pub pending_only: bool,
}

impl RatingFilter {
    pub fn learner(learner_id: UserId) -> Self {
        Self {
            learner_id: Some(learner_id),
            ..Self::default()
        }
    }

    pub fn pending_for(rater_id: UserId) -> Self {
        Self {
            rater_id: Some(rater_id),
            pending_only: true,
            ..Self::default()
        }
    }

    pub fn matches(&self, rating: &Rating) -> bool {
        self.learner_id
            .as_ref()
            .map_or(true, |learner_id| &rating.learner_id == learner_id)
            && self
                .rater_id
                .as_ref()
                .map_or(true, |rater_id| &rating.rater_id == rater_id)
            && (!self.pending_only || rating.is_pending())
    }
}

/// Live feed of rating changes. Dropping it unsubscribes.
#[derive(Debug)]
pub struct RatingSubscription {
    receiver: broadcast::Receiver<RatingEvent>,
    filter: RatingFilter,
}

impl RatingSubscription {
    pub fn new(receiver: broadcast::Receiver<RatingEvent>, filter: RatingFilter) -> Self {
        Self { receiver, filter }
    }

    pub fn filter(&self) -> &RatingFilter {
        &self.filter
    }

    /// Next matching event, or `None` once the store has shut down.
    pub async fn recv(&mut self) -> Option<RatingEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if self.filter.matches(&event.rating) => return Some(event),
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "rating subscriber lagged; events dropped");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Next matching event already buffered, without waiting.
    pub fn try_recv(&mut self) -> Option<RatingEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) if self.filter.matches(&event.rating) => return Some(event),
                Ok(_) => continue,
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "rating subscriber lagged; events dropped");
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }
}
