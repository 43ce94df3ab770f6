use chrono::{DateTime, Utc};

use crate::domain::{Rating, RatingScore};

use super::lifecycle::RatingError;

#[derive(Debug, thiserror::Error)]
pub enum FlowError<E: std::error::Error + 'static> {
    #[error("no ratings left in this flow")]
    Finished,
    #[error(transparent)]
    Rating(#[from] RatingError),
    #[error("failed to save rating: {0}")]
    Persist(#[source] E),
}

/// Walks a rater through their pending ratings one at a time.
///
/// The queue is a snapshot taken at start; ratings requested afterwards are not picked
/// up until a new flow is started.
#[derive(Debug, Clone)]
pub struct RatingFlow {
    queue: Vec<Rating>,
    index: usize,
}

impl RatingFlow {
    pub fn start(pending: Vec<Rating>) -> Self {
        let queue = pending.into_iter().filter(Rating::is_pending).collect();
        Self { queue, index: 0 }
    }

    pub fn current(&self) -> Option<&Rating> {
        self.queue.get(self.index)
    }

    /// 1-based position of the current item, capped at the queue length.
    pub fn position(&self) -> usize {
        (self.index + 1).min(self.queue.len())
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Share of items already handled, in percent.
    pub fn progress(&self) -> f64 {
        if self.queue.is_empty() {
            return 100.0;
        }
        self.index as f64 / self.queue.len() as f64 * 100.0
    }

    pub fn finished(&self) -> bool {
        self.index >= self.queue.len()
    }

    /// Leave the current rating pending and move on.
    pub fn skip(&mut self) -> bool {
        if self.finished() {
            return false;
        }
        self.index += 1;
        true
    }

    /// Complete the current rating and hand it to `persist`. The flow only advances
    /// when persisting succeeds.
    pub fn submit<P, E>(
        &mut self,
        score: RatingScore,
        comment: Option<String>,
        now: DateTime<Utc>,
        persist: P,
    ) -> Result<Rating, FlowError<E>>
    where
        P: FnOnce(&Rating) -> Result<(), E>,
        E: std::error::Error + 'static,
    {
        let mut rating = self.current().cloned().ok_or(FlowError::Finished)?;
        rating.complete(score, comment, now)?;
        persist(&rating).map_err(FlowError::Persist)?;

        self.queue[self.index] = rating.clone();
        self.index += 1;
        Ok(rating)
    }
}
