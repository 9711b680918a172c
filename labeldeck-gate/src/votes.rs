//! Demo / submission voting
//!
//! One ballot per (subject, voter). Every operation funnels into
//! [`VoteBook::set_vote`], which reads the previous ballot, applies the signed
//! delta and writes the new ballot under a single lock, so the tally always
//! equals the sum of recorded directions.
//!
//! Protocol:
//! - `add` records an up vote (again: no tally change, timestamp refreshed)
//! - `remove` clears the ballot (no ballot: no-op)
//! - `toggle(direction)` is a convenience on top: the same direction again
//!   clears, a different direction switches (net delta ±2)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VoteError {
    #[error("Vote subject not found: {0}")]
    SubjectNotFound(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteDirection {
    Up,
    Down,
}

impl VoteDirection {
    fn weight(self) -> i64 {
        match self {
            VoteDirection::Up => 1,
            VoteDirection::Down => -1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteAction {
    Add,
    Remove,
}

#[derive(Debug, Clone)]
struct Ballot {
    direction: VoteDirection,
    cast_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Subject {
    tally: i64,
    ballots: HashMap<String, Ballot>,
}

impl Subject {
    fn current(&self, voter_id: &str) -> Option<VoteDirection> {
        self.ballots.get(voter_id).map(|ballot| ballot.direction)
    }

    /// Replace the voter's ballot and move the tally by the signed difference
    fn record(&mut self, voter_id: &str, direction: Option<VoteDirection>) {
        let delta = direction.map_or(0, VoteDirection::weight)
            - self.current(voter_id).map_or(0, VoteDirection::weight);
        self.tally += delta;

        match direction {
            Some(direction) => {
                self.ballots.insert(
                    voter_id.to_string(),
                    Ballot {
                        direction,
                        cast_at: Utc::now(),
                    },
                );
            }
            None => {
                self.ballots.remove(voter_id);
            }
        }

        tracing::debug!(voter = voter_id, delta = delta, tally = self.tally, "Vote recorded");
    }
}

/// Result of a vote mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VoteOutcome {
    pub subject_id: String,
    pub tally: i64,
    /// The voter's ballot after the mutation
    pub current: Option<VoteDirection>,
}

/// Aggregated, privacy-safe view of a subject's votes
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VoteStats {
    pub tally: i64,
    pub up_votes: usize,
    pub down_votes: usize,
    pub total_users: u64,
    /// `up_votes / total_users`
    pub ratio: f64,
    /// `round(ratio * 5)`, at most 5
    pub stars: u8,
}

/// All open vote subjects and their ballots
#[derive(Debug, Default)]
pub struct VoteBook {
    subjects: Mutex<HashMap<String, Subject>>,
}

impl VoteBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `subject_id` votable; existing ballots are kept
    pub async fn open_subject(&self, subject_id: impl Into<String>) {
        self.subjects
            .lock()
            .await
            .entry(subject_id.into())
            .or_default();
    }

    /// Remove a subject and all of its ballots
    pub async fn close_subject(&self, subject_id: &str) -> bool {
        self.subjects.lock().await.remove(subject_id).is_some()
    }

    /// Set (or clear) `voter_id`'s ballot on `subject_id`
    pub async fn set_vote(
        &self,
        subject_id: &str,
        voter_id: &str,
        direction: Option<VoteDirection>,
    ) -> Result<VoteOutcome, VoteError> {
        let mut subjects = self.subjects.lock().await;
        let subject = subjects
            .get_mut(subject_id)
            .ok_or_else(|| VoteError::SubjectNotFound(subject_id.to_string()))?;

        subject.record(voter_id, direction);
        Ok(VoteOutcome {
            subject_id: subject_id.to_string(),
            tally: subject.tally,
            current: direction,
        })
    }

    /// Explicit add/remove protocol
    pub async fn apply(
        &self,
        subject_id: &str,
        voter_id: &str,
        action: VoteAction,
    ) -> Result<VoteOutcome, VoteError> {
        let direction = match action {
            VoteAction::Add => Some(VoteDirection::Up),
            VoteAction::Remove => None,
        };
        self.set_vote(subject_id, voter_id, direction).await
    }

    /// Directional toggle: same direction clears, other direction switches
    pub async fn toggle(
        &self,
        subject_id: &str,
        voter_id: &str,
        direction: VoteDirection,
    ) -> Result<VoteOutcome, VoteError> {
        let mut subjects = self.subjects.lock().await;
        let subject = subjects
            .get_mut(subject_id)
            .ok_or_else(|| VoteError::SubjectNotFound(subject_id.to_string()))?;

        // Read and write under one lock so a double-submit cannot interleave
        let target = if subject.current(voter_id) == Some(direction) {
            None
        } else {
            Some(direction)
        };
        subject.record(voter_id, target);

        Ok(VoteOutcome {
            subject_id: subject_id.to_string(),
            tally: subject.tally,
            current: target,
        })
    }

    pub async fn tally(&self, subject_id: &str) -> Result<i64, VoteError> {
        self.subjects
            .lock()
            .await
            .get(subject_id)
            .map(|subject| subject.tally)
            .ok_or_else(|| VoteError::SubjectNotFound(subject_id.to_string()))
    }

    /// The voter's ballot and when it was last cast
    pub async fn ballot(
        &self,
        subject_id: &str,
        voter_id: &str,
    ) -> Result<Option<(VoteDirection, DateTime<Utc>)>, VoteError> {
        let subjects = self.subjects.lock().await;
        let subject = subjects
            .get(subject_id)
            .ok_or_else(|| VoteError::SubjectNotFound(subject_id.to_string()))?;
        Ok(subject
            .ballots
            .get(voter_id)
            .map(|ballot| (ballot.direction, ballot.cast_at)))
    }

    /// Star rating relative to the number of users who could have voted
    pub async fn stats(&self, subject_id: &str, total_users: u64) -> Result<VoteStats, VoteError> {
        let subjects = self.subjects.lock().await;
        let subject = subjects
            .get(subject_id)
            .ok_or_else(|| VoteError::SubjectNotFound(subject_id.to_string()))?;

        let up_votes = subject
            .ballots
            .values()
            .filter(|ballot| ballot.direction == VoteDirection::Up)
            .count();
        let down_votes = subject.ballots.len() - up_votes;

        let ratio = if total_users > 0 {
            up_votes as f64 / total_users as f64
        } else {
            0.0
        };
        let stars = (ratio * 5.0).round().clamp(0.0, 5.0) as u8;

        Ok(VoteStats {
            tally: subject.tally,
            up_votes,
            down_votes,
            total_users,
            ratio,
            stars,
        })
    }
}
