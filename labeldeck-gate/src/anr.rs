//! A&R demo and submission registry
//!
//! Demos and submissions are separate listings, each backed by its own
//! [`VoteBook`], so a submission id can never be voted on as a demo. Listings
//! never carry ratings: a demo only says whether the caller has voted, and a
//! submission only shows the caller's own ballot. Tallies stay behind
//! [`AnrDesk::demo_stats`] and the admin views.

use crate::votes::{VoteAction, VoteBook, VoteDirection, VoteError, VoteOutcome, VoteStats};
use chrono::{DateTime, Utc};
use labeldeck_common::config::DemoSeed;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

const UNTITLED: &str = "Untitled";
const UNKNOWN_ARTIST: &str = "Unknown";
const DEFAULT_GENRE: &str = "Electronic";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Demo {
    pub id: String,
    pub title: String,
    pub artist: String,
    pub submitted_by: String,
    pub status: String,
    pub submitted_at: DateTime<Utc>,
}

/// Demo as listed to one caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DemoView {
    #[serde(flatten)]
    pub demo: Demo,
    pub has_voted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub id: String,
    pub artist: String,
    pub track: String,
    pub genre: String,
    pub url: String,
    pub status: String,
    pub submitted_at: DateTime<Utc>,
}

/// Submission as listed to one caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionView {
    #[serde(flatten)]
    pub submission: Submission,
    pub user_vote: Option<VoteDirection>,
    /// Net tally, only filled for admins
    #[serde(skip_serializing_if = "Option::is_none")]
    pub votes: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct NewDemo {
    pub title: Option<String>,
    pub artist: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewSubmission {
    pub artist: String,
    pub track: String,
    pub url: String,
    pub genre: Option<String>,
}

/// Demo and submission listings plus their vote books
#[derive(Debug)]
pub struct AnrDesk {
    demos: RwLock<Vec<Demo>>,
    submissions: RwLock<Vec<Submission>>,
    demo_votes: VoteBook,
    submission_votes: VoteBook,
    voter_pool: u64,
    sequence: AtomicU64,
}

impl AnrDesk {
    /// `voter_pool` is the star-rating denominator
    pub fn new(voter_pool: u64) -> Self {
        Self {
            demos: RwLock::new(Vec::new()),
            submissions: RwLock::new(Vec::new()),
            demo_votes: VoteBook::new(),
            submission_votes: VoteBook::new(),
            voter_pool,
            sequence: AtomicU64::new(0),
        }
    }

    /// Register a configured demo; an id already listed keeps its entry
    pub async fn seed_demo(&self, seed: &DemoSeed) {
        let mut demos = self.demos.write().await;
        if demos.iter().any(|demo| demo.id == seed.id) {
            return;
        }

        demos.push(Demo {
            id: seed.id.clone(),
            title: or_default(seed.title.as_deref(), UNTITLED),
            artist: or_default(seed.artist.as_deref(), UNKNOWN_ARTIST),
            submitted_by: "config".to_string(),
            status: "new".to_string(),
            submitted_at: Utc::now(),
        });
        self.demo_votes.open_subject(seed.id.as_str()).await;
    }

    /// List a new demo, newest first, and open it for voting
    pub async fn submit_demo(&self, new: NewDemo, submitter_id: &str) -> Demo {
        let demo = Demo {
            id: self.next_id("demo"),
            title: or_default(new.title.as_deref(), UNTITLED),
            artist: or_default(new.artist.as_deref(), UNKNOWN_ARTIST),
            submitted_by: display_name(submitter_id),
            status: "new".to_string(),
            submitted_at: Utc::now(),
        };

        self.demo_votes.open_subject(demo.id.as_str()).await;
        self.demos.write().await.insert(0, demo.clone());
        tracing::info!(demo_id = %demo.id, submitted_by = %demo.submitted_by, "Demo submitted");
        demo
    }

    /// Every demo with whether `voter_id` has a ballot on it
    pub async fn demos_for(&self, voter_id: &str) -> Vec<DemoView> {
        let demos = self.demos.read().await.clone();
        let mut views = Vec::with_capacity(demos.len());
        for demo in demos {
            let has_voted = matches!(self.demo_votes.ballot(&demo.id, voter_id).await, Ok(Some(_)));
            views.push(DemoView { demo, has_voted });
        }
        views
    }

    pub async fn vote_demo(
        &self,
        demo_id: &str,
        voter_id: &str,
        action: VoteAction,
    ) -> Result<VoteOutcome, VoteError> {
        self.demo_votes.apply(demo_id, voter_id, action).await
    }

    pub async fn demo_stats(&self, demo_id: &str) -> Result<VoteStats, VoteError> {
        self.demo_votes.stats(demo_id, self.voter_pool).await
    }

    /// List a new submission, newest first, and open it for voting
    pub async fn submit(&self, new: NewSubmission) -> Submission {
        let submission = Submission {
            id: self.next_id("sub"),
            artist: new.artist,
            track: new.track,
            genre: or_default(new.genre.as_deref(), DEFAULT_GENRE),
            url: new.url,
            status: "pending".to_string(),
            submitted_at: Utc::now(),
        };

        self.submission_votes
            .open_subject(submission.id.as_str())
            .await;
        self.submissions.write().await.insert(0, submission.clone());
        tracing::info!(submission_id = %submission.id, "Submission received");
        submission
    }

    /// Every submission with `voter_id`'s ballot; tallies only when `with_tally`
    pub async fn submissions_for(&self, voter_id: &str, with_tally: bool) -> Vec<SubmissionView> {
        let submissions = self.submissions.read().await.clone();
        let mut views = Vec::with_capacity(submissions.len());
        for submission in submissions {
            let user_vote = self
                .submission_votes
                .ballot(&submission.id, voter_id)
                .await
                .ok()
                .flatten()
                .map(|(direction, _)| direction);
            let votes = if with_tally {
                self.submission_votes.tally(&submission.id).await.ok()
            } else {
                None
            };
            views.push(SubmissionView {
                submission,
                user_vote,
                votes,
            });
        }
        views
    }

    /// Same direction twice clears the ballot; the other direction switches it
    pub async fn vote_submission(
        &self,
        submission_id: &str,
        voter_id: &str,
        direction: VoteDirection,
    ) -> Result<VoteOutcome, VoteError> {
        self.submission_votes
            .toggle(submission_id, voter_id, direction)
            .await
    }

    pub async fn submission_stats(&self, submission_id: &str) -> Result<VoteStats, VoteError> {
        self.submission_votes
            .stats(submission_id, self.voter_pool)
            .await
    }

    /// Drop a submission and its ballots
    pub async fn remove_submission(&self, submission_id: &str) -> bool {
        let mut submissions = self.submissions.write().await;
        let before = submissions.len();
        submissions.retain(|submission| submission.id != submission_id);
        let listed = submissions.len() != before;

        let closed = self.submission_votes.close_subject(submission_id).await;
        listed || closed
    }

    /// `{prefix}_{millis}_{seq}`; unique within the process
    fn next_id(&self, prefix: &str) -> String {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        format!("{}_{}_{}", prefix, Utc::now().timestamp_millis(), seq)
    }
}

fn or_default(value: Option<&str>, fallback: &str) -> String {
    match value.map(str::trim) {
        Some(value) if !value.is_empty() => value.to_string(),
        _ => fallback.to_string(),
    }
}

/// Local part of an email-like principal id
fn display_name(principal_id: &str) -> String {
    principal_id
        .split('@')
        .next()
        .unwrap_or(principal_id)
        .to_string()
}
