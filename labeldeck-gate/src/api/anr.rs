//! A&R demo and submission endpoints
//!
//! The voter is always the calling principal. Star ratings are public to
//! every caller; raw tallies are only returned to admins, including in vote
//! responses.

use crate::access::{self, Principal};
use crate::anr::{Demo, DemoView, NewDemo, NewSubmission, Submission, SubmissionView};
use crate::votes::{VoteAction, VoteDirection, VoteOutcome, VoteStats};
use crate::{ApiError, ApiResult, AppState};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Deserialize)]
pub struct SubmitDemoRequest {
    pub title: Option<String>,
    pub artist: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SubmitRequest {
    pub artist: Option<String>,
    pub track: Option<String>,
    pub url: Option<String>,
    pub genre: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VoteRequest {
    pub action: VoteAction,
}

#[derive(Debug, Deserialize)]
pub struct DirectionalVoteRequest {
    pub direction: VoteDirection,
}

#[derive(Debug, Serialize)]
pub struct AnrStateResponse {
    pub demos: Vec<DemoView>,
}

#[derive(Debug, Serialize)]
pub struct SubmissionsResponse {
    pub submissions: Vec<SubmissionView>,
}

/// Caller's ballot after a vote
#[derive(Debug, Serialize)]
pub struct VoteResponse {
    pub subject_id: String,
    pub current: Option<VoteDirection>,
    pub stars: u8,
    /// Admin only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tally: Option<i64>,
}

impl VoteResponse {
    fn new(outcome: VoteOutcome, stats: &VoteStats, principal: &Principal) -> Self {
        Self {
            subject_id: outcome.subject_id,
            current: outcome.current,
            stars: stats.stars,
            tally: principal.is_admin().then_some(outcome.tally),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RatingResponse {
    pub stars: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tally: Option<RatingTally>,
}

/// Admin-only detail
#[derive(Debug, Serialize)]
pub struct RatingTally {
    pub votes: i64,
    pub up_votes: usize,
    pub down_votes: usize,
    pub total_users: u64,
    pub ratio: f64,
}

/// GET /anr/state
///
/// Demo listing without ratings; each demo says whether the caller voted.
pub async fn anr_state(
    State(state): State<AppState>,
    principal: Principal,
) -> Json<AnrStateResponse> {
    Json(AnrStateResponse {
        demos: state.anr.demos_for(&principal.id).await,
    })
}

/// POST /anr/demos
///
/// Any principal may submit; the demo is credited to them.
pub async fn submit_demo(
    State(state): State<AppState>,
    principal: Principal,
    Json(request): Json<SubmitDemoRequest>,
) -> (StatusCode, Json<Demo>) {
    let demo = state
        .anr
        .submit_demo(
            NewDemo {
                title: request.title,
                artist: request.artist,
            },
            &principal.id,
        )
        .await;
    (StatusCode::CREATED, Json(demo))
}

/// POST /anr/vote/:demo_id
pub async fn vote(
    State(state): State<AppState>,
    principal: Principal,
    Path(demo_id): Path<String>,
    Json(request): Json<VoteRequest>,
) -> ApiResult<Json<VoteResponse>> {
    let outcome = state
        .anr
        .vote_demo(&demo_id, &principal.id, request.action)
        .await?;
    let stats = state.anr.demo_stats(&demo_id).await?;
    Ok(Json(VoteResponse::new(outcome, &stats, &principal)))
}

/// GET /anr/stats/:demo_id
pub async fn demo_stats(
    State(state): State<AppState>,
    principal: Principal,
    Path(demo_id): Path<String>,
) -> ApiResult<Json<RatingResponse>> {
    let stats = state.anr.demo_stats(&demo_id).await?;

    let tally = principal.is_admin().then(|| RatingTally {
        votes: stats.tally,
        up_votes: stats.up_votes,
        down_votes: stats.down_votes,
        total_users: stats.total_users,
        ratio: stats.ratio,
    });

    Ok(Json(RatingResponse {
        stars: stats.stars,
        tally,
    }))
}

/// GET /anr/submissions
pub async fn list_submissions(
    State(state): State<AppState>,
    principal: Principal,
) -> Json<SubmissionsResponse> {
    Json(SubmissionsResponse {
        submissions: state
            .anr
            .submissions_for(&principal.id, principal.is_admin())
            .await,
    })
}

/// POST /anr/submissions
pub async fn submit(
    State(state): State<AppState>,
    _principal: Principal,
    Json(request): Json<SubmitRequest>,
) -> ApiResult<(StatusCode, Json<Submission>)> {
    let (artist, track, url) = match (
        required(request.artist),
        required(request.track),
        required(request.url),
    ) {
        (Some(artist), Some(track), Some(url)) => (artist, track, url),
        _ => {
            return Err(ApiError::BadRequest(
                "artist, track and url are required".to_string(),
            ))
        }
    };

    let submission = state
        .anr
        .submit(NewSubmission {
            artist,
            track,
            url,
            genre: request.genre,
        })
        .await;
    Ok((StatusCode::CREATED, Json(submission)))
}

/// POST /anr/submissions/:id/vote
///
/// Same direction twice clears the ballot; the other direction switches it.
pub async fn vote_submission(
    State(state): State<AppState>,
    principal: Principal,
    Path(submission_id): Path<String>,
    Json(request): Json<DirectionalVoteRequest>,
) -> ApiResult<Json<VoteResponse>> {
    let outcome = state
        .anr
        .vote_submission(&submission_id, &principal.id, request.direction)
        .await?;
    let stats = state.anr.submission_stats(&submission_id).await?;
    Ok(Json(VoteResponse::new(outcome, &stats, &principal)))
}

/// DELETE /anr/submissions/:id
///
/// Admin only.
pub async fn remove_submission(
    State(state): State<AppState>,
    principal: Principal,
    Path(submission_id): Path<String>,
) -> ApiResult<StatusCode> {
    access::require_admin(&principal)?;

    if state.anr.remove_submission(&submission_id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!(
            "Submission {}",
            submission_id
        )))
    }
}

fn required(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn anr_routes() -> Router<AppState> {
    Router::new()
        .route("/anr/state", get(anr_state))
        .route("/anr/demos", post(submit_demo))
        .route("/anr/vote/:demo_id", post(vote))
        .route("/anr/stats/:demo_id", get(demo_stats))
        .route("/anr/submissions", get(list_submissions).post(submit))
        .route("/anr/submissions/:id", delete(remove_submission))
        .route("/anr/submissions/:id/vote", post(vote_submission))
}
