//! Reputation Admin API Endpoints
//!
//! Score inspection and correction, policy configuration, and outcome
//! ingestion for authentication pipelines running out of process.
//! Scores are visible here because every route sits behind admin auth.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

use crate::error::ReputationError;
use crate::policy::PolicyRequest;
use crate::reputation::{
    LoginOutcome, OutcomeListener, PolicyDirectory, ReputationKind, ReputationPolicyConfig,
    ReputationPolicyDraft, ReputationRecord, ReputationUpdater, ReputationVerdict, ScoreStore,
};

/// API state for reputation endpoints
#[derive(Clone)]
pub struct ReputationApiState {
    pub store: Arc<dyn ScoreStore>,
    pub updater: ReputationUpdater,
    pub policies: Arc<PolicyDirectory>,
}

impl ReputationApiState {
    pub fn new(store: Arc<dyn ScoreStore>, policies: Arc<PolicyDirectory>) -> Self {
        Self {
            updater: ReputationUpdater::new(store.clone()),
            store,
            policies,
        }
    }
}

type ApiError = (StatusCode, String);

fn api_error(e: ReputationError) -> ApiError {
    let status = match e {
        ReputationError::Validation(_) => StatusCode::BAD_REQUEST,
        ReputationError::PolicyNotFound(_) => StatusCode::NOT_FOUND,
        ReputationError::PolicyExists(_) => StatusCode::CONFLICT,
        ReputationError::Storage(_) | ReputationError::OutcomeNotRecorded { .. } => {
            error!(error = %e, "Reputation storage failure");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, e.to_string())
}

// Request / response types

#[derive(Debug, Deserialize)]
pub struct ScoresQuery {
    pub kind: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ScoreResponse {
    pub kind: ReputationKind,
    pub key: String,
    pub score: i64,
    /// `None` when the key has never been written
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<ReputationRecord> for ScoreResponse {
    fn from(record: ReputationRecord) -> Self {
        Self {
            kind: record.kind,
            key: record.key,
            score: record.score,
            updated_at: Some(record.updated_at),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ScoreListResponse {
    pub total: usize,
    pub records: Vec<ScoreResponse>,
}

#[derive(Debug, Deserialize)]
pub struct SetScoreRequest {
    pub score: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PolicyListResponse {
    pub total: usize,
    pub policies: Vec<ReputationPolicyConfig>,
}

fn parse_kind(kind: &str) -> Result<ReputationKind, ApiError> {
    kind.parse().map_err(api_error)
}

// Endpoints

/// GET /reputation/scores?kind= - List score records, worst first
pub async fn list_scores(
    State(state): State<ReputationApiState>,
    Query(query): Query<ScoresQuery>,
) -> Result<Json<ScoreListResponse>, ApiError> {
    let kind = query.kind.as_deref().map(parse_kind).transpose()?;
    let records = state.store.list(kind).await.map_err(api_error)?;

    Ok(Json(ScoreListResponse {
        total: records.len(),
        records: records.into_iter().map(ScoreResponse::from).collect(),
    }))
}

/// GET /reputation/scores/{kind}/{key} - Read one record
pub async fn get_score(
    State(state): State<ReputationApiState>,
    Path((kind, key)): Path<(String, String)>,
) -> Result<Json<ScoreResponse>, ApiError> {
    let kind = parse_kind(&kind)?;
    let record = state.store.record(kind, &key).await.map_err(api_error)?;

    Ok(Json(match record {
        Some(record) => record.into(),
        None => ScoreResponse {
            kind,
            key,
            score: 0,
            updated_at: None,
        },
    }))
}

/// PUT /reputation/scores/{kind}/{key} - Overwrite a score
pub async fn set_score(
    State(state): State<ReputationApiState>,
    Path((kind, key)): Path<(String, String)>,
    Json(payload): Json<SetScoreRequest>,
) -> Result<Json<ScoreResponse>, ApiError> {
    let kind = parse_kind(&kind)?;
    state
        .store
        .set(kind, &key, payload.score)
        .await
        .map_err(api_error)?;

    info!(kind = %kind, key = %key, "Score reset by administrator");

    let record = state
        .store
        .record(kind, &key)
        .await
        .map_err(api_error)?
        .unwrap_or_else(|| ReputationRecord::new(kind, key, payload.score));

    Ok(Json(record.into()))
}

/// GET /reputation/policies - List policy configs
pub async fn list_policies(State(state): State<ReputationApiState>) -> Json<PolicyListResponse> {
    let policies = state.policies.list().await;
    Json(PolicyListResponse {
        total: policies.len(),
        policies,
    })
}

/// POST /reputation/policies - Create a policy config
pub async fn create_policy(
    State(state): State<ReputationApiState>,
    Json(draft): Json<ReputationPolicyDraft>,
) -> Result<(StatusCode, Json<ReputationPolicyConfig>), ApiError> {
    let config = ReputationPolicyConfig::from_draft(draft).map_err(api_error)?;
    let created = state.policies.create(config).await.map_err(api_error)?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /reputation/policies/{name}
pub async fn get_policy(
    State(state): State<ReputationApiState>,
    Path(name): Path<String>,
) -> Result<Json<ReputationPolicyConfig>, ApiError> {
    state.policies.get(&name).await.map(Json).map_err(api_error)
}

/// PUT /reputation/policies/{name} - Replace a policy config
pub async fn replace_policy(
    State(state): State<ReputationApiState>,
    Path(name): Path<String>,
    Json(mut draft): Json<ReputationPolicyDraft>,
) -> Result<Json<ReputationPolicyConfig>, ApiError> {
    if draft.name.is_none() {
        draft.name = Some(name.clone());
    }
    let config = ReputationPolicyConfig::from_draft(draft).map_err(api_error)?;
    state
        .policies
        .replace(&name, config)
        .await
        .map(Json)
        .map_err(api_error)
}

/// DELETE /reputation/policies/{name}
pub async fn delete_policy(
    State(state): State<ReputationApiState>,
    Path(name): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.policies.delete(&name).await.map_err(api_error)?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /reputation/policies/{name}/evaluate - Dry-run a policy
pub async fn evaluate_policy(
    State(state): State<ReputationApiState>,
    Path(name): Path<String>,
    Json(request): Json<PolicyRequest>,
) -> Result<Json<ReputationVerdict>, ApiError> {
    let policy = state.policies.policy(&name).await.map_err(api_error)?;
    policy.evaluate(&request).await.map(Json).map_err(api_error)
}

/// POST /reputation/outcomes - Ingest a login outcome
pub async fn record_outcome(
    State(state): State<ReputationApiState>,
    Json(outcome): Json<LoginOutcome>,
) -> Result<StatusCode, ApiError> {
    state.updater.notify(&outcome).await.map_err(api_error)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Create the reputation API router
pub fn create_reputation_router(state: ReputationApiState) -> Router {
    Router::new()
        .route("/scores", get(list_scores))
        .route("/scores/{kind}/{key}", get(get_score).put(set_score))
        .route("/policies", get(list_policies).post(create_policy))
        .route(
            "/policies/{name}",
            get(get_policy).put(replace_policy).delete(delete_policy),
        )
        .route("/policies/{name}/evaluate", post(evaluate_policy))
        .route("/outcomes", post(record_outcome))
        .with_state(state)
}
