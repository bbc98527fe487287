//! API handlers for the deployment orchestrator

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use panel_common::JobKind;
use std::sync::Arc;
use tracing::info;

use crate::{
    auth::{require_admin, Principal},
    error::ApiError,
    models::{
        BlockChain, BlockChainListResponse, ChainSettings, JobEntry, JobListResponse,
        JobStatusResponse, LifecycleView, ReportStatusRequest, SetStatusRequest,
    },
    orchestrator::{Orchestrator, TriggerOutcome},
    storage::Store,
};

/// Shared application state
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub orchestrator: Orchestrator,
}

fn parse_kind(kind: &str) -> Result<JobKind, ApiError> {
    kind.parse::<JobKind>()
        .map_err(|e| ApiError::bad_request(e.to_string()))
}

async fn load_live_blockchain(state: &AppState, id: u64) -> Result<BlockChain, ApiError> {
    match state.store.get_blockchain(id).await? {
        Some(chain) if !chain.deleted => Ok(chain),
        _ => Err(ApiError::not_found(format!("Blockchain not found: {}", id))),
    }
}

/// Health check
pub async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "deploy-orchestrator"
    }))
}

/// Register a new blockchain deployment
pub async fn register_blockchain_handler(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Json(settings): Json<ChainSettings>,
) -> Result<(StatusCode, Json<BlockChain>), ApiError> {
    require_admin(&principal)?;
    settings.validate().map_err(ApiError::bad_request)?;

    info!(
        "Registering blockchain {} for {}",
        settings.abbreviation, principal.email
    );

    let id = state.store.next_blockchain_id().await?;
    let chain = BlockChain::new(id, settings, &principal.email);

    if !state.store.insert_blockchain(&chain).await? {
        return Err(ApiError::new(
            StatusCode::CONFLICT,
            format!("Abbreviation already in use: {}", chain.abbreviation()),
        ));
    }

    Ok((StatusCode::CREATED, Json(chain)))
}

/// List blockchain deployments
pub async fn list_blockchains_handler(
    State(state): State<Arc<AppState>>,
    _principal: Principal,
) -> Result<Json<BlockChainListResponse>, ApiError> {
    let blockchains: Vec<BlockChain> = state
        .store
        .list_blockchains()
        .await?
        .into_iter()
        .filter(|c| !c.deleted)
        .collect();
    let total = blockchains.len();

    Ok(Json(BlockChainListResponse { blockchains, total }))
}

/// Get a blockchain deployment
pub async fn get_blockchain_handler(
    State(state): State<Arc<AppState>>,
    _principal: Principal,
    Path(id): Path<u64>,
) -> Result<Json<BlockChain>, ApiError> {
    Ok(Json(load_live_blockchain(&state, id).await?))
}

/// Soft delete a blockchain deployment
pub async fn delete_blockchain_handler(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Path(id): Path<u64>,
) -> Result<Json<BlockChain>, ApiError> {
    require_admin(&principal)?;

    let mut chain = load_live_blockchain(&state, id).await?;
    chain.mark_deleted(&principal.email);
    state.store.update_blockchain(&chain).await?;

    info!("Blockchain {} deleted by {}", id, principal.email);
    Ok(Json(chain))
}

/// Set the display status of a deployment
pub async fn set_status_handler(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Path(id): Path<u64>,
    Json(payload): Json<SetStatusRequest>,
) -> Result<Json<BlockChain>, ApiError> {
    require_admin(&principal)?;

    let mut chain = load_live_blockchain(&state, id).await?;
    chain.status = payload.status;
    state.store.update_blockchain(&chain).await?;

    info!("Blockchain {} status set to {}", id, chain.status);
    Ok(Json(chain))
}

/// Display status and the newest job of every lane
pub async fn lifecycle_handler(
    State(state): State<Arc<AppState>>,
    _principal: Principal,
    Path(id): Path<u64>,
) -> Result<Json<LifecycleView>, ApiError> {
    Ok(Json(state.orchestrator.lifecycle(id).await?))
}

/// Start a build, deploy or terminate job
pub async fn trigger_handler(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Path((id, kind)): Path<(u64, String)>,
) -> Result<Response, ApiError> {
    let kind = parse_kind(&kind)?;
    info!("{} requested {} for blockchain {}", principal.email, kind, id);

    let outcome = state.orchestrator.trigger(id, kind, &principal).await?;
    let status = match &outcome {
        TriggerOutcome::Triggered { .. } => StatusCode::CREATED,
        TriggerOutcome::Conflict { .. } => StatusCode::CONFLICT,
        TriggerOutcome::RemoteAnomaly { .. } => StatusCode::ACCEPTED,
    };

    Ok((status, Json(outcome)).into_response())
}

/// List the jobs of one lane
pub async fn list_jobs_handler(
    State(state): State<Arc<AppState>>,
    _principal: Principal,
    Path((id, kind)): Path<(u64, String)>,
) -> Result<Json<JobListResponse>, ApiError> {
    let kind = parse_kind(&kind)?;
    let jobs = state.orchestrator.list(id, kind).await?;
    let total = jobs.len();

    Ok(Json(JobListResponse {
        blockchain_id: id,
        kind,
        jobs,
        total,
    }))
}

/// Get a ledger entry
pub async fn get_job_handler(
    State(state): State<Arc<AppState>>,
    _principal: Principal,
    Path(entry_id): Path<u64>,
) -> Result<Json<JobEntry>, ApiError> {
    match state.store.get_entry(entry_id).await? {
        Some(entry) => Ok(Json(entry)),
        None => Err(ApiError::not_found(format!(
            "Ledger entry not found: {}",
            entry_id
        ))),
    }
}

/// Record the status a pipeline reported for its job
pub async fn report_job_status_handler(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Path(entry_id): Path<u64>,
    Json(payload): Json<ReportStatusRequest>,
) -> Result<Json<JobEntry>, ApiError> {
    let entry = state
        .orchestrator
        .report_status(entry_id, &payload.status, &principal)
        .await?;

    Ok(Json(entry))
}

/// Ask the CI server for a job's current status
pub async fn job_status_handler(
    State(state): State<Arc<AppState>>,
    _principal: Principal,
    Path(entry_id): Path<u64>,
) -> Result<Json<JobStatusResponse>, ApiError> {
    let (entry, response) = state.orchestrator.status(entry_id).await?;

    Ok(Json(JobStatusResponse {
        entry_id: entry.id,
        build_no: entry.build_no,
        remote: response.body,
    }))
}
