//! Deployment Orchestrator
//!
//! Tracks the build → deploy → terminate lifecycle of blockchain
//! deployments, drives the matching jobs on the Drone CI server and keeps a
//! ledger of every attempt.
//!
//! ## Endpoints
//!
//! - `POST /api/blockchains` - Register a deployment configuration
//! - `GET /api/blockchains` - List deployments
//! - `GET /api/blockchains/{id}` - Get a deployment
//! - `DELETE /api/blockchains/{id}` - Soft delete a deployment
//! - `PUT /api/blockchains/{id}/status` - Set the display status
//! - `GET /api/blockchains/{id}/lifecycle` - Display status and lane heads
//! - `POST /api/blockchains/{id}/{kind}` - Trigger build/deploy/terminate
//! - `GET /api/blockchains/{id}/{kind}` - List a lane's jobs
//! - `GET /api/jobs/{entry_id}` - Get a ledger entry
//! - `GET /api/jobs/{entry_id}/status` - Remote status of a job
//! - `PUT /api/jobs/{entry_id}/status` - Record a pipeline-reported status
//! - `GET /health` - Health check

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod locks;
pub mod models;
pub mod orchestrator;
pub mod params;
pub mod storage;

use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use auth::Principal;
pub use config::{Config, StoreBackend};
pub use error::{ApiError, OrchestratorError};
pub use handlers::AppState;
pub use models::{BlockChain, ChainSettings, JobEntry};
pub use orchestrator::{Orchestrator, TriggerOutcome};
pub use params::{EncodingError, ParameterEncoder};
pub use storage::{MemoryStore, RedisStore, Store};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    let shared_state = Arc::new(state);

    Router::new()
        .route("/health", get(handlers::health_handler))
        .route(
            "/api/blockchains",
            post(handlers::register_blockchain_handler).get(handlers::list_blockchains_handler),
        )
        .route(
            "/api/blockchains/{id}",
            get(handlers::get_blockchain_handler).delete(handlers::delete_blockchain_handler),
        )
        .route(
            "/api/blockchains/{id}/status",
            put(handlers::set_status_handler),
        )
        .route(
            "/api/blockchains/{id}/lifecycle",
            get(handlers::lifecycle_handler),
        )
        .route(
            "/api/blockchains/{id}/{kind}",
            post(handlers::trigger_handler).get(handlers::list_jobs_handler),
        )
        .route("/api/jobs/{entry_id}", get(handlers::get_job_handler))
        .route(
            "/api/jobs/{entry_id}/status",
            get(handlers::job_status_handler).put(handlers::report_job_status_handler),
        )
        .with_state(shared_state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
