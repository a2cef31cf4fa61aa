//! Application setup and server configuration.

use std::sync::Arc;

use axum::http::header::CONTENT_TYPE;
use axum::http::Method;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use ratchet::{EngineBuilder, RetryPolicy, StepRegistry};

use crate::domains::analysis::workflows::{register_analysis_steps, AppEngine};
use crate::kernel::ServerDeps;
use crate::server::routes::{
    active_workflows, delete_analysis, get_analysis, health_handler, list_analyses,
    start_analysis, workflow_status,
};

/// Shared application state
#[derive(Clone)]
pub struct AxumAppState {
    pub engine: AppEngine,
    pub deps: Arc<ServerDeps>,
}

/// Build the workflow engine with the analysis domain's steps registered.
///
/// One engine per process, passed by handle to every call site. The retry
/// policy here is the single policy every step runs under.
pub fn build_engine(deps: Arc<ServerDeps>) -> AppEngine {
    let mut registry = StepRegistry::new();
    register_analysis_steps(&mut registry);

    EngineBuilder::from_arc(deps)
        .with_registry(registry)
        .with_retry_policy(RetryPolicy::default())
        .build()
}

/// Build the Axum application router.
///
/// Returns (Router, AppEngine) — the engine is also needed at startup for
/// workflow recovery.
pub fn build_app(deps: Arc<ServerDeps>) -> (Router, AppEngine) {
    let engine = build_engine(deps.clone());

    let app_state = AxumAppState {
        engine: engine.clone(),
        deps,
    };

    // CORS configuration - the web UI runs as a separate service
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([CONTENT_TYPE]);

    let app = Router::new()
        .route("/api/analyses", post(start_analysis).get(list_analyses))
        .route(
            "/api/analyses/:id",
            get(get_analysis).delete(delete_analysis),
        )
        .route("/api/workflows/active", get(active_workflows))
        .route("/api/workflows/:id/status", get(workflow_status))
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state);

    (app, engine)
}
