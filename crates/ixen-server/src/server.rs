//! Axum router and JSON endpoints

use crate::error::ApiError;
use crate::{assets, sse};
use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::{get, post},
    Router,
};
use ixen_agent::{Classifier, ClassifyRequest, ClassifyResponse};
use ixen_core::IxenConfig;
use ixen_dashboard::{ProfileCache, ViewerProfile};
use ixen_relay::LiveConnector;
use serde::Deserialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::info;

/// Shared application state
pub struct AppState {
    pub config: IxenConfig,
    pub connector: Arc<dyn LiveConnector>,
    pub classifier: Arc<dyn Classifier>,
    pub profiles: ProfileCache,
    active_sessions: AtomicUsize,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(
        config: IxenConfig,
        connector: Arc<dyn LiveConnector>,
        classifier: Arc<dyn Classifier>,
    ) -> SharedState {
        Arc::new(Self {
            config,
            connector,
            classifier,
            profiles: ProfileCache::new(),
            active_sessions: AtomicUsize::new(0),
        })
    }

    /// Sessions whose task has not finished yet
    pub fn active_sessions(&self) -> usize {
        self.active_sessions.load(Ordering::SeqCst)
    }

    pub(crate) fn session_started(&self) {
        self.active_sessions.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn session_finished(&self) {
        self.active_sessions.fetch_sub(1, Ordering::SeqCst);
    }
}

/// All routes, with the UI as fallback
pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/api/live", get(sse::live_handler))
        .route("/api/classify", post(classify))
        .route("/api/profile/:username", get(profile))
        .route("/api/health", get(health))
        .fallback(assets::static_handler)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve on an already bound listener
pub async fn serve(listener: TcpListener, state: SharedState) -> anyhow::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(
            "Serving on {} (transport: {}, classifier: {})",
            addr,
            state.connector.name(),
            state.classifier.name()
        );
    }
    axum::serve(listener, router(state)).await?;
    Ok(())
}

/// POST /api/classify
async fn classify(
    State(app): State<SharedState>,
    Json(request): Json<ClassifyRequest>,
) -> Result<Json<ClassifyResponse>, ApiError> {
    if request.comment.trim().is_empty() {
        return Err(ApiError::bad_request("Comment is required"));
    }

    let category = app.classifier.classify(&request.comment).await?;
    Ok(Json(ClassifyResponse { category }))
}

#[derive(Debug, Deserialize)]
pub struct ProfileQuery {
    pub avatar: Option<String>,
}

/// GET /api/profile/:username
async fn profile(
    State(app): State<SharedState>,
    Path(username): Path<String>,
    Query(query): Query<ProfileQuery>,
) -> Result<Json<ViewerProfile>, ApiError> {
    let username = username.trim().trim_start_matches('@');
    if username.is_empty() {
        return Err(ApiError::bad_request("Username is required"));
    }

    Ok(Json(
        app.profiles
            .get_or_generate(username, query.avatar.as_deref()),
    ))
}

/// GET /api/health
async fn health(State(app): State<SharedState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "ixen",
        "sessions": app.active_sessions(),
    }))
}
