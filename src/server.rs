use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tower_http::{
    cors::CorsLayer,
    services::{ServeDir, ServeFile},
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::{catalog, probe, sweep, types::ProbeRequest};

/// Concurrency used by `/api/health/sweep` when the caller does not pick one.
pub const DEFAULT_SWEEP_CONCURRENCY: usize = 32;

#[derive(Clone, Debug)]
pub struct AppState {
    inner: Arc<ServerConfig>,
}

/// Where the server finds its catalog and static UI.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub data_path: PathBuf,
    pub static_dir: PathBuf,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            inner: Arc::new(config),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct SweepRequest {
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub concurrency: Option<usize>,
}

/// Build the full application router: API under `/api`, static UI elsewhere.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/", get(get_info))
        .route("/health/check", post(post_check))
        .route("/health/sweep", post(post_sweep))
        // Probe results describe a single instant.
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        .with_state(state.clone());

    let static_dir = &state.inner.static_dir;
    let static_svc = ServeDir::new(static_dir)
        .append_index_html_on_directories(true)
        .fallback(ServeFile::new(static_dir.join("index.html")));

    Router::new()
        .nest("/api", api)
        .fallback_service(static_svc)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

pub async fn spawn_server(bind: &str, config: ServerConfig) -> Result<()> {
    let app = router(AppState::new(config));
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("failed to bind {bind}"))?;
    info!("serving portal api on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn get_info() -> impl IntoResponse {
    Json(json!({
        "message": "environment portal api",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn post_check(payload: Result<Json<ProbeRequest>, JsonRejection>) -> Response {
    let req = match payload {
        Ok(Json(req)) => req,
        Err(e) => return bad_request(e.body_text()),
    };

    match probe::probe(&req).await {
        Ok(result) => (StatusCode::OK, Json(result)).into_response(),
        Err(e) => {
            warn!(error = %e, "rejected probe request");
            bad_request(e.to_string())
        }
    }
}

async fn post_sweep(
    State(app): State<AppState>,
    payload: Option<Json<SweepRequest>>,
) -> Response {
    let req = payload.map(|Json(r)| r).unwrap_or_default();
    let catalog = catalog::load_catalog_or_empty(&app.inner.data_path);
    let entries = match req.project.as_deref() {
        Some(id) => catalog.for_project(id),
        None => catalog.environments,
    };
    let concurrency = req.concurrency.unwrap_or(DEFAULT_SWEEP_CONCURRENCY);

    let report = sweep::sweep(&entries, concurrency).await;
    (StatusCode::OK, Json(report)).into_response()
}

fn bad_request(msg: String) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": msg }))).into_response()
}
