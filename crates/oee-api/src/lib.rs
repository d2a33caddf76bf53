//! ---
//! oee_section: "05-networking-external-interfaces"
//! oee_subsection: "module"
//! oee_type: "source"
//! oee_scope: "code"
//! oee_description: "REST query and override surface for production cells."
//! oee_version: "v0.1.0"
//! oee_owner: "tbd"
//! ---

use std::fmt;
use std::net::{SocketAddr, TcpListener as StdTcpListener};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use oee_core::{CellRegistry, DashboardSummary, RegistryError};
use oee_sim::{CellSnapshot, ExternalStatus};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Shared API state exposed to handlers.
pub struct ApiState {
    registry: Arc<CellRegistry>,
    start: Instant,
}

impl ApiState {
    pub fn new(registry: Arc<CellRegistry>) -> Self {
        Self {
            registry,
            start: Instant::now(),
        }
    }
}

impl fmt::Debug for ApiState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiState")
            .field("cells", &self.registry.len())
            .finish()
    }
}

/// Handle to the running API server.
#[derive(Debug)]
pub struct ApiServer {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<Result<()>>,
}

impl ApiServer {
    /// Bound address; resolves port 0 to the actual port.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        match self.task.await {
            Ok(result) => result,
            Err(err) => Err(err.into()),
        }
    }
}

/// Routes of the REST surface, without a listener.
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/api/cells", get(list_cells))
        .route("/api/cells/:id", get(get_cell))
        .route("/api/cells/:id/increment", post(increment_cell))
        .route("/api/cells/:id/toggle", post(toggle_cell))
        .route("/api/dashboard/summary", get(dashboard_summary))
        .route("/health", get(health))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Spawn the REST API.
pub fn spawn_api_server(state: Arc<ApiState>, addr: SocketAddr) -> Result<ApiServer> {
    let router = router(state);

    let listener = StdTcpListener::bind(addr)
        .with_context(|| format!("failed to bind API listener {addr}"))?;
    listener
        .set_nonblocking(true)
        .context("failed to configure API listener as non-blocking")?;
    let addr = listener
        .local_addr()
        .context("failed to read API listener address")?;
    let tcp_listener =
        TcpListener::from_std(listener).context("failed to create tokio listener")?;

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let handle: JoinHandle<Result<()>> = tokio::spawn(async move {
        info!(address = %addr, "api server listening");
        if let Err(err) = axum::serve(tcp_listener, router)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            })
            .await
        {
            error!(address = %addr, error = %err, "api server exited with error");
            return Err(err.into());
        }
        Ok(())
    });

    Ok(ApiServer {
        addr,
        shutdown: Some(shutdown_tx),
        task: handle,
    })
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug, Serialize)]
struct ToggleResponse {
    id: String,
    status: ExternalStatus,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    timestamp: DateTime<Utc>,
    uptime_seconds: u64,
    cells: usize,
}

#[derive(Debug, Deserialize)]
struct IncrementRequest {
    #[serde(default = "default_increment")]
    amount: i64,
}

fn default_increment() -> i64 {
    1
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        let status = match err {
            RegistryError::NotFound(_) => StatusCode::NOT_FOUND,
            RegistryError::InvalidAmount(_) => StatusCode::BAD_REQUEST,
        };
        Self::new(status, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

async fn list_cells(State(state): State<Arc<ApiState>>) -> Json<Vec<CellSnapshot>> {
    Json(state.registry.snapshot_all())
}

async fn get_cell(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
) -> Result<Json<CellSnapshot>, ApiError> {
    Ok(Json(state.registry.snapshot(&id)?))
}

/// An empty body means an increment of one.
async fn increment_cell(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<CellSnapshot>, ApiError> {
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        IncrementRequest {
            amount: default_increment(),
        }
    } else {
        serde_json::from_slice::<IncrementRequest>(&body).map_err(|err| {
            ApiError::new(StatusCode::BAD_REQUEST, format!("invalid request body: {err}"))
        })?
    };
    let snapshot = state
        .registry
        .increment_production(&id, request.amount, Utc::now())?;
    Ok(Json(snapshot))
}

async fn toggle_cell(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
) -> Result<Json<ToggleResponse>, ApiError> {
    let status = state.registry.toggle_status(&id, Utc::now())?;
    Ok(Json(ToggleResponse { id, status }))
}

async fn dashboard_summary(State(state): State<Arc<ApiState>>) -> Json<DashboardSummary> {
    Json(state.registry.summary(Utc::now()))
}

async fn health(State(state): State<Arc<ApiState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "UP",
        timestamp: Utc::now(),
        uptime_seconds: state.start.elapsed().as_secs(),
        cells: state.registry.len(),
    })
}
