use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use serde_json::{Value, json};
use tokio::{
    net::TcpListener,
    signal::unix::{SignalKind, signal},
};
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use crate::{
    config::Config,
    solver_gateway::{
        context::CallContext,
        error::{ClassifiedError, ErrorKind, FieldViolation},
        orchestrator::{Orchestrator, http_status},
    },
};

#[derive(Clone)]
pub struct AppState {
    orchestrator: Arc<Orchestrator>,
    /// Parent of every request's cancellation; cancelled once shutdown starts.
    shutdown: CancellationToken,
}

impl AppState {
    fn call_context(&self) -> CallContext {
        self.orchestrator
            .call_context()
            .with_parent_cancellation(&self.shutdown)
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    kind: ErrorKind,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    details: Vec<FieldViolation>,
}

impl IntoResponse for ClassifiedError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(http_status(self.kind)).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorBody {
            error: self.message,
            kind: self.kind,
            details: self.details,
        };
        (status, Json(body)).into_response()
    }
}

pub fn router(orchestrator: Arc<Orchestrator>) -> Router {
    router_with_shutdown(orchestrator, CancellationToken::new())
}

/// Cancelling `shutdown` abandons every in-flight solver call.
pub fn router_with_shutdown(
    orchestrator: Arc<Orchestrator>,
    shutdown: CancellationToken,
) -> Router {
    Router::new()
        .route("/api/optimize", post(optimize))
        .route("/api/rebalance", post(rebalance))
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState {
            orchestrator,
            shutdown,
        })
}

async fn optimize(State(state): State<AppState>, body: Bytes) -> Response {
    let ctx = state.call_context();
    // Dropping the handler (client went away) cancels the solver call.
    let _abandon_on_drop = ctx.cancellation().clone().drop_guard();

    let outcome = state.orchestrator.optimize_body(&body, &ctx).await;
    with_request_id(outcome.map(Json).into_response(), ctx.request_id())
}

async fn rebalance(State(state): State<AppState>, body: Bytes) -> Response {
    let ctx = state.call_context();
    let _abandon_on_drop = ctx.cancellation().clone().drop_guard();

    let outcome = state.orchestrator.rebalance_body(&body, &ctx).await;
    with_request_id(outcome.map(Json).into_response(), ctx.request_id())
}

async fn healthz(State(state): State<AppState>) -> Json<Value> {
    let mode = if state.orchestrator.is_mock() {
        "mock"
    } else {
        "live"
    };
    Json(json!({ "status": "ok", "mode": mode }))
}

fn with_request_id(mut response: Response, request_id: &str) -> Response {
    if let Ok(value) = HeaderValue::from_str(request_id) {
        response.headers_mut().insert("x-request-id", value);
    }
    response
}

pub async fn run(config: Config) -> Result<()> {
    let orchestrator = Orchestrator::from_config(&config.solver)
        .context("failed to build solver orchestrator")?;
    let mode = if orchestrator.is_mock() { "mock" } else { "live" };
    let shutdown = CancellationToken::new();
    let app = router_with_shutdown(Arc::new(orchestrator), shutdown.clone());

    let listener = TcpListener::bind(config.server.listen_addr)
        .await
        .with_context(|| format!("unable to bind {}", config.server.listen_addr))?;

    let mut sigint =
        signal(SignalKind::interrupt()).context("unable to listen for SIGINT (Ctrl+C)")?;
    let mut sigterm = signal(SignalKind::terminate()).context("unable to listen for SIGTERM")?;

    tracing::info!(
        target: "server",
        listen_addr = %config.server.listen_addr,
        mode = mode,
        request_timeout_ms = config.solver.request_timeout_ms,
        "gateway_listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let signal_name = tokio::select! {
                _ = sigint.recv() => "SIGINT",
                _ = sigterm.recv() => "SIGTERM",
            };
            tracing::info!(target: "server", signal = signal_name, "gateway_stopping");
            shutdown.cancel();
        })
        .await
        .context("gateway server failed")?;

    tracing::info!(target: "server", "gateway_stopped");
    Ok(())
}
