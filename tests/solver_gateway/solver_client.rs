use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use axum::{
    Json, Router,
    http::{HeaderMap, StatusCode},
    routing::post,
};
use serde_json::{Value, json};
use tokio::net::TcpListener;

use portfolio_bridge::solver_gateway::{
    client::{HttpSolverClient, SolverClient, classify_http_status},
    context::CallContext,
    error::ErrorKind,
    request_mapper::RequestMapper,
    schema::{parse_optimization_request, parse_rebalance_request},
    types::{SolverConfig, SolverOperation, SolverRebalanceRequest, SolverRequest},
};

use crate::support::{
    live_config, optimize_payload, rebalance_payload, rebalance_raw_json, spawn_stub,
    xyz_raw_json,
};

fn solver_request() -> SolverRequest {
    let request = parse_optimization_request(&optimize_payload()).expect("payload should be valid");
    RequestMapper.to_solver_request(&request)
}

fn solver_rebalance_request() -> SolverRebalanceRequest {
    let request = parse_rebalance_request(&rebalance_payload()).expect("payload should be valid");
    RequestMapper.to_solver_rebalance_request(&request)
}

fn client(config: &SolverConfig) -> HttpSolverClient {
    HttpSolverClient::new(config).expect("client should build")
}

#[derive(Default, Clone)]
struct Captured {
    headers: Arc<Mutex<Option<HeaderMap>>>,
    body: Arc<Mutex<Option<Value>>>,
}

fn capturing_stub(captured: Captured, response: Value) -> Router {
    Router::new().route(
        "/optimize",
        post(move |headers: HeaderMap, Json(body): Json<Value>| {
            let captured = captured.clone();
            let response = response.clone();
            async move {
                *captured.headers.lock().expect("lock") = Some(headers);
                *captured.body.lock().expect("lock") = Some(body);
                Json(response)
            }
        }),
    )
}

#[tokio::test]
async fn given_healthy_solver_when_optimize_called_then_raw_portfolio_is_returned() {
    let captured = Captured::default();
    let base_url = spawn_stub(capturing_stub(captured.clone(), xyz_raw_json())).await;
    let ctx = CallContext::new(Duration::from_secs(5)).with_request_id("req-ok");

    let raw = client(&live_config(Some(format!("{base_url}/")), 5_000))
        .optimize(&ctx, &solver_request())
        .await
        .expect("call should succeed");

    let portfolio = raw.portfolio.expect("portfolio");
    assert_eq!(portfolio.len(), 3);
    assert_eq!(portfolio[0].asset_id, "X");

    let body = captured.body.lock().expect("lock").clone().expect("body seen");
    assert_eq!(body["universe"], json!("DS_A"));
    assert_eq!(body["max_positions"], json!(3));

    let headers = captured
        .headers
        .lock()
        .expect("lock")
        .clone()
        .expect("headers seen");
    assert_eq!(
        headers.get("x-request-id").and_then(|v| v.to_str().ok()),
        Some("req-ok")
    );
    assert!(headers.get("authorization").is_none());
}

#[tokio::test]
async fn given_api_token_when_optimize_called_then_bearer_header_is_sent() {
    let captured = Captured::default();
    let base_url = spawn_stub(capturing_stub(captured.clone(), xyz_raw_json())).await;
    let config = SolverConfig {
        api_token: Some("  s3cret  ".to_string()),
        ..live_config(Some(base_url), 5_000)
    };

    client(&config)
        .optimize(&CallContext::new(Duration::from_secs(5)), &solver_request())
        .await
        .expect("call should succeed");

    let headers = captured
        .headers
        .lock()
        .expect("lock")
        .clone()
        .expect("headers seen");
    assert_eq!(
        headers.get("authorization").and_then(|v| v.to_str().ok()),
        Some("Bearer s3cret")
    );
}

#[tokio::test]
async fn given_solver_returns_503_when_optimize_called_then_upstream_unavailable() {
    let router = Router::new().route(
        "/optimize",
        post(|| async { (StatusCode::SERVICE_UNAVAILABLE, "solver warming up") }),
    );
    let base_url = spawn_stub(router).await;

    let err = client(&live_config(Some(base_url), 5_000))
        .optimize(&CallContext::new(Duration::from_secs(5)), &solver_request())
        .await
        .expect_err("503 must fail");
    assert_eq!(err.kind, ErrorKind::UpstreamUnavailable);
    assert_eq!(err.upstream_status, Some(503));
    assert!(err.message.contains("solver warming up"));
}

#[tokio::test]
async fn given_solver_returns_504_when_optimize_called_then_upstream_timeout() {
    let router = Router::new().route(
        "/optimize",
        post(|| async { StatusCode::GATEWAY_TIMEOUT }),
    );
    let base_url = spawn_stub(router).await;

    let err = client(&live_config(Some(base_url), 5_000))
        .optimize(&CallContext::new(Duration::from_secs(5)), &solver_request())
        .await
        .expect_err("504 must fail");
    assert_eq!(err.kind, ErrorKind::UpstreamTimeout);
    assert_eq!(err.upstream_status, Some(504));
}

#[tokio::test]
async fn given_slow_solver_when_deadline_passes_then_upstream_timeout() {
    let router = Router::new().route(
        "/optimize",
        post(|| async {
            tokio::time::sleep(Duration::from_secs(2)).await;
            Json(xyz_raw_json())
        }),
    );
    let base_url = spawn_stub(router).await;

    let started = std::time::Instant::now();
    let err = client(&live_config(Some(base_url), 100))
        .optimize(&CallContext::new(Duration::from_millis(100)), &solver_request())
        .await
        .expect_err("slow solver must time out");
    assert_eq!(err.kind, ErrorKind::UpstreamTimeout);
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn given_cancelled_context_when_optimize_called_then_call_is_abandoned() {
    let router = Router::new().route(
        "/optimize",
        post(|| async {
            tokio::time::sleep(Duration::from_secs(2)).await;
            Json(xyz_raw_json())
        }),
    );
    let base_url = spawn_stub(router).await;
    let ctx = CallContext::new(Duration::from_secs(5));
    ctx.cancel();

    let err = client(&live_config(Some(base_url), 5_000))
        .optimize(&ctx, &solver_request())
        .await
        .expect_err("cancelled call must fail");
    assert_eq!(err.kind, ErrorKind::UpstreamUnavailable);
    assert!(err.message.contains("cancelled"));
}

#[tokio::test]
async fn given_schema_drift_when_optimize_called_then_internal_without_details() {
    let router = Router::new().route(
        "/optimize",
        post(|| async {
            Json(json!({ "portfolio": [{ "asset_id": "X", "weight": 1.7 }] }))
        }),
    );
    let base_url = spawn_stub(router).await;

    let err = client(&live_config(Some(base_url), 5_000))
        .optimize(&CallContext::new(Duration::from_secs(5)), &solver_request())
        .await
        .expect_err("drifted payload must fail");
    assert_eq!(err.kind, ErrorKind::Internal);
    assert!(err.details.is_empty());
    assert!(!err.message.contains("1.7"));
}

#[tokio::test]
async fn given_non_json_success_body_when_optimize_called_then_internal() {
    let router = Router::new().route("/optimize", post(|| async { "ok" }));
    let base_url = spawn_stub(router).await;

    let err = client(&live_config(Some(base_url), 5_000))
        .optimize(&CallContext::new(Duration::from_secs(5)), &solver_request())
        .await
        .expect_err("plain text must fail");
    assert_eq!(err.kind, ErrorKind::Internal);
}

#[tokio::test]
async fn given_refused_connection_when_optimize_called_then_upstream_unavailable() {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("listener should bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let err = client(&live_config(Some(format!("http://{addr}")), 5_000))
        .optimize(&CallContext::new(Duration::from_secs(5)), &solver_request())
        .await
        .expect_err("refused connection must fail");
    assert_eq!(err.kind, ErrorKind::UpstreamUnavailable);
    assert_eq!(err.upstream_status, None);
}

#[tokio::test]
async fn given_no_base_url_when_optimize_called_then_upstream_unavailable() {
    let err = client(&live_config(Some("   ".to_string()), 5_000))
        .optimize(&CallContext::new(Duration::from_secs(5)), &solver_request())
        .await
        .expect_err("missing base url must fail");
    assert_eq!(err.kind, ErrorKind::UpstreamUnavailable);
    assert!(err.message.contains("no solver base url"));
}

#[tokio::test]
async fn given_healthy_solver_when_rebalance_called_then_points_are_returned() {
    let router = Router::new().route(
        "/rebalance",
        post(|Json(body): Json<Value>| async move {
            assert_eq!(body["rebalance_every_days"], json!(30));
            Json(rebalance_raw_json())
        }),
    );
    let base_url = spawn_stub(router).await;

    let raw = client(&live_config(Some(base_url), 5_000))
        .rebalance(
            &CallContext::new(Duration::from_secs(5)),
            &solver_rebalance_request(),
        )
        .await
        .expect("rebalance should succeed");
    assert_eq!(raw.points.expect("points").len(), 3);
}

#[test]
fn given_long_error_body_when_classified_then_snippet_is_bounded() {
    let body = "x".repeat(1_000);
    let err = classify_http_status(SolverOperation::Optimize, 500, &body);
    assert_eq!(err.kind, ErrorKind::UpstreamUnavailable);
    assert_eq!(err.upstream_status, Some(500));
    assert!(err.message.len() < 400);

    let err = classify_http_status(SolverOperation::Rebalance, 504, "");
    assert_eq!(err.kind, ErrorKind::UpstreamTimeout);
    assert_eq!(err.message, "solver rebalance returned status 504");
}
