use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, header};
use serde::Serialize;

use crate::solver_gateway::{
    context::{CallContext, Interrupted},
    error::{ClassifiedError, internal_error, upstream_timeout, upstream_unavailable},
    schema::{RawContract, RawContractError, decode_raw},
    types::{
        SolverConfig, SolverOperation, SolverRawRebalanceResponse, SolverRawResponse,
        SolverRebalanceRequest, SolverRequest,
    },
};

const ERROR_BODY_SNIPPET_CHARS: usize = 240;

/// One outbound call per invocation; implementations never retry.
#[async_trait]
pub trait SolverClient: Send + Sync {
    async fn optimize(
        &self,
        ctx: &CallContext,
        request: &SolverRequest,
    ) -> Result<SolverRawResponse, ClassifiedError>;

    async fn rebalance(
        &self,
        ctx: &CallContext,
        request: &SolverRebalanceRequest,
    ) -> Result<SolverRawRebalanceResponse, ClassifiedError>;
}

#[derive(Clone)]
pub struct HttpSolverClient {
    client: Client,
    base_url: Option<String>,
    api_token: Option<String>,
}

enum Exchange {
    Accepted { body: String },
    Rejected { status: u16, body: String },
}

impl HttpSolverClient {
    pub fn new(config: &SolverConfig) -> Result<Self, ClassifiedError> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(30))
            .build()
            .map_err(|err| internal_error(format!("failed to build solver http client: {}", err)))?;

        Ok(Self {
            client,
            base_url: config
                .base_url
                .as_deref()
                .map(str::trim)
                .filter(|url| !url.is_empty())
                .map(|url| url.trim_end_matches('/').to_string()),
            api_token: config
                .api_token
                .as_deref()
                .map(str::trim)
                .filter(|token| !token.is_empty())
                .map(str::to_string),
        })
    }

    async fn post<Req, Resp>(&self, ctx: &CallContext, body: &Req) -> Result<Resp, ClassifiedError>
    where
        Req: Serialize + Sync,
        Resp: RawContract,
    {
        let operation = Resp::OPERATION;
        let base_url = self.base_url.as_deref().ok_or_else(|| {
            upstream_unavailable(format!(
                "solver {} unavailable: no solver base url is configured",
                operation
            ))
        })?;
        let url = format!("{}/{}", base_url, operation.path());

        let mut builder = self
            .client
            .post(&url)
            .timeout(ctx.remaining())
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::ACCEPT, "application/json")
            .header("x-request-id", ctx.request_id())
            .json(body);
        if let Some(token) = &self.api_token {
            builder = builder.bearer_auth(token);
        }

        tracing::debug!(
            target: "solver_client",
            request_id = %ctx.request_id(),
            operation = %operation,
            url = %url,
            timeout_ms = ctx.timeout().as_millis() as u64,
            authenticated = self.api_token.is_some(),
            "solver_call_started"
        );

        let started_at = Instant::now();
        let outcome = ctx.run(Self::exchange(builder)).await;
        let elapsed_ms = started_at.elapsed().as_millis() as u64;

        let exchange = match outcome {
            Err(Interrupted::DeadlineElapsed) => {
                return Err(upstream_timeout(format!(
                    "solver {} did not respond within {} ms",
                    operation,
                    ctx.timeout().as_millis()
                )));
            }
            Err(Interrupted::Cancelled) => {
                tracing::debug!(
                    target: "solver_client",
                    request_id = %ctx.request_id(),
                    operation = %operation,
                    elapsed_ms,
                    "solver_call_abandoned"
                );
                return Err(upstream_unavailable(format!(
                    "solver {} call was cancelled before a response arrived",
                    operation
                )));
            }
            Ok(Err(err)) if err.is_timeout() => {
                return Err(upstream_timeout(format!(
                    "solver {} timed out: {}",
                    operation, err
                )));
            }
            Ok(Err(err)) => {
                return Err(upstream_unavailable(format!(
                    "solver {} request failed: {}",
                    operation, err
                )));
            }
            Ok(Ok(exchange)) => exchange,
        };

        match exchange {
            Exchange::Rejected { status, body } => {
                tracing::warn!(
                    target: "solver_client",
                    request_id = %ctx.request_id(),
                    operation = %operation,
                    status,
                    elapsed_ms,
                    "solver_call_rejected"
                );
                Err(classify_http_status(operation, status, &body))
            }
            Exchange::Accepted { body } => {
                tracing::debug!(
                    target: "solver_client",
                    request_id = %ctx.request_id(),
                    operation = %operation,
                    elapsed_ms,
                    body_bytes = body.len(),
                    "solver_call_completed"
                );
                decode_raw::<Resp>(&body)
                    .map_err(|err| contract_drift(ctx.request_id(), operation, &body, err))
            }
        }
    }

    async fn exchange(builder: RequestBuilder) -> Result<Exchange, reqwest::Error> {
        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            // Best effort: the status alone is enough to classify.
            let body = response.text().await.unwrap_or_default();
            return Ok(Exchange::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        let body = response.text().await?;
        Ok(Exchange::Accepted { body })
    }
}

#[async_trait]
impl SolverClient for HttpSolverClient {
    async fn optimize(
        &self,
        ctx: &CallContext,
        request: &SolverRequest,
    ) -> Result<SolverRawResponse, ClassifiedError> {
        self.post(ctx, request).await
    }

    async fn rebalance(
        &self,
        ctx: &CallContext,
        request: &SolverRebalanceRequest,
    ) -> Result<SolverRawRebalanceResponse, ClassifiedError> {
        self.post(ctx, request).await
    }
}

/// 504 is the solver's own gateway timing out; every other non-2xx status
/// means the solver could not serve the call.
pub fn classify_http_status(operation: SolverOperation, status: u16, body: &str) -> ClassifiedError {
    let snippet = body
        .trim()
        .chars()
        .take(ERROR_BODY_SNIPPET_CHARS)
        .collect::<String>();

    let mut message = format!("solver {} returned status {}", operation, status);
    if !snippet.is_empty() {
        message = format!("{}: {}", message, snippet);
    }

    let err = if status == 504 {
        upstream_timeout(message)
    } else {
        upstream_unavailable(message)
    };
    err.with_upstream_status(status)
}

fn contract_drift(
    request_id: &str,
    operation: SolverOperation,
    body: &str,
    err: RawContractError,
) -> ClassifiedError {
    tracing::error!(
        target: "solver_client",
        request_id = %request_id,
        operation = %operation,
        error = %err,
        raw_body = %body,
        "solver_contract_violation"
    );
    internal_error(format!(
        "solver {} response violated the agreed response contract",
        operation
    ))
}
