use std::{sync::Arc, time::Duration};

use serde_json::Value;

use crate::solver_gateway::{
    client::{HttpSolverClient, SolverClient},
    context::CallContext,
    error::{ClassifiedError, ErrorKind},
    mock::MockProvider,
    request_mapper::RequestMapper,
    response_normalizer::ResponseNormalizer,
    schema,
    telemetry::{LifecycleSink, RequestLifecycle, RequestStage, TracingLifecycleSink},
    types::{
        ComputationMethod, NormalizedRebalanceResponse, NormalizedResponse, SolverConfig,
        SolverOperation,
    },
};

enum SolverBackend {
    Live(Arc<dyn SolverClient>),
    Mock(MockProvider),
}

/// Entry point for both operations. Holds no per-request state; one instance
/// serves every concurrent request.
pub struct Orchestrator {
    backend: SolverBackend,
    request_mapper: RequestMapper,
    response_normalizer: ResponseNormalizer,
    request_timeout: Duration,
    lifecycle_sink: Arc<dyn LifecycleSink>,
}

impl Orchestrator {
    pub fn from_config(config: &SolverConfig) -> Result<Self, ClassifiedError> {
        let timeout = Duration::from_millis(config.request_timeout_ms);
        if config.mock.enabled {
            return Ok(Self::mock(MockProvider::new(&config.mock), timeout));
        }
        Ok(Self::live(Arc::new(HttpSolverClient::new(config)?), timeout))
    }

    pub fn live(client: Arc<dyn SolverClient>, request_timeout: Duration) -> Self {
        Self::with_backend(SolverBackend::Live(client), request_timeout)
    }

    pub fn mock(provider: MockProvider, request_timeout: Duration) -> Self {
        Self::with_backend(SolverBackend::Mock(provider), request_timeout)
    }

    fn with_backend(backend: SolverBackend, request_timeout: Duration) -> Self {
        Self {
            backend,
            request_mapper: RequestMapper,
            response_normalizer: ResponseNormalizer,
            request_timeout,
            lifecycle_sink: Arc::new(TracingLifecycleSink),
        }
    }

    pub fn with_lifecycle_sink(mut self, sink: Arc<dyn LifecycleSink>) -> Self {
        self.lifecycle_sink = sink;
        self
    }

    pub fn is_mock(&self) -> bool {
        matches!(self.backend, SolverBackend::Mock(_))
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// A fresh context bounded by the configured request timeout.
    pub fn call_context(&self) -> CallContext {
        CallContext::new(self.request_timeout)
    }

    pub async fn optimize(
        &self,
        payload: &Value,
        ctx: &CallContext,
    ) -> Result<NormalizedResponse, ClassifiedError> {
        let mut lifecycle = self.begin(SolverOperation::Optimize, ctx);
        self.optimize_within(&mut lifecycle, payload, ctx).await
    }

    /// Like [`Orchestrator::optimize`], starting from the undecoded request
    /// body so that a malformed body is reported through the lifecycle.
    pub async fn optimize_body(
        &self,
        body: &[u8],
        ctx: &CallContext,
    ) -> Result<NormalizedResponse, ClassifiedError> {
        let mut lifecycle = self.begin(SolverOperation::Optimize, ctx);
        let payload = match schema::parse_json_body(body) {
            Ok(payload) => payload,
            Err(err) => return Err(lifecycle.fail(err)),
        };
        self.optimize_within(&mut lifecycle, &payload, ctx).await
    }

    pub async fn rebalance(
        &self,
        payload: &Value,
        ctx: &CallContext,
    ) -> Result<NormalizedRebalanceResponse, ClassifiedError> {
        let mut lifecycle = self.begin(SolverOperation::Rebalance, ctx);
        self.rebalance_within(&mut lifecycle, payload, ctx).await
    }

    pub async fn rebalance_body(
        &self,
        body: &[u8],
        ctx: &CallContext,
    ) -> Result<NormalizedRebalanceResponse, ClassifiedError> {
        let mut lifecycle = self.begin(SolverOperation::Rebalance, ctx);
        let payload = match schema::parse_json_body(body) {
            Ok(payload) => payload,
            Err(err) => return Err(lifecycle.fail(err)),
        };
        self.rebalance_within(&mut lifecycle, &payload, ctx).await
    }

    fn begin(&self, operation: SolverOperation, ctx: &CallContext) -> RequestLifecycle {
        RequestLifecycle::begin(Arc::clone(&self.lifecycle_sink), operation, ctx.request_id())
    }

    async fn optimize_within(
        &self,
        lifecycle: &mut RequestLifecycle,
        payload: &Value,
        ctx: &CallContext,
    ) -> Result<NormalizedResponse, ClassifiedError> {
        let request = match schema::parse_optimization_request(payload) {
            Ok(request) => request,
            Err(err) => return Err(lifecycle.fail(err)),
        };
        lifecycle.advance(RequestStage::Validated);

        let fetched = match &self.backend {
            SolverBackend::Mock(provider) => {
                lifecycle.advance(RequestStage::Mocked);
                provider
                    .optimize(ctx)
                    .await
                    .map(|raw| (raw, ComputationMethod::Mock))
            }
            SolverBackend::Live(client) => {
                let solver_request = self.request_mapper.to_solver_request(&request);
                lifecycle.advance(RequestStage::Dispatched);
                client
                    .optimize(ctx, &solver_request)
                    .await
                    .map(|raw| (raw, ComputationMethod::Solver))
            }
        };
        let (raw, method) = match fetched {
            Ok(fetched) => fetched,
            Err(err) => return Err(lifecycle.fail(err)),
        };

        let normalized = self.response_normalizer.normalize(raw, method);
        lifecycle.advance(RequestStage::Normalized);
        lifecycle.advance(RequestStage::Returned);
        Ok(normalized)
    }

    async fn rebalance_within(
        &self,
        lifecycle: &mut RequestLifecycle,
        payload: &Value,
        ctx: &CallContext,
    ) -> Result<NormalizedRebalanceResponse, ClassifiedError> {
        let request = match schema::parse_rebalance_request(payload) {
            Ok(request) => request,
            Err(err) => return Err(lifecycle.fail(err)),
        };
        lifecycle.advance(RequestStage::Validated);

        let fetched = match &self.backend {
            SolverBackend::Mock(provider) => {
                lifecycle.advance(RequestStage::Mocked);
                provider
                    .rebalance(ctx)
                    .await
                    .map(|raw| (raw, ComputationMethod::Mock))
            }
            SolverBackend::Live(client) => {
                let solver_request = self.request_mapper.to_solver_rebalance_request(&request);
                lifecycle.advance(RequestStage::Dispatched);
                client
                    .rebalance(ctx, &solver_request)
                    .await
                    .map(|raw| (raw, ComputationMethod::Solver))
            }
        };
        let (raw, method) = match fetched {
            Ok(fetched) => fetched,
            Err(err) => return Err(lifecycle.fail(err)),
        };

        let normalized = self.response_normalizer.normalize_rebalance(raw, method);
        lifecycle.advance(RequestStage::Normalized);
        lifecycle.advance(RequestStage::Returned);
        Ok(normalized)
    }
}

/// The status code contract clients depend on.
pub fn http_status(kind: ErrorKind) -> u16 {
    match kind {
        ErrorKind::Validation => 422,
        ErrorKind::UpstreamTimeout => 504,
        ErrorKind::UpstreamUnavailable => 502,
        ErrorKind::Internal => 500,
    }
}
