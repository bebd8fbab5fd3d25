use std::{fmt, sync::Arc, time::Instant};

use crate::solver_gateway::{
    error::{ClassifiedError, ErrorKind},
    types::{RequestId, SolverOperation},
};

/// Per-request states. A request walks
/// `received → validated → {mocked | dispatched} → normalized → returned`
/// or leaves for `failed(kind)` from any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStage {
    Received,
    Validated,
    Mocked,
    Dispatched,
    Normalized,
    Returned,
    Failed(ErrorKind),
}

impl RequestStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStage::Received => "received",
            RequestStage::Validated => "validated",
            RequestStage::Mocked => "mocked",
            RequestStage::Dispatched => "dispatched",
            RequestStage::Normalized => "normalized",
            RequestStage::Returned => "returned",
            RequestStage::Failed(_) => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RequestStage::Returned | RequestStage::Failed(_))
    }

    pub fn can_advance_to(&self, next: RequestStage) -> bool {
        use RequestStage::*;
        match (self, next) {
            (from, Failed(_)) => !from.is_terminal(),
            (Received, Validated) => true,
            (Validated, Mocked) | (Validated, Dispatched) => true,
            (Mocked, Normalized) | (Dispatched, Normalized) => true,
            (Normalized, Returned) => true,
            _ => false,
        }
    }
}

impl fmt::Display for RequestStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestStage::Failed(kind) => write!(f, "failed({})", kind),
            other => f.write_str(other.as_str()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StageTransition {
    pub request_id: RequestId,
    pub operation: SolverOperation,
    pub stage: RequestStage,
    pub elapsed_ms: u64,
}

pub trait LifecycleSink: Send + Sync {
    fn on_transition(&self, transition: &StageTransition);
}

#[derive(Default)]
pub struct TracingLifecycleSink;

impl LifecycleSink for TracingLifecycleSink {
    fn on_transition(&self, transition: &StageTransition) {
        match transition.stage {
            RequestStage::Returned => tracing::info!(
                target: "solver_gateway",
                request_id = %transition.request_id,
                operation = %transition.operation,
                elapsed_ms = transition.elapsed_ms,
                "request_returned"
            ),
            RequestStage::Failed(kind) => tracing::warn!(
                target: "solver_gateway",
                request_id = %transition.request_id,
                operation = %transition.operation,
                error_kind = %kind,
                elapsed_ms = transition.elapsed_ms,
                "request_failed"
            ),
            stage => tracing::debug!(
                target: "solver_gateway",
                request_id = %transition.request_id,
                operation = %transition.operation,
                stage = %stage,
                elapsed_ms = transition.elapsed_ms,
                "request_stage"
            ),
        }
    }
}

/// Tracks one request through its stages and reports each transition.
pub struct RequestLifecycle {
    sink: Arc<dyn LifecycleSink>,
    request_id: RequestId,
    operation: SolverOperation,
    started_at: Instant,
    current: RequestStage,
}

impl RequestLifecycle {
    pub fn begin(
        sink: Arc<dyn LifecycleSink>,
        operation: SolverOperation,
        request_id: impl Into<RequestId>,
    ) -> Self {
        let lifecycle = Self {
            sink,
            request_id: request_id.into(),
            operation,
            started_at: Instant::now(),
            current: RequestStage::Received,
        };
        lifecycle.emit();
        lifecycle
    }

    pub fn advance(&mut self, next: RequestStage) {
        debug_assert!(
            self.current.can_advance_to(next),
            "illegal request transition {} -> {}",
            self.current,
            next
        );
        self.current = next;
        self.emit();
    }

    /// Records the failure and hands the error back unchanged.
    pub fn fail(&mut self, error: ClassifiedError) -> ClassifiedError {
        self.advance(RequestStage::Failed(error.kind));
        error
    }

    fn emit(&self) {
        self.sink.on_transition(&StageTransition {
            request_id: self.request_id.clone(),
            operation: self.operation,
            stage: self.current,
            elapsed_ms: self.started_at.elapsed().as_millis() as u64,
        });
    }
}
