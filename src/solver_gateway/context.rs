use std::{future::Future, time::Duration};

use tokio::time::{Instant, timeout_at};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::solver_gateway::types::RequestId;

/// Why a guarded future did not finish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupted {
    DeadlineElapsed,
    Cancelled,
}

/// Per-request bound on the single suspending operation (solver call or
/// fixture read): a deadline plus the caller's cancellation signal.
#[derive(Debug, Clone)]
pub struct CallContext {
    request_id: RequestId,
    timeout: Duration,
    deadline: Instant,
    cancel: CancellationToken,
}

impl CallContext {
    pub fn new(timeout: Duration) -> Self {
        Self {
            request_id: Uuid::now_v7().to_string(),
            timeout,
            deadline: Instant::now() + timeout,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<RequestId>) -> Self {
        self.request_id = request_id.into();
        self
    }

    /// Links this context to a caller-level token: cancelling `parent`
    /// cancels this context, never the reverse.
    pub fn with_parent_cancellation(mut self, parent: &CancellationToken) -> Self {
        self.cancel = parent.child_token();
        self
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Drives `future` until it completes, the deadline passes, or the
    /// context is cancelled. The losing future is dropped.
    pub async fn run<F>(&self, future: F) -> Result<F::Output, Interrupted>
    where
        F: Future,
    {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Interrupted::Cancelled),
            outcome = timeout_at(self.deadline, future) => {
                outcome.map_err(|_| Interrupted::DeadlineElapsed)
            }
        }
    }
}
