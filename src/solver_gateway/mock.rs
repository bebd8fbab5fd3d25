use std::path::{Path, PathBuf};

use crate::solver_gateway::{
    context::{CallContext, Interrupted},
    error::{ClassifiedError, internal_error},
    response_normalizer::fresh_run_id,
    schema::{RawContract, decode_raw},
    types::{MockConfig, SolverRawRebalanceResponse, SolverRawResponse},
};

/// Serves canned solver payloads from fixture files. Fixture problems are
/// deployment defects and always surface as `internal`.
#[derive(Debug, Clone)]
pub struct MockProvider {
    optimize_fixture: PathBuf,
    rebalance_fixture: PathBuf,
}

impl MockProvider {
    pub fn new(config: &MockConfig) -> Self {
        Self {
            optimize_fixture: config.optimize_fixture.clone(),
            rebalance_fixture: config.rebalance_fixture.clone(),
        }
    }

    pub async fn optimize(&self, ctx: &CallContext) -> Result<SolverRawResponse, ClassifiedError> {
        let mut raw: SolverRawResponse = load_fixture(ctx, &self.optimize_fixture).await?;
        raw.run_id = Some(fresh_run_id());
        Ok(raw)
    }

    pub async fn rebalance(
        &self,
        ctx: &CallContext,
    ) -> Result<SolverRawRebalanceResponse, ClassifiedError> {
        let mut raw: SolverRawRebalanceResponse =
            load_fixture(ctx, &self.rebalance_fixture).await?;
        raw.run_id = Some(fresh_run_id());
        Ok(raw)
    }
}

async fn load_fixture<T: RawContract>(ctx: &CallContext, path: &Path) -> Result<T, ClassifiedError> {
    let operation = T::OPERATION;
    let text = match ctx.run(tokio::fs::read_to_string(path)).await {
        Ok(Ok(text)) => text,
        Ok(Err(err)) => {
            tracing::error!(
                target: "mock_provider",
                request_id = %ctx.request_id(),
                operation = %operation,
                path = %path.display(),
                error = %err,
                "fixture_read_failed"
            );
            return Err(internal_error(format!(
                "mock fixture for {} could not be read from {}",
                operation,
                path.display()
            )));
        }
        Err(interrupted) => {
            let reason = match interrupted {
                Interrupted::DeadlineElapsed => "timed out",
                Interrupted::Cancelled => "was cancelled",
            };
            tracing::error!(
                target: "mock_provider",
                request_id = %ctx.request_id(),
                operation = %operation,
                path = %path.display(),
                reason = reason,
                "fixture_read_interrupted"
            );
            return Err(internal_error(format!(
                "mock fixture read for {} {}",
                operation, reason
            )));
        }
    };

    decode_raw::<T>(&text).map_err(|err| {
        tracing::error!(
            target: "mock_provider",
            request_id = %ctx.request_id(),
            operation = %operation,
            path = %path.display(),
            error = %err,
            raw_body = %text,
            "fixture_contract_violation"
        );
        internal_error(format!(
            "mock fixture for {} at {} is not a valid solver response",
            operation,
            path.display()
        ))
    })
}
