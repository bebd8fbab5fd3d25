use serde_json::{Value, json};
use uuid::Uuid;

use crate::solver_gateway::types::{
    AllocationEntry, BUY_AND_HOLD_SERIES, ComputationMethod, Diagnostics, NamedSeries,
    NormalizedRebalanceResponse, NormalizedResponse, REBALANCED_SERIES, RawPortfolioEntry, RunId,
    SolverRawRebalanceResponse, SolverRawResponse, TimeSeries,
};

/// Time-ordered (UUIDv7), so identifiers sort by creation time.
pub fn fresh_run_id() -> RunId {
    Uuid::now_v7().to_string()
}

/// Maps validated raw solver payloads onto the client contract. Pure apart
/// from `fresh_run_id` when the solver omits its own run id.
#[derive(Debug, Default, Clone, Copy)]
pub struct ResponseNormalizer;

impl ResponseNormalizer {
    pub fn normalize(&self, raw: SolverRawResponse, method: ComputationMethod) -> NormalizedResponse {
        let portfolio = raw.portfolio.unwrap_or_default();

        let mut selected_asset_ids = Vec::with_capacity(portfolio.len());
        let mut weights = Vec::with_capacity(portfolio.len());
        let mut allocation = Vec::with_capacity(portfolio.len());
        for entry in &portfolio {
            selected_asset_ids.push(entry.asset_id.clone());
            weights.push(entry.weight);
            allocation.push(AllocationEntry {
                name: entry.asset_id.clone(),
                percentage_value: Self::percentage_value(entry),
            });
        }

        let mut diagnostics = Diagnostics::new();
        if let Some(objective_value) = raw.objective_value {
            diagnostics.insert("objectiveValue".to_string(), json!(objective_value));
        }
        Self::collect_passthrough(&mut diagnostics, raw.dataset, raw.diagnostics, raw.extra);

        NormalizedResponse {
            run_id: raw.run_id.unwrap_or_else(fresh_run_id),
            method,
            selected_asset_ids,
            weights,
            allocation,
            expected_return: Self::mean_expected_return(&portfolio),
            risk: raw.risk,
            sharpe: raw.sharpe,
            diagnostics,
        }
    }

    pub fn normalize_rebalance(
        &self,
        raw: SolverRawRebalanceResponse,
        method: ComputationMethod,
    ) -> NormalizedRebalanceResponse {
        let points = raw.points.unwrap_or_default();

        let mut days = Vec::with_capacity(points.len());
        let mut rebalanced = Vec::with_capacity(points.len());
        let mut buy_and_hold = Vec::with_capacity(points.len());
        for point in &points {
            days.push(point.day);
            rebalanced.push(point.rebalanced);
            buy_and_hold.push(point.buy_and_hold);
        }

        let mut diagnostics = Diagnostics::new();
        Self::collect_passthrough(&mut diagnostics, raw.dataset, raw.diagnostics, raw.extra);

        NormalizedRebalanceResponse {
            run_id: raw.run_id.unwrap_or_else(fresh_run_id),
            method,
            time_series: TimeSeries {
                days,
                series: vec![
                    NamedSeries {
                        name: REBALANCED_SERIES.to_string(),
                        values: rebalanced,
                    },
                    NamedSeries {
                        name: BUY_AND_HOLD_SERIES.to_string(),
                        values: buy_and_hold,
                    },
                ],
            },
            diagnostics,
        }
    }

    /// `f64::round` rounds half away from zero.
    fn percentage_value(entry: &RawPortfolioEntry) -> f64 {
        match entry.percentage {
            Some(percentage) => percentage.round(),
            None => (entry.weight * 100.0).round(),
        }
    }

    /// Missing per-asset returns are skipped, not counted as zero.
    fn mean_expected_return(portfolio: &[RawPortfolioEntry]) -> Option<f64> {
        let returns = portfolio
            .iter()
            .filter_map(|entry| entry.expected_return)
            .collect::<Vec<_>>();
        if returns.is_empty() {
            return None;
        }
        Some(returns.iter().sum::<f64>() / returns.len() as f64)
    }

    fn collect_passthrough(
        diagnostics: &mut Diagnostics,
        dataset: Option<String>,
        solver_diagnostics: Option<Diagnostics>,
        extra: Diagnostics,
    ) {
        if let Some(dataset) = dataset {
            diagnostics.insert("datasetEchoed".to_string(), Value::String(dataset));
        }
        if let Some(solver_diagnostics) = solver_diagnostics {
            diagnostics.insert(
                "solver".to_string(),
                Value::Object(solver_diagnostics.into_iter().collect()),
            );
        }
        for (key, value) in extra {
            diagnostics.entry(key).or_insert(value);
        }
    }
}
