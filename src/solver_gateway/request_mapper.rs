use crate::solver_gateway::types::{
    Dataset, Objective, OptimizationRequest, RebalanceRequest, RiskLevel, SolverObjective,
    SolverRebalanceRequest, SolverRequest, SolverRiskProfile, SolverUniverse, WeightBounds,
    WeightConstraints,
};

/// Translates validated client requests into the solver's wire vocabulary.
/// Numeric fields are renamed, never rescaled.
#[derive(Debug, Default, Clone, Copy)]
pub struct RequestMapper;

impl RequestMapper {
    pub fn to_solver_request(&self, request: &OptimizationRequest) -> SolverRequest {
        SolverRequest {
            universe: Self::map_dataset(request.dataset),
            horizon_days: request.time_horizon_days,
            risk_profile: Self::map_risk_level(request.risk_level),
            budget_usd: request.total_budget,
            max_positions: request.max_assets,
            objective: Self::map_objective(request.objective),
            params: request.solver_params.clone(),
            weight_bounds: request.weight_constraints.and_then(Self::map_weight_constraints),
            must_include: request.include_list.clone(),
            must_exclude: request.exclude_list.clone(),
        }
    }

    pub fn to_solver_rebalance_request(&self, request: &RebalanceRequest) -> SolverRebalanceRequest {
        SolverRebalanceRequest {
            universe: Self::map_dataset(request.dataset),
            horizon_days: request.time_horizon_days,
            risk_profile: Self::map_risk_level(request.risk_level),
            budget_usd: request.total_budget,
            max_positions: request.max_assets,
            objective: Self::map_objective(request.objective),
            rebalance_every_days: request.rebalance_interval_days,
            transaction_cost_bps: request.transaction_cost_bps,
            params: request.solver_params.clone(),
        }
    }

    /// Fixed lookup. `Dataset` is closed, so every client dataset has exactly
    /// one universe and no fallback entry exists.
    pub fn map_dataset(dataset: Dataset) -> SolverUniverse {
        match dataset {
            Dataset::DatasetA => SolverUniverse::DsA,
            Dataset::DatasetB => SolverUniverse::DsB,
            Dataset::DatasetC => SolverUniverse::DsC,
        }
    }

    fn map_risk_level(level: RiskLevel) -> SolverRiskProfile {
        match level {
            RiskLevel::Low => SolverRiskProfile::Low,
            RiskLevel::Medium => SolverRiskProfile::Medium,
            RiskLevel::High => SolverRiskProfile::High,
        }
    }

    fn map_objective(objective: Objective) -> SolverObjective {
        match objective {
            Objective::Sharpe => SolverObjective::MaxSharpe,
            Objective::Variance => SolverObjective::MinVariance,
        }
    }

    fn map_weight_constraints(constraints: WeightConstraints) -> Option<WeightBounds> {
        if constraints.min_weight.is_none() && constraints.max_weight.is_none() {
            return None;
        }
        Some(WeightBounds {
            lower: constraints.min_weight,
            upper: constraints.max_weight,
        })
    }
}
