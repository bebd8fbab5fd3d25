use std::{collections::BTreeMap, fmt, path::PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub type RunId = String;
pub type AssetId = String;
pub type RequestId = String;

/// Solver-defined metadata carried through to the client untouched. The
/// gateway never reads individual entries; their shape belongs to the solver.
pub type Diagnostics = BTreeMap<String, Value>;

pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 60_000;
pub const DEFAULT_REBALANCE_INTERVAL_DAYS: u32 = 30;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SolverConfig {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub api_token: Option<String>,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default)]
    pub mock: MockConfig,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_token: None,
            request_timeout_ms: default_request_timeout_ms(),
            mock: MockConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MockConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_optimize_fixture")]
    pub optimize_fixture: PathBuf,
    #[serde(default = "default_rebalance_fixture")]
    pub rebalance_fixture: PathBuf,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            optimize_fixture: default_optimize_fixture(),
            rebalance_fixture: default_rebalance_fixture(),
        }
    }
}

fn default_request_timeout_ms() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_MS
}

fn default_optimize_fixture() -> PathBuf {
    PathBuf::from("fixtures/optimize.json")
}

fn default_rebalance_fixture() -> PathBuf {
    PathBuf::from("fixtures/rebalance.json")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolverOperation {
    Optimize,
    Rebalance,
}

impl SolverOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            SolverOperation::Optimize => "optimize",
            SolverOperation::Rebalance => "rebalance",
        }
    }

    pub fn path(&self) -> &'static str {
        self.as_str()
    }
}

impl fmt::Display for SolverOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---- inbound contract ----

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dataset {
    DatasetA,
    DatasetB,
    DatasetC,
}

impl Dataset {
    pub const ALL: [Dataset; 3] = [Dataset::DatasetA, Dataset::DatasetB, Dataset::DatasetC];

    pub fn as_str(&self) -> &'static str {
        match self {
            Dataset::DatasetA => "DatasetA",
            Dataset::DatasetB => "DatasetB",
            Dataset::DatasetC => "DatasetC",
        }
    }

    pub fn parse(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|dataset| dataset.as_str() == label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    #[default]
    Medium,
    High,
}

impl RiskLevel {
    pub const ALL: [RiskLevel; 3] = [RiskLevel::Low, RiskLevel::Medium, RiskLevel::High];

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }

    pub fn parse(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|level| level.as_str() == label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Objective {
    #[default]
    Sharpe,
    Variance,
}

impl Objective {
    pub const ALL: [Objective; 2] = [Objective::Sharpe, Objective::Variance];

    pub fn as_str(&self) -> &'static str {
        match self {
            Objective::Sharpe => "sharpe",
            Objective::Variance => "variance",
        }
    }

    pub fn parse(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|objective| objective.as_str() == label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeightConstraints {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_weight: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_weight: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizationRequest {
    pub dataset: Dataset,
    pub time_horizon_days: u32,
    pub risk_level: RiskLevel,
    pub total_budget: f64,
    pub max_assets: u32,
    pub objective: Objective,
    pub solver_params: BTreeMap<String, Value>,
    pub weight_constraints: Option<WeightConstraints>,
    pub include_list: Vec<AssetId>,
    pub exclude_list: Vec<AssetId>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RebalanceRequest {
    pub dataset: Dataset,
    pub time_horizon_days: u32,
    pub risk_level: RiskLevel,
    pub total_budget: f64,
    pub max_assets: u32,
    pub objective: Objective,
    pub rebalance_interval_days: u32,
    pub transaction_cost_bps: Option<f64>,
    pub solver_params: BTreeMap<String, Value>,
}

// ---- outbound (solver) contract ----

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SolverUniverse {
    #[serde(rename = "DS_A")]
    DsA,
    #[serde(rename = "DS_B")]
    DsB,
    #[serde(rename = "DS_C")]
    DsC,
}

impl SolverUniverse {
    pub const ALL: [SolverUniverse; 3] =
        [SolverUniverse::DsA, SolverUniverse::DsB, SolverUniverse::DsC];

    pub fn as_str(&self) -> &'static str {
        match self {
            SolverUniverse::DsA => "DS_A",
            SolverUniverse::DsB => "DS_B",
            SolverUniverse::DsC => "DS_C",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SolverRiskProfile {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SolverObjective {
    MaxSharpe,
    MinVariance,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WeightBounds {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lower: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upper: Option<f64>,
}

/// Only `RequestMapper` builds these.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[non_exhaustive]
pub struct SolverRequest {
    pub universe: SolverUniverse,
    pub horizon_days: u32,
    pub risk_profile: SolverRiskProfile,
    pub budget_usd: f64,
    pub max_positions: u32,
    pub objective: SolverObjective,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight_bounds: Option<WeightBounds>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub must_include: Vec<AssetId>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub must_exclude: Vec<AssetId>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[non_exhaustive]
pub struct SolverRebalanceRequest {
    pub universe: SolverUniverse,
    pub horizon_days: u32,
    pub risk_profile: SolverRiskProfile,
    pub budget_usd: f64,
    pub max_positions: u32,
    pub objective: SolverObjective,
    pub rebalance_every_days: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_cost_bps: Option<f64>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, Value>,
}

// ---- raw solver responses (untrusted until validated) ----
//
// Field names are canonical; alternate spellings are folded onto them by
// `schema::decode_raw` before these types are decoded.

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverRawResponse {
    #[serde(default)]
    pub run_id: Option<RunId>,
    #[serde(default)]
    pub portfolio: Option<Vec<RawPortfolioEntry>>,
    #[serde(default)]
    pub dataset: Option<String>,
    #[serde(default)]
    pub objective_value: Option<f64>,
    #[serde(default)]
    pub risk: Option<f64>,
    #[serde(default)]
    pub sharpe: Option<f64>,
    #[serde(default)]
    pub diagnostics: Option<Diagnostics>,
    #[serde(flatten)]
    pub extra: Diagnostics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPortfolioEntry {
    pub asset_id: AssetId,
    pub weight: f64,
    #[serde(default)]
    pub percentage: Option<f64>,
    #[serde(default)]
    pub expected_return: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverRawRebalanceResponse {
    #[serde(default)]
    pub run_id: Option<RunId>,
    #[serde(default)]
    pub dataset: Option<String>,
    #[serde(default)]
    pub points: Option<Vec<RawRebalancePoint>>,
    #[serde(default)]
    pub diagnostics: Option<Diagnostics>,
    #[serde(flatten)]
    pub extra: Diagnostics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRebalancePoint {
    pub day: u32,
    pub rebalanced: f64,
    pub buy_and_hold: f64,
}

// ---- normalized client-facing contract ----

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComputationMethod {
    Solver,
    Mock,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedResponse {
    pub run_id: RunId,
    pub method: ComputationMethod,
    pub selected_asset_ids: Vec<AssetId>,
    pub weights: Vec<f64>,
    pub allocation: Vec<AllocationEntry>,
    pub expected_return: Option<f64>,
    pub risk: Option<f64>,
    pub sharpe: Option<f64>,
    pub diagnostics: Diagnostics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationEntry {
    pub name: String,
    pub percentage_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedRebalanceResponse {
    pub run_id: RunId,
    pub method: ComputationMethod,
    pub time_series: TimeSeries,
    pub diagnostics: Diagnostics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    pub days: Vec<u32>,
    pub series: Vec<NamedSeries>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedSeries {
    pub name: String,
    pub values: Vec<f64>,
}

pub const REBALANCED_SERIES: &str = "rebalanced";
pub const BUY_AND_HOLD_SERIES: &str = "buyAndHold";
