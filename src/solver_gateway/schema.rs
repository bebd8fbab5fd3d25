//! Boundary checks for every contract the gateway touches.
//!
//! Inbound payloads are read field by field so that a single response can
//! report every violated field rather than the first decode failure. Raw
//! solver payloads are decoded with serde first and then checked for the
//! numeric ranges the solver agreed to honour.

use std::{collections::BTreeMap, fmt};

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::solver_gateway::{
    error::{ClassifiedError, FieldViolation, validation_failed},
    types::{
        AssetId, DEFAULT_REBALANCE_INTERVAL_DAYS, Dataset, Objective, OptimizationRequest,
        RebalanceRequest, RiskLevel, SolverOperation, SolverRawRebalanceResponse,
        SolverRawResponse, WeightConstraints,
    },
};

const ROOT_FIELD: &str = "$";

pub fn parse_optimization_request(payload: &Value) -> Result<OptimizationRequest, ClassifiedError> {
    let mut reader = FieldReader::new(payload)?;

    let dataset = reader.required("dataset", parse_dataset);
    let time_horizon_days = reader.required("timeHorizonDays", positive_integer);
    let risk_level = reader.optional("riskLevel", parse_risk_level);
    let total_budget = reader.required("totalBudget", positive_finite);
    let max_assets = reader.required("maxAssets", positive_integer);
    let objective = reader.optional("objective", parse_objective);
    let solver_params = reader.optional("solverParams", opaque_object);
    let weight_constraints = reader.weight_constraints("weightConstraints");
    let include_list = reader.optional("includeList", identifier_set);
    let exclude_list = reader.optional("excludeList", identifier_set);

    if let (Some(include), Some(exclude)) = (&include_list, &exclude_list) {
        for id in include.iter().filter(|id| exclude.contains(id)) {
            reader.violate(
                "excludeList",
                format!("'{}' is also listed in includeList", id),
            );
        }
    }

    let violations = reader.into_violations();
    match (dataset, time_horizon_days, total_budget, max_assets) {
        (Some(dataset), Some(time_horizon_days), Some(total_budget), Some(max_assets))
            if violations.is_empty() =>
        {
            Ok(OptimizationRequest {
                dataset,
                time_horizon_days,
                risk_level: risk_level.unwrap_or_default(),
                total_budget,
                max_assets,
                objective: objective.unwrap_or_default(),
                solver_params: solver_params.unwrap_or_default(),
                weight_constraints,
                include_list: include_list.unwrap_or_default(),
                exclude_list: exclude_list.unwrap_or_default(),
            })
        }
        _ => Err(validation_failed(violations)),
    }
}

pub fn parse_rebalance_request(payload: &Value) -> Result<RebalanceRequest, ClassifiedError> {
    let mut reader = FieldReader::new(payload)?;

    let dataset = reader.required("dataset", parse_dataset);
    let time_horizon_days = reader.required("timeHorizonDays", positive_integer);
    let risk_level = reader.optional("riskLevel", parse_risk_level);
    let total_budget = reader.required("totalBudget", positive_finite);
    let max_assets = reader.required("maxAssets", positive_integer);
    let objective = reader.optional("objective", parse_objective);
    let rebalance_interval_days = reader.optional("rebalanceIntervalDays", positive_integer);
    let transaction_cost_bps = reader.optional("transactionCostBps", non_negative_finite);
    let solver_params = reader.optional("solverParams", opaque_object);

    if let (Some(horizon), Some(interval)) = (time_horizon_days, rebalance_interval_days)
        && interval > horizon
    {
        reader.violate(
            "rebalanceIntervalDays",
            format!("must not exceed timeHorizonDays ({})", horizon),
        );
    }

    let violations = reader.into_violations();
    match (dataset, time_horizon_days, total_budget, max_assets) {
        (Some(dataset), Some(time_horizon_days), Some(total_budget), Some(max_assets))
            if violations.is_empty() =>
        {
            Ok(RebalanceRequest {
                dataset,
                time_horizon_days,
                risk_level: risk_level.unwrap_or_default(),
                total_budget,
                max_assets,
                objective: objective.unwrap_or_default(),
                rebalance_interval_days: rebalance_interval_days
                    .unwrap_or(DEFAULT_REBALANCE_INTERVAL_DAYS.min(time_horizon_days)),
                transaction_cost_bps,
                solver_params: solver_params.unwrap_or_default(),
            })
        }
        _ => Err(validation_failed(violations)),
    }
}

/// Decodes a request body. A body that is not JSON is a validation failure
/// on the root field, never a transport rejection.
pub fn parse_json_body(body: &[u8]) -> Result<Value, ClassifiedError> {
    serde_json::from_slice::<Value>(body).map_err(|err| {
        validation_failed(vec![FieldViolation::new(
            ROOT_FIELD,
            format!("request body is not valid JSON: {}", err),
        )])
    })
}

struct FieldReader<'a> {
    object: &'a Map<String, Value>,
    violations: Vec<FieldViolation>,
}

impl<'a> FieldReader<'a> {
    fn new(payload: &'a Value) -> Result<Self, ClassifiedError> {
        let object = payload.as_object().ok_or_else(|| {
            validation_failed(vec![FieldViolation::new(
                ROOT_FIELD,
                format!("request body must be a JSON object, got {}", json_type(payload)),
            )])
        })?;

        Ok(Self {
            object,
            violations: Vec::new(),
        })
    }

    fn required<T>(
        &mut self,
        field: &str,
        parse: impl FnOnce(&Value) -> Result<T, String>,
    ) -> Option<T> {
        let object = self.object;
        match object.get(field) {
            None | Some(Value::Null) => {
                self.violate(field, "is required");
                None
            }
            Some(value) => self.check(field, value, parse),
        }
    }

    /// `null` counts as absent.
    fn optional<T>(
        &mut self,
        field: &str,
        parse: impl FnOnce(&Value) -> Result<T, String>,
    ) -> Option<T> {
        let object = self.object;
        match object.get(field) {
            None | Some(Value::Null) => None,
            Some(value) => self.check(field, value, parse),
        }
    }

    fn check<T>(
        &mut self,
        field: &str,
        value: &Value,
        parse: impl FnOnce(&Value) -> Result<T, String>,
    ) -> Option<T> {
        match parse(value) {
            Ok(parsed) => Some(parsed),
            Err(message) => {
                self.violate(field, message);
                None
            }
        }
    }

    fn weight_constraints(&mut self, field: &str) -> Option<WeightConstraints> {
        let object = self.object;
        let value = match object.get(field) {
            None | Some(Value::Null) => return None,
            Some(value) => value,
        };
        let Some(members) = value.as_object() else {
            self.violate(field, format!("must be an object, got {}", json_type(value)));
            return None;
        };

        let mut bound = |name: &str| -> Option<f64> {
            let path = format!("{}.{}", field, name);
            match members.get(name) {
                None | Some(Value::Null) => None,
                Some(value) => self.check(&path, value, unit_interval),
            }
        };
        let min_weight = bound("minWeight");
        let max_weight = bound("maxWeight");

        if let (Some(min), Some(max)) = (min_weight, max_weight)
            && min > max
        {
            self.violate(
                format!("{}.minWeight", field),
                format!("must not exceed maxWeight ({})", max),
            );
        }

        Some(WeightConstraints {
            min_weight,
            max_weight,
        })
    }

    fn violate(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.violations.push(FieldViolation::new(field, message));
    }

    fn into_violations(self) -> Vec<FieldViolation> {
        self.violations
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn closed_enum<T>(
    value: &Value,
    parse: impl Fn(&str) -> Option<T>,
    allowed: &[&str],
) -> Result<T, String> {
    value
        .as_str()
        .and_then(parse)
        .ok_or_else(|| format!("must be one of {}", allowed.join(", ")))
}

fn parse_dataset(value: &Value) -> Result<Dataset, String> {
    closed_enum(
        value,
        Dataset::parse,
        &Dataset::ALL.map(|dataset| dataset.as_str()),
    )
}

fn parse_risk_level(value: &Value) -> Result<RiskLevel, String> {
    closed_enum(
        value,
        RiskLevel::parse,
        &RiskLevel::ALL.map(|level| level.as_str()),
    )
}

fn parse_objective(value: &Value) -> Result<Objective, String> {
    closed_enum(
        value,
        Objective::parse,
        &Objective::ALL.map(|objective| objective.as_str()),
    )
}

fn positive_integer(value: &Value) -> Result<u32, String> {
    value
        .as_u64()
        .filter(|n| *n >= 1)
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| "must be a positive integer".to_string())
}

fn finite_number(value: &Value) -> Result<f64, String> {
    value
        .as_f64()
        .filter(|n| n.is_finite())
        .ok_or_else(|| format!("must be a finite number, got {}", json_type(value)))
}

fn positive_finite(value: &Value) -> Result<f64, String> {
    let number = finite_number(value)?;
    if number <= 0.0 {
        return Err("must be greater than 0".to_string());
    }
    Ok(number)
}

fn non_negative_finite(value: &Value) -> Result<f64, String> {
    let number = finite_number(value)?;
    if number < 0.0 {
        return Err("must not be negative".to_string());
    }
    Ok(number)
}

fn unit_interval(value: &Value) -> Result<f64, String> {
    let number = finite_number(value)?;
    if !(0.0..=1.0).contains(&number) {
        return Err("must be within [0, 1]".to_string());
    }
    Ok(number)
}

fn opaque_object(value: &Value) -> Result<BTreeMap<String, Value>, String> {
    value
        .as_object()
        .map(|object| {
            object
                .iter()
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect()
        })
        .ok_or_else(|| format!("must be an object, got {}", json_type(value)))
}

/// Duplicates collapse onto their first occurrence. Identifiers are taken
/// verbatim, so padded ones are rejected rather than trimmed.
fn identifier_set(value: &Value) -> Result<Vec<AssetId>, String> {
    let items = value
        .as_array()
        .ok_or_else(|| format!("must be an array of identifiers, got {}", json_type(value)))?;

    let mut ids: Vec<AssetId> = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let id = item
            .as_str()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| format!("element {} must be a non-empty string", index))?;
        if id.trim() != id {
            return Err(format!(
                "element {} must not have leading or trailing whitespace",
                index
            ));
        }
        if !ids.iter().any(|existing| existing == id) {
            ids.push(id.to_string());
        }
    }
    Ok(ids)
}

// ---- raw solver contract ----

/// Alternate spellings a solver may use for one canonical field.
#[derive(Debug, Clone, Copy)]
pub struct FieldAliases {
    pub canonical: &'static str,
    pub alternates: &'static [&'static str],
}

const fn aliases(canonical: &'static str, alternates: &'static [&'static str]) -> FieldAliases {
    FieldAliases {
        canonical,
        alternates,
    }
}

const RUN_ID: FieldAliases = aliases("run_id", &["runId"]);
const DATASET: FieldAliases = aliases("dataset", &["datasetEchoed", "dataset_echoed"]);
const DIAGNOSTICS: FieldAliases = aliases("diagnostics", &["extraDiagnostics", "extra_diagnostics"]);

/// A solver payload that must be checked before the mapper may trust it.
pub trait RawContract: DeserializeOwned {
    const OPERATION: SolverOperation;
    /// Top-level spellings folded onto their canonical field before decoding.
    const FIELD_ALIASES: &'static [FieldAliases];
    /// The canonical sequence field and the spellings folded inside each entry.
    const ENTRY_ALIASES: (&'static str, &'static [FieldAliases]);

    fn violations(&self) -> Vec<FieldViolation>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum RawContractError {
    Malformed(String),
    Violations(Vec<FieldViolation>),
}

impl fmt::Display for RawContractError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawContractError::Malformed(message) => write!(f, "undecodable payload: {}", message),
            RawContractError::Violations(violations) => {
                let joined = violations
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("; ");
                write!(f, "contract violations: {}", joined)
            }
        }
    }
}

impl std::error::Error for RawContractError {}

/// Decodes and range-checks a solver body.
///
/// Alternate spellings are folded onto the canonical field first. When more
/// than one spelling is present the canonical one wins, then the earliest
/// listed alternate; the shadowed values are discarded.
pub fn decode_raw<T: RawContract>(body: &str) -> Result<T, RawContractError> {
    let mut value: Value =
        serde_json::from_str(body).map_err(|err| RawContractError::Malformed(err.to_string()))?;
    canonicalize_raw::<T>(&mut value);
    let raw: T =
        serde_json::from_value(value).map_err(|err| RawContractError::Malformed(err.to_string()))?;
    let violations = raw.violations();
    if !violations.is_empty() {
        return Err(RawContractError::Violations(violations));
    }
    Ok(raw)
}

fn canonicalize_raw<T: RawContract>(value: &mut Value) {
    let Some(object) = value.as_object_mut() else {
        return;
    };
    fold_aliases(object, T::FIELD_ALIASES);

    let (sequence, entry_aliases) = T::ENTRY_ALIASES;
    if let Some(Value::Array(entries)) = object.get_mut(sequence) {
        for entry in entries.iter_mut().filter_map(Value::as_object_mut) {
            fold_aliases(entry, entry_aliases);
        }
    }
}

fn fold_aliases(object: &mut Map<String, Value>, table: &[FieldAliases]) {
    for field in table {
        for alternate in field.alternates {
            if let Some(value) = object.remove(*alternate)
                && !object.contains_key(field.canonical)
            {
                object.insert(field.canonical.to_string(), value);
            }
        }
    }
}

fn check_finite(violations: &mut Vec<FieldViolation>, field: &str, value: Option<f64>) {
    if let Some(value) = value
        && !value.is_finite()
    {
        violations.push(FieldViolation::new(field, "must be finite"));
    }
}

impl RawContract for SolverRawResponse {
    const OPERATION: SolverOperation = SolverOperation::Optimize;
    const FIELD_ALIASES: &'static [FieldAliases] = &[
        RUN_ID,
        DATASET,
        aliases("objective_value", &["objectiveValue"]),
        aliases("risk", &["volatility"]),
        aliases("sharpe", &["sharpe_ratio", "sharpeRatio"]),
        DIAGNOSTICS,
    ];
    const ENTRY_ALIASES: (&'static str, &'static [FieldAliases]) = (
        "portfolio",
        &[
            aliases("asset_id", &["assetId", "ticker"]),
            aliases("expected_return", &["expectedReturn"]),
        ],
    );

    fn violations(&self) -> Vec<FieldViolation> {
        let mut violations = Vec::new();

        match &self.portfolio {
            None => violations.push(FieldViolation::new("portfolio", "is required")),
            Some(portfolio) => {
                for (index, entry) in portfolio.iter().enumerate() {
                    let at = |name: &str| format!("portfolio[{}].{}", index, name);
                    if entry.asset_id.trim().is_empty() {
                        violations.push(FieldViolation::new(at("asset_id"), "must not be empty"));
                    }
                    if !entry.weight.is_finite() || !(0.0..=1.0).contains(&entry.weight) {
                        violations.push(FieldViolation::new(at("weight"), "must be within [0, 1]"));
                    }
                    if let Some(percentage) = entry.percentage
                        && (!percentage.is_finite() || !(0.0..=100.0).contains(&percentage))
                    {
                        violations.push(FieldViolation::new(
                            at("percentage"),
                            "must be within [0, 100]",
                        ));
                    }
                    check_finite(&mut violations, &at("expected_return"), entry.expected_return);
                }
            }
        }

        check_finite(&mut violations, "objective_value", self.objective_value);
        check_finite(&mut violations, "risk", self.risk);
        check_finite(&mut violations, "sharpe", self.sharpe);

        if let Some(run_id) = &self.run_id
            && run_id.trim().is_empty()
        {
            violations.push(FieldViolation::new("run_id", "must not be empty when present"));
        }

        violations
    }
}

impl RawContract for SolverRawRebalanceResponse {
    const OPERATION: SolverOperation = SolverOperation::Rebalance;
    const FIELD_ALIASES: &'static [FieldAliases] = &[
        RUN_ID,
        DATASET,
        aliases("points", &["timeline", "series"]),
        DIAGNOSTICS,
    ];
    const ENTRY_ALIASES: (&'static str, &'static [FieldAliases]) = (
        "points",
        &[
            aliases("rebalanced", &["with_rebalance", "withRebalance"]),
            aliases("buy_and_hold", &["without_rebalance", "buyAndHold", "hold"]),
        ],
    );

    fn violations(&self) -> Vec<FieldViolation> {
        let mut violations = Vec::new();

        match &self.points {
            None => violations.push(FieldViolation::new("points", "is required")),
            Some(points) if points.is_empty() => {
                violations.push(FieldViolation::new("points", "must contain at least one day"))
            }
            Some(points) => {
                let mut previous_day: Option<u32> = None;
                for (index, point) in points.iter().enumerate() {
                    let at = |name: &str| format!("points[{}].{}", index, name);
                    if let Some(previous) = previous_day
                        && point.day <= previous
                    {
                        violations.push(FieldViolation::new(
                            at("day"),
                            format!("must be greater than the previous day ({})", previous),
                        ));
                    }
                    previous_day = Some(point.day);
                    check_finite(&mut violations, &at("rebalanced"), Some(point.rebalanced));
                    check_finite(&mut violations, &at("buy_and_hold"), Some(point.buy_and_hold));
                }
            }
        }

        if let Some(run_id) = &self.run_id
            && run_id.trim().is_empty()
        {
            violations.push(FieldViolation::new("run_id", "must not be empty when present"));
        }

        violations
    }
}
