use serde_json::json;

use portfolio_bridge::solver_gateway::{
    response_normalizer::ResponseNormalizer,
    types::{BUY_AND_HOLD_SERIES, ComputationMethod, REBALANCED_SERIES},
};

use crate::support::{raw_rebalance_response, raw_response, rebalance_raw_json, xyz_raw_json};

#[test]
fn given_example_portfolio_when_normalized_then_allocation_matches_weights() {
    let normalized =
        ResponseNormalizer.normalize(raw_response(xyz_raw_json()), ComputationMethod::Solver);

    let allocation = normalized
        .allocation
        .iter()
        .map(|entry| (entry.name.as_str(), entry.percentage_value))
        .collect::<Vec<_>>();
    assert_eq!(allocation, vec![("X", 50.0), ("Y", 30.0), ("Z", 20.0)]);
    assert_eq!(normalized.expected_return, None);
    assert_eq!(normalized.method, ComputationMethod::Solver);
}

#[test]
fn given_any_portfolio_when_normalized_then_parallel_lists_keep_input_order() {
    let raw = raw_response(json!({
        "portfolio": [
            { "asset_id": "ZZZ", "weight": 0.1 },
            { "asset_id": "AAA", "weight": 0.6 },
            { "asset_id": "MMM", "weight": 0.3 }
        ]
    }));
    let normalized = ResponseNormalizer.normalize(raw, ComputationMethod::Solver);

    assert_eq!(normalized.selected_asset_ids.len(), normalized.weights.len());
    assert_eq!(normalized.weights.len(), normalized.allocation.len());
    assert_eq!(normalized.selected_asset_ids, vec!["ZZZ", "AAA", "MMM"]);
    assert_eq!(normalized.weights, vec![0.1, 0.6, 0.3]);
    let names = normalized
        .allocation
        .iter()
        .map(|entry| entry.name.as_str())
        .collect::<Vec<_>>();
    assert_eq!(names, vec!["ZZZ", "AAA", "MMM"]);
}

#[test]
fn given_percentage_presence_when_normalized_then_rounding_source_follows_it() {
    let raw = raw_response(json!({
        "portfolio": [
            { "asset_id": "A", "weight": 0.2, "percentage": 33.5 },
            { "asset_id": "B", "weight": 0.2, "percentage": 33.4 },
            { "asset_id": "C", "weight": 0.125 },
            { "asset_id": "D", "weight": 0.0 }
        ]
    }));
    let normalized = ResponseNormalizer.normalize(raw, ComputationMethod::Solver);

    let values = normalized
        .allocation
        .iter()
        .map(|entry| entry.percentage_value)
        .collect::<Vec<_>>();
    assert_eq!(values, vec![34.0, 33.0, 13.0, 0.0]);
}

#[test]
fn given_partial_expected_returns_when_normalized_then_mean_skips_missing_values() {
    let raw = raw_response(json!({
        "portfolio": [
            { "asset_id": "A", "weight": 0.5, "expected_return": 0.1 },
            { "asset_id": "B", "weight": 0.3 },
            { "asset_id": "C", "weight": 0.2, "expected_return": 0.3 }
        ]
    }));
    let normalized = ResponseNormalizer.normalize(raw, ComputationMethod::Solver);

    let expected_return = normalized.expected_return.expect("mean should be present");
    assert!((expected_return - 0.2).abs() < 1e-12);
}

#[test]
fn given_solver_run_id_when_normalized_then_it_is_preserved() {
    let mut value = xyz_raw_json();
    value["run_id"] = json!("solver-run-17");
    let normalized = ResponseNormalizer.normalize(raw_response(value), ComputationMethod::Solver);
    assert_eq!(normalized.run_id, "solver-run-17");
}

#[test]
fn given_missing_run_id_when_normalized_twice_then_only_run_id_differs() {
    let first =
        ResponseNormalizer.normalize(raw_response(xyz_raw_json()), ComputationMethod::Solver);
    let mut second =
        ResponseNormalizer.normalize(raw_response(xyz_raw_json()), ComputationMethod::Solver);

    assert!(!first.run_id.is_empty());
    assert_ne!(first.run_id, second.run_id);
    second.run_id = first.run_id.clone();
    assert_eq!(first, second);
}

#[test]
fn given_solver_metadata_when_normalized_then_diagnostics_pass_through() {
    let raw = raw_response(json!({
        "portfolio": [{ "asset_id": "A", "weight": 1.0 }],
        "objective_value": 1.42,
        "dataset": "DS_A",
        "diagnostics": { "iterations": 12 },
        "solver_version": "3.1"
    }));
    let normalized = ResponseNormalizer.normalize(raw, ComputationMethod::Solver);

    assert_eq!(normalized.diagnostics["objectiveValue"], json!(1.42));
    assert_eq!(normalized.diagnostics["datasetEchoed"], json!("DS_A"));
    assert_eq!(normalized.diagnostics["solver"], json!({ "iterations": 12 }));
    assert_eq!(normalized.diagnostics["solver_version"], json!("3.1"));
}

#[test]
fn given_normalized_response_when_serialized_then_client_names_are_camel_case() {
    let normalized =
        ResponseNormalizer.normalize(raw_response(xyz_raw_json()), ComputationMethod::Mock);
    let wire = serde_json::to_value(&normalized).expect("response should serialize");

    assert_eq!(wire["method"], json!("mock"));
    assert_eq!(wire["selectedAssetIds"], json!(["X", "Y", "Z"]));
    assert_eq!(wire["allocation"][0], json!({ "name": "X", "percentageValue": 50.0 }));
    assert!(wire["runId"].is_string());
    assert!(wire["expectedReturn"].is_null());
}

#[test]
fn given_rebalance_points_when_normalized_then_two_aligned_series_are_returned() {
    let normalized = ResponseNormalizer.normalize_rebalance(
        raw_rebalance_response(rebalance_raw_json()),
        ComputationMethod::Solver,
    );

    assert_eq!(normalized.run_id, "rb-1");
    assert_eq!(normalized.time_series.days, vec![0, 30, 60]);
    let series = &normalized.time_series.series;
    assert_eq!(series.len(), 2);
    assert_eq!(series[0].name, REBALANCED_SERIES);
    assert_eq!(series[0].values, vec![1.0, 1.02, 1.05]);
    assert_eq!(series[1].name, BUY_AND_HOLD_SERIES);
    assert_eq!(series[1].values, vec![1.0, 1.01, 1.03]);
}
