use serde_json::json;

use portfolio_bridge::solver_gateway::{
    error::ErrorKind,
    schema::{RawContractError, decode_raw, parse_optimization_request, parse_rebalance_request},
    types::{Objective, RiskLevel, SolverRawRebalanceResponse, SolverRawResponse},
};

use crate::support::{optimize_payload, rebalance_payload};

fn fields(err: &portfolio_bridge::solver_gateway::error::ClassifiedError) -> Vec<&str> {
    err.details.iter().map(|d| d.field.as_str()).collect()
}

#[test]
fn given_max_assets_zero_when_parsed_then_validation_names_the_field() {
    let mut payload = optimize_payload();
    payload["maxAssets"] = json!(0);

    let err = parse_optimization_request(&payload).expect_err("maxAssets 0 must fail");
    assert_eq!(err.kind, ErrorKind::Validation);
    assert_eq!(fields(&err), vec!["maxAssets"]);
    assert_eq!(err.details[0].message, "must be a positive integer");
}

#[test]
fn given_several_bad_fields_when_parsed_then_every_violation_is_reported() {
    let payload = json!({
        "timeHorizonDays": 30,
        "riskLevel": "extreme",
        "totalBudget": -5,
        "maxAssets": 3
    });

    let err = parse_optimization_request(&payload).expect_err("payload must fail");
    assert_eq!(err.kind, ErrorKind::Validation);
    assert_eq!(fields(&err), vec!["dataset", "riskLevel", "totalBudget"]);
    assert_eq!(err.details[0].message, "is required");
    assert_eq!(err.details[1].message, "must be one of low, medium, high");
    assert!(err.message.contains("3 fields are invalid"));
}

#[test]
fn given_unknown_dataset_when_parsed_then_closed_set_is_listed() {
    let mut payload = optimize_payload();
    payload["dataset"] = json!("DatasetZ");

    let err = parse_optimization_request(&payload).expect_err("unknown dataset must fail");
    assert_eq!(fields(&err), vec!["dataset"]);
    assert_eq!(
        err.details[0].message,
        "must be one of DatasetA, DatasetB, DatasetC"
    );
}

#[test]
fn given_padded_include_id_when_parsed_then_it_is_rejected_not_trimmed() {
    let mut payload = optimize_payload();
    payload["includeList"] = json!(["AAPL", " MSFT "]);

    let err = parse_optimization_request(&payload).expect_err("padded id must fail");
    assert_eq!(fields(&err), vec!["includeList"]);
    assert_eq!(
        err.details[0].message,
        "element 1 must not have leading or trailing whitespace"
    );
}

#[test]
fn given_non_object_body_when_parsed_then_root_violation_is_returned() {
    let err = parse_optimization_request(&json!([1, 2, 3])).expect_err("array must fail");
    assert_eq!(fields(&err), vec!["$"]);
    assert!(err.details[0].message.contains("got array"));
}

#[test]
fn given_optional_fields_omitted_when_parsed_then_defaults_apply() {
    let mut payload = optimize_payload();
    payload.as_object_mut().expect("object").remove("riskLevel");

    let request = parse_optimization_request(&payload).expect("payload should be valid");
    assert_eq!(request.risk_level, RiskLevel::Medium);
    assert_eq!(request.objective, Objective::Sharpe);
    assert!(request.solver_params.is_empty());
    assert!(request.weight_constraints.is_none());
    assert!(request.include_list.is_empty());
    assert_eq!(request.total_budget, 100000.0);
}

#[test]
fn given_unknown_fields_when_parsed_then_they_are_ignored() {
    let mut payload = optimize_payload();
    payload["clientVersion"] = json!("2.4.1");

    assert!(parse_optimization_request(&payload).is_ok());
}

#[test]
fn given_overlapping_include_and_exclude_when_parsed_then_exclude_is_flagged() {
    let mut payload = optimize_payload();
    payload["includeList"] = json!(["AAPL", "MSFT"]);
    payload["excludeList"] = json!(["MSFT"]);

    let err = parse_optimization_request(&payload).expect_err("overlap must fail");
    assert_eq!(fields(&err), vec!["excludeList"]);
    assert!(err.details[0].message.contains("'MSFT'"));
}

#[test]
fn given_inverted_weight_constraints_when_parsed_then_min_weight_is_flagged() {
    let mut payload = optimize_payload();
    payload["weightConstraints"] = json!({ "minWeight": 0.6, "maxWeight": 0.4 });

    let err = parse_optimization_request(&payload).expect_err("inverted bounds must fail");
    assert_eq!(fields(&err), vec!["weightConstraints.minWeight"]);

    payload["weightConstraints"] = json!({ "maxWeight": 1.5 });
    let err = parse_optimization_request(&payload).expect_err("out of range bound must fail");
    assert_eq!(fields(&err), vec!["weightConstraints.maxWeight"]);
}

#[test]
fn given_valid_rebalance_payload_when_parsed_then_fields_are_carried() {
    let request = parse_rebalance_request(&rebalance_payload()).expect("payload should be valid");
    assert_eq!(request.time_horizon_days, 90);
    assert_eq!(request.rebalance_interval_days, 30);
    assert_eq!(request.transaction_cost_bps, Some(5.0));
    assert_eq!(request.risk_level, RiskLevel::Low);
}

#[test]
fn given_short_horizon_without_interval_when_parsed_then_interval_defaults_to_horizon() {
    let mut payload = rebalance_payload();
    let object = payload.as_object_mut().expect("object");
    object.remove("rebalanceIntervalDays");
    object.insert("timeHorizonDays".to_string(), json!(10));

    let request = parse_rebalance_request(&payload).expect("payload should be valid");
    assert_eq!(request.rebalance_interval_days, 10);
}

#[test]
fn given_interval_beyond_horizon_when_parsed_then_validation_is_returned() {
    let mut payload = rebalance_payload();
    payload["rebalanceIntervalDays"] = json!(120);
    payload["transactionCostBps"] = json!(-1);

    let err = parse_rebalance_request(&payload).expect_err("payload must fail");
    assert_eq!(
        fields(&err),
        vec!["transactionCostBps", "rebalanceIntervalDays"]
    );
}

#[test]
fn given_raw_response_without_portfolio_when_decoded_then_contract_is_violated() {
    let err = decode_raw::<SolverRawResponse>(r#"{"run_id":"r1"}"#)
        .expect_err("missing portfolio must fail");
    match err {
        RawContractError::Violations(violations) => {
            assert_eq!(violations[0].field, "portfolio");
        }
        other => panic!("expected violations, got {other:?}"),
    }
}

#[test]
fn given_out_of_range_weight_when_decoded_then_entry_is_named() {
    let err = decode_raw::<SolverRawResponse>(
        r#"{"portfolio":[{"asset_id":"X","weight":0.4},{"asset_id":"Y","weight":1.6}]}"#,
    )
    .expect_err("weight above 1 must fail");
    assert!(err.to_string().contains("portfolio[1].weight"));
}

#[test]
fn given_non_json_body_when_decoded_then_malformed_is_returned() {
    let err = decode_raw::<SolverRawResponse>("<html>bad gateway</html>")
        .expect_err("html must fail");
    assert!(matches!(err, RawContractError::Malformed(_)));
}

#[test]
fn given_camel_case_raw_fields_when_decoded_then_aliases_are_accepted() {
    let raw = decode_raw::<SolverRawResponse>(
        r#"{"runId":"r9","portfolio":[{"assetId":"X","weight":1.0,"expectedReturn":0.08}],"sharpeRatio":1.3,"volatility":0.2}"#,
    )
    .expect("camelCase payload should decode");
    assert_eq!(raw.run_id.as_deref(), Some("r9"));
    assert_eq!(raw.sharpe, Some(1.3));
    assert_eq!(raw.risk, Some(0.2));

    let portfolio = raw.portfolio.expect("portfolio");
    assert_eq!(portfolio[0].asset_id, "X");
    assert_eq!(portfolio[0].expected_return, Some(0.08));
}

#[test]
fn given_both_spellings_of_a_raw_field_when_decoded_then_canonical_value_wins() {
    let raw = decode_raw::<SolverRawResponse>(
        r#"{"portfolio":[{"asset_id":"X","assetId":"Q","weight":1.0}],"sharpe":1.1,"sharpe_ratio":9.9,"sharpeRatio":8.8}"#,
    )
    .expect("payload with duplicate spellings should decode");
    assert_eq!(raw.sharpe, Some(1.1));
    assert!(raw.extra.is_empty());

    let portfolio = raw.portfolio.expect("portfolio");
    assert_eq!(portfolio[0].asset_id, "X");
}

#[test]
fn given_only_alternate_spellings_when_decoded_then_first_listed_alternate_wins() {
    let raw = decode_raw::<SolverRawResponse>(
        r#"{"portfolio":[{"ticker":"T","assetId":"A","weight":1.0}],"sharpeRatio":2.0,"sharpe_ratio":1.5}"#,
    )
    .expect("payload with alternate spellings should decode");
    assert_eq!(raw.sharpe, Some(1.5));
    assert_eq!(raw.portfolio.expect("portfolio")[0].asset_id, "A");
}

#[test]
fn given_both_spellings_of_rebalance_series_when_decoded_then_canonical_points_win() {
    let raw = decode_raw::<SolverRawRebalanceResponse>(
        r#"{"points":[{"day":0,"rebalanced":1.0,"with_rebalance":7.0,"hold":1.0}],"timeline":[{"day":5,"rebalanced":2.0,"buy_and_hold":2.0}]}"#,
    )
    .expect("payload with duplicate spellings should decode");

    let points = raw.points.expect("points");
    assert_eq!(points.len(), 1);
    assert_eq!(points[0].day, 0);
    assert_eq!(points[0].rebalanced, 1.0);
    assert_eq!(points[0].buy_and_hold, 1.0);
    assert!(!raw.extra.contains_key("timeline"));
}

#[test]
fn given_unordered_rebalance_days_when_decoded_then_contract_is_violated() {
    let err = decode_raw::<SolverRawRebalanceResponse>(
        r#"{"points":[{"day":30,"rebalanced":1.0,"buy_and_hold":1.0},{"day":30,"rebalanced":1.1,"buy_and_hold":1.0}]}"#,
    )
    .expect_err("repeated day must fail");
    assert!(err.to_string().contains("points[1].day"));

    let err = decode_raw::<SolverRawRebalanceResponse>(r#"{"points":[]}"#)
        .expect_err("empty series must fail");
    assert!(err.to_string().contains("points"));
}
