//! Dispatcher tests

use std::sync::Arc;

use coa_protocol::envelope::{
    CarriesBody, ContentType, RequestEnvelope, ResponseEnvelope, REQUEST_ID_KEY,
};
use coa_protocol::models::{deployment_hash, DeploymentSpec};
use coa_protocol::state::ResultCode;
use coa_protocol::summary::{SummaryResult, SummaryState};
use coordinator::aggregator::SummaryRegistry;
use coordinator::dispatch::Dispatcher;
use serde_json::{json, Value};
use tokio_test::assert_ok;

fn dispatcher() -> Dispatcher {
    Dispatcher::new(Arc::new(SummaryRegistry::new()))
}

fn post(route: &str, body: Value) -> RequestEnvelope {
    assert_ok!(RequestEnvelope::new("POST", route).with_body(body, ContentType::Json))
}

fn body(response: &ResponseEnvelope) -> Value {
    assert_ok!(response.get_json::<Value>()).unwrap()
}

#[test]
fn test_full_report_flow() {
    let dispatcher = dispatcher();

    let response = dispatcher.dispatch(
        &RequestEnvelope::new("POST", "summaries/s1")
            .with_parameter("generation", "4")
            .with_parameter("hash", "abc"),
    );
    assert_eq!(response.state, ResultCode::OK);
    assert_eq!(body(&response)["state"], 1);

    let response = dispatcher.dispatch(&post(
        "summaries/s1/targets/t1",
        json!({"status": "Failed", "message": "boom", "components": {"c1": {"status": 500, "message": "oops"}}}),
    ));
    assert_eq!(response.state, ResultCode::OK);
    assert_eq!(body(&response)["summary"]["targets"]["t1"]["status"], "Failed");

    let response = dispatcher.dispatch(&post(
        "summaries/s1/progress",
        json!({"targetCount": 1, "plannedDeployment": 1}),
    ));
    assert_eq!(response.state, ResultCode::OK);

    let response = dispatcher.dispatch(&RequestEnvelope::new("POST", "summaries/s1/complete"));
    assert_eq!(response.state, ResultCode::OK);
    let completed = body(&response);
    assert_eq!(completed["summary"]["state"], 2);
    assert_eq!(completed["summary"]["summary"]["targetCount"], 1);
    assert_eq!(
        completed["message"],
        "Failed to deploy. Detailed status: t1: \"boom\" (t1.c1: oops)"
    );

    let response = dispatcher.dispatch(&RequestEnvelope::new("GET", "summaries/s1"));
    let stored: SummaryResult = assert_ok!(response.get_json()).unwrap();
    assert!(stored.is_finished());
    assert_eq!(stored.generation, "4");
    assert_eq!(stored.deployment_hash, "abc");
}

#[test]
fn test_begin_hashes_descriptor_body() {
    let dispatcher = dispatcher();
    let deployment = DeploymentSpec {
        solution_name: "sol".to_string(),
        ..Default::default()
    };
    let expected = assert_ok!(deployment_hash(&deployment));

    let request = assert_ok!(RequestEnvelope::new("POST", "summaries/s1")
        .with_body(serde_json::to_value(&deployment).unwrap(), ContentType::Json));
    let response = dispatcher.dispatch(&request);
    assert_eq!(body(&response)["deploymentHash"], expected);
}

#[test]
fn test_late_report_conflicts() {
    let dispatcher = dispatcher();
    dispatcher.dispatch(&RequestEnvelope::new("POST", "summaries/s1"));
    dispatcher.dispatch(&RequestEnvelope::new("POST", "summaries/s1/complete"));

    let response = dispatcher.dispatch(&post("summaries/s1/targets/t1", json!({"status": "OK"})));
    assert_eq!(response.state, ResultCode::CONFLICT);
    assert!(body(&response)["error"].is_string());
}

#[test]
fn test_unknown_route_and_method() {
    let dispatcher = dispatcher();

    let response = dispatcher.dispatch(&RequestEnvelope::new("GET", "instances"));
    assert_eq!(response.state, ResultCode::NOT_FOUND);

    let response = dispatcher.dispatch(&RequestEnvelope::new("DELETE", "summaries"));
    assert_eq!(response.state, ResultCode::METHOD_NOT_ALLOWED);

    let response = dispatcher.dispatch(&RequestEnvelope::new("PATCH", "summaries/s1"));
    assert_eq!(response.state, ResultCode::METHOD_NOT_ALLOWED);
}

#[test]
fn test_missing_summary() {
    let dispatcher = dispatcher();

    let response = dispatcher.dispatch(&RequestEnvelope::new("GET", "summaries/nope"));
    assert_eq!(response.state, ResultCode::NOT_FOUND);

    let response = dispatcher.dispatch(&RequestEnvelope::new("DELETE", "summaries/nope"));
    assert_eq!(response.state, ResultCode::NOT_FOUND);

    let response = dispatcher.dispatch(&post("summaries/nope/progress", json!({})));
    assert_eq!(response.state, ResultCode::NOT_FOUND);
}

#[test]
fn test_malformed_bodies() {
    let dispatcher = dispatcher();
    dispatcher.dispatch(&RequestEnvelope::new("POST", "summaries/s1"));

    // JSON content type whose wire body is not base64 JSON
    let mut request = RequestEnvelope::new("POST", "summaries/s1/targets/t1");
    request.body = "not-base64!".to_string();
    assert_eq!(dispatcher.dispatch(&request).state, ResultCode::BAD_REQUEST);

    // valid JSON of the wrong shape
    let response = dispatcher.dispatch(&post("summaries/s1/progress", json!({"successCount": "two"})));
    assert_eq!(response.state, ResultCode::BAD_REQUEST);

    // no body where one is required
    let response = dispatcher.dispatch(&RequestEnvelope::new("PUT", "summaries/s1"));
    assert_eq!(response.state, ResultCode::BAD_REQUEST);
}

#[test]
fn test_upsert_and_list() {
    let dispatcher = dispatcher();

    let mut incoming = SummaryResult::new("ignored", "7", "h", SummaryState::Done);
    incoming.summary.job_id = "3".to_string();
    let request = assert_ok!(RequestEnvelope::new("PUT", "summaries/b")
        .with_body(serde_json::to_value(&incoming).unwrap(), ContentType::Json));
    let response = dispatcher.dispatch(&request);
    assert_eq!(response.state, ResultCode::OK);
    assert_eq!(body(&response)["summaryid"], "b");

    dispatcher.dispatch(&RequestEnvelope::new("POST", "summaries/a"));

    let response = dispatcher.dispatch(&RequestEnvelope::new("GET", "summaries"));
    let listed = body(&response);
    let ids: Vec<&str> = listed
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["summaryid"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["a", "b"]);

    // an older job id is stale
    incoming.summary.job_id = "2".to_string();
    let request = assert_ok!(RequestEnvelope::new("PUT", "summaries/b")
        .with_body(serde_json::to_value(&incoming).unwrap(), ContentType::Json));
    assert_eq!(dispatcher.dispatch(&request).state, ResultCode::CONFLICT);
}

#[test]
fn test_put_cannot_reopen_finished_summary() {
    let dispatcher = dispatcher();
    dispatcher.dispatch(&RequestEnvelope::new("POST", "summaries/s1"));
    dispatcher.dispatch(&RequestEnvelope::new("POST", "summaries/s1/complete"));

    let reopened = SummaryResult::new("s1", "2", "h", SummaryState::Running);
    let request = assert_ok!(RequestEnvelope::new("PUT", "summaries/s1")
        .with_body(serde_json::to_value(&reopened).unwrap(), ContentType::Json));
    assert_eq!(dispatcher.dispatch(&request).state, ResultCode::CONFLICT);

    let response = dispatcher.dispatch(&post("summaries/s1/targets/t1", json!({"status": "OK"})));
    assert_eq!(response.state, ResultCode::CONFLICT);
}

#[test]
fn test_get_by_name_and_soft_delete() {
    let dispatcher = dispatcher();
    dispatcher.dispatch(&RequestEnvelope::new("POST", "summaries/summary-web"));

    let response = dispatcher
        .dispatch(&RequestEnvelope::new("GET", "summaries/guid-9").with_parameter("name", "web"));
    assert_eq!(response.state, ResultCode::OK);

    let response = dispatcher.dispatch(
        &RequestEnvelope::new("DELETE", "summaries/summary-web").with_parameter("soft", "true"),
    );
    assert_eq!(body(&response)["summary"]["removed"], true);
    assert_eq!(dispatcher.registry().len(), 1);

    dispatcher.dispatch(&RequestEnvelope::new("DELETE", "summaries/summary-web"));
    assert!(dispatcher.registry().is_empty());
}

#[test]
fn test_request_id_is_echoed() {
    let dispatcher = dispatcher();

    let ok = dispatcher
        .dispatch(&RequestEnvelope::new("GET", "summaries").with_metadata(REQUEST_ID_KEY, "r-1"));
    assert_eq!(ok.request_id(), Some("r-1"));

    let failed = dispatcher
        .dispatch(&RequestEnvelope::new("GET", "nowhere").with_metadata(REQUEST_ID_KEY, "r-2"));
    assert_eq!(failed.state, ResultCode::NOT_FOUND);
    assert_eq!(failed.request_id(), Some("r-2"));

    let anonymous = dispatcher.dispatch(&RequestEnvelope::new("GET", "summaries"));
    assert!(anonymous.metadata.is_empty());
}
