//! Summary registry tests

use std::sync::Arc;

use coa_protocol::state::ResultCode;
use coa_protocol::summary::{ComponentResult, DeploymentSummary, SummaryState, TargetResult};
use coordinator::aggregator::{SummaryProgress, SummaryRegistry};
use coordinator::errors::CoordinatorError;
use tokio_test::{assert_err, assert_ok};

fn failed_target(message: &str, component: &str, component_message: &str) -> TargetResult {
    TargetResult::new("Failed", message, Default::default()).with_component(
        component,
        ComponentResult::failure(component_message, None),
    )
}

#[test]
fn test_begin_starts_running() {
    let registry = SummaryRegistry::new();
    let started = registry.begin("s1", "3", "abc");

    assert_eq!(started.state, SummaryState::Running);
    assert_eq!(started.generation, "3");
    assert_eq!(started.deployment_hash, "abc");
    assert!(!assert_ok!(registry.is_finished("s1")));
}

#[test]
fn test_begin_replaces_previous_attempt() {
    let registry = SummaryRegistry::new();
    registry.begin("s1", "1", "h1");
    assert_ok!(registry.apply_target_result("s1", "t1", TargetResult::ok(Default::default())));
    assert_ok!(registry.complete("s1"));

    let restarted = registry.begin("s1", "2", "h2");
    assert_eq!(restarted.state, SummaryState::Running);
    assert!(restarted.summary.target_results.is_empty());
    assert_eq!(registry.get("s1").unwrap().generation, "2");
    assert_eq!(registry.len(), 1);
}

#[test]
fn test_target_reports_merge() {
    let registry = SummaryRegistry::new();
    registry.begin("s1", "1", "h");

    assert_ok!(registry.apply_target_result("s1", "t1", failed_target("boom", "c1", "oops")));
    let merged = assert_ok!(registry.apply_target_result(
        "s1",
        "t1",
        TargetResult::new("OK", "retried", Default::default())
            .with_component("c2", ComponentResult::success("")),
    ));

    let target = &merged.summary.target_results["t1"];
    assert_eq!(target.status, "Failed");
    assert_eq!(target.message, "boom; retried");
    assert_eq!(target.component_results.len(), 2);
    assert_eq!(target.component_results["c1"].status, ResultCode::INTERNAL_ERROR);
}

#[test]
fn test_reports_rejected_once_done() {
    let registry = SummaryRegistry::new();
    registry.begin("s1", "1", "h");
    assert_ok!(registry.complete("s1"));

    let err = assert_err!(registry.apply_target_result(
        "s1",
        "t1",
        TargetResult::ok(Default::default())
    ));
    assert!(matches!(err, CoordinatorError::SummaryFinished(_)));
    assert_eq!(err.result_code(), ResultCode::CONFLICT);
    assert!(registry.get("s1").unwrap().summary.target_results.is_empty());

    let err = assert_err!(registry.advance("s1", SummaryState::Running));
    assert!(matches!(err, CoordinatorError::InvalidTransition { .. }));
}

#[test]
fn test_complete_generates_message() {
    let registry = SummaryRegistry::new();
    registry.begin("s1", "1", "h");
    assert_ok!(registry.apply_target_result("s1", "t1", failed_target("boom", "c1", "oops")));

    let (result, message) = assert_ok!(registry.complete("s1"));
    assert!(result.is_finished());
    assert_eq!(
        message,
        "Failed to deploy. Detailed status: t1: \"boom\" (t1.c1: oops)"
    );
    assert!(assert_ok!(registry.is_finished("s1")));
}

#[test]
fn test_complete_when_all_deployed_is_silent() {
    let registry = SummaryRegistry::new();
    registry.begin("s1", "1", "h");
    let progress = SummaryProgress {
        all_assigned_deployed: Some(true),
        success_count: Some(1),
        ..Default::default()
    };
    assert_ok!(registry.apply_progress("s1", progress));

    let (result, message) = assert_ok!(registry.complete("s1"));
    assert!(message.is_empty());
    // counters stay what the caller set, regardless of target results
    assert_eq!(result.summary.success_count, 1);
    assert_eq!(result.summary.current_deployed, 0);
}

#[test]
fn test_unknown_summary() {
    let registry = SummaryRegistry::new();
    let err = assert_err!(registry.apply_target_result(
        "missing",
        "t1",
        TargetResult::ok(Default::default())
    ));
    assert!(matches!(err, CoordinatorError::SummaryNotFound(_)));
    assert_err!(registry.is_finished("missing"));
    assert!(registry.remove("missing").is_none());
}

#[test]
fn test_upsert_job_id_ordering() {
    let registry = SummaryRegistry::new();
    let summary = |job_id: &str| DeploymentSummary {
        job_id: job_id.to_string(),
        ..Default::default()
    };

    assert_ok!(registry.upsert("s1", "1", "h", summary("5"), SummaryState::Running));
    assert_ok!(registry.upsert("s1", "1", "h", summary("6"), SummaryState::Running));

    let err = assert_err!(registry.upsert("s1", "1", "h", summary("4"), SummaryState::Done));
    assert!(matches!(err, CoordinatorError::StaleJobId { incoming: 4, current: 6, .. }));

    let err = assert_err!(registry.upsert("s1", "1", "h", summary("x"), SummaryState::Done));
    assert_eq!(err.result_code(), ResultCode::BAD_REQUEST);

    // an empty job id skips the check
    let stored = assert_ok!(registry.upsert("s1", "2", "h", summary(""), SummaryState::Done));
    assert_eq!(stored.generation, "2");
    assert!(stored.is_finished());
}

#[test]
fn test_upsert_cannot_reopen_finished_summary() {
    let registry = SummaryRegistry::new();
    registry.begin("s1", "1", "h");
    assert_ok!(registry.complete("s1"));

    let err = assert_err!(registry.upsert(
        "s1",
        "2",
        "h",
        DeploymentSummary::default(),
        SummaryState::Running
    ));
    assert!(matches!(
        err,
        CoordinatorError::InvalidTransition {
            from: SummaryState::Done,
            to: SummaryState::Running,
            ..
        }
    ));
    assert_eq!(err.result_code(), ResultCode::CONFLICT);
    assert!(assert_ok!(registry.is_finished("s1")));
    assert_eq!(registry.get("s1").unwrap().generation, "1");

    // late reports stay rejected
    assert_err!(registry.apply_target_result("s1", "t1", TargetResult::ok(Default::default())));
}

#[test]
fn test_find_falls_back_to_name() {
    let registry = SummaryRegistry::new();
    registry.begin("summary-web", "1", "h");

    assert!(registry.find("guid-1", None).is_none());
    let found = registry.find("guid-1", Some("web")).unwrap();
    assert_eq!(found.summary_id, "summary-web");
}

#[test]
fn test_list_is_sorted_and_remove() {
    let registry = SummaryRegistry::new();
    for id in ["c", "a", "b"] {
        registry.begin(id, "1", "h");
    }

    let ids: Vec<String> = registry.list().into_iter().map(|s| s.summary_id).collect();
    assert_eq!(ids, vec!["a", "b", "c"]);

    let removed = registry.remove("b").unwrap();
    assert_eq!(removed.summary_id, "b");
    assert_eq!(registry.len(), 2);
}

#[test]
fn test_soft_remove_keeps_summary() {
    let registry = SummaryRegistry::new();
    registry.begin("s1", "1", "h");
    assert_ok!(registry.complete("s1"));

    let flagged = assert_ok!(registry.soft_remove("s1"));
    assert!(flagged.summary.removed);
    assert!(registry.get("s1").unwrap().summary.removed);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_reports_for_one_summary() {
    let registry = Arc::new(SummaryRegistry::new());
    registry.begin("s1", "1", "h");

    let mut handles = Vec::new();
    for i in 0..32 {
        let registry = registry.clone();
        handles.push(tokio::spawn(async move {
            let result = TargetResult::ok(Default::default())
                .with_component(format!("c{:02}", i), ComponentResult::success("done"));
            registry.apply_target_result("s1", "t1", result)
        }));
    }
    for handle in handles {
        assert_ok!(handle.await.unwrap());
    }

    let summary = registry.get("s1").unwrap().summary;
    assert_eq!(summary.target_results["t1"].component_results.len(), 32);
}
