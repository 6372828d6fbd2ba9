//! Reconciliation tests: the application truth table and service scenarios.

use crate::common::{deployed, key, postgres};
use mta_deployer::diff::{
    compute_application_actions, compute_service_actions, needs_restaging, ServiceAction,
    ServiceActionCalculator,
};
use mta_deployer::models::{
    ApplicationStartupState as State, ApplicationStateAction as Action, Build, BuildState,
    ServiceDeploymentUnit, ServiceKind, ServiceOperation, ServiceOperationState,
    ServiceOperationType,
};
use mta_deployer::DeployError;
use chrono::{Duration, Utc};
use serde_json::json;
use std::collections::BTreeSet;
use uuid::Uuid;

fn actions(list: &[Action]) -> BTreeSet<Action> {
    list.iter().copied().collect()
}

#[test]
fn test_application_truth_table() {
    use Action::{Execute, Stage, Start, Stop};
    let table: &[(State, State, bool, &[Action])] = &[
        (State::Stopped, State::Stopped, false, &[]),
        (State::Stopped, State::Stopped, true, &[Stage]),
        (State::Stopped, State::Started, false, &[Stage, Start]),
        (State::Stopped, State::Started, true, &[Stage, Start]),
        (State::Started, State::Stopped, false, &[Stop]),
        (State::Started, State::Stopped, true, &[Stop, Stage]),
        (State::Started, State::Started, false, &[]),
        (State::Started, State::Started, true, &[Stop, Stage, Start]),
        (State::Inconsistent, State::Stopped, false, &[Stop]),
        (State::Inconsistent, State::Stopped, true, &[Stop, Stage]),
        (State::Inconsistent, State::Started, false, &[Stop, Stage, Start]),
        (State::Inconsistent, State::Started, true, &[Stop, Stage, Start]),
        (State::Stopped, State::Executed, false, &[Stage, Start, Execute]),
        (State::Stopped, State::Executed, true, &[Stage, Start, Execute]),
        (State::Started, State::Executed, false, &[Stop, Execute]),
        (State::Started, State::Executed, true, &[Stop, Stage, Start, Execute]),
        (State::Inconsistent, State::Executed, false, &[Stop, Stage, Start, Execute]),
        (State::Inconsistent, State::Executed, true, &[Stop, Stage, Start, Execute]),
    ];

    for (current, desired, changed, expected) in table {
        assert_eq!(
            compute_application_actions(*current, *desired, *changed, false),
            actions(expected),
            "current={current} desired={desired} changed={changed}"
        );
    }
}

#[test]
fn test_actions_iterate_in_execution_order() {
    let ordered: Vec<Action> =
        compute_application_actions(State::Inconsistent, State::Executed, true, false)
            .into_iter()
            .collect();
    assert_eq!(ordered, vec![Action::Stop, Action::Stage, Action::Start, Action::Execute]);
}

#[test]
fn test_failed_latest_build_requires_restaging() {
    let build = |state, age_minutes| Build {
        guid: Uuid::new_v4(),
        state,
        package_guid: None,
        error: None,
        created_at: Utc::now() - Duration::minutes(age_minutes),
    };
    assert!(needs_restaging(&[build(BuildState::Staged, 10), build(BuildState::Failed, 1)]));
    assert!(!needs_restaging(&[build(BuildState::Failed, 10), build(BuildState::Staged, 1)]));
    assert!(needs_restaging(&[]));
}

#[test]
fn test_staging_required_truth_table() {
    use Action::{Execute, Stage, Start, Stop};
    let table: &[(State, State, &[Action])] = &[
        (State::Stopped, State::Stopped, &[Stop, Stage]),
        (State::Stopped, State::Started, &[Stage, Start]),
        (State::Stopped, State::Executed, &[Stage, Start, Execute]),
        (State::Started, State::Stopped, &[Stop, Stage]),
        (State::Started, State::Started, &[Stop, Stage, Start]),
        (State::Started, State::Executed, &[Stop, Stage, Execute]),
        (State::Inconsistent, State::Stopped, &[Stop, Stage]),
        (State::Inconsistent, State::Started, &[Stop, Stage, Start]),
        (State::Inconsistent, State::Executed, &[Stop, Stage, Start, Execute]),
    ];

    for (current, desired, expected) in table {
        assert_eq!(
            compute_application_actions(*current, *desired, false, true),
            actions(expected),
            "current={current} desired={desired}"
        );
    }
}

#[test]
fn test_unbuilt_started_application_is_restaged() {
    assert!(needs_restaging(&[]));
    assert_eq!(
        compute_application_actions(State::Started, State::Started, false, needs_restaging(&[])),
        actions(&[Action::Stop, Action::Stage, Action::Start])
    );
}

#[test]
fn test_plan_change_only_updates_plan() {
    let existing = deployed(&postgres("db", "p1"));
    let desired = postgres("db", "p2");
    let actions = compute_service_actions(&desired, Some(&existing), false).unwrap();
    assert_eq!(actions.iter().collect::<Vec<_>>(), vec![ServiceAction::UpdatePlan]);
}

#[test]
fn test_tag_order_is_irrelevant() {
    let existing = deployed(&postgres("db", "small").with_tags(["a", "b"]));
    let desired = postgres("db", "small").with_tags(["b", "a"]);
    assert!(compute_service_actions(&desired, Some(&existing), false)
        .unwrap()
        .is_empty());
}

#[test]
fn test_platform_default_tags_are_ignored_unless_desired() {
    let calculator = ServiceActionCalculator::new(vec!["platform-managed".to_string()]);
    let existing = deployed(&postgres("db", "small").with_tags(["a", "platform-managed"]));

    let untouched = calculator
        .compute(&postgres("db", "small").with_tags(["a"]), Some(&existing), false)
        .unwrap();
    assert!(untouched.actions.is_empty());

    let removed = calculator
        .compute(&postgres("db", "small").with_tags(["b"]), Some(&existing), false)
        .unwrap();
    assert!(removed.actions.contains(ServiceAction::UpdateTags));
}

#[test]
fn test_parameters_compare_structurally() {
    let existing = deployed(&postgres("db", "small").with_credentials(json!({"a": 1, "b": {"c": [1, 2]}})));
    let same = postgres("db", "small").with_credentials(json!({"b": {"c": [1, 2]}, "a": 1}));
    assert!(compute_service_actions(&same, Some(&existing), false).unwrap().is_empty());

    let changed = postgres("db", "small").with_credentials(json!({"a": 2, "b": {"c": [1, 2]}}));
    assert!(compute_service_actions(&changed, Some(&existing), false)
        .unwrap()
        .contains(ServiceAction::UpdateCredentials));
}

#[test]
fn test_unretrievable_parameters_are_skipped_with_warning() {
    let mut existing = deployed(&postgres("db", "small"));
    existing.credentials = None;
    let desired = postgres("db", "small").with_credentials(json!({"size": 10}));

    let diff = ServiceActionCalculator::default()
        .compute(&desired, Some(&existing), false)
        .unwrap();
    assert!(diff.actions.is_empty());
    assert_eq!(diff.warnings.len(), 1);
}

#[test]
fn test_changed_key_parameters_update_keys() {
    let existing = deployed(&postgres("db", "small").with_key(key("k1", json!({"role": "read"}))));
    let desired = postgres("db", "small").with_key(key("k1", json!({"role": "write"})));

    let diff = ServiceActionCalculator::default()
        .compute(&desired, Some(&existing), false)
        .unwrap();
    assert!(diff.actions.contains(ServiceAction::UpdateKeys));
    assert_eq!(diff.key_changes.to_update.len(), 1);
    assert!(diff.key_changes.to_create.is_empty());
    assert!(diff.key_changes.to_delete.is_empty());
}

#[test]
fn test_type_change_requires_delete_flag() {
    let existing = deployed(&postgres("db", "small"));
    let desired = ServiceDeploymentUnit::user_provided("db", json!({"uri": "postgres://db"}));

    let err = compute_service_actions(&desired, Some(&existing), false).unwrap_err();
    assert!(matches!(err, DeployError::Configuration { .. }));
    let message = err.to_string();
    assert!(message.contains("postgresql/small"), "{message}");
    assert!(message.contains("user-provided"), "{message}");

    let actions = compute_service_actions(&desired, Some(&existing), true).unwrap();
    assert_eq!(actions.iter().collect::<Vec<_>>(), vec![ServiceAction::Recreate]);
}

#[test]
fn test_label_change_recreates() {
    let existing = deployed(&postgres("db", "small"));
    let desired = ServiceDeploymentUnit::managed("db", "mysql", "small");
    let actions = compute_service_actions(&desired, Some(&existing), true).unwrap();
    assert!(actions.contains(ServiceAction::Recreate));
    assert!(!actions.contains(ServiceAction::UpdatePlan));
}

#[test]
fn test_failed_creation_is_attempted_again() {
    let mut existing = deployed(&postgres("db", "small"));
    existing.last_operation = Some(ServiceOperation::new(
        ServiceOperationType::Create,
        ServiceOperationState::Failed,
    ));
    let actions = compute_service_actions(&postgres("db", "large"), Some(&existing), false).unwrap();
    assert_eq!(actions.iter().collect::<Vec<_>>(), vec![ServiceAction::Create]);
}

#[test]
fn test_failed_deletion_recreates_only_with_flag() {
    let mut existing = deployed(&postgres("db", "small"));
    existing.last_operation = Some(ServiceOperation::new(
        ServiceOperationType::Delete,
        ServiceOperationState::Failed,
    ));

    let recreated = compute_service_actions(&postgres("db", "small"), Some(&existing), true).unwrap();
    assert!(recreated.contains(ServiceAction::Recreate));

    let diff = ServiceActionCalculator::default()
        .compute(&postgres("db", "small"), Some(&existing), false)
        .unwrap();
    assert!(diff.actions.is_empty());
    assert!(diff.warnings[0].contains("may not be operational"));
}

#[test]
fn test_user_provided_services_compare_syslog_url_not_keys() {
    let desired = ServiceDeploymentUnit::user_provided("logs", json!({"token": "t"}))
        .with_syslog_drain_url("syslog://new");
    let mut existing = deployed(&desired);
    existing.syslog_drain_url = Some("syslog://old".to_string());
    existing.keys.push(key("stale", json!({})));
    assert_eq!(existing.kind, ServiceKind::UserProvided);

    let actions = compute_service_actions(&desired, Some(&existing), false).unwrap();
    assert_eq!(actions.iter().collect::<Vec<_>>(), vec![ServiceAction::UpdateSyslogUrl]);
}
