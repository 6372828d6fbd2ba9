//! Poller tests: each classifier driven through a step context backed by
//! the fake platform.

use crate::common::postgres;
use chrono::{Duration, Utc};
use mta_deployer::models::{
    AppState, ApplicationStartupState, ApplicationStateAction, BuildState, InstanceInfo, InstanceState,
    MessageType, ModuleDeploymentUnit, ServiceOperationState, ServiceOperationType, UploadState,
    UploadStatus,
};
use mta_deployer::platform::{PlatformClient, PlatformError};
use mta_deployer::poller::{
    classify_start, AsyncExecution, PollExecuteStatus, PollServiceOperations, PollStagingStatus,
    PollStartStatus, PollUploadStatus,
};
use mta_deployer::state_machine::{AsyncExecutionState, DeploymentProcessState};
use mta_deployer::test_helpers::{app_log, existing_app, process_state, FakePlatform, TestEnvironment};
use mta_deployer::DeployError;
use uuid::Uuid;

fn state_for(app: ModuleDeploymentUnit) -> DeploymentProcessState {
    let mut state = process_state("com.example.shop");
    state.app_to_process = Some(app);
    state
}

fn instances(states: &[InstanceState]) -> Vec<InstanceInfo> {
    states
        .iter()
        .enumerate()
        .map(|(index, state)| InstanceInfo::new(index as u32, *state))
        .collect()
}

#[test]
fn test_start_classification_scenarios() {
    use InstanceState::{Crashed, Flapping, Running, Starting};
    assert_eq!(classify_start(&instances(&[Running, Running]), 2, true), AsyncExecutionState::Finished);
    assert_eq!(classify_start(&instances(&[Crashed, Crashed, Crashed]), 3, true), AsyncExecutionState::Error);
    assert_eq!(classify_start(&instances(&[Crashed]), 1, false), AsyncExecutionState::Running);
    assert_eq!(classify_start(&instances(&[Flapping, Running]), 2, true), AsyncExecutionState::Error);
    assert_eq!(classify_start(&instances(&[Starting, Running]), 2, true), AsyncExecutionState::Running);
    assert_eq!(classify_start(&instances(&[]), 0, true), AsyncExecutionState::Finished);
}

#[tokio::test]
async fn test_upload_ready_records_package() {
    let env = TestEnvironment::new();
    let package = Uuid::new_v4();
    env.platform.set_upload(
        "token-1",
        UploadStatus {
            state: UploadState::ProcessingUpload,
            package_guid: None,
            error: None,
        },
    );
    let mut state = state_for(ModuleDeploymentUnit::new("orders"));
    state.upload_token = Some("token-1".to_string());
    let mut ctx = env.context(state);

    let outcome = PollUploadStatus.poll(&mut ctx).await.unwrap();
    assert_eq!(outcome.state, AsyncExecutionState::Running);
    assert!(!ctx.state.app_content_changed);

    env.platform.set_upload(
        "token-1",
        UploadStatus {
            state: UploadState::Ready,
            package_guid: Some(package),
            error: None,
        },
    );
    let outcome = PollUploadStatus.poll(&mut ctx).await.unwrap();
    assert_eq!(outcome.state, AsyncExecutionState::Finished);
    assert_eq!(ctx.state.package_guid, Some(package));
    assert!(ctx.state.app_content_changed);
}

#[tokio::test]
async fn test_upload_expired_is_error_and_transport_failure_propagates() {
    let env = TestEnvironment::new();
    env.platform.set_upload(
        "token-1",
        UploadStatus {
            state: UploadState::Expired,
            package_guid: None,
            error: None,
        },
    );
    let mut state = state_for(ModuleDeploymentUnit::new("orders"));
    state.upload_token = Some("token-1".to_string());
    let mut ctx = env.context(state);

    let outcome = PollUploadStatus.poll(&mut ctx).await.unwrap();
    assert_eq!(outcome.state, AsyncExecutionState::Error);

    env.platform
        .fail_on("get_upload_status", "orders", PlatformError::bad_gateway("connection reset"));
    let err = PollUploadStatus.poll(&mut ctx).await.unwrap_err();
    assert!(matches!(err, DeployError::Platform { .. }));
    assert!(err.to_string().contains("\"orders\""));
}

#[tokio::test]
async fn test_staging_follows_build_state() {
    let env = TestEnvironment::new();
    env.platform.set_new_build_state(BuildState::Pending);
    let build = env.platform.create_build("orders", Uuid::new_v4()).await.unwrap();
    let mut state = state_for(ModuleDeploymentUnit::new("orders"));
    state.build_guid = Some(build.guid);
    let mut ctx = env.context(state);

    assert_eq!(PollStagingStatus.poll(&mut ctx).await.unwrap().state, AsyncExecutionState::Running);

    env.platform.set_build_state(build.guid, BuildState::Failed, Some("buildpack compile failed"));
    let outcome = PollStagingStatus.poll(&mut ctx).await.unwrap();
    assert_eq!(outcome.state, AsyncExecutionState::Error);
    assert!(outcome.message.unwrap().contains("buildpack compile failed"));

    env.platform.set_build_state(build.guid, BuildState::Staged, None);
    assert_eq!(PollStagingStatus.poll(&mut ctx).await.unwrap().state, AsyncExecutionState::Finished);
}

#[tokio::test]
async fn test_start_poller_uses_fail_on_crashed_flag() {
    let env = TestEnvironment::new();
    env.platform.set_instances("orders", &[InstanceState::Crashed]);
    let mut state = state_for(ModuleDeploymentUnit::new("orders"));
    state.app_state_actions.insert(ApplicationStateAction::Start);

    state.flags.fail_on_crashed = true;
    let mut ctx = env.context(state.clone());
    let outcome = PollStartStatus.poll(&mut ctx).await.unwrap();
    assert_eq!(outcome.state, AsyncExecutionState::Error);
    assert!(outcome.message.unwrap().contains("crashed"));

    state.flags.fail_on_crashed = false;
    let mut ctx = env.context(state);
    assert_eq!(PollStartStatus.poll(&mut ctx).await.unwrap().state, AsyncExecutionState::Running);
}

fn executing_state(app: ModuleDeploymentUnit) -> DeploymentProcessState {
    let mut state = state_for(app.with_desired_state(ApplicationStartupState::Executed));
    state.app_state_actions.insert(ApplicationStateAction::Execute);
    state.start_time = Some(Utc::now() - Duration::seconds(30));
    state
}

#[tokio::test]
async fn test_execute_ignores_foreign_sources_and_finishes_on_marker() {
    let env = TestEnvironment::new();
    let start = Utc::now() - Duration::seconds(30);
    env.logs.push("job", app_log("STG/0", "STDOUT:SUCCESS", MessageType::Stdout, start + Duration::seconds(1)));
    env.logs.push("job", app_log("RTR/1", "SUCCESS", MessageType::Stdout, start + Duration::seconds(2)));
    let mut state = executing_state(ModuleDeploymentUnit::new("job"));
    state.start_time = Some(start);
    let mut ctx = env.context(state);

    let outcome = PollExecuteStatus.poll(&mut ctx).await.unwrap();
    assert_eq!(outcome.state, AsyncExecutionState::Running);
    assert_eq!(ctx.state.logs_offset, Some(start + Duration::seconds(2)));

    env.logs.push("job", app_log("APP/PROC/WEB/0", "migration SUCCESS", MessageType::Stdout, start + Duration::seconds(3)));
    let outcome = PollExecuteStatus.poll(&mut ctx).await.unwrap();
    assert_eq!(outcome.state, AsyncExecutionState::Finished);
    assert!(env.platform.calls_to("stop_application").is_empty());
}

#[tokio::test]
async fn test_execute_failure_marker_stops_app_when_requested() {
    let env = TestEnvironment::with_platform(
        FakePlatform::new().with_application(existing_app("job", AppState::Started, 1, 1)),
    );
    let mut app = ModuleDeploymentUnit::new("job");
    app.stop_after_execution = true;
    let state = executing_state(app);
    env.logs.push("job", app_log("APP/PROC/WEB/0", "FAILURE: schema locked", MessageType::Stderr, Utc::now()));
    let mut ctx = env.context(state);

    let outcome = PollExecuteStatus.poll(&mut ctx).await.unwrap();
    assert_eq!(outcome.state, AsyncExecutionState::Error);
    assert!(outcome.message.unwrap().contains("schema locked"));
    assert_eq!(env.platform.calls_to("stop_application"), vec!["job".to_string()]);
}

#[tokio::test]
async fn test_execute_uses_custom_markers() {
    let env = TestEnvironment::new();
    let state = executing_state(ModuleDeploymentUnit::new("job").with_markers("DONE", "BROKEN"));
    env.logs.push("job", app_log("APP/TASK/0", "STDOUT:SUCCESS", MessageType::Stdout, Utc::now()));
    let mut ctx = env.context(state);
    assert_eq!(PollExecuteStatus.poll(&mut ctx).await.unwrap().state, AsyncExecutionState::Running);

    env.logs.push("job", app_log("APP/TASK/0", "all DONE", MessageType::Stderr, Utc::now() + Duration::seconds(1)));
    assert_eq!(PollExecuteStatus.poll(&mut ctx).await.unwrap().state, AsyncExecutionState::Finished);
}

#[tokio::test]
async fn test_service_operations_narrow_until_done() {
    let platform = FakePlatform::new();
    platform.set_service_operation_state(ServiceOperationState::InProgress);
    for name in ["a", "b"] {
        platform.create_service(&postgres(name, "small")).await.unwrap();
    }
    let env = TestEnvironment::with_platform(platform);
    let mut state = process_state("com.example.shop");
    for name in ["a", "b"] {
        state.services_to_poll.insert(name.to_string());
        state
            .triggered_service_operations
            .insert(name.to_string(), ServiceOperationType::Create);
    }
    let mut ctx = env.context(state);

    assert_eq!(PollServiceOperations.poll(&mut ctx).await.unwrap().state, AsyncExecutionState::Running);

    env.platform.complete_service_operation("a", ServiceOperationState::Succeeded, None);
    assert_eq!(PollServiceOperations.poll(&mut ctx).await.unwrap().state, AsyncExecutionState::Running);
    assert_eq!(ctx.state.services_to_poll.iter().collect::<Vec<_>>(), vec!["b"]);

    env.platform.complete_service_operation("b", ServiceOperationState::Failed, Some("quota exceeded"));
    let outcome = PollServiceOperations.poll(&mut ctx).await.unwrap();
    assert_eq!(outcome.state, AsyncExecutionState::Error);
    assert!(outcome.message.unwrap().contains("quota exceeded"));
}

#[tokio::test]
async fn test_deleted_service_counts_as_done_and_transport_errors_fail() {
    let env = TestEnvironment::new();
    let mut state = process_state("com.example.shop");
    state.services_to_poll.insert("gone".to_string());
    state
        .triggered_service_operations
        .insert("gone".to_string(), ServiceOperationType::Delete);
    let mut ctx = env.context(state.clone());
    assert_eq!(PollServiceOperations.poll(&mut ctx).await.unwrap().state, AsyncExecutionState::Finished);

    env.platform
        .fail_on("get_service_instance", "gone", PlatformError::bad_gateway("timeout"));
    let mut ctx = env.context(state);
    assert!(PollServiceOperations.poll(&mut ctx).await.is_err());
}

#[tokio::test]
async fn test_optional_service_failure_is_a_warning() {
    let platform = FakePlatform::new();
    platform.set_service_operation_state(ServiceOperationState::Failed);
    platform.create_service(&postgres("cache", "small")).await.unwrap();
    let env = TestEnvironment::with_platform(platform);
    let mut state = process_state("com.example.shop");
    state.service_to_process = Some(postgres("cache", "small").optional());
    state.services_to_poll.insert("cache".to_string());
    state
        .triggered_service_operations
        .insert("cache".to_string(), ServiceOperationType::Create);
    let mut ctx = env.context(state);

    let outcome = PollServiceOperations.poll(&mut ctx).await.unwrap();
    assert_eq!(outcome.state, AsyncExecutionState::Finished);
    assert_eq!(ctx.state.warnings.len(), 1);
}
