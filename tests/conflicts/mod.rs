//! Ownership checks run through the creation conflict step.

use crate::common::postgres;
use mta_deployer::config::DeployerConfig;
use mta_deployer::models::{AppState, ModuleDeploymentUnit, MtaMetadata, ServiceBinding};
use mta_deployer::state_machine::{StepPhase, StepPhaseController};
use mta_deployer::steps::CheckForCreationConflictsStep;
use mta_deployer::test_helpers::{existing_app, managed_instance, process_state, FakePlatform, TestEnvironment};

const M1: &str = "com.example.m1";
const M2: &str = "com.example.m2";

fn shared_db_owned_by_m1() -> FakePlatform {
    let mut db = managed_instance("shared-db", "postgresql", "small", None);
    db.bindings.push(ServiceBinding::new("m1-app", "shared-db"));
    let mut owner_app = existing_app("m1-app", AppState::Started, 1, 1);
    owner_app.mta_metadata = Some(MtaMetadata::new(M1));
    owner_app.mta_services = vec!["shared-db".to_string()];
    FakePlatform::new().with_service(db).with_application(owner_app)
}

#[tokio::test]
async fn test_service_owned_through_bound_app_of_other_mta() {
    let env = TestEnvironment::with_platform(shared_db_owned_by_m1());
    let mut state = process_state(M2);
    state.services_to_deploy = vec![postgres("shared-db", "small")];
    let mut ctx = env.context(state);

    let phase = StepPhaseController::execute_step(&CheckForCreationConflictsStep, &mut ctx).await;
    assert_eq!(phase, StepPhase::Error);
    let message = ctx.state.error_message.unwrap();
    assert!(message.contains(&format!("\"{M1}\"")));
    assert!(message.contains(&format!("\"{M2}\"")));
}

#[tokio::test]
async fn test_unclaimed_reuse_depends_on_configuration() {
    let mut state = process_state(M2);
    state.services_to_deploy = vec![postgres("shared-db", "small").without_ownership_claim()];

    let env = TestEnvironment::with_platform(shared_db_owned_by_m1());
    let mut ctx = env.context(state.clone());
    let phase = StepPhaseController::execute_step(&CheckForCreationConflictsStep, &mut ctx).await;
    assert_eq!(phase, StepPhase::Done);
    assert_eq!(ctx.state.warnings.len(), 1);

    let mut strict = DeployerConfig::default();
    strict.conflicts.allow_unclaimed_foreign_resources = false;
    let env = TestEnvironment::with_platform(shared_db_owned_by_m1()).with_config(strict);
    let mut ctx = env.context(state);
    let phase = StepPhaseController::execute_step(&CheckForCreationConflictsStep, &mut ctx).await;
    assert_eq!(phase, StepPhase::Error);
}

#[tokio::test]
async fn test_redeploying_own_resources_and_adopting_standalone_ones() {
    let mut own_app = existing_app("web", AppState::Started, 1, 1);
    own_app.mta_metadata = Some(MtaMetadata::new(M1));
    let platform = FakePlatform::new()
        .with_service(managed_instance("db", "postgresql", "small", Some(M1)))
        .with_service(managed_instance("cache", "redis", "small", None))
        .with_application(own_app)
        .with_application(existing_app("legacy-worker", AppState::Stopped, 1, 0));
    let env = TestEnvironment::with_platform(platform);

    let mut state = process_state(M1);
    state.services_to_deploy = vec![
        postgres("db", "small"),
        mta_deployer::models::ServiceDeploymentUnit::managed("cache", "redis", "small"),
        postgres("fresh", "small"),
    ];
    state.apps_to_deploy = vec![
        ModuleDeploymentUnit::new("web"),
        ModuleDeploymentUnit::new("legacy-worker"),
    ];
    let mut ctx = env.context(state);

    let phase = StepPhaseController::execute_step(&CheckForCreationConflictsStep, &mut ctx).await;
    assert_eq!(phase, StepPhase::Done);
    assert_eq!(ctx.state.warnings.len(), 2);
    assert!(ctx.state.warnings[0].contains("\"cache\""));
    assert!(ctx.state.warnings[1].contains("\"legacy-worker\""));
    assert!(env.platform.mutations().is_empty());
}
