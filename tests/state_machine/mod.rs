//! Step phase controller tests: execute, poll resumption through the state
//! store and error recording.

use async_trait::async_trait;
use mta_deployer::poller::{AsyncExecution, AsyncOutcome};
use mta_deployer::state_machine::{
    DeploymentProcessState, InMemoryProcessStateStore, ProcessStateStore, Step, StepContext,
    StepPhase, StepPhaseController,
};
use mta_deployer::test_helpers::{process_state, TestEnvironment};
use mta_deployer::{DeployError, DeployResult};
use serde_json::json;
use std::sync::Arc;

/// Finishes after `polls_needed` polls, counting polls in the state extensions
struct CountingExecution {
    key: &'static str,
    polls_needed: u64,
}

impl CountingExecution {
    fn polls(state: &DeploymentProcessState, key: &str) -> u64 {
        state.extensions.get(key).and_then(|v| v.as_u64()).unwrap_or(0)
    }
}

#[async_trait]
impl AsyncExecution for CountingExecution {
    fn name(&self) -> &'static str {
        self.key
    }

    async fn poll(&self, ctx: &mut StepContext) -> DeployResult<AsyncOutcome> {
        let polls = Self::polls(&ctx.state, self.key) + 1;
        ctx.state.extensions.insert(self.key.to_string(), json!(polls));
        if polls >= self.polls_needed {
            Ok(AsyncOutcome::finished())
        } else {
            Ok(AsyncOutcome::running())
        }
    }

    fn polling_error_message(&self, _ctx: &StepContext) -> String {
        format!("Error in {}", self.key)
    }
}

struct FailingExecution;

#[async_trait]
impl AsyncExecution for FailingExecution {
    fn name(&self) -> &'static str {
        "failing"
    }

    async fn poll(&self, _ctx: &mut StepContext) -> DeployResult<AsyncOutcome> {
        Ok(AsyncOutcome {
            state: mta_deployer::AsyncExecutionState::Error,
            message: None,
        })
    }

    fn polling_error_message(&self, _ctx: &StepContext) -> String {
        "Remote job failed".to_string()
    }
}

/// Starts asynchronous work unless `fail` is set
struct ScriptedStep {
    fail: bool,
    broken_poll: bool,
}

#[async_trait]
impl Step for ScriptedStep {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn execute(&self, ctx: &mut StepContext) -> DeployResult<StepPhase> {
        let runs = ctx.state.extensions.get("runs").and_then(|v| v.as_u64()).unwrap_or(0);
        ctx.state.extensions.insert("runs".to_string(), json!(runs + 1));
        if self.fail {
            return Err(DeployError::conflict("service \"db\" belongs to another MTA"));
        }
        Ok(StepPhase::Poll)
    }

    fn async_executions(&self) -> Vec<Box<dyn AsyncExecution>> {
        if self.broken_poll {
            return vec![Box::new(FailingExecution)];
        }
        vec![
            Box::new(CountingExecution {
                key: "first",
                polls_needed: 2,
            }),
            Box::new(CountingExecution {
                key: "second",
                polls_needed: 1,
            }),
        ]
    }

    fn error_message(&self, _ctx: &StepContext) -> String {
        "Error running scripted step".to_string()
    }
}

async fn controller_with_state() -> (StepPhaseController, Arc<InMemoryProcessStateStore>) {
    let env = TestEnvironment::new();
    let store = Arc::new(InMemoryProcessStateStore::new());
    store
        .save_state("process-1", &process_state("com.example.shop"))
        .await
        .unwrap();
    (StepPhaseController::new(store.clone(), env.collaborators()), store)
}

#[tokio::test]
async fn test_poll_resumes_from_persisted_state() {
    let (controller, store) = controller_with_state().await;
    let step = ScriptedStep {
        fail: false,
        broken_poll: false,
    };

    let phases = [
        controller.run("process-1", &step).await.unwrap(),
        controller.run("process-1", &step).await.unwrap(),
        controller.run("process-1", &step).await.unwrap(),
        controller.run("process-1", &step).await.unwrap(),
    ];
    assert_eq!(
        phases,
        [StepPhase::Poll, StepPhase::Poll, StepPhase::Poll, StepPhase::Done]
    );

    let state = store.load_state("process-1").await.unwrap().unwrap();
    assert_eq!(state.extensions["runs"], json!(1));
    assert_eq!(state.extensions["first"], json!(2));
    assert_eq!(state.extensions["second"], json!(1));
    assert_eq!(state.async_execution_index, 0);
    assert_eq!(state.step_phase, StepPhase::Done);
    assert_eq!(state.current_step.as_deref(), Some("scripted"));
}

#[tokio::test]
async fn test_step_failure_is_recorded_in_state() {
    let (controller, store) = controller_with_state().await;
    let step = ScriptedStep {
        fail: true,
        broken_poll: false,
    };

    let phase = controller.run("process-1", &step).await.unwrap();
    assert_eq!(phase, StepPhase::Error);

    let state = store.load_state("process-1").await.unwrap().unwrap();
    let message = state.error_message.unwrap();
    assert!(message.starts_with("Error running scripted step: "));
    assert!(message.contains("belongs to another MTA"));
}

#[tokio::test]
async fn test_poll_error_uses_execution_message() {
    let (controller, store) = controller_with_state().await;
    let step = ScriptedStep {
        fail: false,
        broken_poll: true,
    };

    assert_eq!(controller.run("process-1", &step).await.unwrap(), StepPhase::Poll);
    assert_eq!(controller.run("process-1", &step).await.unwrap(), StepPhase::Error);

    let state = store.load_state("process-1").await.unwrap().unwrap();
    assert!(state.error_message.unwrap().contains("Remote job failed"));
}

#[tokio::test]
async fn test_rerun_after_error_executes_again() {
    let (controller, store) = controller_with_state().await;
    let failing = ScriptedStep {
        fail: true,
        broken_poll: false,
    };
    controller.run("process-1", &failing).await.unwrap();

    let retry = ScriptedStep {
        fail: false,
        broken_poll: false,
    };
    assert_eq!(controller.run("process-1", &retry).await.unwrap(), StepPhase::Poll);

    let state = store.load_state("process-1").await.unwrap().unwrap();
    assert_eq!(state.extensions["runs"], json!(2));
    assert!(state.error_message.is_none());
}

#[tokio::test]
async fn test_missing_state_is_a_store_error() {
    let env = TestEnvironment::new();
    let controller = StepPhaseController::new(Arc::new(InMemoryProcessStateStore::new()), env.collaborators());
    let step = ScriptedStep {
        fail: false,
        broken_poll: false,
    };

    let err = controller.run("unknown", &step).await.unwrap_err();
    assert!(matches!(err, DeployError::StateStore { .. }));
}
