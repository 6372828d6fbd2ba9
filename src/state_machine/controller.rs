//! # Step Phase Controller
//!
//! Runs one step invocation: execute or poll, map the outcome to a
//! [`StepPhase`] and persist it together with the rest of the process state.

use super::persistence::ProcessStateStore;
use super::states::{AsyncExecutionState, StepPhase};
use super::step::{Collaborators, Step, StepContext};
use crate::error::{DeployError, DeployResult};
use crate::logging::{log_error, log_step_operation};
use std::sync::Arc;
use tracing::{debug, instrument};

pub struct StepPhaseController {
    store: Arc<dyn ProcessStateStore>,
    collaborators: Collaborators,
}

impl StepPhaseController {
    pub fn new(store: Arc<dyn ProcessStateStore>, collaborators: Collaborators) -> Self {
        Self {
            store,
            collaborators,
        }
    }

    /// Load the process state, run `step` once and persist the outcome.
    ///
    /// Step failures are recorded as [`StepPhase::Error`] with the message in
    /// the process state; only state store failures are returned as errors.
    #[instrument(skip(self, step), fields(step = step.name()))]
    pub async fn run(&self, process_id: &str, step: &dyn Step) -> DeployResult<StepPhase> {
        let state = self.store.load_state(process_id).await?.ok_or_else(|| {
            DeployError::state_store(format!("No state stored for process {process_id}"))
        })?;

        let mut ctx = StepContext::new(process_id, state, &self.collaborators);
        let phase = Self::execute_step(step, &mut ctx).await;
        self.store.save_state(process_id, &ctx.state).await?;
        Ok(phase)
    }

    /// Run `step` against an already loaded context without persisting
    pub async fn execute_step(step: &dyn Step, ctx: &mut StepContext) -> StepPhase {
        let resuming = ctx.state.step_phase == StepPhase::Poll
            && ctx.state.current_step.as_deref() == Some(step.name());

        let result = if resuming {
            Self::poll_executions(step, ctx).await
        } else {
            ctx.state.begin_step(step.name());
            step.execute(ctx).await
        };

        let phase = match result {
            Ok(phase) => phase,
            Err(err) => {
                let message = format!("{}: {}", step.error_message(ctx), err);
                log_error(step.name(), "execute", &message, Some(&ctx.process_id));
                ctx.state.error_message = Some(message);
                StepPhase::Error
            }
        };

        if phase != StepPhase::Poll {
            ctx.state.async_execution_index = 0;
        }
        ctx.state.step_phase = phase;

        log_step_operation(
            if resuming { "poll" } else { "execute" },
            Some(&ctx.process_id),
            step.name(),
            &phase.to_string(),
            ctx.state.error_message.as_deref(),
        );
        phase
    }

    async fn poll_executions(step: &dyn Step, ctx: &mut StepContext) -> DeployResult<StepPhase> {
        let executions = step.async_executions();
        let index = ctx.state.async_execution_index;
        let Some(execution) = executions.get(index) else {
            return Ok(StepPhase::Done);
        };

        let outcome = execution.poll(ctx).await?;
        debug!(
            execution = execution.name(),
            index,
            state = %outcome.state,
            "Polled asynchronous execution"
        );

        match outcome.state {
            AsyncExecutionState::Running => Ok(StepPhase::Poll),
            AsyncExecutionState::Finished => {
                ctx.state.async_execution_index = index + 1;
                if index + 1 < executions.len() {
                    Ok(StepPhase::Poll)
                } else {
                    Ok(StepPhase::Done)
                }
            }
            AsyncExecutionState::Error => {
                let message = outcome
                    .message
                    .unwrap_or_else(|| execution.polling_error_message(ctx));
                Err(DeployError::async_operation_failed(execution.name(), message))
            }
        }
    }
}
