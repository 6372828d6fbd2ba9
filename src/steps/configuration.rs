//! Configuration entry publishing and subscriber propagation.

use crate::error::DeployResult;
use crate::logging::log_step_operation;
use crate::state_machine::{Step, StepContext, StepPhase};
use crate::subscriptions::{
    compute_entry_changes, query_existing_entries, CurrentTarget, SubscriberUpdater,
};
use async_trait::async_trait;
use std::sync::Arc;

fn current_target(ctx: &StepContext) -> DeployResult<CurrentTarget> {
    Ok(CurrentTarget::new(
        ctx.state.require_target()?.clone(),
        ctx.state.space_guid.clone(),
    ))
}

/// Creates or updates the entries the MTA provides to other MTAs
pub struct PublishConfigurationEntriesStep;

#[async_trait]
impl Step for PublishConfigurationEntriesStep {
    fn name(&self) -> &'static str {
        "publish-configuration-entries"
    }

    async fn execute(&self, ctx: &mut StepContext) -> DeployResult<StepPhase> {
        let current = current_target(ctx)?;
        let existing = query_existing_entries(
            ctx.configuration_store.as_ref(),
            &ctx.state.mta_id,
            &current,
            ctx.config.subscriptions.support_legacy_targets,
        )
        .await?;
        let changes = compute_entry_changes(&ctx.state.entries_to_publish, &existing, &current);

        let mut published = Vec::with_capacity(changes.to_create.len() + changes.to_update.len());
        for entry in changes.to_create {
            published.push(ctx.configuration_store.add_entry(entry).await?);
        }
        for entry in changes.to_update {
            ctx.configuration_store.update_entry(&entry).await?;
            published.push(entry);
        }

        log_step_operation(
            "publish",
            Some(&ctx.process_id),
            self.name(),
            "published",
            Some(&format!("{} entries", published.len())),
        );
        ctx.state.published_entries = published;
        Ok(StepPhase::Done)
    }

    fn error_message(&self, _ctx: &StepContext) -> String {
        "Error publishing configuration entries".to_string()
    }
}

/// Removes entries the MTA no longer provides, including copies stored under
/// the legacy target encoding
pub struct DeleteDiscontinuedConfigurationEntriesStep;

#[async_trait]
impl Step for DeleteDiscontinuedConfigurationEntriesStep {
    fn name(&self) -> &'static str {
        "delete-discontinued-configuration-entries"
    }

    async fn execute(&self, ctx: &mut StepContext) -> DeployResult<StepPhase> {
        let current = current_target(ctx)?;
        let existing = query_existing_entries(
            ctx.configuration_store.as_ref(),
            &ctx.state.mta_id,
            &current,
            ctx.config.subscriptions.support_legacy_targets,
        )
        .await?;
        let changes = compute_entry_changes(&ctx.state.entries_to_publish, &existing, &current);

        let mut deleted = Vec::with_capacity(changes.to_delete.len());
        for entry in changes.to_delete {
            if let Some(id) = entry.id {
                ctx.configuration_store.remove_entry(id).await?;
                deleted.push(entry);
            }
        }
        ctx.state.deleted_entries = deleted;
        Ok(StepPhase::Done)
    }

    fn error_message(&self, _ctx: &StepContext) -> String {
        "Error deleting discontinued configuration entries".to_string()
    }
}

/// Recomputes the environment of applications subscribed to changed entries
pub struct UpdateSubscribersStep;

#[async_trait]
impl Step for UpdateSubscribersStep {
    fn name(&self) -> &'static str {
        "update-subscribers"
    }

    async fn execute(&self, ctx: &mut StepContext) -> DeployResult<StepPhase> {
        let updater = SubscriberUpdater::new(
            Arc::clone(&ctx.clients),
            Arc::clone(&ctx.configuration_store),
            ctx.state.user.clone(),
        );
        let update = updater
            .update_subscribers(&ctx.state.published_entries, &ctx.state.deleted_entries)
            .await?;
        ctx.state.extend_warnings(update.warnings);
        ctx.state.updated_subscribers = update.updated;
        Ok(StepPhase::Done)
    }

    fn error_message(&self, _ctx: &StepContext) -> String {
        "Error updating subscribers".to_string()
    }
}

/// Restarts subscribers whose environment changed
pub struct RestartSubscribersStep;

#[async_trait]
impl Step for RestartSubscribersStep {
    fn name(&self) -> &'static str {
        "restart-subscribers"
    }

    async fn execute(&self, ctx: &mut StepContext) -> DeployResult<StepPhase> {
        if ctx.state.updated_subscribers.is_empty() {
            return Ok(StepPhase::Done);
        }
        let updater = SubscriberUpdater::new(
            Arc::clone(&ctx.clients),
            Arc::clone(&ctx.configuration_store),
            ctx.state.user.clone(),
        );
        let warnings = updater
            .restart_subscribers(&ctx.state.updated_subscribers)
            .await;
        ctx.state.extend_warnings(warnings);
        Ok(StepPhase::Done)
    }

    fn error_message(&self, _ctx: &StepContext) -> String {
        "Error restarting subscribers".to_string()
    }
}
