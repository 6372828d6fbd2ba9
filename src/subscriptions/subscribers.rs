//! Subscriber environment updates and restarts.
//!
//! Subscribers may live in other spaces, so every space gets its own client.
//! A failure for one subscriber or one space is reported as a warning and does
//! not stop the others.

use super::store::ConfigurationStore;
use crate::error::{DeployError, DeployResult};
use crate::logging::log_application_operation;
use crate::models::{
    CloudTarget, ConfigurationEntry, ConfigurationSubscription, ConfigurationTarget, Subscriber,
};
use crate::platform::{PlatformClient, PlatformClientProvider, PlatformResult};
use futures::future::join_all;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubscriberUpdate {
    /// Subscribers whose environment changed, without duplicates
    pub updated: Vec<Subscriber>,
    pub warnings: Vec<String>,
}

impl SubscriberUpdate {
    fn merge(&mut self, other: SubscriberUpdate) {
        self.updated.extend(other.updated);
        self.warnings.extend(other.warnings);
    }
}

enum SubscriberOutcome {
    Updated,
    Unchanged,
    Missing,
}

pub struct SubscriberUpdater {
    clients: Arc<dyn PlatformClientProvider>,
    store: Arc<dyn ConfigurationStore>,
    user: String,
}

impl SubscriberUpdater {
    pub fn new(
        clients: Arc<dyn PlatformClientProvider>,
        store: Arc<dyn ConfigurationStore>,
        user: impl Into<String>,
    ) -> Self {
        Self {
            clients,
            store,
            user: user.into(),
        }
    }

    /// Recompute the environment of every subscriber of the changed entries
    pub async fn update_subscribers(
        &self,
        published: &[ConfigurationEntry],
        deleted: &[ConfigurationEntry],
    ) -> DeployResult<SubscriberUpdate> {
        let changed: Vec<ConfigurationEntry> = published.iter().chain(deleted).cloned().collect();
        if changed.is_empty() {
            return Ok(SubscriberUpdate::default());
        }

        let mut seen = BTreeSet::new();
        let mut by_target: BTreeMap<ConfigurationTarget, Vec<ConfigurationSubscription>> = BTreeMap::new();
        for subscription in self.store.find_subscriptions_matching(&changed).await? {
            if subscription.id.is_some_and(|id| !seen.insert(id)) {
                continue;
            }
            by_target
                .entry(subscription.target.clone())
                .or_default()
                .push(subscription);
        }
        debug!(spaces = by_target.len(), "Updating subscribers of changed configuration entries");

        let mut result = SubscriberUpdate::default();
        let updates = join_all(
            by_target
                .into_iter()
                .map(|(target, subscriptions)| self.update_space(target, subscriptions)),
        )
        .await;
        for update in updates {
            result.merge(update);
        }

        let mut unique = BTreeSet::new();
        result.updated.retain(|subscriber| unique.insert(subscriber.clone()));
        Ok(result)
    }

    async fn update_space(
        &self,
        target: ConfigurationTarget,
        subscriptions: Vec<ConfigurationSubscription>,
    ) -> SubscriberUpdate {
        let mut result = SubscriberUpdate::default();

        let cloud_target = match self.resolve_target(&target).await {
            Ok(cloud_target) => cloud_target,
            Err(reason) => {
                result.warnings.push(format!(
                    "Could not update subscribers in space \"{target}\": {reason}"
                ));
                return result;
            }
        };
        let client = match self.clients.client_for(&self.user, &cloud_target).await {
            Ok(client) => client,
            Err(e) => {
                result.warnings.push(format!(
                    "Could not update subscribers in space \"{cloud_target}\": {e}"
                ));
                return result;
            }
        };

        for subscription in subscriptions {
            let app = subscription.app_name.clone();
            match self.update_subscriber(client.as_ref(), &subscription).await {
                Ok(SubscriberOutcome::Updated) => {
                    log_application_operation("update_subscriber", &app, "updated", None);
                    result.updated.push(Subscriber {
                        app_name: app,
                        target: cloud_target.clone(),
                    });
                }
                Ok(SubscriberOutcome::Unchanged) => {
                    debug!(app = %app, "Subscriber environment unchanged");
                }
                Ok(SubscriberOutcome::Missing) => result.warnings.push(format!(
                    "Subscriber application \"{app}\" does not exist in \"{cloud_target}\"; skipping"
                )),
                Err(e) => result.warnings.push(format!(
                    "Could not update subscriber application \"{app}\" in \"{cloud_target}\": {e}"
                )),
            }
        }
        result
    }

    async fn resolve_target(&self, target: &ConfigurationTarget) -> Result<CloudTarget, String> {
        match target {
            ConfigurationTarget::Space(cloud_target) => Ok(cloud_target.clone()),
            ConfigurationTarget::LegacySpaceId(guid) => match self.clients.resolve_space(guid).await {
                Ok(Some(cloud_target)) => Ok(cloud_target),
                Ok(None) => Err("space does not exist".to_string()),
                Err(e) => Err(e.to_string()),
            },
        }
    }

    async fn update_subscriber(
        &self,
        client: &dyn PlatformClient,
        subscription: &ConfigurationSubscription,
    ) -> DeployResult<SubscriberOutcome> {
        let name = subscription.app_name.as_str();
        let app = client.get_application(name).await.map_err(|e| {
            DeployError::platform(format!("Error retrieving application \"{name}\""), e)
        })?;
        let Some(app) = app else {
            return Ok(SubscriberOutcome::Missing);
        };

        let matched = self.store.find_entries(&subscription.filter).await?;
        let mut env = app.env.clone();
        match render_env_value(&matched, subscription.is_list)? {
            Some(value) => env.insert(subscription.env_var_name.clone(), value),
            None => env.remove(&subscription.env_var_name),
        };
        if env == app.env {
            return Ok(SubscriberOutcome::Unchanged);
        }

        client
            .update_application_env(name, &env)
            .await
            .map_err(|e| {
                DeployError::platform(format!("Error updating environment of application \"{name}\""), e)
            })?;
        Ok(SubscriberOutcome::Updated)
    }

    /// Restart updated subscribers so they pick up their new environment
    pub async fn restart_subscribers(&self, subscribers: &[Subscriber]) -> Vec<String> {
        join_all(subscribers.iter().map(|subscriber| self.restart(subscriber)))
            .await
            .into_iter()
            .flatten()
            .collect()
    }

    async fn restart(&self, subscriber: &Subscriber) -> Option<String> {
        match self.try_restart(subscriber).await {
            Ok(()) => {
                log_application_operation("restart_subscriber", &subscriber.app_name, "restarted", None);
                None
            }
            Err(e) => Some(format!(
                "Could not restart subscriber application \"{}\" in \"{}\": {e}",
                subscriber.app_name, subscriber.target
            )),
        }
    }

    async fn try_restart(&self, subscriber: &Subscriber) -> PlatformResult<()> {
        let client = self.clients.client_for(&self.user, &subscriber.target).await?;
        client.stop_application(&subscriber.app_name).await?;
        client.start_application(&subscriber.app_name).await
    }
}

/// Value of a subscription's environment variable: the content of the newest
/// matching entry, or all matching contents as a JSON array for lists. `None`
/// removes the variable.
pub fn render_env_value(entries: &[ConfigurationEntry], is_list: bool) -> DeployResult<Option<String>> {
    if is_list {
        let mut sorted: Vec<&ConfigurationEntry> = entries.iter().collect();
        sorted.sort_by(|a, b| (&a.provider_id, &a.version).cmp(&(&b.provider_id, &b.version)));
        let contents: Vec<&serde_json::Value> = sorted.iter().map(|entry| &entry.content).collect();
        return Ok(Some(serde_json::to_string(&contents)?));
    }
    entries
        .iter()
        .max_by(|a, b| a.version.cmp(&b.version))
        .map(|entry| serde_json::to_string(&entry.content))
        .transpose()
        .map_err(DeployError::from)
}
