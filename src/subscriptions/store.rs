use crate::error::{DeployError, DeployResult};
use crate::models::{ConfigurationEntry, ConfigurationFilter, ConfigurationSubscription};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// Persistence of configuration entries and subscriptions
#[async_trait]
pub trait ConfigurationStore: Send + Sync {
    async fn find_entries(&self, filter: &ConfigurationFilter) -> DeployResult<Vec<ConfigurationEntry>>;

    /// Persist a new entry and return it with its storage id
    async fn add_entry(&self, entry: ConfigurationEntry) -> DeployResult<ConfigurationEntry>;

    async fn update_entry(&self, entry: &ConfigurationEntry) -> DeployResult<()>;

    async fn remove_entry(&self, id: u64) -> DeployResult<()>;

    async fn add_subscription(
        &self,
        subscription: ConfigurationSubscription,
    ) -> DeployResult<ConfigurationSubscription>;

    /// Subscriptions whose filter matches at least one of `entries`
    async fn find_subscriptions_matching(
        &self,
        entries: &[ConfigurationEntry],
    ) -> DeployResult<Vec<ConfigurationSubscription>>;
}

#[derive(Debug, Default)]
struct Tables {
    next_id: u64,
    entries: BTreeMap<u64, ConfigurationEntry>,
    subscriptions: BTreeMap<u64, ConfigurationSubscription>,
}

impl Tables {
    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Debug, Default)]
pub struct InMemoryConfigurationStore {
    tables: RwLock<Tables>,
}

impl InMemoryConfigurationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<ConfigurationEntry> {
        self.tables.read().entries.values().cloned().collect()
    }
}

#[async_trait]
impl ConfigurationStore for InMemoryConfigurationStore {
    async fn find_entries(&self, filter: &ConfigurationFilter) -> DeployResult<Vec<ConfigurationEntry>> {
        Ok(self
            .tables
            .read()
            .entries
            .values()
            .filter(|entry| filter.matches(entry))
            .cloned()
            .collect())
    }

    async fn add_entry(&self, mut entry: ConfigurationEntry) -> DeployResult<ConfigurationEntry> {
        let mut tables = self.tables.write();
        let id = tables.allocate_id();
        entry.id = Some(id);
        tables.entries.insert(id, entry.clone());
        Ok(entry)
    }

    async fn update_entry(&self, entry: &ConfigurationEntry) -> DeployResult<()> {
        let id = entry
            .id
            .ok_or_else(|| DeployError::state_store("Cannot update an entry without id"))?;
        let mut tables = self.tables.write();
        match tables.entries.get_mut(&id) {
            Some(stored) => {
                *stored = entry.clone();
                Ok(())
            }
            None => Err(DeployError::state_store(format!(
                "Configuration entry {id} does not exist"
            ))),
        }
    }

    async fn remove_entry(&self, id: u64) -> DeployResult<()> {
        self.tables
            .write()
            .entries
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| DeployError::state_store(format!("Configuration entry {id} does not exist")))
    }

    async fn add_subscription(
        &self,
        mut subscription: ConfigurationSubscription,
    ) -> DeployResult<ConfigurationSubscription> {
        let mut tables = self.tables.write();
        let id = tables.allocate_id();
        subscription.id = Some(id);
        tables.subscriptions.insert(id, subscription.clone());
        Ok(subscription)
    }

    async fn find_subscriptions_matching(
        &self,
        entries: &[ConfigurationEntry],
    ) -> DeployResult<Vec<ConfigurationSubscription>> {
        Ok(self
            .tables
            .read()
            .subscriptions
            .values()
            .filter(|subscription| entries.iter().any(|entry| subscription.filter.matches(entry)))
            .cloned()
            .collect())
    }
}
