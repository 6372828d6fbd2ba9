//! Publish/delete reconciliation of configuration entries.
//!
//! Entries are identified by provider namespace, provider id and target;
//! version and content are payload. Existing entries may be stored under
//! either target encoding, so both are queried and folded onto one logical
//! target before comparing.

use super::store::ConfigurationStore;
use crate::constants::MTA_PROVIDER_NID;
use crate::error::DeployResult;
use crate::models::{CloudTarget, ConfigurationEntry, ConfigurationFilter, ConfigurationTarget};
use std::collections::{BTreeMap, BTreeSet};

/// The deploying space, under both of its target encodings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentTarget {
    pub target: CloudTarget,
    pub space_guid: String,
}

impl CurrentTarget {
    pub fn new(target: CloudTarget, space_guid: impl Into<String>) -> Self {
        Self {
            target,
            space_guid: space_guid.into(),
        }
    }

    /// Map the legacy encoding of the current space onto the org/space form
    pub fn normalize(&self, target: &ConfigurationTarget) -> ConfigurationTarget {
        match target {
            ConfigurationTarget::LegacySpaceId(guid) if *guid == self.space_guid => {
                ConfigurationTarget::Space(self.target.clone())
            }
            other => other.clone(),
        }
    }

    pub fn encodings(&self, include_legacy: bool) -> Vec<ConfigurationTarget> {
        let mut encodings = vec![ConfigurationTarget::Space(self.target.clone())];
        if include_legacy {
            encodings.push(ConfigurationTarget::LegacySpaceId(self.space_guid.clone()));
        }
        encodings
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntryChanges {
    pub to_create: Vec<ConfigurationEntry>,
    /// Desired entries carrying the storage id of the entry they replace
    pub to_update: Vec<ConfigurationEntry>,
    pub to_delete: Vec<ConfigurationEntry>,
}

impl EntryChanges {
    pub fn is_empty(&self) -> bool {
        self.to_create.is_empty() && self.to_update.is_empty() && self.to_delete.is_empty()
    }
}

type EntryKey = (String, String, ConfigurationTarget);

/// Compare the entries a deployment publishes with those found in storage.
///
/// The same stored entry may appear more than once in `existing` (once per
/// queried encoding); it is considered once. When a logical entry is stored
/// under both encodings, the current-encoding copy is kept and the other copy
/// is deleted.
pub fn compute_entry_changes(
    desired: &[ConfigurationEntry],
    existing: &[ConfigurationEntry],
    current: &CurrentTarget,
) -> EntryChanges {
    let key_of = |entry: &ConfigurationEntry| -> EntryKey {
        (
            entry.provider_nid.clone(),
            entry.provider_id.clone(),
            current.normalize(&entry.target),
        )
    };

    let mut seen_ids = BTreeSet::new();
    let mut stored: BTreeMap<EntryKey, Vec<&ConfigurationEntry>> = BTreeMap::new();
    for entry in existing {
        if let Some(id) = entry.id {
            if !seen_ids.insert(id) {
                continue;
            }
        }
        stored.entry(key_of(entry)).or_default().push(entry);
    }
    for copies in stored.values_mut() {
        copies.sort_by_key(|entry| entry.target.is_legacy());
    }

    let mut changes = EntryChanges::default();
    let mut published = BTreeSet::new();
    for entry in desired {
        let key = key_of(entry);
        if !published.insert(key.clone()) {
            continue;
        }
        match stored.get(&key).and_then(|copies| copies.split_first()) {
            None => changes.to_create.push(entry.clone()),
            Some((primary, duplicates)) => {
                if !primary.has_same_payload(entry) || primary.target != entry.target {
                    let mut replacement = entry.clone();
                    replacement.id = primary.id;
                    changes.to_update.push(replacement);
                }
                changes
                    .to_delete
                    .extend(duplicates.iter().map(|copy| (*copy).clone()));
            }
        }
    }

    for (key, copies) in stored {
        if !published.contains(&key) {
            changes.to_delete.extend(copies.into_iter().cloned());
        }
    }
    changes
}

/// Entries an MTA has published to the current space, under every encoding
/// in use
pub async fn query_existing_entries(
    store: &dyn ConfigurationStore,
    mta_id: &str,
    current: &CurrentTarget,
    include_legacy: bool,
) -> DeployResult<Vec<ConfigurationEntry>> {
    let mut entries = Vec::new();
    for target in current.encodings(include_legacy) {
        let filter = ConfigurationFilter::new()
            .provider_nid(MTA_PROVIDER_NID)
            .mta(mta_id)
            .target(target);
        entries.extend(store.find_entries(&filter).await?);
    }
    Ok(entries)
}
