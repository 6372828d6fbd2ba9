use semver::Version;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Ownership metadata the deployer attaches to platform resources
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MtaMetadata {
    pub id: String,
    pub version: Option<Version>,
}

impl MtaMetadata {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: None,
        }
    }

    pub fn with_version(mut self, version: Version) -> Self {
        self.version = Some(version);
        self
    }
}

/// Resources currently deployed as part of one MTA
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployedMta {
    pub metadata: MtaMetadata,
    pub applications: BTreeSet<String>,
    pub services: BTreeSet<String>,
}

impl DeployedMta {
    pub fn new(metadata: MtaMetadata) -> Self {
        Self {
            metadata,
            applications: BTreeSet::new(),
            services: BTreeSet::new(),
        }
    }

    pub fn contains_service(&self, name: &str) -> bool {
        self.services.contains(name)
    }

    pub fn contains_application(&self, name: &str) -> bool {
        self.applications.contains(name)
    }
}
