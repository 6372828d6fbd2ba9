//! Configuration entries and subscriptions: the cross-MTA publish/subscribe
//! directory.

use crate::constants::{MTA_PROVIDER_NID, PROVIDER_ID_DELIMITER, TARGET_DELIMITER};
use semver::{Version, VersionReq};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Organization and space pair
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CloudTarget {
    pub org: String,
    pub space: String,
}

impl CloudTarget {
    pub fn new(org: impl Into<String>, space: impl Into<String>) -> Self {
        Self {
            org: org.into(),
            space: space.into(),
        }
    }
}

impl fmt::Display for CloudTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.org, TARGET_DELIMITER, self.space)
    }
}

/// Target of a configuration entry, in either of the two stored encodings:
/// `"org space"` or a bare space guid.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum ConfigurationTarget {
    Space(CloudTarget),
    LegacySpaceId(String),
}

impl ConfigurationTarget {
    pub fn space(org: impl Into<String>, space: impl Into<String>) -> Self {
        Self::Space(CloudTarget::new(org, space))
    }

    pub fn parse(raw: &str) -> Self {
        match raw.split_once(TARGET_DELIMITER) {
            Some((org, space)) if !org.is_empty() && !space.is_empty() => {
                Self::Space(CloudTarget::new(org, space))
            }
            _ => Self::LegacySpaceId(raw.to_string()),
        }
    }

    pub fn is_legacy(&self) -> bool {
        matches!(self, Self::LegacySpaceId(_))
    }

    pub fn as_cloud_target(&self) -> Option<&CloudTarget> {
        match self {
            Self::Space(target) => Some(target),
            Self::LegacySpaceId(_) => None,
        }
    }
}

impl fmt::Display for ConfigurationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Space(target) => target.fmt(f),
            Self::LegacySpaceId(space_id) => write!(f, "{space_id}"),
        }
    }
}

impl From<ConfigurationTarget> for String {
    fn from(target: ConfigurationTarget) -> Self {
        target.to_string()
    }
}

impl From<String> for ConfigurationTarget {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl From<CloudTarget> for ConfigurationTarget {
    fn from(target: CloudTarget) -> Self {
        Self::Space(target)
    }
}

/// A published directory record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigurationEntry {
    /// Storage id, assigned once the entry has been persisted
    pub id: Option<u64>,
    pub provider_nid: String,
    pub provider_id: String,
    pub version: Option<Version>,
    pub target: ConfigurationTarget,
    pub content: Value,
}

impl ConfigurationEntry {
    pub fn new(
        provider_nid: impl Into<String>,
        provider_id: impl Into<String>,
        version: Option<Version>,
        target: ConfigurationTarget,
        content: Value,
    ) -> Self {
        Self {
            id: None,
            provider_nid: provider_nid.into(),
            provider_id: provider_id.into(),
            version,
            target,
            content,
        }
    }

    /// Entry published by an MTA for one of its provided dependencies
    pub fn for_mta(
        mta_id: &str,
        dependency: &str,
        version: Option<Version>,
        target: ConfigurationTarget,
        content: Value,
    ) -> Self {
        Self::new(
            MTA_PROVIDER_NID,
            build_provider_id(mta_id, dependency),
            version,
            target,
            content,
        )
    }

    pub fn with_id(mut self, id: u64) -> Self {
        self.id = Some(id);
        self
    }

    /// Version and content are payload; identity is nid, id and target
    pub fn has_same_payload(&self, other: &ConfigurationEntry) -> bool {
        self.version == other.version && self.content == other.content
    }
}

pub fn build_provider_id(mta_id: &str, dependency: &str) -> String {
    format!("{mta_id}{PROVIDER_ID_DELIMITER}{dependency}")
}

/// Criteria selecting configuration entries
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigurationFilter {
    pub provider_nid: Option<String>,
    pub provider_id: Option<String>,
    /// Matches every provider id published by this MTA
    pub mta_id: Option<String>,
    pub version_requirement: Option<VersionReq>,
    pub target: Option<ConfigurationTarget>,
    pub required_content: Option<Map<String, Value>>,
}

impl ConfigurationFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn provider_nid(mut self, nid: impl Into<String>) -> Self {
        self.provider_nid = Some(nid.into());
        self
    }

    pub fn provider_id(mut self, id: impl Into<String>) -> Self {
        self.provider_id = Some(id.into());
        self
    }

    pub fn mta(mut self, mta_id: impl Into<String>) -> Self {
        self.mta_id = Some(mta_id.into());
        self
    }

    pub fn target(mut self, target: ConfigurationTarget) -> Self {
        self.target = Some(target);
        self
    }

    pub fn required_content(mut self, content: Map<String, Value>) -> Self {
        self.required_content = Some(content);
        self
    }

    /// Restrict versions by a semver range; `all` matches any version
    pub fn version_range(mut self, range: &str) -> Result<Self, semver::Error> {
        self.version_requirement = match range.trim() {
            "" | "all" => None,
            requirement => Some(VersionReq::parse(requirement)?),
        };
        Ok(self)
    }

    pub fn matches(&self, entry: &ConfigurationEntry) -> bool {
        if self
            .provider_nid
            .as_ref()
            .is_some_and(|nid| *nid != entry.provider_nid)
        {
            return false;
        }
        if self
            .provider_id
            .as_ref()
            .is_some_and(|id| *id != entry.provider_id)
        {
            return false;
        }
        if let Some(mta_id) = &self.mta_id {
            let prefix = format!("{mta_id}{PROVIDER_ID_DELIMITER}");
            if !entry.provider_id.starts_with(&prefix) {
                return false;
            }
        }
        if let Some(requirement) = &self.version_requirement {
            match &entry.version {
                Some(version) if requirement.matches(version) => {}
                _ => return false,
            }
        }
        if self.target.as_ref().is_some_and(|t| *t != entry.target) {
            return false;
        }
        if let Some(required) = &self.required_content {
            return required
                .iter()
                .all(|(key, value)| entry.content.get(key) == Some(value));
        }
        true
    }
}

/// A consumer-side registration. The subscriber's environment variable
/// `env_var_name` is owned by the subscription and holds the matched content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigurationSubscription {
    pub id: Option<u64>,
    pub mta_id: String,
    pub app_name: String,
    pub target: ConfigurationTarget,
    pub filter: ConfigurationFilter,
    pub env_var_name: String,
    /// Render all matches as a JSON array instead of a single object
    pub is_list: bool,
}

impl ConfigurationSubscription {
    pub fn new(
        mta_id: impl Into<String>,
        app_name: impl Into<String>,
        target: ConfigurationTarget,
        filter: ConfigurationFilter,
        env_var_name: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            mta_id: mta_id.into(),
            app_name: app_name.into(),
            target,
            filter,
            env_var_name: env_var_name.into(),
            is_list: false,
        }
    }

    pub fn as_list(mut self) -> Self {
        self.is_list = true;
        self
    }
}

/// A subscriber application whose environment was updated
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Subscriber {
    pub app_name: String,
    pub target: CloudTarget,
}
