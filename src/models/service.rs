//! Service models: desired resources and the platform's view of service
//! instances, keys, bindings and brokers.

use super::mta::MtaMetadata;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// Managed services are provisioned by a broker; user-provided services only
/// carry the credentials the descriptor gives them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceKind {
    Managed,
    UserProvided,
}

/// One service resource to be deployed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceDeploymentUnit {
    pub name: String,
    pub kind: ServiceKind,
    pub label: Option<String>,
    pub plan: Option<String>,
    pub tags: Vec<String>,
    /// Creation parameters for managed services, credentials for user-provided ones
    pub credentials: Value,
    pub syslog_drain_url: Option<String>,
    pub service_keys: Vec<ServiceKey>,
    /// Failures of optional services are reported as warnings
    pub optional: bool,
    /// Whether the descriptor intends to own and manage an existing instance
    pub claims_ownership: bool,
    pub skip_parameters_update: bool,
}

impl ServiceDeploymentUnit {
    pub fn managed(name: impl Into<String>, label: impl Into<String>, plan: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ServiceKind::Managed,
            label: Some(label.into()),
            plan: Some(plan.into()),
            tags: Vec::new(),
            credentials: Value::Null,
            syslog_drain_url: None,
            service_keys: Vec::new(),
            optional: false,
            claims_ownership: true,
            skip_parameters_update: false,
        }
    }

    pub fn user_provided(name: impl Into<String>, credentials: Value) -> Self {
        Self {
            name: name.into(),
            kind: ServiceKind::UserProvided,
            label: None,
            plan: None,
            tags: Vec::new(),
            credentials,
            syslog_drain_url: None,
            service_keys: Vec::new(),
            optional: false,
            claims_ownership: true,
            skip_parameters_update: false,
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_credentials(mut self, credentials: Value) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_key(mut self, key: ServiceKey) -> Self {
        self.service_keys.push(key);
        self
    }

    pub fn with_syslog_drain_url(mut self, url: impl Into<String>) -> Self {
        self.syslog_drain_url = Some(url.into());
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn without_ownership_claim(mut self) -> Self {
        self.claims_ownership = false;
        self
    }

    pub fn is_user_provided(&self) -> bool {
        self.kind == ServiceKind::UserProvided
    }

    /// Human readable type used in error messages, e.g. `postgres/small`
    pub fn type_description(&self) -> String {
        describe_type(self.kind, self.label.as_deref(), self.plan.as_deref())
    }
}

fn describe_type(kind: ServiceKind, label: Option<&str>, plan: Option<&str>) -> String {
    match kind {
        ServiceKind::UserProvided => "user-provided".to_string(),
        ServiceKind::Managed => format!("{}/{}", label.unwrap_or("?"), plan.unwrap_or("?")),
    }
}

/// The platform's current view of a service instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExistingServiceInstance {
    pub guid: Uuid,
    pub name: String,
    pub kind: ServiceKind,
    pub label: Option<String>,
    pub plan: Option<String>,
    pub tags: Vec<String>,
    /// `None` when the broker does not allow parameters to be retrieved
    pub credentials: Option<Value>,
    pub syslog_drain_url: Option<String>,
    pub last_operation: Option<ServiceOperation>,
    pub bindings: Vec<ServiceBinding>,
    pub keys: Vec<ServiceKey>,
    pub mta_metadata: Option<MtaMetadata>,
}

impl ExistingServiceInstance {
    /// Snapshot of what the platform would report right after creating `unit`
    pub fn from_unit(unit: &ServiceDeploymentUnit) -> Self {
        Self {
            guid: Uuid::new_v4(),
            name: unit.name.clone(),
            kind: unit.kind,
            label: unit.label.clone(),
            plan: unit.plan.clone(),
            tags: unit.tags.clone(),
            credentials: Some(unit.credentials.clone()),
            syslog_drain_url: unit.syslog_drain_url.clone(),
            last_operation: None,
            bindings: Vec::new(),
            keys: unit.service_keys.clone(),
            mta_metadata: None,
        }
    }

    pub fn type_description(&self) -> String {
        describe_type(self.kind, self.label.as_deref(), self.plan.as_deref())
    }

    pub fn last_operation_failed(&self, operation_type: ServiceOperationType) -> bool {
        self.last_operation.as_ref().is_some_and(|op| {
            op.operation_type == operation_type && op.state == ServiceOperationState::Failed
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServiceOperationType {
    Create,
    Update,
    Delete,
}

impl fmt::Display for ServiceOperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => write!(f, "create"),
            Self::Update => write!(f, "update"),
            Self::Delete => write!(f, "delete"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServiceOperationState {
    InProgress,
    Succeeded,
    Failed,
}

/// Last operation reported for a service instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceOperation {
    pub operation_type: ServiceOperationType,
    pub state: ServiceOperationState,
    pub description: Option<String>,
}

impl ServiceOperation {
    pub fn new(operation_type: ServiceOperationType, state: ServiceOperationState) -> Self {
        Self {
            operation_type,
            state,
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceKey {
    pub name: String,
    pub parameters: Value,
    /// Populated by the platform for existing keys
    pub credentials: Value,
}

impl ServiceKey {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: Value::Null,
            credentials: Value::Null,
        }
    }

    pub fn with_parameters(mut self, parameters: Value) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_credentials(mut self, credentials: Value) -> Self {
        self.credentials = credentials;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceBinding {
    pub app_name: String,
    pub service_name: String,
    pub parameters: Option<Value>,
}

impl ServiceBinding {
    pub fn new(app_name: impl Into<String>, service_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            service_name: service_name.into(),
            parameters: None,
        }
    }
}

/// Service broker registered by a module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceBrokerSpec {
    pub name: String,
    pub url: String,
    pub username: String,
    pub password: String,
    pub space_scoped: bool,
}
