//! # Conflict Detection
//!
//! Before creating services and applications, check whether same-named
//! resources already exist and who owns them. Ownership of a service comes from
//! its own MTA metadata and from the MTAs of bound applications that declare
//! the service.

use crate::error::{DeployError, DeployResult};
use crate::models::{ExistingServiceInstance, ModuleDeploymentUnit, ServiceDeploymentUnit};
use crate::platform::PlatformClient;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

pub struct ConflictDetector {
    client: Arc<dyn PlatformClient>,
    allow_unclaimed_foreign_resources: bool,
}

impl ConflictDetector {
    pub fn new(client: Arc<dyn PlatformClient>, allow_unclaimed_foreign_resources: bool) -> Self {
        Self {
            client,
            allow_unclaimed_foreign_resources,
        }
    }

    /// Check every service about to be deployed; returns warnings for adopted
    /// resources and fails on the first ownership conflict.
    pub async fn check_services(
        &self,
        mta_id: &str,
        services: &[ServiceDeploymentUnit],
        deployed_apps: &BTreeSet<String>,
    ) -> DeployResult<Vec<String>> {
        let mut warnings = Vec::new();
        for service in services {
            let existing = self
                .client
                .get_service_instance(&service.name)
                .await
                .map_err(|e| {
                    DeployError::platform(format!("Error retrieving service \"{}\"", service.name), e)
                })?;
            if let Some(existing) = existing {
                if let Some(warning) = self
                    .check_service(mta_id, service, &existing, deployed_apps)
                    .await?
                {
                    warnings.push(warning);
                }
            }
        }
        Ok(warnings)
    }

    async fn check_service(
        &self,
        mta_id: &str,
        service: &ServiceDeploymentUnit,
        existing: &ExistingServiceInstance,
        deployed_apps: &BTreeSet<String>,
    ) -> DeployResult<Option<String>> {
        let name = service.name.as_str();
        let owners = self.service_owners(existing).await?;
        let foreign: Vec<&str> = owners
            .iter()
            .map(String::as_str)
            .filter(|owner| *owner != mta_id)
            .collect();

        if owners.is_empty() {
            let bound_elsewhere: Vec<&str> = existing
                .bindings
                .iter()
                .map(|binding| binding.app_name.as_str())
                .filter(|app| !deployed_apps.contains(*app))
                .collect();
            if !bound_elsewhere.is_empty() {
                return Err(DeployError::conflict(format!(
                    "Service \"{name}\" is not part of any MTA but is bound to applications {}; its ownership is ambiguous",
                    quote_all(&bound_elsewhere)
                )));
            }
            return Ok(Some(format!(
                "Service \"{name}\" already exists and is not part of any MTA; it will be managed by MTA \"{mta_id}\""
            )));
        }

        if foreign.is_empty() {
            debug!(service = %name, mta = %mta_id, "Service belongs to the deployed MTA");
            return Ok(None);
        }

        if !service.claims_ownership && self.allow_unclaimed_foreign_resources {
            return Ok(Some(format!(
                "Service \"{name}\" is associated with MTA {}; MTA \"{mta_id}\" uses it without managing it",
                quote_all(&foreign)
            )));
        }
        Err(DeployError::conflict(format!(
            "Service \"{name}\" is associated with MTA {} and cannot be managed by MTA \"{mta_id}\"",
            quote_all(&foreign)
        )))
    }

    async fn service_owners(&self, existing: &ExistingServiceInstance) -> DeployResult<BTreeSet<String>> {
        let mut owners: BTreeSet<String> = existing
            .mta_metadata
            .iter()
            .map(|metadata| metadata.id.clone())
            .collect();

        for binding in &existing.bindings {
            let app = self
                .client
                .get_application(&binding.app_name)
                .await
                .map_err(|e| {
                    DeployError::platform(
                        format!("Error retrieving application \"{}\"", binding.app_name),
                        e,
                    )
                })?;
            let owner = app.filter(|app| app.mta_services.contains(&existing.name))
                .and_then(|app| app.mta_metadata);
            if let Some(metadata) = owner {
                owners.insert(metadata.id);
            }
        }
        Ok(owners)
    }

    /// Existing standalone applications are adopted with a warning; those of
    /// another MTA are a conflict.
    pub async fn check_applications(
        &self,
        mta_id: &str,
        apps: &[ModuleDeploymentUnit],
    ) -> DeployResult<Vec<String>> {
        let mut warnings = Vec::new();
        for app in apps {
            let existing = self.client.get_application(&app.name).await.map_err(|e| {
                DeployError::platform(format!("Error retrieving application \"{}\"", app.name), e)
            })?;
            let Some(existing) = existing else { continue };
            match existing.mta_metadata {
                None => warnings.push(format!(
                    "Application \"{}\" already exists and is not part of any MTA; it will be managed by MTA \"{mta_id}\"",
                    app.name
                )),
                Some(metadata) if metadata.id != mta_id => {
                    return Err(DeployError::conflict(format!(
                        "Application \"{}\" is associated with MTA \"{}\" and cannot be managed by MTA \"{mta_id}\"",
                        app.name, metadata.id
                    )));
                }
                Some(_) => {}
            }
        }
        Ok(warnings)
    }
}

fn quote_all(names: &[&str]) -> String {
    names
        .iter()
        .map(|name| format!("\"{name}\""))
        .collect::<Vec<_>>()
        .join(", ")
}
