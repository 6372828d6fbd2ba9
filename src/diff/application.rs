//! Application reconciliation: attribute drift and startup-state actions.

use crate::models::{
    ApplicationStartupState, ApplicationStateAction, Build, BuildState, ExistingApplication,
    ModuleDeploymentUnit,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::models::ApplicationStartupState::{Executed, Inconsistent, Started, Stopped};
use crate::models::ApplicationStateAction::{Execute, Stage, Start, Stop};

/// Application attributes that differ between a module and its existing
/// application
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplicationAttribute {
    Instances,
    Memory,
    Disk,
    Command,
    Buildpack,
    DockerImage,
    HealthCheck,
    Uris,
    Env,
}

impl ApplicationAttribute {
    /// Scaling takes effect without staging the application again
    pub fn requires_restage(&self) -> bool {
        !matches!(self, Self::Instances)
    }
}

impl fmt::Display for ApplicationAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Instances => "INSTANCES",
            Self::Memory => "MEMORY",
            Self::Disk => "DISK",
            Self::Command => "COMMAND",
            Self::Buildpack => "BUILDPACK",
            Self::DockerImage => "DOCKER_IMAGE",
            Self::HealthCheck => "HEALTH_CHECK",
            Self::Uris => "URIS",
            Self::Env => "ENV",
        };
        write!(f, "{name}")
    }
}

/// Attributes of `existing` that must be updated to match `desired`.
///
/// Unset memory and disk quotas keep the platform's values. Route order is
/// irrelevant. Environment variables only present on the platform (injected
/// service keys among them) are kept; declared ones must match.
pub fn compute_application_updates(
    desired: &ModuleDeploymentUnit,
    existing: &ExistingApplication,
) -> BTreeSet<ApplicationAttribute> {
    use ApplicationAttribute as Attr;

    fn sorted(uris: &[String]) -> BTreeSet<&str> {
        uris.iter().map(String::as_str).collect()
    }
    let quota_differs =
        |desired: Option<u64>, existing: Option<u64>| desired.is_some() && desired != existing;

    let mut updates = BTreeSet::new();
    if desired.instances != existing.instances {
        updates.insert(Attr::Instances);
    }
    if quota_differs(desired.memory_mb, existing.memory_mb) {
        updates.insert(Attr::Memory);
    }
    if quota_differs(desired.disk_mb, existing.disk_mb) {
        updates.insert(Attr::Disk);
    }
    if desired.command != existing.command {
        updates.insert(Attr::Command);
    }
    if desired.buildpack != existing.buildpack {
        updates.insert(Attr::Buildpack);
    }
    if desired.docker_image != existing.docker_image {
        updates.insert(Attr::DockerImage);
    }
    if desired.health_check != existing.health_check {
        updates.insert(Attr::HealthCheck);
    }
    if sorted(&desired.uris) != sorted(&existing.uris) {
        updates.insert(Attr::Uris);
    }
    if desired
        .env
        .iter()
        .any(|(name, value)| existing.env.get(name) != Some(value))
    {
        updates.insert(Attr::Env);
    }
    updates
}

/// Actions that move an application from `current` to `desired`.
///
/// An inconsistent application is always stopped first, reaching a started
/// state always stages first, and changed content is staged even if the
/// application stays stopped. `Executed` is never a current state; an
/// application that ran to completion is treated as stopped.
///
/// `staging_required` marks unchanged content whose last build failed or that
/// was never built. It adds a STAGE, and an application already in its
/// desired state is also stopped and, when it should run, started again. It
/// never adds a START for an executed application.
pub fn compute_application_actions(
    current: ApplicationStartupState,
    desired: ApplicationStartupState,
    content_changed: bool,
    staging_required: bool,
) -> BTreeSet<ApplicationStateAction> {
    let current = if current == Executed { Stopped } else { current };
    let mut actions = BTreeSet::new();

    match desired {
        Stopped | Inconsistent => {
            if current != Stopped {
                actions.insert(Stop);
            }
            if content_changed {
                actions.insert(Stage);
            }
        }
        Started => {
            if current != Started || content_changed {
                if current != Stopped {
                    actions.insert(Stop);
                }
                actions.extend([Stage, Start]);
            }
        }
        Executed => {
            if current != Stopped {
                actions.insert(Stop);
            }
            if current != Started || content_changed {
                actions.extend([Stage, Start]);
            }
            actions.insert(Execute);
        }
    }

    if staging_required && !content_changed {
        actions.insert(Stage);
        if current == desired {
            actions.insert(Stop);
            if desired == Started {
                actions.insert(Start);
            }
        }
    }

    actions
}

/// Whether the application must be staged again even if its content is
/// unchanged: it has no build yet, or its most recent build failed
pub fn needs_restaging(builds: &[Build]) -> bool {
    builds
        .iter()
        .max_by_key(|build| build.created_at)
        .map_or(true, |build| build.state == BuildState::Failed)
}
