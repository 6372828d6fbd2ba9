//! # Action Executor
//!
//! Performs computed actions against the platform. Independent entities of one
//! batch (distinct services, distinct bindings) are all attempted: their
//! failures are collected in the [`ExecutionReport`] and raised together once
//! the batch is done. Within a single entity, the first failure stops the
//! remaining actions unless the process keeps going on errors.

pub mod application;
pub mod binding;
pub mod broker;
pub mod service;

use crate::error::{DeployError, DeployResult};
use crate::models::ServiceOperationType;
use crate::platform::PlatformResult;
use futures::future::join_all;
use std::collections::BTreeMap;
use std::future::Future;

pub use application::ApplicationStateExecutor;
pub use binding::ApplicationServiceBinder;
pub use broker::ServiceBrokerSynchronizer;
pub use service::{ServiceActionExecutor, ServiceWork};

/// What a batch of actions did, including failures not yet raised
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionReport {
    /// Asynchronous service operations left in flight, by service name
    pub triggered_operations: BTreeMap<String, ServiceOperationType>,
    pub warnings: Vec<String>,
    pub failures: Vec<DeployError>,
}

impl ExecutionReport {
    pub fn record_operation(&mut self, service: &str, operation: ServiceOperationType) {
        self.triggered_operations.insert(service.to_string(), operation);
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn merge(&mut self, other: ExecutionReport) {
        self.triggered_operations.extend(other.triggered_operations);
        self.warnings.extend(other.warnings);
        self.failures.extend(other.failures);
    }

    /// Raise collected failures as one error
    pub fn take_failures(&mut self) -> DeployResult<()> {
        if self.failures.is_empty() {
            return Ok(());
        }
        Err(DeployError::aggregate(std::mem::take(&mut self.failures)))
    }
}

/// Await every entity's work and merge the reports
pub async fn run_isolated<F>(work: impl IntoIterator<Item = F>) -> ExecutionReport
where
    F: Future<Output = ExecutionReport>,
{
    let mut report = ExecutionReport::default();
    for entity_report in join_all(work).await {
        report.merge(entity_report);
    }
    report
}

/// Wrap a platform failure with the operation and entity it concerned
pub(crate) fn with_context<T>(
    result: PlatformResult<T>,
    context: impl FnOnce() -> String,
) -> DeployResult<T> {
    result.map_err(|e| DeployError::platform(context(), e))
}

/// Missing resources count as removed
pub(crate) fn ignore_not_found(err: DeployError) -> DeployResult<()> {
    if err.is_not_found() {
        Ok(())
    } else {
        Err(err)
    }
}
