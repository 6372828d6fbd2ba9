//! Recording fakes for the platform contracts.
//!
//! Every call is appended to a call log as `"operation:entity"`; failures are
//! injected per `"operation:entity"` key and returned instead of performing
//! the call.

use crate::models::{
    AppState, ApplicationLog, Build, BuildState, CloudTarget, ExistingApplication,
    ExistingServiceInstance, InstanceInfo, InstanceState, ModuleDeploymentUnit, ServiceBinding,
    ServiceBrokerSpec,
    ServiceDeploymentUnit, ServiceKey, ServiceKind, ServiceOperation, ServiceOperationState,
    ServiceOperationType, UploadStatus,
};
use crate::platform::{LogStreamReader, PlatformClient, PlatformClientProvider, PlatformError, PlatformResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

/// Simulated platform contents and the calls made against them
#[derive(Debug, Clone)]
pub struct FakePlatformState {
    pub applications: BTreeMap<String, ExistingApplication>,
    pub instances: BTreeMap<String, Vec<InstanceInfo>>,
    /// Upload jobs by token
    pub uploads: BTreeMap<String, UploadStatus>,
    pub builds: BTreeMap<Uuid, Build>,
    pub services: BTreeMap<String, ExistingServiceInstance>,
    pub brokers: BTreeMap<String, ServiceBrokerSpec>,
    /// Last-operation state given to managed service operations when triggered
    pub service_operation_state: ServiceOperationState,
    /// State of builds created by `create_build`
    pub new_build_state: BuildState,
    pub calls: Vec<String>,
    pub failures: BTreeMap<String, PlatformError>,
}

impl Default for FakePlatformState {
    fn default() -> Self {
        Self {
            applications: BTreeMap::new(),
            instances: BTreeMap::new(),
            uploads: BTreeMap::new(),
            builds: BTreeMap::new(),
            services: BTreeMap::new(),
            brokers: BTreeMap::new(),
            service_operation_state: ServiceOperationState::Succeeded,
            new_build_state: BuildState::Staging,
            calls: Vec::new(),
            failures: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FakePlatform {
    state: Arc<Mutex<FakePlatformState>>,
}

impl FakePlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_application(self, app: ExistingApplication) -> Self {
        self.state.lock().applications.insert(app.name.clone(), app);
        self
    }

    pub fn with_service(self, service: ExistingServiceInstance) -> Self {
        self.state.lock().services.insert(service.name.clone(), service);
        self
    }

    pub fn with_broker(self, broker: ServiceBrokerSpec) -> Self {
        self.state.lock().brokers.insert(broker.name.clone(), broker);
        self
    }

    /// Make `operation` on `entity` fail with `error`
    pub fn fail_on(&self, operation: &str, entity: &str, error: PlatformError) {
        self.state
            .lock()
            .failures
            .insert(format!("{operation}:{entity}"), error);
    }

    pub fn clear_failures(&self) {
        self.state.lock().failures.clear();
    }

    pub fn set_instances(&self, app: &str, states: &[InstanceState]) {
        let instances = states
            .iter()
            .enumerate()
            .map(|(index, state)| InstanceInfo::new(index as u32, *state))
            .collect();
        self.state.lock().instances.insert(app.to_string(), instances);
    }

    pub fn set_upload(&self, token: &str, status: UploadStatus) {
        self.state.lock().uploads.insert(token.to_string(), status);
    }

    pub fn add_build(&self, build: Build) {
        self.state.lock().builds.insert(build.guid, build);
    }

    pub fn set_build_state(&self, guid: Uuid, state: BuildState, error: Option<&str>) {
        if let Some(build) = self.state.lock().builds.get_mut(&guid) {
            build.state = state;
            build.error = error.map(str::to_string);
        }
    }

    pub fn set_new_build_state(&self, state: BuildState) {
        self.state.lock().new_build_state = state;
    }

    pub fn set_service_operation_state(&self, state: ServiceOperationState) {
        self.state.lock().service_operation_state = state;
    }

    /// Finish the in-flight operation of `service` with `state`
    pub fn complete_service_operation(&self, service: &str, state: ServiceOperationState, description: Option<&str>) {
        let mut platform = self.state.lock();
        let finished_delete = matches!(
            platform.services.get(service).and_then(|s| s.last_operation.as_ref()),
            Some(op) if op.operation_type == ServiceOperationType::Delete
        ) && state == ServiceOperationState::Succeeded;
        if finished_delete {
            platform.services.remove(service);
            return;
        }
        if let Some(operation) = platform
            .services
            .get_mut(service)
            .and_then(|s| s.last_operation.as_mut())
        {
            operation.state = state;
            operation.description = description.map(str::to_string);
        }
    }

    pub fn application(&self, name: &str) -> Option<ExistingApplication> {
        self.state.lock().applications.get(name).cloned()
    }

    pub fn service(&self, name: &str) -> Option<ExistingServiceInstance> {
        self.state.lock().services.get(name).cloned()
    }

    pub fn broker(&self, name: &str) -> Option<ServiceBrokerSpec> {
        self.state.lock().brokers.get(name).cloned()
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }

    /// Calls of one operation, as the entities they concerned
    pub fn calls_to(&self, operation: &str) -> Vec<String> {
        let prefix = format!("{operation}:");
        self.state
            .lock()
            .calls
            .iter()
            .filter_map(|call| call.strip_prefix(&prefix).map(str::to_string))
            .collect()
    }

    /// Calls that changed something on the platform
    pub fn mutations(&self) -> Vec<String> {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|call| !call.starts_with("get_") && !call.starts_with("list_"))
            .cloned()
            .collect()
    }

    fn record(&self, operation: &str, entity: &str) -> PlatformResult<()> {
        let key = format!("{operation}:{entity}");
        let mut state = self.state.lock();
        state.calls.push(key.clone());
        match state.failures.get(&key) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn with_service_mut<T>(
        &self,
        name: &str,
        f: impl FnOnce(&mut ExistingServiceInstance) -> T,
    ) -> PlatformResult<T> {
        let mut state = self.state.lock();
        state
            .services
            .get_mut(name)
            .map(f)
            .ok_or_else(|| PlatformError::not_found(format!("Service instance {name} not found")))
    }

    fn with_app_mut<T>(
        &self,
        name: &str,
        f: impl FnOnce(&mut ExistingApplication) -> T,
    ) -> PlatformResult<T> {
        let mut state = self.state.lock();
        state
            .applications
            .get_mut(name)
            .map(f)
            .ok_or_else(|| PlatformError::not_found(format!("Application {name} not found")))
    }

    fn trigger(&self, name: &str, operation_type: ServiceOperationType) -> PlatformResult<()> {
        let operation_state = self.state.lock().service_operation_state;
        self.with_service_mut(name, |service| {
            if service.kind == ServiceKind::Managed {
                service.last_operation = Some(ServiceOperation::new(operation_type, operation_state));
            }
        })
    }
}

#[async_trait]
impl PlatformClient for FakePlatform {
    async fn get_application(&self, name: &str) -> PlatformResult<Option<ExistingApplication>> {
        self.record("get_application", name)?;
        Ok(self.application(name))
    }

    async fn get_instances(&self, app: &str) -> PlatformResult<Vec<InstanceInfo>> {
        self.record("get_instances", app)?;
        Ok(self.state.lock().instances.get(app).cloned().unwrap_or_default())
    }

    async fn create_application(&self, app: &ModuleDeploymentUnit) -> PlatformResult<()> {
        self.record("create_application", &app.name)?;
        let mut state = self.state.lock();
        if state.applications.contains_key(&app.name) {
            return Err(PlatformError::new(
                422,
                format!("The app name is taken: {}", app.name),
            ));
        }
        state
            .applications
            .insert(app.name.clone(), ExistingApplication::from_unit(app));
        Ok(())
    }

    async fn update_application(&self, app: &ModuleDeploymentUnit) -> PlatformResult<()> {
        self.record("update_application", &app.name)?;
        self.with_app_mut(&app.name, |existing| {
            existing.instances = app.instances;
            existing.memory_mb = app.memory_mb.or(existing.memory_mb);
            existing.disk_mb = app.disk_mb.or(existing.disk_mb);
            existing.command = app.command.clone();
            existing.uris = app.uris.clone();
            existing.buildpack = app.buildpack.clone();
            existing.docker_image = app.docker_image.clone();
            existing.health_check = app.health_check.clone();
        })
    }

    async fn update_application_env(
        &self,
        app: &str,
        env: &BTreeMap<String, String>,
    ) -> PlatformResult<()> {
        self.record("update_application_env", app)?;
        self.with_app_mut(app, |existing| existing.env = env.clone())
    }

    async fn stop_application(&self, app: &str) -> PlatformResult<()> {
        self.record("stop_application", app)?;
        self.with_app_mut(app, |existing| {
            existing.state = AppState::Stopped;
            existing.running_instances = 0;
        })
    }

    async fn start_application(&self, app: &str) -> PlatformResult<()> {
        self.record("start_application", app)?;
        self.with_app_mut(app, |existing| existing.state = AppState::Started)
    }

    async fn get_upload_status(&self, app: &str, upload_token: &str) -> PlatformResult<UploadStatus> {
        self.record("get_upload_status", app)?;
        self.state
            .lock()
            .uploads
            .get(upload_token)
            .cloned()
            .ok_or_else(|| PlatformError::not_found(format!("Upload job {upload_token} not found")))
    }

    async fn create_build(&self, app: &str, package_guid: Uuid) -> PlatformResult<Build> {
        self.record("create_build", app)?;
        let mut state = self.state.lock();
        let build = Build {
            guid: Uuid::new_v4(),
            state: state.new_build_state,
            package_guid: Some(package_guid),
            error: None,
            created_at: Utc::now(),
        };
        state.builds.insert(build.guid, build.clone());
        if let Some(existing) = state.applications.get_mut(app) {
            existing.package_guid = Some(package_guid);
        }
        Ok(build)
    }

    async fn get_build(&self, build_guid: Uuid) -> PlatformResult<Build> {
        self.record("get_build", &build_guid.to_string())?;
        self.state
            .lock()
            .builds
            .get(&build_guid)
            .cloned()
            .ok_or_else(|| PlatformError::not_found(format!("Build {build_guid} not found")))
    }

    async fn list_builds(&self, app: &str) -> PlatformResult<Vec<Build>> {
        self.record("list_builds", app)?;
        let state = self.state.lock();
        let package = state.applications.get(app).and_then(|existing| existing.package_guid);
        Ok(state
            .builds
            .values()
            .filter(|build| package.is_some() && build.package_guid == package)
            .cloned()
            .collect())
    }

    async fn get_service_instance(
        &self,
        name: &str,
    ) -> PlatformResult<Option<ExistingServiceInstance>> {
        self.record("get_service_instance", name)?;
        Ok(self.service(name))
    }

    async fn create_service(&self, service: &ServiceDeploymentUnit) -> PlatformResult<()> {
        self.record("create_service", &service.name)?;
        let deleting = matches!(
            self.service(&service.name).and_then(|s| s.last_operation),
            Some(op) if op.operation_type == ServiceOperationType::Delete
                && op.state == ServiceOperationState::InProgress
        );
        if deleting {
            return Err(PlatformError::new(
                409,
                format!("Service instance {} is being deleted", service.name),
            ));
        }
        let mut instance = ExistingServiceInstance::from_unit(service);
        instance.keys.clear();
        self.state.lock().services.insert(service.name.clone(), instance);
        self.trigger(&service.name, ServiceOperationType::Create)
    }

    async fn update_service_plan(&self, service: &str, plan: &str) -> PlatformResult<()> {
        self.record("update_service_plan", service)?;
        self.with_service_mut(service, |existing| existing.plan = Some(plan.to_string()))?;
        self.trigger(service, ServiceOperationType::Update)
    }

    async fn update_service_tags(&self, service: &str, tags: &[String]) -> PlatformResult<()> {
        self.record("update_service_tags", service)?;
        self.with_service_mut(service, |existing| existing.tags = tags.to_vec())?;
        self.trigger(service, ServiceOperationType::Update)
    }

    async fn update_service_credentials(
        &self,
        service: &str,
        credentials: &Value,
    ) -> PlatformResult<()> {
        self.record("update_service_credentials", service)?;
        self.with_service_mut(service, |existing| existing.credentials = Some(credentials.clone()))?;
        self.trigger(service, ServiceOperationType::Update)
    }

    async fn update_service_syslog_url(
        &self,
        service: &str,
        url: Option<&str>,
    ) -> PlatformResult<()> {
        self.record("update_service_syslog_url", service)?;
        self.with_service_mut(service, |existing| {
            existing.syslog_drain_url = url.map(str::to_string);
        })
    }

    async fn delete_service(&self, service: &str) -> PlatformResult<()> {
        self.record("delete_service", service)?;
        let managed = self.with_service_mut(service, |existing| existing.kind == ServiceKind::Managed)?;
        if managed {
            self.trigger(service, ServiceOperationType::Delete)?;
            let finished = self.state.lock().service_operation_state == ServiceOperationState::Succeeded;
            if !finished {
                return Ok(());
            }
        }
        self.state.lock().services.remove(service);
        Ok(())
    }

    async fn get_service_keys(&self, service: &str) -> PlatformResult<Vec<ServiceKey>> {
        self.record("get_service_keys", service)?;
        self.with_service_mut(service, |existing| existing.keys.clone())
    }

    async fn create_service_key(&self, service: &str, key: &ServiceKey) -> PlatformResult<()> {
        self.record("create_service_key", &format!("{service}/{}", key.name))?;
        self.with_service_mut(service, |existing| {
            existing.keys.retain(|k| k.name != key.name);
            existing.keys.push(key.clone());
        })
    }

    async fn delete_service_key(&self, service: &str, key: &str) -> PlatformResult<()> {
        self.record("delete_service_key", &format!("{service}/{key}"))?;
        let removed = self.with_service_mut(service, |existing| {
            let before = existing.keys.len();
            existing.keys.retain(|k| k.name != key);
            before != existing.keys.len()
        })?;
        if removed {
            Ok(())
        } else {
            Err(PlatformError::not_found(format!("Service key {key} not found")))
        }
    }

    async fn bind_service(
        &self,
        app: &str,
        service: &str,
        parameters: Option<&Value>,
    ) -> PlatformResult<()> {
        self.record("bind_service", &format!("{app}/{service}"))?;
        self.with_service_mut(service, |existing| {
            existing.bindings.retain(|b| b.app_name != app);
            let mut binding = ServiceBinding::new(app, service);
            binding.parameters = parameters.cloned();
            existing.bindings.push(binding);
        })?;
        // Binding to a missing application is allowed by the fake.
        let _ = self.with_app_mut(app, |existing| {
            if !existing.bound_services.iter().any(|s| s == service) {
                existing.bound_services.push(service.to_string());
            }
        });
        Ok(())
    }

    async fn unbind_service(&self, app: &str, service: &str) -> PlatformResult<()> {
        self.record("unbind_service", &format!("{app}/{service}"))?;
        self.with_service_mut(service, |existing| existing.bindings.retain(|b| b.app_name != app))?;
        let _ = self.with_app_mut(app, |existing| existing.bound_services.retain(|s| s != service));
        Ok(())
    }

    async fn get_service_broker(&self, name: &str) -> PlatformResult<Option<ServiceBrokerSpec>> {
        self.record("get_service_broker", name)?;
        Ok(self.broker(name))
    }

    async fn create_service_broker(&self, broker: &ServiceBrokerSpec) -> PlatformResult<()> {
        self.record("create_service_broker", &broker.name)?;
        self.state.lock().brokers.insert(broker.name.clone(), broker.clone());
        Ok(())
    }

    async fn update_service_broker(&self, broker: &ServiceBrokerSpec) -> PlatformResult<()> {
        self.record("update_service_broker", &broker.name)?;
        self.state.lock().brokers.insert(broker.name.clone(), broker.clone());
        Ok(())
    }

    async fn delete_service_broker(&self, name: &str) -> PlatformResult<()> {
        self.record("delete_service_broker", name)?;
        match self.state.lock().brokers.remove(name) {
            Some(_) => Ok(()),
            None => Err(PlatformError::not_found(format!("Service broker {name} not found"))),
        }
    }
}

/// Hands out one [`FakePlatform`] per target; unknown targets are forbidden
#[derive(Debug, Default)]
pub struct FakeClientProvider {
    clients: Mutex<BTreeMap<CloudTarget, FakePlatform>>,
    spaces: Mutex<BTreeMap<String, CloudTarget>>,
    requests: Mutex<Vec<(String, CloudTarget)>>,
}

impl FakeClientProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(self, target: CloudTarget, platform: FakePlatform) -> Self {
        self.clients.lock().insert(target, platform);
        self
    }

    pub fn with_space(self, space_guid: impl Into<String>, target: CloudTarget) -> Self {
        self.spaces.lock().insert(space_guid.into(), target);
        self
    }

    /// (user, target) pairs clients were requested for
    pub fn requests(&self) -> Vec<(String, CloudTarget)> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl PlatformClientProvider for FakeClientProvider {
    async fn client_for(
        &self,
        user: &str,
        target: &CloudTarget,
    ) -> PlatformResult<Arc<dyn PlatformClient>> {
        self.requests.lock().push((user.to_string(), target.clone()));
        match self.clients.lock().get(target) {
            Some(platform) => Ok(Arc::new(platform.clone())),
            None => Err(PlatformError::forbidden(format!(
                "User {user} is not authorized for {target}"
            ))),
        }
    }

    async fn resolve_space(&self, space_guid: &str) -> PlatformResult<Option<CloudTarget>> {
        Ok(self.spaces.lock().get(space_guid).cloned())
    }
}

/// Log lines per application, served oldest first
#[derive(Debug, Default)]
pub struct FakeLogReader {
    logs: Mutex<BTreeMap<String, Vec<ApplicationLog>>>,
}

impl FakeLogReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, app: &str, log: ApplicationLog) {
        let mut logs = self.logs.lock();
        let lines = logs.entry(app.to_string()).or_default();
        lines.push(log);
        lines.sort_by_key(|line| line.timestamp);
    }
}

#[async_trait]
impl LogStreamReader for FakeLogReader {
    async fn recent_logs(
        &self,
        app: &str,
        since: Option<DateTime<Utc>>,
    ) -> PlatformResult<Vec<ApplicationLog>> {
        Ok(self
            .logs
            .lock()
            .get(app)
            .map(|lines| {
                lines
                    .iter()
                    .filter(|line| since.map_or(true, |since| line.timestamp >= since))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}
