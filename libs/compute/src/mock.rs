//! In-memory compute service for testing and development.
//!
//! Inserted instances become visible immediately with fixed addresses; zone
//! operations can be scripted to stay pending for a number of polls or to
//! finish with errors. Every call is recorded.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tracing::debug;

use crate::error::ComputeError;
use crate::model::{Instance, Operation, OperationError, OperationErrorDetail, OperationStatus, Zone};
use crate::service::ComputeService;

/// Internal IP assigned to every mock network interface.
pub const MOCK_INTERNAL_IP: &str = "10.0.0.15";

/// External IP assigned to every mock access config.
pub const MOCK_EXTERNAL_IP: &str = "35.243.147.143";

/// A recorded call against the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    InstancesInsert { project: String, zone: String, instance: Box<Instance> },
    InstancesGet { project: String, zone: String, name: String },
    InstancesDelete { project: String, zone: String, name: String },
    ZonesGet { project: String, zone: String },
    ZoneOperationsGet { project: String, zone: String, operation: String },
}

impl MockCall {
    pub const INSTANCES_INSERT: &'static str = "instances.insert";
    pub const INSTANCES_GET: &'static str = "instances.get";
    pub const INSTANCES_DELETE: &'static str = "instances.delete";
    pub const ZONES_GET: &'static str = "zones.get";
    pub const ZONE_OPERATIONS_GET: &'static str = "zoneOperations.get";

    /// API method name of the call.
    pub fn method(&self) -> &'static str {
        match self {
            Self::InstancesInsert { .. } => Self::INSTANCES_INSERT,
            Self::InstancesGet { .. } => Self::INSTANCES_GET,
            Self::InstancesDelete { .. } => Self::INSTANCES_DELETE,
            Self::ZonesGet { .. } => Self::ZONES_GET,
            Self::ZoneOperationsGet { .. } => Self::ZONE_OPERATIONS_GET,
        }
    }
}

type InstanceKey = (String, String, String);

struct MockOperation {
    operation: Operation,
    remaining_polls: u32,
}

#[derive(Default)]
struct MockState {
    instances: BTreeMap<InstanceKey, Instance>,
    missing_zones: BTreeSet<(String, String)>,
    operations: BTreeMap<String, MockOperation>,
    pending_polls: u32,
    operation_errors: Vec<OperationErrorDetail>,
    failures: BTreeMap<&'static str, ComputeError>,
    calls: Vec<MockCall>,
    next_id: u64,
}

impl MockState {
    fn injected_failure(&self, method: &'static str) -> Result<(), ComputeError> {
        match self.failures.get(method) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn start_operation(&mut self, operation_type: &str, target: &str) -> Operation {
        self.next_id += 1;
        let operation = Operation {
            name: format!("operation-{}-{}", operation_type, self.next_id),
            operation_type: operation_type.to_string(),
            status: OperationStatus::Pending,
            target_link: target.to_string(),
            error: None,
        };
        self.operations.insert(
            operation.name.clone(),
            MockOperation {
                operation: operation.clone(),
                remaining_polls: self.pending_polls,
            },
        );
        operation
    }
}

fn key(project: &str, zone: &str, name: &str) -> InstanceKey {
    (project.to_string(), zone.to_string(), name.to_string())
}

/// Mock compute service.
#[derive(Default)]
pub struct MockComputeService {
    state: Mutex<MockState>,
}

impl MockComputeService {
    /// Create a mock where every zone resolves and no instance exists.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an existing instance.
    pub fn with_instance(self, project: &str, zone: &str, instance: Instance) -> Self {
        self.insert_instance(project, zone, instance);
        self
    }

    /// Make `zones.get` report the zone as missing.
    pub fn with_missing_zone(self, project: &str, zone: &str) -> Self {
        self.state()
            .missing_zones
            .insert((project.to_string(), zone.to_string()));
        self
    }

    /// Keep new operations pending for `polls` fetches before they finish.
    pub fn with_pending_polls(self, polls: u32) -> Self {
        self.state().pending_polls = polls;
        self
    }

    /// Finish new operations with the given errors.
    pub fn with_operation_errors(self, errors: Vec<OperationErrorDetail>) -> Self {
        self.state().operation_errors = errors;
        self
    }

    /// Fail every call of `method` (see `MockCall` constants) with `err`.
    pub fn with_failure(self, method: &'static str, err: ComputeError) -> Self {
        self.fail(method, err);
        self
    }

    pub fn fail(&self, method: &'static str, err: ComputeError) {
        self.state().failures.insert(method, err);
    }

    pub fn clear_failure(&self, method: &'static str) {
        self.state().failures.remove(method);
    }

    pub fn insert_instance(&self, project: &str, zone: &str, instance: Instance) {
        self.state()
            .instances
            .insert(key(project, zone, &instance.name), instance);
    }

    pub fn instance(&self, project: &str, zone: &str, name: &str) -> Option<Instance> {
        self.state().instances.get(&key(project, zone, name)).cloned()
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.state().calls.clone()
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|c| c.method() == method)
            .count()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl ComputeService for MockComputeService {
    async fn instances_insert(
        &self,
        project: &str,
        zone: &str,
        instance: &Instance,
    ) -> Result<Operation, ComputeError> {
        let mut state = self.state();
        state.calls.push(MockCall::InstancesInsert {
            project: project.to_string(),
            zone: zone.to_string(),
            instance: Box::new(instance.clone()),
        });
        state.injected_failure(MockCall::INSTANCES_INSERT)?;

        let key = key(project, zone, &instance.name);
        if state.instances.contains_key(&key) {
            return Err(ComputeError::conflict(format!(
                "The resource 'projects/{project}/zones/{zone}/instances/{}' already exists",
                instance.name
            )));
        }

        state.next_id += 1;
        let mut created = instance.clone();
        created.id = Some(state.next_id);
        created.status = "RUNNING".to_string();
        created.zone = zone.to_string();
        for nic in &mut created.network_interfaces {
            nic.network_ip = MOCK_INTERNAL_IP.to_string();
            for config in &mut nic.access_configs {
                config.nat_ip = MOCK_EXTERNAL_IP.to_string();
            }
        }
        state.instances.insert(key, created);

        debug!(project, zone, instance = %instance.name, "[MOCK] Inserted instance");
        Ok(state.start_operation("insert", &instance.name))
    }

    async fn instances_get(
        &self,
        project: &str,
        zone: &str,
        name: &str,
    ) -> Result<Instance, ComputeError> {
        let mut state = self.state();
        state.calls.push(MockCall::InstancesGet {
            project: project.to_string(),
            zone: zone.to_string(),
            name: name.to_string(),
        });
        state.injected_failure(MockCall::INSTANCES_GET)?;

        state
            .instances
            .get(&key(project, zone, name))
            .cloned()
            .ok_or_else(|| {
                ComputeError::not_found(format!(
                    "The resource 'projects/{project}/zones/{zone}/instances/{name}' was not found"
                ))
            })
    }

    async fn instances_delete(
        &self,
        project: &str,
        zone: &str,
        name: &str,
    ) -> Result<Operation, ComputeError> {
        let mut state = self.state();
        state.calls.push(MockCall::InstancesDelete {
            project: project.to_string(),
            zone: zone.to_string(),
            name: name.to_string(),
        });
        state.injected_failure(MockCall::INSTANCES_DELETE)?;

        if state.instances.remove(&key(project, zone, name)).is_none() {
            return Err(ComputeError::not_found(format!(
                "The resource 'projects/{project}/zones/{zone}/instances/{name}' was not found"
            )));
        }

        debug!(project, zone, instance = %name, "[MOCK] Deleted instance");
        Ok(state.start_operation("delete", name))
    }

    async fn zones_get(&self, project: &str, zone: &str) -> Result<Zone, ComputeError> {
        let mut state = self.state();
        state.calls.push(MockCall::ZonesGet {
            project: project.to_string(),
            zone: zone.to_string(),
        });
        state.injected_failure(MockCall::ZONES_GET)?;

        if state
            .missing_zones
            .contains(&(project.to_string(), zone.to_string()))
        {
            return Err(ComputeError::not_found(format!(
                "The resource 'projects/{project}/zones/{zone}' was not found"
            )));
        }

        Ok(Zone {
            name: zone.to_string(),
            status: "UP".to_string(),
            region: zone.rsplit_once('-').map(|(r, _)| r.to_string()).unwrap_or_default(),
        })
    }

    async fn zone_operations_get(
        &self,
        project: &str,
        zone: &str,
        operation: &str,
    ) -> Result<Operation, ComputeError> {
        let mut state = self.state();
        state.calls.push(MockCall::ZoneOperationsGet {
            project: project.to_string(),
            zone: zone.to_string(),
            operation: operation.to_string(),
        });
        state.injected_failure(MockCall::ZONE_OPERATIONS_GET)?;

        let errors = state.operation_errors.clone();
        let tracked = state.operations.get_mut(operation).ok_or_else(|| {
            ComputeError::not_found(format!(
                "The resource 'projects/{project}/zones/{zone}/operations/{operation}' was not found"
            ))
        })?;

        if tracked.remaining_polls > 0 {
            tracked.remaining_polls -= 1;
            tracked.operation.status = OperationStatus::Running;
        } else {
            tracked.operation.status = OperationStatus::Done;
            if !errors.is_empty() {
                tracked.operation.error = Some(OperationError { errors });
            }
        }

        Ok(tracked.operation.clone())
    }
}
