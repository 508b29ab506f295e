//! Per-invocation machine scope.
//!
//! A scope is acquired at the start of one actuator operation and released
//! exactly once, either by `close` (persist the status if it changed) or by
//! `discard` (drop every change). Dropping a scope that still carries status
//! changes logs a warning; nothing is written in that case.

use std::sync::Arc;

use capg_api::{provider_id, GcpMachineProviderSpec, Machine, MachineStatus};
use capg_compute::ComputeService;
use tracing::{debug, warn};

use crate::error::{ActuatorError, MachineError};
use crate::secrets::SecretStore;
use crate::status::InstanceProjection;
use crate::store::MachineStore;

/// Inputs for acquiring a scope.
pub struct MachineScopeParams<'a> {
    pub machine: &'a Machine,
    pub compute: Arc<dyn ComputeService>,
    pub secrets: Arc<dyn SecretStore>,
    /// Project used when the machine spec names none.
    pub default_project: Option<&'a str>,
}

pub struct MachineScope {
    machine: Machine,
    origin: MachineStatus,
    project_id: String,
    provider_id: String,
    compute: Arc<dyn ComputeService>,
    secrets: Arc<dyn SecretStore>,
    released: bool,
}

impl MachineScope {
    /// Acquire a scope for `params.machine`.
    pub fn new(params: MachineScopeParams<'_>) -> Result<Self, ActuatorError> {
        let machine = params.machine.clone();

        let project_id = machine
            .spec
            .project_id
            .as_deref()
            .or(params.default_project)
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .ok_or_else(|| {
                MachineError::invalid_configuration(format!(
                    "failed to create scope for machine {:?}: no project set in spec and no default project configured",
                    machine.name()
                ))
            })?;

        let provider_id = provider_id(&project_id, &machine.spec.zone, machine.name());

        Ok(Self {
            origin: machine.status.clone(),
            machine,
            project_id,
            provider_id,
            compute: params.compute,
            secrets: params.secrets,
            released: false,
        })
    }

    pub fn machine(&self) -> &Machine {
        &self.machine
    }

    pub fn name(&self) -> &str {
        self.machine.name()
    }

    pub fn namespace(&self) -> &str {
        self.machine.namespace()
    }

    pub fn spec(&self) -> &GcpMachineProviderSpec {
        &self.machine.spec
    }

    pub fn status(&self) -> &MachineStatus {
        &self.machine.status
    }

    pub fn zone(&self) -> &str {
        &self.machine.spec.zone
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// `gce://{project}/{zone}/{name}`.
    pub fn provider_id(&self) -> &str {
        &self.provider_id
    }

    pub fn compute(&self) -> &Arc<dyn ComputeService> {
        &self.compute
    }

    pub fn secrets(&self) -> &Arc<dyn SecretStore> {
        &self.secrets
    }

    /// Whether the status differs from the one the scope was acquired with.
    pub fn is_dirty(&self) -> bool {
        self.machine.status != self.origin
    }

    /// Write observed instance state into the status.
    pub(crate) fn apply_projection(&mut self, projection: InstanceProjection) {
        let status = &mut self.machine.status;
        status.addresses = projection.addresses;
        status.provider_status.instance_id = Some(projection.instance_id);
        status.provider_status.instance_state = Some(projection.instance_state);
        status.provider_id = Some(self.provider_id.clone());
    }

    pub(crate) fn record_error(&mut self, err: &MachineError) {
        self.machine.status.error_reason = Some(err.reason);
        self.machine.status.error_message = Some(err.message.clone());
    }

    pub(crate) fn clear_error(&mut self) {
        self.machine.status.error_reason = None;
        self.machine.status.error_message = None;
    }

    /// Release the scope, persisting the status when it changed.
    pub async fn close(mut self, store: &dyn MachineStore) -> Result<(), ActuatorError> {
        self.released = true;

        if !self.is_dirty() {
            debug!(machine = %self.name(), "Machine status unchanged, nothing to persist");
            return Ok(());
        }

        store
            .update_status(&self.machine)
            .await
            .map_err(|source| ActuatorError::Store {
                machine: self.machine.name().to_string(),
                source,
            })?;

        debug!(machine = %self.name(), "Persisted machine status");
        Ok(())
    }

    /// Release the scope without persisting anything.
    pub fn discard(mut self) {
        self.released = true;
    }
}

impl Drop for MachineScope {
    fn drop(&mut self) {
        if !self.released && self.is_dirty() {
            warn!(
                machine = %self.name(),
                "Machine scope dropped without being closed, status changes discarded"
            );
        }
    }
}
