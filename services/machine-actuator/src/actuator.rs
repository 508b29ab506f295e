//! Actuator entry points.
//!
//! Every call acquires a fresh scope for the machine, runs one reconciler
//! operation and releases the scope. `create` and `update` persist the status
//! when it changed; `exists` and `delete` never write.

use std::sync::Arc;

use capg_api::Machine;
use capg_compute::ComputeService;
use capg_reconcile::PollConfig;
use tracing::{error, info};

use crate::error::ActuatorError;
use crate::events::EventRecorder;
use crate::operation::OperationWaiter;
use crate::reconciler::Reconciler;
use crate::scope::{MachineScope, MachineScopeParams};
use crate::secrets::SecretStore;
use crate::store::MachineStore;

/// Actuator settings.
#[derive(Debug, Clone, Default)]
pub struct ActuatorConfig {
    /// Project used for machines whose spec names none.
    pub default_project: Option<String>,

    /// Zone operation polling.
    pub operation_poll: PollConfig,
}

/// Collaborators of an actuator.
pub struct ActuatorParams {
    pub compute: Arc<dyn ComputeService>,
    pub secrets: Arc<dyn SecretStore>,
    pub store: Arc<dyn MachineStore>,
    pub events: Arc<dyn EventRecorder>,
    pub config: ActuatorConfig,
}

pub struct Actuator {
    compute: Arc<dyn ComputeService>,
    secrets: Arc<dyn SecretStore>,
    store: Arc<dyn MachineStore>,
    events: Arc<dyn EventRecorder>,
    default_project: Option<String>,
    waiter: OperationWaiter,
}

impl Actuator {
    pub fn new(params: ActuatorParams) -> Self {
        Self {
            compute: params.compute,
            secrets: params.secrets,
            store: params.store,
            events: params.events,
            default_project: params.config.default_project,
            waiter: OperationWaiter::new(params.config.operation_poll),
        }
    }

    fn scope(&self, machine: &Machine) -> Result<MachineScope, ActuatorError> {
        MachineScope::new(MachineScopeParams {
            machine,
            compute: Arc::clone(&self.compute),
            secrets: Arc::clone(&self.secrets),
            default_project: self.default_project.as_deref(),
        })
    }

    /// Create the instance for `machine` and persist the resulting status.
    pub async fn create(&self, machine: &Machine) -> Result<(), ActuatorError> {
        info!(machine = %machine.name(), "Creating machine");
        let mut scope = self.scope(machine)?;
        let result = Reconciler::new(&mut scope, self.events.as_ref(), &self.waiter)
            .create()
            .await;
        if let Err(e) = &result {
            log_failure(&scope, "create", e);
        }
        let closed = scope.close(self.store.as_ref()).await;
        result.and(closed)
    }

    /// Whether the instance for `machine` exists. Never persists.
    pub async fn exists(&self, machine: &Machine) -> Result<bool, ActuatorError> {
        info!(machine = %machine.name(), "Checking if machine exists");
        let mut scope = self.scope(machine)?;
        let result = Reconciler::new(&mut scope, self.events.as_ref(), &self.waiter)
            .exists()
            .await;
        if let Err(e) = &result {
            log_failure(&scope, "exists", e);
        }
        scope.discard();
        result
    }

    /// Refresh the status of `machine` from the provider and persist it.
    pub async fn update(&self, machine: &Machine) -> Result<(), ActuatorError> {
        info!(machine = %machine.name(), "Updating machine");
        let mut scope = self.scope(machine)?;
        let result = Reconciler::new(&mut scope, self.events.as_ref(), &self.waiter)
            .update()
            .await;
        if let Err(e) = &result {
            log_failure(&scope, "update", e);
        }
        let closed = scope.close(self.store.as_ref()).await;
        result.and(closed)
    }

    /// Delete the instance for `machine`.
    pub async fn delete(&self, machine: &Machine) -> Result<(), ActuatorError> {
        info!(machine = %machine.name(), "Deleting machine");
        let mut scope = self.scope(machine)?;
        let result = Reconciler::new(&mut scope, self.events.as_ref(), &self.waiter)
            .delete()
            .await;
        if let Err(e) = &result {
            log_failure(&scope, "delete", e);
        }
        scope.discard();
        result
    }
}

fn log_failure(scope: &MachineScope, operation: &str, err: &ActuatorError) {
    error!(
        machine = %scope.name(),
        project = %scope.project_id(),
        zone = %scope.zone(),
        operation,
        reason = ?err.reason(),
        retryable = err.is_retryable(),
        error = %err,
        "Machine operation failed"
    );
}
