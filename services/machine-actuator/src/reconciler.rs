//! Machine reconciliation against GCE instances.
//!
//! The reconciler works on a borrowed scope:
//! - `create` validates, inserts the instance and waits for the operation
//! - `exists` checks the zone, then looks the instance up
//! - `update` refreshes the status from the provider
//! - `delete` removes the instance if it is still there
//!
//! Status fields derived from the provider are only written after a
//! successful instance read.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use capg_api::validate_machine;
use capg_compute::{ComputeErrorKind, ComputeService};
use tracing::{debug, error, info};

use crate::error::{ActuatorError, MachineError};
use crate::events::{EventRecorder, EventType, REASON_CREATED, REASON_FAILED_CREATE};
use crate::instance::build_instance;
use crate::operation::OperationWaiter;
use crate::scope::MachineScope;
use crate::secrets::USER_DATA_SECRET_KEY;
use crate::status::project_instance;

pub struct Reconciler<'a> {
    scope: &'a mut MachineScope,
    events: &'a dyn EventRecorder,
    waiter: &'a OperationWaiter,
}

impl<'a> Reconciler<'a> {
    pub fn new(
        scope: &'a mut MachineScope,
        events: &'a dyn EventRecorder,
        waiter: &'a OperationWaiter,
    ) -> Self {
        Self {
            scope,
            events,
            waiter,
        }
    }

    fn compute(&self) -> Arc<dyn ComputeService> {
        Arc::clone(self.scope.compute())
    }

    /// Create the instance backing the machine.
    ///
    /// The status is refreshed whatever the outcome, so a partially created
    /// instance still shows up.
    pub async fn create(&mut self) -> Result<(), ActuatorError> {
        let result = match validate_machine(self.scope.machine()) {
            Ok(()) => self.insert_and_wait().await,
            Err(e) => Err(self.handle_machine_error(MachineError::invalid_configuration(
                format!("failed validating machine provider spec: {e}"),
            ))),
        };

        if let Err(e) = self.reconcile_with_cloud_state().await {
            debug!(
                machine = %self.scope.name(),
                error = %e,
                "Failed to refresh machine status after create"
            );
        }

        result?;

        self.scope.clear_error();
        self.events.event(
            self.scope.machine(),
            EventType::Normal,
            REASON_CREATED,
            format!("Created Machine {}", self.scope.name()),
        );
        Ok(())
    }

    async fn insert_and_wait(&mut self) -> Result<(), ActuatorError> {
        let user_data = match self.user_data().await {
            Ok(user_data) => user_data,
            Err(e) => return Err(self.handle_machine_error(e)),
        };

        let compute = self.compute();
        let project = self.scope.project_id().to_string();
        let zone = self.scope.zone().to_string();
        let instance = build_instance(self.scope.machine(), &project, &user_data);

        info!(
            machine = %self.scope.name(),
            project = %project,
            zone = %zone,
            "Creating instance"
        );

        let operation = match compute.instances_insert(&project, &zone, &instance).await {
            Ok(operation) => operation,
            Err(e) if e.kind() == ComputeErrorKind::InvalidArgument => {
                return Err(self.handle_machine_error(MachineError::create(format!(
                    "instance creation failed: {e}"
                ))));
            }
            Err(e) => {
                return Err(ActuatorError::provider(
                    format!("failed to create instance {} in {project}/{zone}", instance.name),
                    e,
                ))
            }
        };

        self.waiter
            .wait(compute.as_ref(), &project, &zone, &operation.name)
            .await?;

        info!(machine = %self.scope.name(), operation = %operation.name, "Instance created");
        Ok(())
    }

    /// Whether the instance exists.
    ///
    /// A missing zone or project is an error, not an absent instance.
    pub async fn exists(&self) -> Result<bool, ActuatorError> {
        validate_machine(self.scope.machine()).map_err(|e| {
            MachineError::invalid_configuration(format!(
                "failed validating machine provider spec: {e}"
            ))
        })?;

        let compute = self.compute();
        let project = self.scope.project_id();
        let zone = self.scope.zone();
        let name = self.scope.name();

        compute.zones_get(project, zone).await.map_err(|e| {
            ActuatorError::provider(
                format!("unable to verify project/zone exists: {project}/{zone}"),
                e,
            )
        })?;

        match compute.instances_get(project, zone, name).await {
            Ok(_) => {
                debug!(machine = %name, project, zone, "Instance exists");
                Ok(true)
            }
            Err(e) if e.is_not_found() => {
                debug!(machine = %name, project, zone, "Instance does not exist");
                Ok(false)
            }
            Err(e) => Err(ActuatorError::provider(
                format!("failed to get instance {name} in {project}/{zone}"),
                e,
            )),
        }
    }

    /// Refresh the status from the provider.
    pub async fn update(&mut self) -> Result<(), ActuatorError> {
        self.reconcile_with_cloud_state().await?;
        self.scope.clear_error();
        Ok(())
    }

    /// Delete the instance. An absent instance is already deleted.
    pub async fn delete(&mut self) -> Result<(), ActuatorError> {
        if !self.exists().await? {
            info!(machine = %self.scope.name(), "Instance already deleted");
            return Ok(());
        }

        let compute = self.compute();
        let project = self.scope.project_id().to_string();
        let zone = self.scope.zone().to_string();
        let name = self.scope.name().to_string();

        info!(machine = %name, project = %project, zone = %zone, "Deleting instance");

        let operation = match compute.instances_delete(&project, &zone, &name).await {
            Ok(operation) => operation,
            Err(e) if e.is_not_found() => {
                info!(machine = %name, "Instance disappeared before delete");
                return Ok(());
            }
            Err(e) => {
                return Err(ActuatorError::provider(
                    format!("failed to delete instance {name} in {project}/{zone}"),
                    e,
                ))
            }
        };

        self.waiter
            .wait(compute.as_ref(), &project, &zone, &operation.name)
            .await?;

        info!(machine = %name, operation = %operation.name, "Instance deleted");
        Ok(())
    }

    /// Read the instance and project it onto the status.
    pub async fn reconcile_with_cloud_state(&mut self) -> Result<(), ActuatorError> {
        let compute = self.compute();
        let (project, zone, name) = (self.scope.project_id(), self.scope.zone(), self.scope.name());
        let instance = compute
            .instances_get(project, zone, name)
            .await
            .map_err(|e| {
                ActuatorError::provider(
                    format!("failed to get instance {name} in {project}/{zone}"),
                    e,
                )
            })?;

        let projection = project_instance(&instance)?;
        debug!(
            machine = %self.scope.name(),
            state = %projection.instance_state,
            addresses = projection.addresses.len(),
            "Observed instance"
        );
        self.scope.apply_projection(projection);
        Ok(())
    }

    /// Boot data for the instance, base64 encoded.
    ///
    /// Empty when the machine references no secret.
    async fn user_data(&self) -> Result<String, MachineError> {
        let Some(secret) = &self.scope.spec().user_data_secret else {
            return Ok(String::new());
        };

        let data = self
            .scope
            .secrets()
            .get_secret(self.scope.namespace(), &secret.name)
            .await
            .map_err(|e| {
                MachineError::create(format!(
                    "error getting user data secret {:?} in namespace {:?}: {e}",
                    secret.name,
                    self.scope.namespace()
                ))
            })?;

        let value = data.get(USER_DATA_SECRET_KEY).ok_or_else(|| {
            MachineError::create(format!(
                "secret {}/{} does not have {USER_DATA_SECRET_KEY:?} field set; cannot create machine",
                self.scope.namespace(),
                secret.name
            ))
        })?;

        Ok(STANDARD.encode(value))
    }

    /// Surface a structured error on the status and as a warning event.
    fn handle_machine_error(&mut self, err: MachineError) -> ActuatorError {
        error!(
            machine = %self.scope.name(),
            reason = %err.reason,
            error = %err.message,
            "Machine create failed"
        );
        self.scope.record_error(&err);
        self.events.event(
            self.scope.machine(),
            EventType::Warning,
            REASON_FAILED_CREATE,
            err.message.clone(),
        );
        err.into()
    }
}
