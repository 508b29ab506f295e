//! Waiting on zone operations.

use capg_compute::{ComputeError, ComputeService, Operation};
use capg_reconcile::{poll_until, PollConfig, PollError, Progress};
use tracing::debug;

use crate::error::ActuatorError;

/// Polls a zone operation until it is `DONE`.
#[derive(Debug, Clone, Default)]
pub struct OperationWaiter {
    config: PollConfig,
}

impl OperationWaiter {
    pub fn new(config: PollConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    /// Wait for `operation`.
    ///
    /// A fetch error aborts at once. An operation that finishes with errors
    /// fails with every error it carries.
    pub async fn wait(
        &self,
        compute: &dyn ComputeService,
        project: &str,
        zone: &str,
        operation: &str,
    ) -> Result<Operation, ActuatorError> {
        debug!(project, zone, operation, "Waiting for operation");

        let polled = poll_until(&self.config, move || async move {
            let op = compute.zone_operations_get(project, zone, operation).await?;
            debug!(operation, status = %op.status, "Polled operation");
            Ok::<_, ComputeError>(if op.is_done() {
                Progress::Done(op)
            } else {
                Progress::Pending(op)
            })
        })
        .await;

        let (op, attempts) = match polled {
            Ok(done) => done,
            Err(PollError::Aborted(source)) => {
                return Err(ActuatorError::provider(
                    format!("failed to get operation {operation} in {project}/{zone}"),
                    source,
                ))
            }
            Err(PollError::Timeout {
                elapsed,
                attempts,
                last,
            }) => {
                return Err(ActuatorError::OperationTimeout {
                    operation: operation.to_string(),
                    elapsed,
                    attempts,
                    last: last.map(Box::new),
                })
            }
        };

        if !op.errors().is_empty() {
            return Err(ActuatorError::OperationFailed {
                operation: operation.to_string(),
                errors: op.errors().to_vec(),
            });
        }

        debug!(operation, attempts, "Operation done");
        Ok(op)
    }
}
