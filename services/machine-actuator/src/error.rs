//! Error types for machine reconciliation.

use std::time::Duration;

use capg_api::MachineErrorReason;
use capg_compute::{ComputeError, Operation, OperationErrorDetail};
use thiserror::Error;

use crate::store::StoreError;

/// A structured machine error, surfaced on the machine status and as an event.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{reason}: {message}")]
pub struct MachineError {
    pub reason: MachineErrorReason,
    pub message: String,
}

impl MachineError {
    pub fn new(reason: MachineErrorReason, message: impl Into<String>) -> Self {
        Self {
            reason,
            message: message.into(),
        }
    }

    pub fn invalid_configuration(message: impl Into<String>) -> Self {
        Self::new(MachineErrorReason::InvalidConfiguration, message)
    }

    pub fn create(message: impl Into<String>) -> Self {
        Self::new(MachineErrorReason::CreateError, message)
    }
}

/// Errors returned by actuator operations.
#[derive(Debug, Error)]
pub enum ActuatorError {
    /// Structured error carrying a machine-readable reason.
    #[error(transparent)]
    Machine(#[from] MachineError),

    /// The instance, zone or project does not exist.
    #[error("{context}: {source}")]
    NotFound {
        context: String,
        #[source]
        source: ComputeError,
    },

    /// Any other compute API failure.
    #[error("{context}: {source}")]
    Provider {
        context: String,
        #[source]
        source: ComputeError,
    },

    /// The zone operation did not finish in time.
    #[error(
        "operation {operation} did not complete within {elapsed:?} after {attempts} polls (last status: {})",
        last_status(.last)
    )]
    OperationTimeout {
        operation: String,
        elapsed: Duration,
        attempts: u32,
        last: Option<Box<Operation>>,
    },

    /// The zone operation finished with errors.
    #[error("operation {operation} failed: the following errors occurred: [{}]", join(.errors))]
    OperationFailed {
        operation: String,
        errors: Vec<OperationErrorDetail>,
    },

    /// The provider returned an instance the status cannot be derived from.
    #[error("unexpected state of instance {instance}: {reason}")]
    UnexpectedInstance { instance: String, reason: String },

    /// Persisting the machine status failed.
    #[error("failed to persist machine {machine}: {source}")]
    Store {
        machine: String,
        #[source]
        source: StoreError,
    },
}

fn last_status(last: &Option<Box<Operation>>) -> String {
    match last {
        Some(op) => op.to_string(),
        None => "unknown".to_string(),
    }
}

fn join(errors: &[OperationErrorDetail]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl ActuatorError {
    /// Wrap a compute error, keeping not-found apart from other failures.
    pub fn provider(context: impl Into<String>, source: ComputeError) -> Self {
        let context = context.into();
        if source.is_not_found() {
            Self::NotFound { context, source }
        } else {
            Self::Provider { context, source }
        }
    }

    /// Machine-readable reason for structured errors.
    pub fn reason(&self) -> Option<MachineErrorReason> {
        match self {
            Self::Machine(err) => Some(err.reason),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Whether invoking the same operation again may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Machine(_) | Self::OperationFailed { .. } => false,
            Self::NotFound { .. } | Self::UnexpectedInstance { .. } => false,
            Self::Provider { .. } | Self::OperationTimeout { .. } | Self::Store { .. } => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use capg_compute::{ComputeErrorKind, OperationStatus};

    #[test]
    fn test_provider_keeps_not_found_apart() {
        let err = ActuatorError::provider("get", ComputeError::not_found("gone"));
        assert!(err.is_not_found());
        assert!(!err.is_retryable());

        let err = ActuatorError::provider(
            "get",
            ComputeError::new(ComputeErrorKind::Transport, "reset"),
        );
        assert!(!err.is_not_found());
        assert!(err.is_retryable());
        assert_eq!(err.to_string(), "get: transport: reset");
    }

    #[test]
    fn test_machine_error_reason() {
        let err: ActuatorError = MachineError::invalid_configuration("zone is required").into();
        assert_eq!(err.reason(), Some(MachineErrorReason::InvalidConfiguration));
        assert_eq!(err.to_string(), "InvalidConfiguration: zone is required");
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_operation_failed_preserves_every_message() {
        let err = ActuatorError::OperationFailed {
            operation: "operation-1".to_string(),
            errors: vec![
                OperationErrorDetail {
                    code: "QUOTA_EXCEEDED".to_string(),
                    message: "Quota 'CPUS' exceeded".to_string(),
                    ..Default::default()
                },
                OperationErrorDetail {
                    code: "ZONE_RESOURCE_POOL_EXHAUSTED".to_string(),
                    message: "no capacity".to_string(),
                    ..Default::default()
                },
            ],
        };

        let text = err.to_string();
        assert!(text.contains("QUOTA_EXCEEDED: Quota 'CPUS' exceeded"));
        assert!(text.contains("ZONE_RESOURCE_POOL_EXHAUSTED: no capacity"));
    }

    #[test]
    fn test_timeout_reports_last_snapshot() {
        let err = ActuatorError::OperationTimeout {
            operation: "operation-1".to_string(),
            elapsed: Duration::from_secs(180),
            attempts: 37,
            last: Some(Box::new(Operation {
                name: "operation-1".to_string(),
                operation_type: "insert".to_string(),
                status: OperationStatus::Running,
                target_link: String::new(),
                error: None,
            })),
        };

        assert!(err.is_retryable());
        assert!(err
            .to_string()
            .ends_with("(last status: operation-1 (insert, RUNNING))"));
    }
}
