//! # capg-machine-actuator
//!
//! Reconciles machine resources against GCE instances.
//!
//! ## Architecture
//!
//! - **Actuator**: entry points, one scope per call
//! - **Scope**: working copy of the machine, released with `close` or `discard`
//! - **Reconciler**: create/exists/update/delete against the compute API
//! - **Operation waiter**: bounded polling of zone operations
//! - **Status projection**: addresses and provider status from an instance read
//!
//! Secrets, events and status persistence sit behind traits so the binary and
//! the tests can plug in their own implementations.

mod actuator;
mod config;
mod error;
mod events;
mod instance;
mod operation;
mod reconciler;
mod scope;
mod secrets;
mod status;
mod store;

pub use actuator::{Actuator, ActuatorConfig, ActuatorParams};
pub use config::Config;
pub use error::{ActuatorError, MachineError};
pub use events::{
    Event, EventRecorder, EventType, FakeRecorder, ObjectReference, TracingRecorder,
    REASON_CREATED, REASON_FAILED_CREATE,
};
pub use instance::build_instance;
pub use operation::OperationWaiter;
pub use reconciler::Reconciler;
pub use scope::{MachineScope, MachineScopeParams};
pub use secrets::{
    DirectorySecretStore, InMemorySecretStore, SecretData, SecretError, SecretStore,
    USER_DATA_SECRET_KEY,
};
pub use status::{project_instance, InstanceProjection};
pub use store::{FileMachineStore, InMemoryMachineStore, MachineStore, StoreError};
