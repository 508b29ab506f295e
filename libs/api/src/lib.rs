//! # capg-api
//!
//! Declarative machine resource for the GCE machine actuator.
//!
//! ## Design Principles
//!
//! - The provider spec is the desired state and is never mutated by reconciliation
//! - The status is only written from observed provider state
//! - Validation is structural, side-effect free and safe to repeat
//!
//! ## Resource Shape
//!
//! ```text
//! metadata: { name, namespace }
//! spec:     GcpMachineProviderSpec
//! status:
//!   addresses: [{type: InternalIP|ExternalIP, address}]
//!   providerID: gce://project/zone/instance-name
//!   providerStatus: { instanceId, instanceState }
//!   errorReason / errorMessage
//! ```

mod machine;
mod validation;

pub use machine::*;
pub use validation::{validate_instance_name, validate_machine, ValidationError};
