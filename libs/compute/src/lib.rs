//! # capg-compute
//!
//! Boundary to the GCE compute API used by the machine actuator.
//!
//! ## Modules
//!
//! - `model`: wire types for instances, zones and zone operations
//! - `error`: `ComputeError` with an explicit `ComputeErrorKind`
//! - `service`: the `ComputeService` trait consumed by reconciliation
//! - `client`: HTTP/JSON implementation against `compute/v1`
//! - `mock`: in-memory implementation for tests and dry runs
//!
//! Not-found detection is a match on `ComputeErrorKind::NotFound`; callers
//! never inspect transport errors themselves.

mod client;
mod error;
mod mock;
mod model;
mod service;

pub use client::{GceClient, GceClientConfig, TokenSource, DEFAULT_COMPUTE_ENDPOINT};
pub use error::{ComputeError, ComputeErrorKind};
pub use mock::{MockCall, MockComputeService, MOCK_EXTERNAL_IP, MOCK_INTERNAL_IP};
pub use model::*;
pub use service::ComputeService;
