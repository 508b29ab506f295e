//! Compute service interface.

use async_trait::async_trait;

use crate::error::ComputeError;
use crate::model::{Instance, Operation, Zone};

/// Calls the reconciler issues against the compute API.
///
/// Missing resources surface as `ComputeErrorKind::NotFound`.
#[async_trait]
pub trait ComputeService: Send + Sync {
    /// Submit an instance insert; returns the zone operation tracking it.
    async fn instances_insert(
        &self,
        project: &str,
        zone: &str,
        instance: &Instance,
    ) -> Result<Operation, ComputeError>;

    /// Fetch an instance by name.
    async fn instances_get(
        &self,
        project: &str,
        zone: &str,
        name: &str,
    ) -> Result<Instance, ComputeError>;

    /// Submit an instance delete; returns the zone operation tracking it.
    async fn instances_delete(
        &self,
        project: &str,
        zone: &str,
        name: &str,
    ) -> Result<Operation, ComputeError>;

    /// Fetch a zone, used to tell a missing zone apart from a missing instance.
    async fn zones_get(&self, project: &str, zone: &str) -> Result<Zone, ComputeError>;

    /// Fetch a zone operation by name.
    async fn zone_operations_get(
        &self,
        project: &str,
        zone: &str,
        operation: &str,
    ) -> Result<Operation, ComputeError>;
}
