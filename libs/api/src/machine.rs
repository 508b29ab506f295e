//! Machine resource types.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Metadata key under which custom boot data is handed to the instance.
pub const USER_DATA_METADATA_KEY: &str = "user-data";

/// Scheme prefix of provider IDs.
pub const PROVIDER_ID_SCHEME: &str = "gce";

/// Build the provider ID for an instance.
pub fn provider_id(project: &str, zone: &str, instance_name: &str) -> String {
    format!("{PROVIDER_ID_SCHEME}://{project}/{zone}/{instance_name}")
}

/// A machine resource as stored by the orchestrator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Machine {
    pub metadata: ObjectMeta,
    pub spec: GcpMachineProviderSpec,
    #[serde(default)]
    pub status: MachineStatus,
}

impl Machine {
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn namespace(&self) -> &str {
        &self.metadata.namespace
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    pub name: String,
    #[serde(default)]
    pub namespace: String,
}

/// Desired configuration of a GCE instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GcpMachineProviderSpec {
    pub zone: String,

    #[serde(default)]
    pub region: String,

    /// Project hosting the instance. Falls back to the actuator's default project.
    #[serde(default, rename = "projectID", skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,

    pub machine_type: String,

    #[serde(default)]
    pub labels: BTreeMap<String, String>,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default, rename = "canIPForward")]
    pub can_ip_forward: bool,

    #[serde(default)]
    pub deletion_protection: bool,

    #[serde(default)]
    pub disks: Vec<GcpDisk>,

    #[serde(default)]
    pub network_interfaces: Vec<GcpNetworkInterface>,

    #[serde(default)]
    pub service_accounts: Vec<GcpServiceAccount>,

    #[serde(default)]
    pub metadata: Vec<GcpMetadata>,

    /// Secret holding custom boot data under the `userData` key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_data_secret: Option<SecretReference>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GcpDisk {
    #[serde(default)]
    pub auto_delete: bool,
    #[serde(default)]
    pub boot: bool,
    pub size_gb: i64,
    #[serde(rename = "type")]
    pub disk_type: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GcpNetworkInterface {
    #[serde(default)]
    pub network: String,
    #[serde(default)]
    pub subnetwork: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GcpServiceAccount {
    pub email: String,
    #[serde(default)]
    pub scopes: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GcpMetadata {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretReference {
    pub name: String,
}

/// Observed state of a machine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineStatus {
    #[serde(default)]
    pub addresses: Vec<NodeAddress>,

    #[serde(default, rename = "providerID", skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,

    #[serde(default)]
    pub provider_status: GcpMachineProviderStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_reason: Option<MachineErrorReason>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GcpMachineProviderStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,

    /// Provider lifecycle string, e.g. `RUNNING` or `TERMINATED`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_state: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeAddress {
    #[serde(rename = "type")]
    pub address_type: NodeAddressType,
    pub address: String,
}

impl NodeAddress {
    pub fn internal(address: impl Into<String>) -> Self {
        Self {
            address_type: NodeAddressType::InternalIP,
            address: address.into(),
        }
    }

    pub fn external(address: impl Into<String>) -> Self {
        Self {
            address_type: NodeAddressType::ExternalIP,
            address: address.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[allow(clippy::upper_case_acronyms)]
pub enum NodeAddressType {
    InternalIP,
    ExternalIP,
}

/// Machine-readable reason attached to structured machine errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MachineErrorReason {
    InvalidConfiguration,
    CreateError,
    UpdateError,
    DeleteError,
}

impl MachineErrorReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidConfiguration => "InvalidConfiguration",
            Self::CreateError => "CreateError",
            Self::UpdateError => "UpdateError",
            Self::DeleteError => "DeleteError",
        }
    }
}

impl fmt::Display for MachineErrorReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_id_format() {
        assert_eq!(
            provider_id("my-project", "us-east1-b", "worker-0"),
            "gce://my-project/us-east1-b/worker-0"
        );
    }

    #[test]
    fn test_machine_manifest_field_names() {
        let json = serde_json::json!({
            "metadata": {"name": "worker-0", "namespace": "machines"},
            "spec": {
                "zone": "us-east1-b",
                "region": "us-east1",
                "projectID": "my-project",
                "machineType": "n1-standard-2",
                "canIPForward": true,
                "disks": [{"boot": true, "autoDelete": true, "sizeGb": 64, "type": "pd-ssd", "image": "rhcos"}],
                "networkInterfaces": [{"network": "default", "subnetwork": "workers"}],
                "userDataSecret": {"name": "worker-user-data"}
            }
        });

        let machine: Machine = serde_json::from_value(json).unwrap();
        assert_eq!(machine.name(), "worker-0");
        assert_eq!(machine.spec.project_id.as_deref(), Some("my-project"));
        assert!(machine.spec.can_ip_forward);
        assert_eq!(machine.spec.disks[0].disk_type, "pd-ssd");
        assert_eq!(machine.status, MachineStatus::default());
    }

    #[test]
    fn test_status_serializes_provider_id() {
        let status = MachineStatus {
            addresses: vec![NodeAddress::internal("10.0.0.2")],
            provider_id: Some("gce://p/z/n".to_string()),
            ..Default::default()
        };

        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["providerID"], "gce://p/z/n");
        assert_eq!(json["addresses"][0]["type"], "InternalIP");
        assert!(json.get("errorReason").is_none());
    }
}
