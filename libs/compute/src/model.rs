//! Compute API wire types.
//!
//! Field names follow the `compute/v1` JSON representation. Only the fields
//! the actuator reads or writes are modelled; unknown fields are ignored on
//! decode.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A VM instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instance {
    pub name: String,

    /// Provider-assigned numeric ID (output only).
    #[serde(
        default,
        with = "int64_string::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<u64>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub machine_type: String,

    #[serde(default)]
    pub can_ip_forward: bool,

    #[serde(default)]
    pub deletion_protection: bool,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Tags>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub disks: Vec<AttachedDisk>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub network_interfaces: Vec<NetworkInterface>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub service_accounts: Vec<ServiceAccount>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,

    /// Lifecycle state, e.g. `PROVISIONING`, `RUNNING`, `TERMINATED` (output only).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub status: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub zone: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tags {
    #[serde(default)]
    pub items: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachedDisk {
    #[serde(default)]
    pub auto_delete: bool,

    #[serde(default)]
    pub boot: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initialize_params: Option<AttachedDiskInitializeParams>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachedDiskInitializeParams {
    #[serde(
        default,
        with = "int64_string::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub disk_size_gb: Option<u64>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub disk_type: String,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub source_image: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInterface {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub network: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub subnetwork: String,

    /// Internal IP assigned by the provider (output only).
    #[serde(
        default,
        rename = "networkIP",
        skip_serializing_if = "String::is_empty"
    )]
    pub network_ip: String,

    #[serde(default)]
    pub access_configs: Vec<AccessConfig>,
}

/// External access configuration of a network interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessConfig {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    #[serde(default, rename = "type", skip_serializing_if = "String::is_empty")]
    pub access_type: String,

    /// External IP; left empty on insert to request an ephemeral address.
    #[serde(default, rename = "natIP", skip_serializing_if = "String::is_empty")]
    pub nat_ip: String,
}

impl AccessConfig {
    pub const ONE_TO_ONE_NAT: &'static str = "ONE_TO_ONE_NAT";

    /// Access config requesting an ephemeral external IP.
    pub fn ephemeral_external() -> Self {
        Self {
            name: "External NAT".to_string(),
            access_type: Self::ONE_TO_ONE_NAT.to_string(),
            nat_ip: String::new(),
        }
    }
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self::ephemeral_external()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceAccount {
    pub email: String,
    #[serde(default)]
    pub scopes: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default)]
    pub items: Vec<MetadataItem>,
}

impl Metadata {
    pub fn get(&self, key: &str) -> Option<&MetadataItem> {
        self.items.iter().find(|item| item.key == key)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataItem {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

/// A zone within a project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Zone {
    pub name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub region: String,
}

/// Status of a zone operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationStatus {
    Pending,
    Running,
    Done,
}

impl OperationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Done => "DONE",
        }
    }
}

impl std::fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handle to an asynchronous provider action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub name: String,

    #[serde(default)]
    pub operation_type: String,

    pub status: OperationStatus,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub target_link: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<OperationError>,
}

impl Operation {
    pub fn is_done(&self) -> bool {
        self.status == OperationStatus::Done
    }

    /// Errors reported on the operation, empty when none.
    pub fn errors(&self) -> &[OperationErrorDetail] {
        self.error
            .as_ref()
            .map(|e| e.errors.as_slice())
            .unwrap_or_default()
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}, {})", self.name, self.operation_type, self.status)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationError {
    #[serde(default)]
    pub errors: Vec<OperationErrorDetail>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationErrorDetail {
    #[serde(default)]
    pub code: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub location: String,
    #[serde(default)]
    pub message: String,
}

impl std::fmt::Display for OperationErrorDetail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// int64 fields travel as JSON strings; numbers are accepted on decode.
mod int64_string {
    pub mod option {
        use serde::{de, Deserialize, Deserializer, Serializer};

        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Str(String),
            Num(u64),
        }

        pub fn serialize<S: Serializer>(value: &Option<u64>, s: S) -> Result<S::Ok, S::Error> {
            match value {
                Some(v) => s.serialize_str(&v.to_string()),
                None => s.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u64>, D::Error> {
            match Option::<Repr>::deserialize(d)? {
                None => Ok(None),
                Some(Repr::Num(v)) => Ok(Some(v)),
                Some(Repr::Str(s)) => s.parse().map(Some).map_err(de::Error::custom),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_decodes_provider_response() {
        let json = serde_json::json!({
            "kind": "compute#instance",
            "id": "8374662917372621234",
            "name": "worker-0",
            "status": "RUNNING",
            "networkInterfaces": [{
                "networkIP": "10.0.0.15",
                "accessConfigs": [{"type": "ONE_TO_ONE_NAT", "name": "External NAT", "natIP": "35.243.147.143"}]
            }],
            "disks": [{"boot": true, "autoDelete": true}]
        });

        let instance: Instance = serde_json::from_value(json).unwrap();
        assert_eq!(instance.id, Some(8374662917372621234));
        assert_eq!(instance.network_interfaces[0].network_ip, "10.0.0.15");
        assert_eq!(
            instance.network_interfaces[0].access_configs[0].nat_ip,
            "35.243.147.143"
        );
    }

    #[test]
    fn test_insert_body_encodes_int64_as_string() {
        let instance = Instance {
            name: "worker-0".to_string(),
            disks: vec![AttachedDisk {
                boot: true,
                auto_delete: true,
                initialize_params: Some(AttachedDiskInitializeParams {
                    disk_size_gb: Some(128),
                    disk_type: "zones/us-east1-b/diskTypes/pd-ssd".to_string(),
                    ..Default::default()
                }),
            }],
            network_interfaces: vec![NetworkInterface {
                access_configs: vec![AccessConfig::ephemeral_external()],
                ..Default::default()
            }],
            ..Default::default()
        };

        let json = serde_json::to_value(&instance).unwrap();
        assert_eq!(json["disks"][0]["initializeParams"]["diskSizeGb"], "128");
        assert!(json.get("id").is_none());
        assert!(json.get("status").is_none());
        assert_eq!(
            json["networkInterfaces"][0]["accessConfigs"][0]["type"],
            "ONE_TO_ONE_NAT"
        );
        assert!(json["networkInterfaces"][0]["accessConfigs"][0]
            .get("natIP")
            .is_none());
    }

    #[test]
    fn test_operation_errors() {
        let json = serde_json::json!({
            "name": "operation-123",
            "operationType": "insert",
            "status": "DONE",
            "error": {"errors": [
                {"code": "QUOTA_EXCEEDED", "message": "Quota 'CPUS' exceeded"},
                {"code": "RESOURCE_NOT_READY", "message": "disk not ready"}
            ]}
        });

        let op: Operation = serde_json::from_value(json).unwrap();
        assert!(op.is_done());
        assert_eq!(op.errors().len(), 2);
        assert_eq!(op.errors()[0].to_string(), "QUOTA_EXCEEDED: Quota 'CPUS' exceeded");
    }

    #[test]
    fn test_operation_without_errors() {
        let op = Operation {
            name: "operation-1".to_string(),
            operation_type: "delete".to_string(),
            status: OperationStatus::Running,
            target_link: String::new(),
            error: None,
        };
        assert!(!op.is_done());
        assert!(op.errors().is_empty());
        assert_eq!(op.to_string(), "operation-1 (delete, RUNNING)");
    }
}
