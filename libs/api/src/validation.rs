//! Structural validation of machine resources.
//!
//! Admission may already have run the same checks; running them again is
//! harmless since validation never touches the resource.

use std::collections::BTreeSet;

use thiserror::Error;

use crate::machine::{Machine, USER_DATA_METADATA_KEY};

/// Maximum length of a GCE instance name.
pub const MAX_INSTANCE_NAME_LENGTH: usize = 63;

/// Validation failures for a machine resource.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A single field is invalid.
    #[error("{field}: {reason}")]
    InvalidField { field: String, reason: String },

    /// Several fields are invalid.
    #[error("{}", join(.0))]
    Multiple(Vec<ValidationError>),
}

impl ValidationError {
    fn field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Flattened list of individual violations.
    pub fn violations(&self) -> Vec<&ValidationError> {
        match self {
            Self::InvalidField { .. } => vec![self],
            Self::Multiple(errors) => errors.iter().flat_map(|e| e.violations()).collect(),
        }
    }
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Validate an instance name against GCE naming rules.
pub fn validate_instance_name(name: &str) -> Result<(), ValidationError> {
    if name.is_empty() {
        return Err(ValidationError::field("metadata.name", "name cannot be empty"));
    }

    if name.len() > MAX_INSTANCE_NAME_LENGTH {
        return Err(ValidationError::field(
            "metadata.name",
            format!("name exceeds {MAX_INSTANCE_NAME_LENGTH} characters"),
        ));
    }

    if !name.starts_with(|c: char| c.is_ascii_lowercase()) {
        return Err(ValidationError::field(
            "metadata.name",
            "name must start with a lowercase letter",
        ));
    }

    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(ValidationError::field(
            "metadata.name",
            "name may only contain lowercase letters, digits and hyphens",
        ));
    }

    if name.ends_with('-') {
        return Err(ValidationError::field(
            "metadata.name",
            "name cannot end with a hyphen",
        ));
    }

    Ok(())
}

/// RFC 1123 label: lowercase alphanumerics and `-`, alphanumeric at both ends.
fn validate_dns_label(field: &str, value: &str) -> Result<(), ValidationError> {
    let valid = (1..=MAX_INSTANCE_NAME_LENGTH).contains(&value.len())
        && value
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && !value.starts_with('-')
        && !value.ends_with('-');

    if valid {
        Ok(())
    } else {
        Err(ValidationError::field(
            field,
            format!("'{value}' must be a DNS-1123 label"),
        ))
    }
}

/// Validate a machine resource, reporting every violation found.
pub fn validate_machine(machine: &Machine) -> Result<(), ValidationError> {
    let spec = &machine.spec;
    let mut errors = Vec::new();

    if let Err(e) = validate_instance_name(machine.name()) {
        errors.push(e);
    }

    if spec.zone.trim().is_empty() {
        errors.push(ValidationError::field("spec.zone", "zone is required"));
    }

    if spec.machine_type.trim().is_empty() {
        errors.push(ValidationError::field(
            "spec.machineType",
            "machine type is required",
        ));
    }

    if spec.project_id.as_deref().is_some_and(|p| p.trim().is_empty()) {
        errors.push(ValidationError::field(
            "spec.projectID",
            "project cannot be blank when set",
        ));
    }

    if spec.disks.is_empty() {
        errors.push(ValidationError::field(
            "spec.disks",
            "at least one disk is required",
        ));
    }

    let boot_disks = spec.disks.iter().filter(|d| d.boot).count();
    if !spec.disks.is_empty() && boot_disks != 1 {
        errors.push(ValidationError::field(
            "spec.disks",
            format!("exactly one boot disk is required, found {boot_disks}"),
        ));
    }

    for (i, disk) in spec.disks.iter().enumerate() {
        if disk.disk_type.trim().is_empty() {
            errors.push(ValidationError::field(
                format!("spec.disks[{i}].type"),
                "disk type is required",
            ));
        }
        if disk.size_gb <= 0 {
            errors.push(ValidationError::field(
                format!("spec.disks[{i}].sizeGb"),
                "disk size must be positive",
            ));
        }
        if disk.boot && disk.image.trim().is_empty() {
            errors.push(ValidationError::field(
                format!("spec.disks[{i}].image"),
                "boot disk requires a source image",
            ));
        }
    }

    if spec.network_interfaces.is_empty() {
        errors.push(ValidationError::field(
            "spec.networkInterfaces",
            "at least one network interface is required",
        ));
    }

    for (i, nic) in spec.network_interfaces.iter().enumerate() {
        if !nic.subnetwork.is_empty() && spec.region.trim().is_empty() {
            errors.push(ValidationError::field(
                format!("spec.networkInterfaces[{i}].subnetwork"),
                "subnetwork requires spec.region",
            ));
        }
    }

    for (i, sa) in spec.service_accounts.iter().enumerate() {
        if sa.email.trim().is_empty() {
            errors.push(ValidationError::field(
                format!("spec.serviceAccounts[{i}].email"),
                "service account email is required",
            ));
        }
    }

    let mut keys = BTreeSet::new();
    for (i, item) in spec.metadata.iter().enumerate() {
        let field = format!("spec.metadata[{i}].key");
        if item.key.is_empty() {
            errors.push(ValidationError::field(field, "metadata key cannot be empty"));
        } else if item.key == USER_DATA_METADATA_KEY {
            errors.push(ValidationError::field(
                field,
                format!("{USER_DATA_METADATA_KEY} is reserved, use userDataSecret"),
            ));
        } else if !keys.insert(item.key.as_str()) {
            errors.push(ValidationError::field(
                field,
                format!("duplicate metadata key '{}'", item.key),
            ));
        }
    }

    if !machine.namespace().is_empty() {
        if let Err(e) = validate_dns_label("metadata.namespace", machine.namespace()) {
            errors.push(e);
        }
    }

    if let Some(secret) = &spec.user_data_secret {
        if secret.name.trim().is_empty() {
            errors.push(ValidationError::field(
                "spec.userDataSecret.name",
                "secret name is required",
            ));
        } else if let Err(e) = validate_dns_label("spec.userDataSecret.name", &secret.name) {
            errors.push(e);
        }
    }

    match errors.len() {
        0 => Ok(()),
        1 => Err(errors.remove(0)),
        _ => Err(ValidationError::Multiple(errors)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::*;
    use proptest::prelude::*;

    fn valid_machine() -> Machine {
        Machine {
            metadata: ObjectMeta {
                name: "worker-0".to_string(),
                namespace: "machines".to_string(),
            },
            spec: GcpMachineProviderSpec {
                zone: "us-east1-b".to_string(),
                region: "us-east1".to_string(),
                machine_type: "n1-standard-2".to_string(),
                disks: vec![GcpDisk {
                    boot: true,
                    auto_delete: true,
                    size_gb: 64,
                    disk_type: "pd-ssd".to_string(),
                    image: "projects/rhcos/global/images/rhcos".to_string(),
                    ..Default::default()
                }],
                network_interfaces: vec![GcpNetworkInterface {
                    network: "default".to_string(),
                    subnetwork: "workers".to_string(),
                }],
                ..Default::default()
            },
            status: MachineStatus::default(),
        }
    }

    #[test]
    fn test_valid_machine_passes() {
        assert_eq!(validate_machine(&valid_machine()), Ok(()));
    }

    #[test]
    fn test_validation_is_repeatable() {
        let machine = valid_machine();
        let before = machine.clone();
        validate_machine(&machine).unwrap();
        validate_machine(&machine).unwrap();
        assert_eq!(machine, before);
    }

    #[test]
    fn test_missing_zone_and_machine_type_reported_together() {
        let mut machine = valid_machine();
        machine.spec.zone.clear();
        machine.spec.machine_type.clear();

        let err = validate_machine(&machine).unwrap_err();
        assert_eq!(err.violations().len(), 2);
        assert!(err.to_string().contains("spec.zone"));
        assert!(err.to_string().contains("spec.machineType"));
    }

    #[test]
    fn test_requires_exactly_one_boot_disk() {
        let mut machine = valid_machine();
        let mut data = machine.spec.disks[0].clone();
        data.image.clear();
        machine.spec.disks.push(data);

        let err = validate_machine(&machine).unwrap_err();
        assert!(err.to_string().contains("exactly one boot disk"));
    }

    #[test]
    fn test_subnetwork_requires_region() {
        let mut machine = valid_machine();
        machine.spec.region.clear();

        let err = validate_machine(&machine).unwrap_err();
        assert!(err
            .to_string()
            .contains("spec.networkInterfaces[0].subnetwork"));
    }

    #[test]
    fn test_user_data_metadata_key_is_reserved() {
        let mut machine = valid_machine();
        machine.spec.metadata.push(GcpMetadata {
            key: USER_DATA_METADATA_KEY.to_string(),
            value: Some("x".to_string()),
        });

        let err = validate_machine(&machine).unwrap_err();
        assert!(err.to_string().contains("reserved"));
    }

    #[test]
    fn test_duplicate_metadata_keys() {
        let mut machine = valid_machine();
        for _ in 0..2 {
            machine.spec.metadata.push(GcpMetadata {
                key: "startup-script".to_string(),
                value: None,
            });
        }

        let err = validate_machine(&machine).unwrap_err();
        assert!(err.to_string().contains("duplicate metadata key"));
    }

    #[test]
    fn test_user_data_secret_name_must_be_a_label() {
        for name in ["../../outside", "/etc/capg", "a/b", "..", "Secret", "-leading"] {
            let mut machine = valid_machine();
            machine.spec.user_data_secret = Some(SecretReference {
                name: name.to_string(),
            });

            let err = validate_machine(&machine).unwrap_err();
            assert!(
                err.to_string().contains("spec.userDataSecret.name"),
                "{name} was accepted"
            );
        }

        let mut machine = valid_machine();
        machine.spec.user_data_secret = Some(SecretReference {
            name: "worker-user-data".to_string(),
        });
        assert_eq!(validate_machine(&machine), Ok(()));
    }

    #[test]
    fn test_namespace_must_be_a_label() {
        let mut machine = valid_machine();
        machine.metadata.namespace = "../machines".to_string();

        let err = validate_machine(&machine).unwrap_err();
        assert!(err.to_string().contains("metadata.namespace"));
    }

    #[test]
    fn test_instance_name_rules() {
        assert!(validate_instance_name("a").is_ok());
        assert!(validate_instance_name("worker-0").is_ok());
        assert!(validate_instance_name("").is_err());
        assert!(validate_instance_name("0worker").is_err());
        assert!(validate_instance_name("Worker").is_err());
        assert!(validate_instance_name("worker-").is_err());
        assert!(validate_instance_name("worker_0").is_err());
        assert!(validate_instance_name(&"a".repeat(64)).is_err());
    }

    proptest! {
        #[test]
        fn prop_generated_names_are_valid(name in "[a-z]([-a-z0-9]{0,61}[a-z0-9])?") {
            prop_assert!(validate_instance_name(&name).is_ok());
        }

        #[test]
        fn prop_uppercase_names_are_rejected(name in "[a-z]{0,10}[A-Z][a-z]{0,10}") {
            prop_assert!(validate_instance_name(&name).is_err());
        }
    }
}
