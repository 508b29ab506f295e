//! Instance descriptor built from a machine spec.

use capg_api::{Machine, USER_DATA_METADATA_KEY};
use capg_compute::{
    AccessConfig, AttachedDisk, AttachedDiskInitializeParams, Instance, Metadata, MetadataItem,
    NetworkInterface, ServiceAccount, Tags,
};

/// Build the insert request for `machine` in `project`.
///
/// `user_data` is the already encoded boot data; it is always sent under the
/// `user-data` key, ahead of the machine's own metadata items.
pub fn build_instance(machine: &Machine, project: &str, user_data: &str) -> Instance {
    let spec = &machine.spec;
    let zone = &spec.zone;

    let disks = spec
        .disks
        .iter()
        .map(|disk| AttachedDisk {
            auto_delete: disk.auto_delete,
            boot: disk.boot,
            initialize_params: Some(AttachedDiskInitializeParams {
                disk_size_gb: u64::try_from(disk.size_gb).ok(),
                disk_type: format!("zones/{zone}/diskTypes/{}", disk.disk_type),
                labels: disk.labels.clone(),
                source_image: disk.image.clone(),
            }),
        })
        .collect();

    let network_interfaces = spec
        .network_interfaces
        .iter()
        .map(|nic| NetworkInterface {
            network: if nic.network.is_empty() {
                String::new()
            } else {
                format!("projects/{project}/global/networks/{}", nic.network)
            },
            subnetwork: if nic.subnetwork.is_empty() {
                String::new()
            } else {
                format!("regions/{}/subnetworks/{}", spec.region, nic.subnetwork)
            },
            network_ip: String::new(),
            access_configs: vec![AccessConfig::ephemeral_external()],
        })
        .collect();

    let service_accounts = spec
        .service_accounts
        .iter()
        .map(|sa| ServiceAccount {
            email: sa.email.clone(),
            scopes: sa.scopes.clone(),
        })
        .collect();

    let mut items = Vec::with_capacity(spec.metadata.len() + 1);
    items.push(MetadataItem {
        key: USER_DATA_METADATA_KEY.to_string(),
        value: Some(user_data.to_string()),
    });
    items.extend(spec.metadata.iter().map(|m| MetadataItem {
        key: m.key.clone(),
        value: m.value.clone(),
    }));

    Instance {
        name: machine.name().to_string(),
        machine_type: format!("zones/{zone}/machineTypes/{}", spec.machine_type),
        can_ip_forward: spec.can_ip_forward,
        deletion_protection: spec.deletion_protection,
        labels: spec.labels.clone(),
        tags: Some(Tags {
            items: spec.tags.clone(),
        }),
        disks,
        network_interfaces,
        service_accounts,
        metadata: Some(Metadata { items }),
        ..Default::default()
    }
}
