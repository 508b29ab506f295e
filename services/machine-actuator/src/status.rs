//! Projection of an observed instance onto machine status.

use capg_api::NodeAddress;
use capg_compute::Instance;

use crate::error::ActuatorError;

/// Status fields derived from one instance read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceProjection {
    /// Internal IP of the first interface, then one external IP per access config.
    pub addresses: Vec<NodeAddress>,
    pub instance_id: String,
    pub instance_state: String,
}

/// Derive status fields from `instance`.
///
/// Fails when the instance has no network interface.
pub fn project_instance(instance: &Instance) -> Result<InstanceProjection, ActuatorError> {
    let nic = instance
        .network_interfaces
        .first()
        .ok_or_else(|| ActuatorError::UnexpectedInstance {
            instance: instance.name.clone(),
            reason: "could not find network interfaces for instance".to_string(),
        })?;

    let mut addresses = Vec::with_capacity(1 + nic.access_configs.len());
    addresses.push(NodeAddress::internal(nic.network_ip.clone()));
    addresses.extend(
        nic.access_configs
            .iter()
            .map(|config| NodeAddress::external(config.nat_ip.clone())),
    );

    Ok(InstanceProjection {
        addresses,
        instance_id: instance.name.clone(),
        instance_state: instance.status.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use capg_api::NodeAddressType;
    use capg_compute::{AccessConfig, NetworkInterface};

    #[test]
    fn test_addresses_in_provider_order() {
        let instance = Instance {
            name: "worker-0".to_string(),
            status: "RUNNING".to_string(),
            network_interfaces: vec![
                NetworkInterface {
                    network_ip: "10.0.0.15".to_string(),
                    access_configs: vec![
                        AccessConfig {
                            nat_ip: "35.243.147.143".to_string(),
                            ..Default::default()
                        },
                        AccessConfig {
                            nat_ip: "35.243.147.144".to_string(),
                            ..Default::default()
                        },
                    ],
                    ..Default::default()
                },
                NetworkInterface {
                    network_ip: "10.1.0.9".to_string(),
                    ..Default::default()
                },
            ],
            ..Default::default()
        };

        let projection = project_instance(&instance).unwrap();

        assert_eq!(
            projection.addresses,
            vec![
                NodeAddress::internal("10.0.0.15"),
                NodeAddress::external("35.243.147.143"),
                NodeAddress::external("35.243.147.144"),
            ]
        );
        assert_eq!(projection.addresses[0].address_type, NodeAddressType::InternalIP);
        assert_eq!(projection.instance_id, "worker-0");
        assert_eq!(projection.instance_state, "RUNNING");
    }

    #[test]
    fn test_no_network_interface_is_an_error() {
        let instance = Instance {
            name: "worker-0".to_string(),
            ..Default::default()
        };

        let err = project_instance(&instance).unwrap_err();
        assert!(matches!(err, ActuatorError::UnexpectedInstance { .. }));
    }
}
