use serde::{Deserialize, Serialize};

use crate::envelope::EntityId;
use crate::error::DomainError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Network {
    pub name: String,
    pub topology: NetworkTopology,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkTopology {
    Bridge,
    Dummy,
}

/// A subnet's CIDR is immutable after creation: the constructor is the only
/// place it is set, and there is no setter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subnet {
    pub network_id: EntityId,
    cidr: String,
}

impl Subnet {
    pub fn new(network_id: EntityId, cidr: impl Into<String>) -> Result<Self, DomainError> {
        let cidr = cidr.into();
        if cidr.parse::<ipnet_lite::IpNet>().is_err() {
            return Err(DomainError::InvalidConfig(format!("invalid CIDR '{cidr}'")));
        }
        Ok(Self { network_id, cidr })
    }

    pub fn cidr(&self) -> &str {
        &self.cidr
    }
}

/// References exactly one Node and one Subnet. IP leases are exclusive per
/// subnet; enforced by the storage adapter's uniqueness check on
/// (subnet_id, ip_address), not here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interface {
    pub node_id: EntityId,
    pub subnet_id: EntityId,
    pub ip_address: Option<String>,
    pub mac_address: Option<String>,
}

/// Minimal dependency-free CIDR parser: this workspace does not pull in a
/// networking crate for the single "is this syntactically a CIDR" check the
/// Subnet constructor needs.
mod ipnet_lite {
    use std::str::FromStr;

    pub struct IpNet;

    impl FromStr for IpNet {
        type Err = ();

        fn from_str(s: &str) -> Result<Self, Self::Err> {
            let (addr, prefix) = s.split_once('/').ok_or(())?;
            let octets: Vec<&str> = addr.split('.').collect();
            if octets.len() != 4 || !octets.iter().all(|o| o.parse::<u8>().is_ok()) {
                return Err(());
            }
            let prefix: u8 = prefix.parse().map_err(|_| ())?;
            if prefix > 32 {
                return Err(());
            }
            Ok(IpNet)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subnet_accepts_valid_cidr() {
        let subnet = Subnet::new(EntityId::new_v4(), "10.0.0.0/24").unwrap();
        assert_eq!(subnet.cidr(), "10.0.0.0/24");
    }

    #[test]
    fn subnet_rejects_malformed_cidr() {
        assert!(Subnet::new(EntityId::new_v4(), "not-a-cidr").is_err());
        assert!(Subnet::new(EntityId::new_v4(), "10.0.0.0/99").is_err());
    }
}
