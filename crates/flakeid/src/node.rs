use core::fmt;
use std::net::IpAddr;

use crate::id::SnowflakeId;

/// The (group ID, worker ID) pair that distinguishes one generator from every
/// other generator in a fleet.
///
/// Both fields are 5 bits wide. Out-of-range input is masked to the low five
/// bits instead of being rejected, so `NodeId::new(37, 0)` has group ID `5`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId {
    group_id: u8,
    worker_id: u8,
}

impl NodeId {
    /// Largest value either field can hold.
    pub const MAX: u8 = SnowflakeId::GROUP_ID_MASK as u8;

    pub const fn new(group_id: u8, worker_id: u8) -> Self {
        Self {
            group_id: group_id & SnowflakeId::GROUP_ID_MASK as u8,
            worker_id: worker_id & SnowflakeId::WORKER_ID_MASK as u8,
        }
    }

    /// Uses the same value for both the group and the worker field.
    pub const fn uniform(value: u8) -> Self {
        Self::new(value, value)
    }

    pub const fn group_id(&self) -> u8 {
        self.group_id
    }

    pub const fn worker_id(&self) -> u8 {
        self.worker_id
    }

    /// Derives an identity from the host's network interfaces.
    ///
    /// The third and fourth octets of the first non-loopback IPv4 address
    /// become the group and worker ID. If the interfaces cannot be listed, or
    /// none carries a usable IPv4 address, this returns `(0, 0)`.
    ///
    /// This is a convenience, not a uniqueness guarantee: hosts whose
    /// addresses share the last two octets (after masking) end up with the
    /// same identity. Fleets that care should configure identities
    /// explicitly.
    pub fn resolve() -> Self {
        match local_ip_address::list_afinet_netifas() {
            Ok(interfaces) => {
                let found = interfaces
                    .iter()
                    .find_map(|(name, addr)| usable_ipv4(*addr).map(|v4| (name, v4)));
                match found {
                    Some((_name, v4)) => {
                        let [_, _, group, worker] = v4.octets();
                        #[cfg(feature = "tracing")]
                        tracing::debug!(interface = %_name, addr = %v4, "resolved node identity");
                        Self::new(group, worker)
                    }
                    None => {
                        #[cfg(feature = "tracing")]
                        tracing::warn!("no non-loopback IPv4 interface, using node identity (0, 0)");
                        Self::default()
                    }
                }
            }
            Err(_e) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(error = %_e, "interface lookup failed, using node identity (0, 0)");
                Self::default()
            }
        }
    }

    /// Picks the identity from the first usable address in `addrs`, following
    /// the same rules as [`NodeId::resolve`].
    pub fn from_addrs<I>(addrs: I) -> Self
    where
        I: IntoIterator<Item = IpAddr>,
    {
        addrs
            .into_iter()
            .find_map(usable_ipv4)
            .map_or_else(Self::default, |v4| {
                let [_, _, group, worker] = v4.octets();
                Self::new(group, worker)
            })
    }
}

fn usable_ipv4(addr: IpAddr) -> Option<std::net::Ipv4Addr> {
    if addr.is_loopback() {
        return None;
    }
    match addr {
        IpAddr::V4(v4) => Some(v4),
        IpAddr::V6(v6) => v6.to_ipv4_mapped().filter(|v4| !v4.is_loopback()),
    }
}

impl From<u8> for NodeId {
    fn from(value: u8) -> Self {
        Self::uniform(value)
    }
}

impl From<(u8, u8)> for NodeId {
    fn from((group_id, worker_id): (u8, u8)) -> Self {
        Self::new(group_id, worker_id)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.group_id, self.worker_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, Ipv6Addr};

    #[test]
    fn out_of_range_values_are_masked() {
        let node = NodeId::uniform(37);
        assert_eq!(node.group_id(), 5);
        assert_eq!(node.worker_id(), 5);
        assert_eq!(NodeId::new(255, 32), NodeId::new(31, 0));
    }

    #[test]
    fn tuple_and_scalar_conversions() {
        assert_eq!(NodeId::from(7u8), NodeId::new(7, 7));
        assert_eq!(NodeId::from((1u8, 2u8)), NodeId::new(1, 2));
    }

    #[test]
    fn skips_loopback_and_uses_last_two_octets() {
        let addrs = [
            IpAddr::V4(Ipv4Addr::LOCALHOST),
            IpAddr::V6(Ipv6Addr::LOCALHOST),
            IpAddr::V4(Ipv4Addr::new(10, 0, 3, 17)),
            IpAddr::V4(Ipv4Addr::new(192, 168, 1, 2)),
        ];
        assert_eq!(NodeId::from_addrs(addrs), NodeId::new(3, 17));
    }

    #[test]
    fn octets_above_five_bits_are_masked() {
        let addrs = [IpAddr::V4(Ipv4Addr::new(192, 168, 40, 200))];
        assert_eq!(NodeId::from_addrs(addrs), NodeId::new(40 & 31, 200 & 31));
    }

    #[test]
    fn ipv6_only_hosts_fall_back_to_zero() {
        let addrs = [IpAddr::V6("fe80::1".parse().unwrap())];
        assert_eq!(NodeId::from_addrs(addrs), NodeId::new(0, 0));
        assert_eq!(NodeId::from_addrs(std::iter::empty()), NodeId::default());
    }

    #[test]
    fn ipv4_mapped_ipv6_counts_as_ipv4() {
        let mapped = Ipv4Addr::new(172, 16, 4, 9).to_ipv6_mapped();
        assert_eq!(NodeId::from_addrs([IpAddr::V6(mapped)]), NodeId::new(4, 9));
    }

    #[test]
    fn resolve_never_panics_and_stays_in_range() {
        let node = NodeId::resolve();
        assert!(node.group_id() <= NodeId::MAX);
        assert!(node.worker_id() <= NodeId::MAX);
    }
}
