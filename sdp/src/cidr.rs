use std::{fmt, net::IpAddr};

use ipnet::{IpNet, Ipv4Net, Ipv6Net};

use crate::{Error, Result};

pub trait AsOctets {
    type Octets: AsRef<[u8]>;
    fn as_octets(&self) -> Self::Octets;
}

impl AsOctets for Ipv4Net {
    type Octets = [u8; 4];

    fn as_octets(&self) -> Self::Octets {
        self.addr().octets()
    }
}

impl AsOctets for Ipv6Net {
    type Octets = [u8; 16];

    fn as_octets(&self) -> Self::Octets {
        self.addr().octets()
    }
}

/// Address constraint of a [Rule](crate::Rule).
///
/// A `Prefix` keeps the reference address as written, host bits included;
/// only the first `prefix_len` bits take part in matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressPredicate {
    /// Matches every address of either family.
    Any,
    /// Matches addresses sharing the leading bits of the reference.
    Prefix(IpNet),
}

impl AddressPredicate {
    /// Predicate matching addresses that share the first `prefix` bits with `reference`.
    ///
    /// `prefix` must be in `1..=32` for IPv4 and `1..=128` for IPv6.
    pub fn prefix(reference: IpAddr, prefix: u8) -> Result<Self> {
        let max = max_prefix_len(&reference);
        if prefix == 0 || prefix > max {
            return Err(Error::InvalidPrefix { prefix, max });
        }
        IpNet::new(reference, prefix)
            .map(Self::Prefix)
            .map_err(|_| Error::InvalidPrefix { prefix, max })
    }

    /// Predicate matching only `address` itself.
    pub fn exact(address: IpAddr) -> Self {
        Self::Prefix(IpNet::from(address))
    }

    pub fn matches(&self, candidate: &IpAddr) -> bool {
        match (self, candidate) {
            (Self::Any, _) => true,
            (Self::Prefix(IpNet::V4(net)), IpAddr::V4(candidate)) => {
                prefix_matches(net.as_octets(), candidate.octets(), net.prefix_len())
            }
            (Self::Prefix(IpNet::V6(net)), IpAddr::V6(candidate)) => {
                prefix_matches(net.as_octets(), candidate.octets(), net.prefix_len())
            }
            // No cross family matching, not even for mapped addresses.
            _ => false,
        }
    }
}

impl fmt::Display for AddressPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => write!(f, "*"),
            Self::Prefix(net) => write!(f, "{net}"),
        }
    }
}

fn max_prefix_len(address: &IpAddr) -> u8 {
    match address {
        IpAddr::V4(_) => 32,
        IpAddr::V6(_) => 128,
    }
}

fn prefix_matches(reference: impl AsRef<[u8]>, candidate: impl AsRef<[u8]>, prefix: u8) -> bool {
    let (reference, candidate) = (reference.as_ref(), candidate.as_ref());
    let whole = usize::from(prefix / 8);
    if reference[..whole] != candidate[..whole] {
        return false;
    }
    match boundary_mask(prefix) {
        Some(mask) => reference[whole] & mask == candidate[whole] & mask,
        None => true,
    }
}

#[inline]
fn boundary_mask(prefix: u8) -> Option<u8> {
    let rem = prefix % 8;
    (rem != 0).then(|| 0xFFu8 << (8 - rem))
}
