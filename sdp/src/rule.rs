use std::{fmt, net::IpAddr};

use sdp_common::{Action, PortRange};

use crate::AddressPredicate;

/// Rule for the [Engine](crate::Engine).
///
/// A rule without an address is a port-only rule: its predicate is
/// [AddressPredicate::Any].
#[derive(Debug, PartialEq, Eq, Clone, Hash)]
pub struct Rule {
    action: Action,
    address: AddressPredicate,
    ports: PortRange,
}

impl Rule {
    /// Creates a new `Rule` for `action` matching any address and port.
    pub fn new(action: Action) -> Self {
        Self {
            action,
            address: AddressPredicate::Any,
            ports: PortRange::ALL,
        }
    }

    /// Restricts the `Rule` to the addresses accepted by `address`.
    pub fn with_address(self, address: AddressPredicate) -> Self {
        Self { address, ..self }
    }

    /// Sets a port range for the `Rule`.
    pub fn with_range(self, ports: PortRange) -> Self {
        Self { ports, ..self }
    }

    pub fn action(&self) -> Action {
        self.action
    }

    pub fn address(&self) -> &AddressPredicate {
        &self.address
    }

    pub fn ports(&self) -> PortRange {
        self.ports
    }

    pub fn matches(&self, action: Action, address: &IpAddr, port: u16) -> bool {
        self.action == action && self.ports.contains(port) && self.address.matches(address)
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.action, self.address, self.ports)
    }
}
