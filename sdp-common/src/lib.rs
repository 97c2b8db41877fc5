mod port_range;

pub use port_range::{PortRange, PortRangeError, MAX_PORT};

use serde::Serialize;
use strum_macros::{Display, EnumCount, EnumString};

/// Socket operation intercepted before it reaches the OS.
///
/// Parses case-insensitively from `bind`/`connect` and displays as
/// `BIND`/`CONNECT`, which is the form used in decision log lines.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumCount, Serialize,
)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Assigning a local address to the socket.
    Bind,
    /// Establishing a remote association.
    Connect,
}
