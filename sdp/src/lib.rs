//! Rule based conversion of TCP sockets to the Sockets Direct Protocol.
//!
//! An [Engine] is built once at startup from a rules file and consulted by the
//! socket layer right before every bind and connect. The first [Rule] matching
//! the `(action, address, port)` of the call decides whether the socket is
//! converted.
//!
//! # Example
//! ```no_run
//! # use sdp::{Config, Engine, linux::SdpConverter};
//! let config = Config::new()
//!     .with_rules("/etc/sdp.conf")
//!     .with_log(sdp::LogDestination::Stdout);
//! let engine = Engine::load(&config, SdpConverter).unwrap();
//! ```
mod cidr;
mod config;
mod engine;
mod error;
mod loader;
mod logger;
mod rule;

#[cfg(target_os = "linux")]
pub mod linux;

pub use sdp_common::{Action, PortRange, PortRangeError};

pub use cidr::AddressPredicate;
pub use config::{Config, LogDestination};
pub use engine::{Converter, Decision, Engine, SocketHook};
pub use error::{Error, ParseErrorKind};
pub use loader::{load_rules, load_rules_with, parse_rules, Resolver, SystemResolver};
pub use rule::Rule;
pub type Result<T> = std::result::Result<T, Error>;

const RULES_PATH_VAR: &str = "SDP_CONF";
const LOG_DESTINATION_VAR: &str = "SDP_DEBUG";
const DECISION_TARGET: &str = "sdp::decision";
