
use std::{fmt, ops::RangeInclusive, str::FromStr};

use thiserror::Error;

pub const MAX_PORT: u16 = u16::MAX;

/// Inclusive port interval used by a rule.
///
/// `start > end` is representable: such a range contains no port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortRange {
    start: u16,
    end: u16,
}

impl PortRange {
    /// Every port, what `*` stands for.
    pub const ALL: PortRange = PortRange {
        start: 0,
        end: MAX_PORT,
    };

    pub const fn new(start: u16, end: u16) -> Self {
        Self { start, end }
    }

    pub const fn single(port: u16) -> Self {
        Self::new(port, port)
    }

    pub fn start(&self) -> u16 {
        self.start
    }

    pub fn end(&self) -> u16 {
        self.end
    }

    pub fn ports(&self) -> RangeInclusive<u16> {
        self.start..=self.end
    }

    #[inline]
    pub fn contains(&self, port: u16) -> bool {
        self.start <= port && port <= self.end
    }
}

impl Default for PortRange {
    fn default() -> Self {
        Self::ALL
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::ALL {
            write!(f, "*")
        } else if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

impl FromStr for PortRange {
    type Err = PortRangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('-') {
            None if s == "*" => Ok(Self::ALL),
            None => parse_port(s).map(Self::single),
            // A lone hyphen names no bound at all.
            Some(("", "")) => Err(PortRangeError::Invalid(s.to_string())),
            Some((low, high)) => {
                let start = match low {
                    "" | "*" => 0,
                    low => parse_port(low)?,
                };
                let end = match high {
                    "" | "*" => MAX_PORT,
                    high => parse_port(high)?,
                };
                Ok(Self::new(start, end))
            }
        }
    }
}

fn parse_port(s: &str) -> Result<u16, PortRangeError> {
    if s.is_empty() {
        return Err(PortRangeError::Empty);
    }
    if !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(PortRangeError::Invalid(s.to_string()));
    }
    s.parse::<u16>()
        .map_err(|_| PortRangeError::OutOfRange(s.to_string()))
}

#[non_exhaustive]
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PortRangeError {
    #[error("port specification is empty")]
    Empty,
    #[error("'{0}' is not a valid port specification")]
    Invalid(String),
    #[error("port {0} is out of range, must be between 0 and 65535")]
    OutOfRange(String),
}
