
use std::{
    fs, io,
    net::{IpAddr, ToSocketAddrs},
    path::Path,
};

use sdp_common::{Action, PortRange, PortRangeError};

use crate::{AddressPredicate, Error, ParseErrorKind, Result, Rule};

/// Turns the host part of a rule into addresses.
pub trait Resolver {
    /// Every address `host` stands for, in preference order.
    fn resolve(&self, host: &str) -> io::Result<Vec<IpAddr>>;
}

/// Resolves literals directly and everything else through the OS resolver.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

impl Resolver for SystemResolver {
    fn resolve(&self, host: &str) -> io::Result<Vec<IpAddr>> {
        let literal = host
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .unwrap_or(host);
        if let Ok(address) = literal.parse::<IpAddr>() {
            return Ok(vec![address]);
        }

        let mut addresses = Vec::new();
        for address in (host, 0).to_socket_addrs()?.map(|s| s.ip()) {
            if !addresses.contains(&address) {
                addresses.push(address);
            }
        }
        if addresses.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                "host has no addresses",
            ));
        }
        Ok(addresses)
    }
}

/// Reads the rules file at `path`, resolving hosts with [SystemResolver].
pub fn load_rules(path: impl AsRef<Path>) -> Result<Vec<Rule>> {
    load_rules_with(path, &SystemResolver)
}

/// Reads the rules file at `path`, resolving hosts with `resolver`.
pub fn load_rules_with(
    path: impl AsRef<Path>,
    resolver: &impl Resolver,
) -> Result<Vec<Rule>> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| Error::ConfigRead {
        path: path.to_path_buf(),
        source,
    })?;
    let rules = parse_rules(&text, resolver)?;
    tracing::info!(path = %path.display(), rules = rules.len(), "loaded conversion rules");
    Ok(rules)
}

/// Parses rules text, one rule per line.
///
/// Blank lines and `#` comments are skipped. The first bad line aborts the
/// whole load, so either every line is valid or no rule is returned.
pub fn parse_rules(text: &str, resolver: &impl Resolver) -> Result<Vec<Rule>> {
    let mut rules = Vec::new();
    for (index, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let parsed = parse_line(line, resolver).map_err(|e| e.at(index + 1, line))?;
        rules.extend(parsed);
    }
    Ok(rules)
}

enum LineError {
    Parse(ParseErrorKind),
    Resolve { host: String, source: io::Error },
}

impl LineError {
    fn at(self, line: usize, content: &str) -> Error {
        let content = content.to_string();
        match self {
            LineError::Parse(reason) => Error::Parse {
                line,
                content,
                reason,
            },
            LineError::Resolve { host, source } => Error::HostResolution {
                line,
                content,
                host,
                source,
            },
        }
    }
}

impl From<ParseErrorKind> for LineError {
    fn from(kind: ParseErrorKind) -> Self {
        LineError::Parse(kind)
    }
}

impl From<PortRangeError> for LineError {
    fn from(e: PortRangeError) -> Self {
        LineError::Parse(ParseErrorKind::Port(e))
    }
}

fn parse_line(
    line: &str,
    resolver: &impl Resolver,
) -> std::result::Result<Vec<Rule>, LineError> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    let [action, address, ports] = fields[..] else {
        return Err(ParseErrorKind::FieldCount(fields.len()).into());
    };

    let action: Action = action
        .parse()
        .map_err(|_| ParseErrorKind::Action(action.to_string()))?;
    let ports: PortRange = ports.parse()?;
    let rule = Rule::new(action).with_range(ports);

    if address == "*" {
        return Ok(vec![rule]);
    }

    let (host, prefix) = match address.split_once('/') {
        Some((host, prefix)) => (host, Some(parse_prefix(address, prefix)?)),
        None => (address, None),
    };
    let resolved = resolver
        .resolve(host)
        .map_err(|source| LineError::Resolve {
            host: host.to_string(),
            source,
        })?;
    tracing::debug!(host, addresses = ?resolved, "resolved rule host");

    resolved
        .into_iter()
        .map(|reference| -> std::result::Result<Rule, LineError> {
            let predicate = match prefix {
                None => AddressPredicate::exact(reference),
                Some(bits) => AddressPredicate::prefix(reference, bits)
                    .map_err(|_| ParseErrorKind::Prefix(address.to_string()))?,
            };
            Ok(rule.clone().with_address(predicate))
        })
        .collect()
}

// Family bound is checked once the host is resolved.
fn parse_prefix(spec: &str, prefix: &str) -> std::result::Result<u8, LineError> {
    let invalid = || ParseErrorKind::Prefix(spec.to_string());
    if prefix.is_empty() || !prefix.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid().into());
    }
    match prefix.parse::<u8>() {
        Ok(bits) if bits > 0 => Ok(bits),
        _ => Err(invalid().into()),
    }
}
