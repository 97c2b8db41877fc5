mod test;

use std::{
    fmt, io,
    io::Write,
    net::{IpAddr, SocketAddr},
};

use sdp_common::Action;

use crate::{
    loader::{load_rules_with, Resolver, SystemResolver},
    logger::{format_line, trace_decision, LogSink},
    Config, Error, Result, Rule,
};

/// Outcome of evaluating one bind or connect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Decision {
    /// A rule matched and the socket was converted.
    Converted,
    /// No rule matched, the socket is untouched.
    NotMatched,
}

/// One-time, irreversible protocol substitution on a socket.
///
/// Must run before the socket is bound or connected, and at most once per socket.
pub trait Converter {
    type Socket: ?Sized;

    /// Name of the target protocol, used in log lines.
    fn protocol(&self) -> &str;

    fn convert(&self, socket: &mut Self::Socket) -> io::Result<()>;
}

/// Entry points for the socket layer, called right before the OS call.
///
/// Once a call returns [Decision::Converted] the caller proceeds with the
/// converted socket.
pub trait SocketHook<S: ?Sized> {
    fn before_bind(&self, socket: &mut S, local: SocketAddr) -> Result<Decision>;
    fn before_connect(&self, socket: &mut S, remote: SocketAddr) -> Result<Decision>;
}

/// Conversion engine holding the rules loaded at startup.
///
/// Rules are evaluated in file order and the first match wins. The engine never
/// changes after construction, reloading rules means building a new one.
///
/// # Example
/// ```no_run
/// # use sdp::{Config, Engine, SocketHook, linux::SdpConverter};
/// # use std::os::unix::io::RawFd;
/// let engine = Engine::load(&Config::from_env(), SdpConverter).unwrap();
/// // Descriptor handed over by the socket layer, not bound or connected yet.
/// let mut fd: RawFd = 3;
/// engine
///     .before_connect(&mut fd, "192.168.1.7:7001".parse().unwrap())
///     .unwrap();
/// ```
pub struct Engine<C> {
    rules: Vec<Rule>,
    enabled: bool,
    log: Option<LogSink>,
    converter: C,
}

impl<C> fmt::Debug for Engine<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("rules", &self.rules)
            .field("enabled", &self.enabled)
            .field("log", &self.log)
            .finish_non_exhaustive()
    }
}

impl<C: Converter> Engine<C> {
    /// Builds the engine described by `config`.
    ///
    /// Without a rules path this is [disabled](Self::disabled). A log file that
    /// can't be opened only turns logging off.
    pub fn load(config: &Config, converter: C) -> Result<Self> {
        Self::load_with(config, converter, &SystemResolver)
    }

    /// Same as [load](Self::load) with a custom host [Resolver].
    pub fn load_with(config: &Config, converter: C, resolver: &impl Resolver) -> Result<Self> {
        let Some(path) = config.rules_path() else {
            tracing::debug!("no rules file configured, conversion disabled");
            return Ok(Self::disabled(converter));
        };
        let rules = load_rules_with(path, resolver)?;
        let log = config.log_destination().and_then(LogSink::open);
        let mut engine = Self::new(rules, converter);
        engine.log = log;
        Ok(engine)
    }

    /// Engine over `rules`, enabled unless `rules` is empty.
    pub fn new(rules: Vec<Rule>, converter: C) -> Self {
        let enabled = !rules.is_empty();
        tracing::info!(
            rules = rules.len(),
            enabled,
            protocol = converter.protocol(),
            "conversion engine ready"
        );
        Self {
            rules,
            enabled,
            log: None,
            converter,
        }
    }

    /// Engine that leaves every socket alone.
    pub fn disabled(converter: C) -> Self {
        Self {
            rules: Vec::new(),
            enabled: false,
            log: None,
            converter,
        }
    }

    /// Sends decision lines to `out`.
    pub fn with_log(self, out: impl Write + Send + 'static) -> Self {
        Self {
            log: Some(LogSink::new(out)),
            ..self
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// First rule matching the call, without converting anything.
    pub fn matching_rule(&self, action: Action, address: &IpAddr, port: u16) -> Option<&Rule> {
        self.rules
            .iter()
            .find(|rule| rule.matches(action, address, port))
    }

    /// Decides on a bind or connect and converts `socket` on a match.
    ///
    /// A disabled engine returns [Decision::NotMatched] straight away, without
    /// logging. The only error is the converter failing on the socket.
    pub fn evaluate(
        &self,
        socket: &mut C::Socket,
        action: Action,
        address: IpAddr,
        port: u16,
    ) -> Result<Decision> {
        if !self.enabled {
            return Ok(Decision::NotMatched);
        }

        let decision = match self.matching_rule(action, &address, port) {
            Some(rule) => {
                if let Err(error) = self.converter.convert(socket) {
                    tracing::warn!(%rule, %address, port, %error, "socket conversion failed");
                    return Err(Error::Conversion(error));
                }
                Decision::Converted
            }
            None => Decision::NotMatched,
        };

        let protocol = self.converter.protocol();
        if let Some(log) = &self.log {
            log.write_line(&format_line(action, address, port, decision, protocol));
        }
        trace_decision(action, address, port, decision, protocol);
        Ok(decision)
    }
}

impl<C: Converter> SocketHook<C::Socket> for Engine<C> {
    fn before_bind(&self, socket: &mut C::Socket, local: SocketAddr) -> Result<Decision> {
        self.evaluate(socket, Action::Bind, local.ip(), local.port())
    }

    fn before_connect(&self, socket: &mut C::Socket, remote: SocketAddr) -> Result<Decision> {
        self.evaluate(socket, Action::Connect, remote.ip(), remote.port())
    }
}
