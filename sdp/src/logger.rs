use std::{
    fmt,
    fs::OpenOptions,
    io::{self, Write},
    net::{IpAddr, SocketAddr},
    sync::{Mutex, PoisonError},
};

use sdp_common::Action;
use serde::Serialize;

use crate::{Decision, LogDestination, DECISION_TARGET};

/// Serialized writer for decision lines.
pub(crate) struct LogSink {
    out: Mutex<Box<dyn Write + Send>>,
}

impl fmt::Debug for LogSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogSink").finish_non_exhaustive()
    }
}

impl LogSink {
    pub(crate) fn new(out: impl Write + Send + 'static) -> Self {
        Self {
            out: Mutex::new(Box::new(out)),
        }
    }

    /// Opens `destination`, `None` if the file can't be opened.
    pub(crate) fn open(destination: &LogDestination) -> Option<Self> {
        match destination {
            LogDestination::Stdout => Some(Self::new(io::stdout())),
            LogDestination::File(path) => {
                match OpenOptions::new().create(true).append(true).open(path) {
                    Ok(file) => Some(Self::new(file)),
                    Err(error) => {
                        tracing::warn!(
                            path = %path.display(),
                            %error,
                            "unable to open decision log, continuing without it"
                        );
                        None
                    }
                }
            }
        }
    }

    pub(crate) fn write_line(&self, line: &str) {
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        let result = out
            .write_all(format!("{line}\n").as_bytes())
            .and_then(|_| out.flush());
        if let Err(error) = result {
            tracing::debug!(%error, "failed writing decision log");
        }
    }
}

/// `ACTION to ADDRESS:PORT (outcome)`, IPv6 addresses bracketed.
pub(crate) fn format_line(
    action: Action,
    address: IpAddr,
    port: u16,
    decision: Decision,
    protocol: &str,
) -> String {
    let target = SocketAddr::new(address, port);
    match decision {
        Decision::Converted => {
            format!("{action} to {target} (socket converted to {protocol} protocol)")
        }
        Decision::NotMatched => format!("{action} to {target} (no match)"),
    }
}

#[derive(Debug, Clone, Serialize)]
struct DecisionFormatted<'a> {
    action: Action,
    address: IpAddr,
    port: u16,
    converted: bool,
    protocol: &'a str,
    timestamp: String,
}

pub(crate) fn trace_decision(
    action: Action,
    address: IpAddr,
    port: u16,
    decision: Decision,
    protocol: &str,
) {
    if !tracing::enabled!(target: DECISION_TARGET, tracing::Level::DEBUG) {
        return;
    }
    let decision = DecisionFormatted {
        action,
        address,
        port,
        converted: decision == Decision::Converted,
        protocol,
        timestamp: chrono::offset::Local::now()
            .to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
    };
    let Ok(decision) = serde_json::to_string(&decision) else { return; };
    tracing::debug!(target: DECISION_TARGET, "{decision}");
}
