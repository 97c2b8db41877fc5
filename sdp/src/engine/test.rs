#![cfg(test)]

use std::{
    io::{self, Write},
    net::{IpAddr, SocketAddr},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    thread,
};

use sdp_common::{Action, PortRange};
use test_case::test_case;

use super::{Converter, Decision, Engine, SocketHook};
use crate::{
    loader::SystemResolver, logger::test::SharedBuf, AddressPredicate, Config, Error,
    LogDestination, Rule,
};

#[derive(Debug, Default)]
struct FakeSocket {
    conversions: usize,
}

/// Counts conversions both globally and per socket.
#[derive(Debug, Default)]
struct RecordingConverter {
    calls: AtomicUsize,
}

impl Converter for RecordingConverter {
    type Socket = FakeSocket;

    fn protocol(&self) -> &str {
        "SDP"
    }

    fn convert(&self, socket: &mut FakeSocket) -> io::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        socket.conversions += 1;
        Ok(())
    }
}

struct FailingConverter;

impl Converter for FailingConverter {
    type Socket = FakeSocket;

    fn protocol(&self) -> &str {
        "SDP"
    }

    fn convert(&self, _: &mut FakeSocket) -> io::Result<()> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "protocol not supported",
        ))
    }
}

fn ip(s: &str) -> IpAddr {
    s.parse().unwrap()
}

fn prefix(reference: &str, bits: u8) -> AddressPredicate {
    AddressPredicate::prefix(ip(reference), bits).unwrap()
}

fn rules_file(text: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(text.as_bytes()).unwrap();
    file
}

fn bind_range_engine() -> (Engine<RecordingConverter>, SharedBuf) {
    let buf = SharedBuf::default();
    let rules = vec![Rule::new(Action::Bind).with_range(PortRange::new(8080, 9000))];
    let engine = Engine::new(rules, RecordingConverter::default()).with_log(buf.clone());
    (engine, buf)
}

#[test_case(Action::Bind, "1.2.3.4", 8500, Decision::Converted)]
#[test_case(Action::Bind, "1.2.3.4", 80, Decision::NotMatched)]
#[test_case(Action::Connect, "1.2.3.4", 8500, Decision::NotMatched)]
#[test_case(Action::Bind, "fafa::3", 9000, Decision::Converted)]
fn end_to_end_from_file(action: Action, address: &str, port: u16, expected: Decision) {
    let file = rules_file("bind * 8080-9000\n");
    let config = Config::new().with_rules(file.path());
    let engine = Engine::load(&config, RecordingConverter::default()).unwrap();
    assert!(engine.is_enabled());

    let mut socket = FakeSocket::default();
    let decision = engine.evaluate(&mut socket, action, ip(address), port).unwrap();
    assert_eq!(decision, expected);
    assert_eq!(socket.conversions, usize::from(expected == Decision::Converted));
}

#[test]
fn first_match_wins() {
    let rules = vec![
        Rule::new(Action::Connect).with_address(prefix("10.0.0.0", 8)),
        Rule::new(Action::Connect).with_address(prefix("10.0.0.5", 32)),
    ];
    let engine = Engine::new(rules.clone(), RecordingConverter::default());

    assert_eq!(
        engine.matching_rule(Action::Connect, &ip("10.0.0.5"), 1234),
        Some(&rules[0])
    );

    let mut socket = FakeSocket::default();
    let decision = engine
        .evaluate(&mut socket, Action::Connect, ip("10.0.0.5"), 1234)
        .unwrap();
    assert_eq!(decision, Decision::Converted);
    assert_eq!(socket.conversions, 1);
    assert_eq!(engine.converter.calls.load(Ordering::SeqCst), 1);
}

#[test_case(Action::Bind, "0.0.0.0", 0)]
#[test_case(Action::Bind, "1.2.3.4", 8500)]
#[test_case(Action::Connect, "::1", 65535)]
fn disabled_engine_does_nothing(action: Action, address: &str, port: u16) {
    let buf = SharedBuf::default();
    let engine = Engine::load(&Config::new(), RecordingConverter::default())
        .unwrap()
        .with_log(buf.clone());
    assert!(!engine.is_enabled());

    let mut socket = FakeSocket::default();
    let decision = engine.evaluate(&mut socket, action, ip(address), port).unwrap();

    assert_eq!(decision, Decision::NotMatched);
    assert_eq!(socket.conversions, 0);
    assert!(buf.lines().is_empty());
}

#[test]
fn empty_rules_file_disables() {
    let file = rules_file("# nothing to convert\n\n");
    let config = Config::new().with_rules(file.path());
    let engine = Engine::load(&config, RecordingConverter::default()).unwrap();
    assert!(!engine.is_enabled());
    assert!(engine.rules().is_empty());
}

#[test]
fn malformed_file_yields_no_engine() {
    let file = rules_file("bind * *\nconnect 10.0.0.1\nbind * 80\n");
    let config = Config::new().with_rules(file.path());
    assert!(matches!(
        Engine::load(&config, RecordingConverter::default()),
        Err(Error::Parse { line: 2, .. })
    ));
}

#[test]
fn unreadable_rules_file_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::new().with_rules(dir.path().join("absent.conf"));
    assert!(matches!(
        Engine::load_with(&config, RecordingConverter::default(), &SystemResolver),
        Err(Error::ConfigRead { .. })
    ));
}

#[test]
fn logs_one_line_per_decision() {
    let (engine, buf) = bind_range_engine();
    let mut socket = FakeSocket::default();
    engine
        .evaluate(&mut socket, Action::Bind, ip("1.2.3.4"), 8500)
        .unwrap();
    engine
        .evaluate(&mut socket, Action::Bind, ip("fafa::3"), 80)
        .unwrap();

    assert_eq!(
        buf.lines(),
        vec![
            "BIND to 1.2.3.4:8500 (socket converted to SDP protocol)",
            "BIND to [fafa::3]:80 (no match)",
        ]
    );
}

#[test]
fn log_file_destination_receives_lines() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("sdp.log");
    let file = rules_file("connect 192.168.1.0/24 7000-8000\n");
    let config = Config::new()
        .with_rules(file.path())
        .with_log(LogDestination::File(log_path.clone()));
    let engine = Engine::load(&config, RecordingConverter::default()).unwrap();

    let mut socket = FakeSocket::default();
    let remote: SocketAddr = "192.168.1.20:7001".parse().unwrap();
    assert_eq!(
        engine.before_connect(&mut socket, remote).unwrap(),
        Decision::Converted
    );
    drop(engine);

    assert_eq!(
        std::fs::read_to_string(&log_path).unwrap(),
        "CONNECT to 192.168.1.20:7001 (socket converted to SDP protocol)\n"
    );
}

#[test]
fn unopenable_log_keeps_conversion_working() {
    let dir = tempfile::tempdir().unwrap();
    let file = rules_file("bind * *\n");
    let config = Config::new()
        .with_rules(file.path())
        .with_log(LogDestination::File(dir.path().join("no").join("such.log")));
    let engine = Engine::load(&config, RecordingConverter::default()).unwrap();
    assert!(engine.log.is_none());

    let mut socket = FakeSocket::default();
    let local: SocketAddr = "0.0.0.0:5000".parse().unwrap();
    assert_eq!(
        engine.before_bind(&mut socket, local).unwrap(),
        Decision::Converted
    );
    assert_eq!(socket.conversions, 1);
}

#[test]
fn hooks_map_to_actions() {
    let rules = vec![Rule::new(Action::Connect).with_range(PortRange::single(443))];
    let engine = Engine::new(rules, RecordingConverter::default());
    let addr: SocketAddr = "[fafa::3]:443".parse().unwrap();

    let mut socket = FakeSocket::default();
    assert_eq!(
        engine.before_bind(&mut socket, addr).unwrap(),
        Decision::NotMatched
    );
    assert_eq!(
        engine.before_connect(&mut socket, addr).unwrap(),
        Decision::Converted
    );
}

#[test]
fn conversion_failure_is_reported_and_not_logged() {
    let buf = SharedBuf::default();
    let engine = Engine::new(vec![Rule::new(Action::Bind)], FailingConverter).with_log(buf.clone());
    let mut socket = FakeSocket::default();

    assert!(matches!(
        engine.evaluate(&mut socket, Action::Bind, ip("1.2.3.4"), 1),
        Err(Error::Conversion(_))
    ));
    assert!(buf.lines().is_empty());
}

#[test]
fn concurrent_evaluation_keeps_lines_whole() {
    let (engine, buf) = bind_range_engine();
    let engine = Arc::new(engine);

    let handles: Vec<_> = (0..8u16)
        .map(|i| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                for n in 0..100u16 {
                    let mut socket = FakeSocket::default();
                    let port = 8000 + i * 100 + n;
                    engine
                        .evaluate(&mut socket, Action::Bind, ip("10.0.0.1"), port)
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let lines = buf.lines();
    assert_eq!(lines.len(), 800);
    assert!(lines.iter().all(|line| line.starts_with("BIND to 10.0.0.1:")
        && (line.ends_with("(no match)")
            || line.ends_with("(socket converted to SDP protocol)"))));
    // Ports 8080..=8799 match.
    assert_eq!(engine.converter.calls.load(Ordering::SeqCst), 720);
}
