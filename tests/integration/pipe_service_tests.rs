//! Pipe-backed services through the dispatcher: the TCP tunnel and WiFi
//! scanning, with the test playing the host side of each pipe.

use regbus::PipeError;
use regbus::bus::{Dispatcher, Packet, PipePair, PipeRecord, PipeState};
use regbus::config::BusConfig;
use regbus::consts::{tcp, wifi};
use regbus::services::wifi::{AP_RECORD_LEN, MAX_SCAN_RESULTS};
use regbus::services::{TcpService, WifiService, catalog};

use crate::mock_hw::{MockSocket, MockWifi, RecordingDelegate, access_point, bus, bus_with};

const TCP_CLASS: u32 = 0x1b43_b70b;
const WIFI_CLASS: u32 = 0x18ae_de4c;

fn tcp_bus() -> (Dispatcher, u8, MockSocket) {
    let (mut bus, _) = bus();
    let socket = MockSocket::default();
    let id = bus
        .add_service(TCP_CLASS, &catalog::TCP, Box::new(TcpService::new(Box::new(socket.clone()))))
        .unwrap();
    (bus, id, socket)
}

fn open(bus: &mut Dispatcher, id: u8, code: u16, descriptor: &[u8]) -> PipePair {
    let r = bus.dispatch(id, &Packet::new(code, descriptor)).unwrap();
    PipePair::from_bytes(&r.payload).expect("pipe handles")
}

fn tick(bus: &mut Dispatcher) {
    bus.tick(10, &mut RecordingDelegate::default());
}

fn next(bus: &mut Dispatcher, pair: PipePair) -> Option<PipeRecord> {
    bus.pipes_mut()
        .receive(pair.inbound)
        .expect("inbound open")
        .map(|s| s.record)
}

fn error_meta(err: tcp::TcpError) -> PipeRecord {
    PipeRecord::meta(tcp::PIPE_CMD_ERROR, &(err as i32).to_le_bytes()).unwrap()
}

fn connect(bus: &mut Dispatcher, pair: PipePair) {
    bus.pipes_mut()
        .send_meta(pair.outbound, tcp::PIPE_CMD_OPEN_SSL, b"\xbb\x01example.com")
        .unwrap();
    tick(bus);
    assert_eq!(next(bus, pair), Some(PipeRecord::data(&[]).unwrap()));
}

// ── TCP ───────────────────────────────────────────────────────

#[test]
fn tcp_tunnels_data_both_ways() {
    let (mut bus, id, socket) = tcp_bus();
    let pair = open(&mut bus, id, tcp::CMD_OPEN, &[0xde, 0xad]);
    assert_eq!(bus.pipes().state(pair.inbound), PipeState::Open);
    assert_eq!(bus.pipes().descriptor(pair.inbound), Some(&[0xde, 0xad][..]));

    connect(&mut bus, pair);
    assert_eq!(socket.0.borrow().connects, [("example.com".to_owned(), 443)]);
    assert_eq!(bus.pipes().state(pair.inbound), PipeState::Streaming);

    bus.pipes_mut().send_data(pair.outbound, b"GET / HTTP/1.1\r\n").unwrap();
    bus.pipes_mut().send_data(pair.outbound, b"\r\n").unwrap();
    socket.0.borrow_mut().incoming.push_back(b"HTTP/1.1 200 OK".to_vec());
    tick(&mut bus);

    assert_eq!(socket.0.borrow().sent, [b"GET / HTTP/1.1\r\n".to_vec(), b"\r\n".to_vec()]);
    assert_eq!(next(&mut bus, pair), Some(PipeRecord::data(b"HTTP/1.1 200 OK").unwrap()));
    assert_eq!(next(&mut bus, pair), None);
}

#[test]
fn tcp_protocol_misuse_reports_error_meta() {
    let (mut bus, id, socket) = tcp_bus();
    let pair = open(&mut bus, id, tcp::CMD_OPEN, &[1]);

    // Data before the connection exists.
    bus.pipes_mut().send_data(pair.outbound, b"early").unwrap();
    // Unknown meta command.
    bus.pipes_mut().send_meta(pair.outbound, 0x7, &[]).unwrap();
    // Open without a host name.
    bus.pipes_mut()
        .send_meta(pair.outbound, tcp::PIPE_CMD_OPEN_SSL, &[0xbb, 0x01])
        .unwrap();
    tick(&mut bus);

    assert_eq!(next(&mut bus, pair), Some(error_meta(tcp::TcpError::InvalidCommand)));
    assert_eq!(next(&mut bus, pair), Some(error_meta(tcp::TcpError::InvalidCommand)));
    assert_eq!(next(&mut bus, pair), Some(error_meta(tcp::TcpError::InvalidCommandPayload)));
    assert!(socket.0.borrow().sent.is_empty());

    connect(&mut bus, pair);
    bus.pipes_mut()
        .send_meta(pair.outbound, tcp::PIPE_CMD_OPEN_SSL, b"\x50\x00other")
        .unwrap();
    tick(&mut bus);
    assert_eq!(next(&mut bus, pair), Some(error_meta(tcp::TcpError::InvalidCommand)));
    assert_eq!(socket.0.borrow().connects.len(), 1);
}

#[test]
fn tcp_connect_failure_closes_the_pipe() {
    let (mut bus, id, socket) = tcp_bus();
    socket.0.borrow_mut().refuse_connect = true;
    let pair = open(&mut bus, id, tcp::CMD_OPEN, &[1]);

    bus.pipes_mut()
        .send_meta(pair.outbound, tcp::PIPE_CMD_OPEN_SSL, b"\xbb\x01example.com")
        .unwrap();
    tick(&mut bus);

    assert_eq!(bus.pipes().state(pair.inbound), PipeState::Closed);
    assert_eq!(bus.pipes_mut().send_data(pair.outbound, b"x"), Err(PipeError::Closed));
    assert_eq!(bus.pipes_mut().receive(pair.inbound), Err(PipeError::Closed));
}

#[test]
fn tcp_send_failure_closes_the_pipe() {
    let (mut bus, id, socket) = tcp_bus();
    let pair = open(&mut bus, id, tcp::CMD_OPEN, &[1]);
    connect(&mut bus, pair);

    socket.0.borrow_mut().fail_send = true;
    bus.pipes_mut().send_data(pair.outbound, b"payload").unwrap();
    tick(&mut bus);

    assert!(!bus.pipes().is_open(pair.outbound));
    assert_eq!(socket.0.borrow().closed, 1);
}

#[test]
fn host_close_shuts_the_socket() {
    let (mut bus, id, socket) = tcp_bus();
    let pair = open(&mut bus, id, tcp::CMD_OPEN, &[1]);
    connect(&mut bus, pair);

    bus.pipes_mut().close(pair.outbound).unwrap();
    tick(&mut bus);
    assert_eq!(socket.0.borrow().closed, 1);
    tick(&mut bus);
    assert_eq!(socket.0.borrow().closed, 1);
}

#[test]
fn reopen_replaces_the_previous_connection() {
    let (mut bus, id, socket) = tcp_bus();
    let first = open(&mut bus, id, tcp::CMD_OPEN, &[1]);
    connect(&mut bus, first);

    let second = open(&mut bus, id, tcp::CMD_OPEN, &[2]);
    assert_ne!(first, second);
    assert!(!bus.pipes().is_open(first.inbound));
    assert!(bus.pipes().is_open(second.inbound));
    assert_eq!(socket.0.borrow().closed, 1);
    assert_eq!(bus.pipes().open_count(), 1);
}

#[test]
fn bad_descriptors_are_rejected() {
    let (mut bus, id, _) = tcp_bus();
    let r = bus.dispatch(id, &Packet::new(tcp::CMD_OPEN, &[])).unwrap();
    assert_eq!(r.error_code(), Some(2));
    let r = bus.dispatch(id, &Packet::new(tcp::CMD_OPEN, &[0; 17])).unwrap();
    assert_eq!(r.error_code(), Some(9));
    assert_eq!(bus.pipes().open_count(), 0);
}

#[test]
fn pipe_table_limit_is_reported() {
    let config = BusConfig {
        max_pipes: 1,
        ..BusConfig::default()
    };
    let (mut bus, _) = bus_with(config);
    let a = bus
        .add_service(TCP_CLASS, &catalog::TCP, Box::new(TcpService::new(Box::new(MockSocket::default()))))
        .unwrap();
    let b = bus
        .add_service(TCP_CLASS, &catalog::TCP, Box::new(TcpService::new(Box::new(MockSocket::default()))))
        .unwrap();

    open(&mut bus, a, tcp::CMD_OPEN, &[1]);
    let r = bus.dispatch(b, &Packet::new(tcp::CMD_OPEN, &[1])).unwrap();
    assert_eq!(r.error_code(), Some(8));
}

#[test]
fn device_reset_closes_pipes_and_socket() {
    let (mut bus, id, socket) = tcp_bus();
    let pair = open(&mut bus, id, tcp::CMD_OPEN, &[1]);
    connect(&mut bus, pair);

    bus.reset();
    assert_eq!(bus.pipes().open_count(), 0);
    assert_eq!(socket.0.borrow().closed, 1);
}

// ── WiFi ──────────────────────────────────────────────────────

fn wifi_bus() -> (Dispatcher, u8, MockWifi) {
    let (mut bus, _) = bus();
    let radio = MockWifi::default();
    let id = bus
        .add_service(WIFI_CLASS, &catalog::WIFI, Box::new(WifiService::new(Box::new(radio.clone()))))
        .unwrap();
    (bus, id, radio)
}

#[test]
fn scan_streams_every_network_then_finishes() {
    let (mut bus, id, radio) = wifi_bus();
    radio.0.borrow_mut().networks = (0..10).map(|i| access_point(&format!("net{i}"), -40 - i)).collect();

    let pair = open(&mut bus, id, wifi::CMD_SCAN, &[0x42]);
    let mut seen = Vec::new();
    for _ in 0..4 {
        while let Ok(Some(rec)) = bus.pipes_mut().receive(pair.inbound) {
            seen.push(rec);
        }
        tick(&mut bus);
    }

    assert_eq!(seen.len(), 10);
    assert!(seen.windows(2).all(|w| w[1].seq == w[0].seq.wrapping_add(1)));
    for (i, rec) in seen.iter().enumerate() {
        let bytes = rec.record.bytes();
        assert_eq!(bytes.len(), AP_RECORD_LEN);
        assert_eq!(bytes[8] as i8, -40 - i as i8);
        let ssid = format!("net{i}");
        assert_eq!(&bytes[16..16 + ssid.len()], ssid.as_bytes());
    }
    assert_eq!(bus.pipes().state(pair.inbound), PipeState::Closed);
}

#[test]
fn scan_backlog_is_capped() {
    let (mut bus, id, radio) = wifi_bus();
    radio.0.borrow_mut().networks = (0..40).map(|i| access_point(&format!("ap{i}"), -30 - i)).collect();

    let pair = open(&mut bus, id, wifi::CMD_SCAN, &[7]);
    let mut seen = Vec::new();
    for _ in 0..10 {
        while let Ok(Some(rec)) = bus.pipes_mut().receive(pair.inbound) {
            seen.push(rec);
        }
        tick(&mut bus);
    }

    assert_eq!(seen.len(), MAX_SCAN_RESULTS);
    let last = seen[MAX_SCAN_RESULTS - 1].record.bytes();
    assert_eq!(&last[16..20], b"ap31");
    assert_eq!(bus.pipes().state(pair.inbound), PipeState::Closed);
}

#[test]
fn empty_scan_closes_immediately() {
    let (mut bus, id, _) = wifi_bus();
    let pair = open(&mut bus, id, wifi::CMD_SCAN, &[1]);
    assert_eq!(bus.pipes().state(pair.inbound), PipeState::Closed);
}

#[test]
fn failed_scan_reports_and_releases_the_pipe() {
    let (mut bus, id, radio) = wifi_bus();
    radio.0.borrow_mut().scan_fails = true;
    let r = bus.dispatch(id, &Packet::new(wifi::CMD_SCAN, &[1])).unwrap();
    assert_eq!(r.error_code(), Some(10));
    assert_eq!(bus.pipes().open_count(), 0);
}

#[test]
fn connect_parses_credentials() {
    let (mut bus, id, radio) = wifi_bus();
    assert_eq!(bus.dispatch(id, &Packet::new(wifi::CMD_CONNECT, b"home\0secret\0")), None);
    assert_eq!(
        radio.0.borrow().joined,
        Some(("home".to_owned(), Some("secret".to_owned())))
    );

    assert_eq!(bus.dispatch(id, &Packet::new(wifi::CMD_CONNECT, b"cafe\0")), None);
    assert_eq!(radio.0.borrow().joined, Some(("cafe".to_owned(), None)));

    let r = bus.dispatch(id, &Packet::new(wifi::CMD_CONNECT, b"home")).unwrap();
    assert_eq!(r.error_code(), Some(2));

    assert_eq!(bus.dispatch(id, &Packet::new(wifi::CMD_DISCONNECT, &[])), None);
    assert_eq!(radio.0.borrow().joined, None);
}

#[test]
fn ip_changes_become_events() {
    let (mut bus, id, radio) = wifi_bus();
    tick(&mut bus);
    assert_eq!(bus.pending_events(), 0);

    radio.0.borrow_mut().has_ip = true;
    tick(&mut bus);
    tick(&mut bus);
    radio.0.borrow_mut().has_ip = false;
    tick(&mut bus);

    let mut codes = Vec::new();
    bus.drain_events(|r| {
        assert_eq!(r.service_id, id);
        codes.push(r.code);
    });
    assert_eq!(codes, [0x8000 | wifi::EVENT_GOT_IP, 0x8000 | wifi::EVENT_LOST_IP]);
}
