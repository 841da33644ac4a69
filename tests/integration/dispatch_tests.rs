//! Dispatcher behaviour through the public API: register access, error
//! reports, announce scheduling, streaming, events and device reset.

use std::cell::RefCell;
use std::rc::Rc;

use regbus::bus::codec::{get_register_code, set_register_code};
use regbus::bus::{Packet, ReportKind, StreamState};
use regbus::consts::{base, button, control, light, music, temperature};
use regbus::ports::{CommandPort, PortError};
use regbus::registers::snapshot::RegisterSnapshot;
use regbus::services::{BasicService, catalog};

use crate::mock_hw::{RecordingDelegate, bus};

const TEMPERATURE_CLASS: u32 = 0x1421_0ca4;
const LIGHT_CLASS: u32 = 0x1e3a_4c5a;
const BUTTON_CLASS: u32 = 0x1473_a263;
const MUSIC_CLASS: u32 = 0x1b57_b1d7;

// ── Registers ─────────────────────────────────────────────────

#[test]
fn control_constants_are_readable() {
    let (mut bus, device) = bus();
    assert_eq!(device.0.borrow().identified, 0);

    let r = bus
        .dispatch(0, &Packet::new(get_register_code(control::REG_DEVICE_DESCRIPTION), &[]))
        .unwrap();
    assert_eq!(r.kind, ReportKind::Data);
    assert_eq!(r.payload, b"regbus device");

    let r = bus
        .dispatch(0, &Packet::new(get_register_code(control::REG_UPTIME), &[]))
        .unwrap();
    assert_eq!(r.payload, 1_000u64.to_le_bytes());
}

#[test]
fn control_constants_reject_writes() {
    let (mut bus, _) = bus();
    let r = bus
        .dispatch(0, &Packet::new(set_register_code(control::REG_DEVICE_CLASS), &[1, 2, 3, 4]))
        .unwrap();
    assert_eq!(r.error_code(), Some(4));
    assert_eq!(bus.registers(0).unwrap().read_uint(control::REG_DEVICE_CLASS), Some(0));
}

#[test]
fn set_then_get_round_trips() {
    let (mut bus, _) = bus();
    let id = bus
        .add_service(LIGHT_CLASS, &catalog::LIGHT, Box::new(BasicService::new()))
        .unwrap();

    let set = Packet::new(set_register_code(light::REG_BRIGHTNESS), &[200]);
    assert_eq!(bus.dispatch(id, &set), None);
    let ack = bus.dispatch(id, &set.with_ack()).unwrap();
    assert_eq!(ack.kind, ReportKind::Ack);

    let r = bus
        .dispatch(id, &Packet::new(get_register_code(light::REG_BRIGHTNESS), &[]))
        .unwrap();
    assert_eq!(r.payload, [200]);
    assert_eq!(r.code, 0x1001);
}

#[test]
fn access_errors_become_error_reports() {
    let (mut bus, _) = bus();
    let id = bus
        .add_service(TEMPERATURE_CLASS, &catalog::TEMPERATURE, Box::new(BasicService::new()))
        .unwrap();

    let cases: [(u16, &[u8], u16); 5] = [
        (0x90, &[], 1),
        (get_register_code(temperature::REG_TEMPERATURE), &[1], 2),
        (get_register_code(0x0fff), &[], 3),
        (set_register_code(temperature::REG_TEMPERATURE), &[0; 4], 4),
        (set_register_code(base::REG_IS_STREAMING), &[1, 0], 5),
    ];
    for (code, payload, expected) in cases {
        let r = bus.dispatch(id, &Packet::new(code, payload)).unwrap();
        assert_eq!(r.kind, ReportKind::Error, "0x{code:x}");
        assert_eq!(r.code, code);
        assert_eq!(r.error_code(), Some(expected), "0x{code:x}");
    }
}

#[test]
fn error_report_carries_text() {
    let (mut bus, _) = bus();
    let id = bus
        .add_service(TEMPERATURE_CLASS, &catalog::TEMPERATURE, Box::new(BasicService::new()))
        .unwrap();
    let r = bus
        .dispatch(id, &Packet::new(set_register_code(0x101), &[0; 4]))
        .unwrap();
    let text = std::str::from_utf8(&r.payload[2..]).unwrap();
    assert!(text.contains("0x101"), "{text}");
}

#[test]
fn unknown_service_gets_no_reply() {
    let (mut bus, _) = bus();
    assert_eq!(bus.dispatch(7, &Packet::new(base::CMD_ANNOUNCE, &[]).with_ack()), None);
}

// ── Commands ──────────────────────────────────────────────────

#[derive(Clone, Default)]
struct RecordingPort(Rc<RefCell<Vec<(u16, Vec<u8>)>>>);

impl CommandPort for RecordingPort {
    fn execute(&mut self, code: u16, payload: &[u8]) -> Result<Option<Vec<u8>>, PortError> {
        self.0.borrow_mut().push((code, payload.to_vec()));
        if code == base::CMD_CALIBRATE {
            return Err(PortError::Busy);
        }
        Ok(None)
    }
}

#[test]
fn service_commands_reach_the_port_after_payload_check() {
    let (mut bus, _) = bus();
    let port = RecordingPort::default();
    let id = bus
        .add_service(MUSIC_CLASS, &catalog::MUSIC, Box::new(BasicService::with_port(Box::new(port.clone()))))
        .unwrap();

    let tone = [0xe8, 0x03, 0xf4, 0x01, 0x64, 0x00];
    assert_eq!(bus.dispatch(id, &Packet::new(music::CMD_PLAY_TONE, &tone)), None);
    let r = bus
        .dispatch(id, &Packet::new(music::CMD_PLAY_TONE, &tone[..5]))
        .unwrap();
    assert_eq!(r.error_code(), Some(2));

    let r = bus.dispatch(id, &Packet::new(base::CMD_CALIBRATE, &[])).unwrap();
    assert_eq!(r.error_code(), Some(10));

    let calls = port.0.borrow();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0], (music::CMD_PLAY_TONE, tone.to_vec()));
    assert_eq!(calls[1].0, base::CMD_CALIBRATE);
}

#[test]
fn identify_reaches_the_device() {
    let (mut bus, device) = bus();
    assert_eq!(bus.dispatch(0, &Packet::new(control::CMD_IDENTIFY, &[])), None);
    assert_eq!(device.0.borrow().identified, 1);

    let r = bus.dispatch(0, &Packet::new(control::CMD_IDENTIFY, &[1])).unwrap();
    assert_eq!(r.error_code(), Some(2));
    assert_eq!(device.0.borrow().identified, 1);
}

#[test]
fn generic_codes_ignore_trailing_bytes() {
    let (mut bus, _) = bus();
    let r = bus
        .dispatch(0, &Packet::new(base::CMD_DESCRIPTION, &[1, 2, 3]))
        .unwrap();
    assert_eq!(r.payload, b"regbus device");
}

// ── Announce ──────────────────────────────────────────────────

#[test]
fn control_announce_lists_service_classes() {
    let (mut bus, _) = bus();
    bus.add_service(TEMPERATURE_CLASS, &catalog::TEMPERATURE, Box::new(BasicService::new()))
        .unwrap();
    bus.add_service(LIGHT_CLASS, &catalog::LIGHT, Box::new(BasicService::new()))
        .unwrap();

    let r = bus.dispatch(0, &Packet::new(base::CMD_ANNOUNCE, &[])).unwrap();
    let mut expected = TEMPERATURE_CLASS.to_le_bytes().to_vec();
    expected.extend_from_slice(&LIGHT_CLASS.to_le_bytes());
    assert_eq!(r.payload, expected);

    let r = bus.dispatch(1, &Packet::new(base::CMD_ANNOUNCE, &[])).unwrap();
    assert_eq!(r.payload, TEMPERATURE_CLASS.to_le_bytes());
}

#[test]
fn announce_cadence_while_attached() {
    let (mut bus, _) = bus();
    let id = bus
        .add_service(LIGHT_CLASS, &catalog::LIGHT, Box::new(BasicService::new()))
        .unwrap();
    let mut d = RecordingDelegate::default();

    bus.tick(10_000, &mut d);
    assert!(d.self_announces.is_empty());
    assert!(d.queries.is_empty());

    bus.attach();
    bus.tick(499, &mut d);
    assert!(d.self_announces.is_empty());
    bus.tick(1, &mut d);
    assert_eq!(d.self_announces.len(), 1);
    assert_eq!(d.self_announces[0].service_id, 0);
    assert_eq!(d.self_announces[0].payload, LIGHT_CLASS.to_le_bytes());
    assert_eq!(d.queries, [id]);

    // An announce from the service restarts its window.
    bus.tick(300, &mut d);
    bus.dispatch(id, &Packet::new(base::CMD_ANNOUNCE, &[]));
    bus.tick(200, &mut d);
    assert_eq!(d.self_announces.len(), 2);
    assert_eq!(d.queries, [id]);

    bus.detach();
    bus.tick(5_000, &mut d);
    assert_eq!(d.self_announces.len(), 2);
}

// ── Streaming ─────────────────────────────────────────────────

#[test]
fn streaming_broadcasts_reading_while_attached() {
    let (mut bus, _) = bus();
    let id = bus
        .add_service(TEMPERATURE_CLASS, &catalog::TEMPERATURE, Box::new(BasicService::new()))
        .unwrap();
    let reading = (21u32 << 10).to_le_bytes();
    bus.registers_mut(id)
        .unwrap()
        .update(temperature::REG_TEMPERATURE, &reading)
        .unwrap();
    let mut d = RecordingDelegate::default();

    bus.attach();
    assert_eq!(bus.stream_state(id), Some(StreamState::Inactive));
    bus.dispatch(id, &Packet::new(set_register_code(base::REG_IS_STREAMING), &[1]));
    assert_eq!(bus.stream_state(id), Some(StreamState::Active { interval_ms: 100 }));

    bus.tick(99, &mut d);
    assert!(d.broadcasts.is_empty());
    bus.tick(1, &mut d);
    assert_eq!(d.broadcasts.len(), 1);
    assert_eq!(d.broadcasts[0].service_id, id);
    assert_eq!(d.broadcasts[0].code, 0x1101);
    assert_eq!(d.broadcasts[0].payload, reading);

    // Interval below the floor is clamped.
    bus.dispatch(id, &Packet::new(set_register_code(base::REG_STREAMING_INTERVAL), &5u32.to_le_bytes()));
    assert_eq!(bus.stream_state(id), Some(StreamState::Active { interval_ms: 20 }));

    bus.detach();
    assert_eq!(bus.stream_state(id), Some(StreamState::Paused { interval_ms: 20 }));
    bus.tick(1_000, &mut d);
    assert_eq!(d.broadcasts.len(), 1);

    bus.attach();
    bus.tick(20, &mut d);
    assert_eq!(d.broadcasts.len(), 2);

    bus.dispatch(id, &Packet::new(set_register_code(base::REG_IS_STREAMING), &[0]));
    bus.tick(1_000, &mut d);
    assert_eq!(d.broadcasts.len(), 2);
}

// ── Events ────────────────────────────────────────────────────

#[test]
fn events_drain_as_flagged_reports() {
    let (mut bus, _) = bus();
    let id = bus
        .add_service(BUTTON_CLASS, &catalog::BUTTON, Box::new(BasicService::new()))
        .unwrap();

    assert_eq!(bus.emit_event(id, button::EVENT_DOWN, &[]), Ok(true));
    assert_eq!(bus.emit_event(id, button::EVENT_UP, &500u32.to_le_bytes()), Ok(true));
    assert!(bus.emit_event(id, 0x8001, &[]).is_err());
    assert!(bus.emit_event(9, button::EVENT_DOWN, &[]).is_err());

    let mut out = Vec::new();
    bus.drain_events(|r| out.push(r));
    assert_eq!(out.len(), 2);
    assert_eq!(out[0].code, 0x8001);
    assert_eq!(out[1].code, 0x8002);
    assert_eq!(out[1].payload, 500u32.to_le_bytes());
    assert_eq!(bus.pending_events(), 0);
}

// ── Reset ─────────────────────────────────────────────────────

#[test]
fn reset_command_restores_defaults_and_resets_device() {
    let (mut bus, device) = bus();
    let id = bus
        .add_service(LIGHT_CLASS, &catalog::LIGHT, Box::new(BasicService::new()))
        .unwrap();
    bus.add_service(BUTTON_CLASS, &catalog::BUTTON, Box::new(BasicService::new()))
        .unwrap();
    bus.dispatch(id, &Packet::new(set_register_code(light::REG_BRIGHTNESS), &[99]));
    bus.emit_event(2, button::EVENT_DOWN, &[]).unwrap();
    device.0.borrow_mut().uptime_us = 5_000;

    let r = bus.dispatch(0, &Packet::new(control::CMD_RESET, &[]).with_ack());
    assert_eq!(r.map(|r| r.kind), Some(ReportKind::Ack));

    assert_eq!(device.0.borrow().resets, 1);
    assert_eq!(bus.registers(id).unwrap().read_uint(light::REG_BRIGHTNESS), Some(15));
    assert_eq!(bus.pending_events(), 0);
    assert_eq!(bus.registers(0).unwrap().read_uint(control::REG_UPTIME), Some(5_000));
    // Constants survive.
    assert_eq!(
        bus.registers(0).unwrap().read(control::REG_DEVICE_DESCRIPTION).unwrap().bytes,
        b"regbus device"
    );
}

#[test]
fn snapshot_moves_writable_registers_between_devices() {
    let (mut a, _) = bus();
    let (mut b, _) = bus();
    let ia = a
        .add_service(LIGHT_CLASS, &catalog::LIGHT, Box::new(BasicService::new()))
        .unwrap();
    let ib = b
        .add_service(LIGHT_CLASS, &catalog::LIGHT, Box::new(BasicService::new()))
        .unwrap();
    a.dispatch(ia, &Packet::new(set_register_code(light::REG_NUM_PIXELS), &[60, 0]));

    let bytes = a.registers(ia).unwrap().snapshot().to_bytes().unwrap();
    let snap = RegisterSnapshot::from_bytes(&bytes).unwrap();
    b.registers_mut(ib).unwrap().restore(&snap);
    assert_eq!(b.registers(ib).unwrap().read_uint(light::REG_NUM_PIXELS), Some(60));
}
