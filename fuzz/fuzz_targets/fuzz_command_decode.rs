//! Fuzz target: `codec::decode` and `Dispatcher::dispatch`
//!
//! The first three bytes pick the service id and the command code, the rest
//! is the payload.  Decoding and dispatching must never panic, and a report
//! always echoes the request it answers.
//!
//! cargo fuzz run fuzz_command_decode

#![no_main]

use libfuzzer_sys::fuzz_target;
use regbus::bus::codec::{self, CommandTable};
use regbus::bus::{Dispatcher, Packet};
use regbus::config::BusConfig;
use regbus::ports::DevicePort;
use regbus::services::{BasicService, ControlService, catalog};

struct Idle;

impl DevicePort for Idle {
    fn identify(&mut self) {}
    fn reset(&mut self) {}
    fn uptime_us(&self) -> u64 {
        0
    }
    fn temperature_c(&self) -> Option<i16> {
        None
    }
}

fuzz_target!(|data: &[u8]| {
    if data.len() < 3 {
        return;
    }
    let service_id = data[0] % 4;
    let code = u16::from_le_bytes([data[1], data[2]]);
    let payload = &data[3..];

    let _ = codec::decode(code, payload, &CommandTable::EMPTY);

    let config = BusConfig::default();
    let control = ControlService::new(Box::new(Idle), &config);
    let Ok(mut bus) = Dispatcher::new(config, control) else {
        return;
    };
    for desc in [&catalog::PWM_LIGHT, &catalog::SERVO, &catalog::GAMEPAD] {
        if bus.add_service(0x1000_0000, desc, Box::new(BasicService::new())).is_err() {
            return;
        }
    }

    if let Some(report) = bus.dispatch(service_id, &Packet::new(code, payload).with_ack()) {
        assert_eq!(report.service_id, service_id);
        assert_eq!(report.code, code);
    }
});
