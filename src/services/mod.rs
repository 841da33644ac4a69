//! Service handlers.
//!
//! The dispatcher owns decoding, register access and error reporting.
//! Whatever a service does beyond its registers lives behind
//! [`ServiceHandler`]: service-specific commands, announce payloads, pipe
//! traffic and periodic work.
//!
//! ```text
//!   Dispatcher ──▶ ServiceHandler ──▶ Port trait ──▶ device
//!        │               │
//!        └─ registers ◀──┴─ ServiceContext (registers, pipes, events)
//! ```

pub mod basic;
pub mod bootloader;
pub mod catalog;
pub mod control;
pub mod tcp;
pub mod wifi;

use crate::bus::PipeTable;
use crate::bus::codec::CommandSpec;
use crate::consts::base;
use crate::error::{CodecError, Error};
use crate::events::{BusEvent, EventQueue};
use crate::registers::{RegisterDescriptor, RegisterStore};

pub use basic::BasicService;
pub use bootloader::BootloaderService;
pub use control::ControlService;
pub use tcp::TcpService;
pub use wifi::WifiService;

/// Static metadata of one kind of service.
#[derive(Debug, Clone, Copy)]
pub struct ServiceDescriptor {
    pub name: &'static str,
    pub registers: &'static [RegisterDescriptor],
    pub commands: &'static [CommandSpec],
}

/// Everything a handler may touch while serving one request or tick.
pub struct ServiceContext<'a> {
    pub service_id: u8,
    /// Service class of every service on the device, indexed by id.
    pub classes: &'a [u32],
    pub registers: &'a mut RegisterStore,
    pub pipes: &'a mut PipeTable,
    pub events: &'a mut EventQueue,
    /// Set by a handler to ask for a full device reset once it returns.
    pub reset_requested: bool,
}

impl ServiceContext<'_> {
    /// This service's class.
    pub fn service_class(&self) -> u32 {
        self.classes
            .get(usize::from(self.service_id))
            .copied()
            .unwrap_or_default()
    }

    /// Queue an event.  Returns `false` if the queue was full.
    pub fn emit(&mut self, code: u16, payload: &[u8]) -> Result<bool, Error> {
        let event = BusEvent::new(self.service_id, code, payload)?;
        Ok(self.events.push(event))
    }
}

/// Behaviour of one service instance.  Every method has a default, so a
/// register-only service implements nothing.
pub trait ServiceHandler {
    /// Called once when the service is added, before constant registers
    /// are sealed.
    fn init(&mut self, _ctx: &mut ServiceContext<'_>) -> Result<(), Error> {
        Ok(())
    }

    /// Payload of the `Announce` report.  Defaults to the service class.
    fn announce(&mut self, ctx: &mut ServiceContext<'_>) -> Vec<u8> {
        ctx.service_class().to_le_bytes().to_vec()
    }

    fn calibrate(&mut self, _ctx: &mut ServiceContext<'_>) -> Result<(), Error> {
        Err(CodecError::UnsupportedCommand(base::CMD_CALIBRATE).into())
    }

    /// Payload of the `Description` report; `None` uses the descriptor name.
    fn description(&mut self, _ctx: &mut ServiceContext<'_>) -> Option<Vec<u8>> {
        None
    }

    /// A service-specific command whose payload already passed its
    /// [`PayloadRule`](crate::bus::codec::PayloadRule).  `Ok(Some(bytes))`
    /// becomes a data report.
    fn command(
        &mut self,
        _ctx: &mut ServiceContext<'_>,
        code: u16,
        _payload: &[u8],
    ) -> Result<Option<Vec<u8>>, Error> {
        Err(CodecError::UnsupportedCommand(code).into())
    }

    /// A host `SetRegister` succeeded.
    fn on_register_written(&mut self, _ctx: &mut ServiceContext<'_>, _addr: u16) {}

    /// Periodic work, driven by [`Dispatcher::tick`](crate::bus::Dispatcher::tick).
    fn tick(&mut self, _ctx: &mut ServiceContext<'_>, _delta_ms: u32) {}

    /// Device reset.  Registers, pipes and events are already reset.
    fn reset(&mut self, _ctx: &mut ServiceContext<'_>) {}
}
