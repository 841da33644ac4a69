//! Register-only services (sensors, actuators).
//!
//! Registers are served by the dispatcher.  Service-specific commands and
//! `Calibrate` go to an optional [`CommandPort`].

use log::warn;

use super::{ServiceContext, ServiceHandler};
use crate::consts::base;
use crate::error::{CodecError, Error};
use crate::ports::CommandPort;

#[derive(Default)]
pub struct BasicService {
    port: Option<Box<dyn CommandPort>>,
}

impl BasicService {
    pub fn new() -> Self {
        Self { port: None }
    }

    pub fn with_port(port: Box<dyn CommandPort>) -> Self {
        Self { port: Some(port) }
    }

    fn forward(&mut self, id: u8, code: u16, payload: &[u8]) -> Result<Option<Vec<u8>>, Error> {
        let Some(port) = self.port.as_mut() else {
            return Err(CodecError::UnsupportedCommand(code).into());
        };
        port.execute(code, payload).map_err(|e| {
            warn!("BUS[{}]: command 0x{:x} failed: {}", id, code, e);
            Error::from(e)
        })
    }
}

impl ServiceHandler for BasicService {
    fn calibrate(&mut self, ctx: &mut ServiceContext<'_>) -> Result<(), Error> {
        self.forward(ctx.service_id, base::CMD_CALIBRATE, &[]).map(|_| ())
    }

    fn command(
        &mut self,
        ctx: &mut ServiceContext<'_>,
        code: u16,
        payload: &[u8],
    ) -> Result<Option<Vec<u8>>, Error> {
        self.forward(ctx.service_id, code, payload)
    }
}
