//! Bootloader service: `Info`, `SetSession` and `PageData` on top of the
//! [`Flasher`].

use log::info;

use super::{ServiceContext, ServiceHandler};
use crate::bootloader::{Flasher, FlasherState, InfoReply, wire};
use crate::config::FlashGeometry;
use crate::consts::bootloader as boot;
use crate::error::{CodecError, Error};
use crate::ports::FlashPort;

pub struct BootloaderService {
    flasher: Flasher,
    flash: Box<dyn FlashPort>,
    device_class: u32,
}

impl BootloaderService {
    /// Fails with [`Error::Config`] if `geometry` does not validate.
    pub fn new(
        geometry: FlashGeometry,
        device_class: u32,
        flash: Box<dyn FlashPort>,
    ) -> Result<Self, Error> {
        Ok(Self {
            flasher: Flasher::new(geometry)?,
            flash,
            device_class,
        })
    }

    pub fn state(&self) -> FlasherState {
        self.flasher.state()
    }

    pub fn flasher(&self) -> &Flasher {
        &self.flasher
    }
}

impl ServiceHandler for BootloaderService {
    /// `Info` shares the announce code.
    fn announce(&mut self, _ctx: &mut ServiceContext<'_>) -> Vec<u8> {
        let g = self.flasher.geometry();
        InfoReply::new(g.page_size, g.flashable_size(), self.device_class)
            .encode()
            .to_vec()
    }

    fn command(
        &mut self,
        _ctx: &mut ServiceContext<'_>,
        code: u16,
        payload: &[u8],
    ) -> Result<Option<Vec<u8>>, Error> {
        match code {
            boot::CMD_SET_SESSION => {
                let session_id =
                    wire::parse_session(payload).ok_or(CodecError::BadPayload(code))?;
                self.flasher.set_session(session_id);
                Ok(Some(session_id.to_le_bytes().to_vec()))
            }
            boot::CMD_PAGE_DATA => {
                let outcome = self.flasher.page_data(payload, self.flash.as_mut());
                let session_id = self.flasher.session_id().unwrap_or_default();
                Ok(outcome.report(session_id).map(|r| r.encode().to_vec()))
            }
            other => Err(CodecError::UnsupportedCommand(other).into()),
        }
    }

    fn reset(&mut self, _ctx: &mut ServiceContext<'_>) {
        if self.flasher.state() != FlasherState::Idle {
            info!("BOOT: session aborted by device reset");
        }
        self.flasher.reset();
    }
}
