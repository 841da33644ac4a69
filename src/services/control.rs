//! Control service (always service 0).
//!
//! Announces the device's service list, answers identify/reset, and keeps
//! the uptime and MCU temperature registers fresh from a [`DevicePort`].

use log::{info, warn};

use super::{ServiceContext, ServiceHandler};
use crate::config::BusConfig;
use crate::consts::control;
use crate::error::{CodecError, Error};
use crate::ports::DevicePort;
use crate::registers::RegisterType;

pub struct ControlService {
    device: Box<dyn DevicePort>,
    description: String,
    firmware_version: String,
    device_class: u32,
    reset_pending: bool,
}

impl ControlService {
    pub fn new(device: Box<dyn DevicePort>, config: &BusConfig) -> Self {
        Self {
            device,
            description: config.device_description.clone(),
            firmware_version: config.firmware_version.clone(),
            device_class: config.device_class,
            reset_pending: false,
        }
    }

    fn refresh(&self, ctx: &mut ServiceContext<'_>) {
        let uptime = self.device.uptime_us();
        if let Err(e) = ctx.registers.update(control::REG_UPTIME, &uptime.to_le_bytes()) {
            warn!("BUS[0]: uptime refresh failed: {}", e);
        }
        if let Some(t) = self.device.temperature_c() {
            if let Err(e) = ctx.registers.update(control::REG_TEMPERATURE, &t.to_le_bytes()) {
                warn!("BUS[0]: temperature refresh failed: {}", e);
            }
        }
    }
}

/// Preset a string constant, truncated to the register's declared maximum.
fn preset_str(ctx: &mut ServiceContext<'_>, addr: u16, text: &str) -> Result<(), Error> {
    let max = match ctx.registers.descriptor(addr).map(|d| d.ty) {
        Some(RegisterType::Bytes { max_len }) => max_len,
        _ => text.len(),
    };
    let mut end = text.len().min(max);
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    ctx.registers.preset(addr, &text.as_bytes()[..end])?;
    Ok(())
}

impl ServiceHandler for ControlService {
    fn init(&mut self, ctx: &mut ServiceContext<'_>) -> Result<(), Error> {
        preset_str(ctx, control::REG_DEVICE_DESCRIPTION, &self.description)?;
        preset_str(ctx, control::REG_FIRMWARE_VERSION, &self.firmware_version)?;
        let class = self.device_class.to_le_bytes();
        ctx.registers.preset(control::REG_DEVICE_CLASS, &class)?;
        ctx.registers.preset(control::REG_BOOTLOADER_DEVICE_CLASS, &class)?;
        self.refresh(ctx);
        Ok(())
    }

    /// Service classes of every other service, u32 LE each.
    fn announce(&mut self, ctx: &mut ServiceContext<'_>) -> Vec<u8> {
        ctx.classes
            .iter()
            .skip(1)
            .flat_map(|c| c.to_le_bytes())
            .collect()
    }

    fn description(&mut self, _ctx: &mut ServiceContext<'_>) -> Option<Vec<u8>> {
        Some(self.description.as_bytes().to_vec())
    }

    fn command(
        &mut self,
        ctx: &mut ServiceContext<'_>,
        code: u16,
        _payload: &[u8],
    ) -> Result<Option<Vec<u8>>, Error> {
        match code {
            control::CMD_NOOP => Ok(None),
            control::CMD_IDENTIFY => {
                info!("BUS[0]: identify");
                self.device.identify();
                Ok(None)
            }
            control::CMD_RESET => {
                info!("BUS[0]: reset requested");
                self.reset_pending = true;
                ctx.reset_requested = true;
                Ok(None)
            }
            other => Err(CodecError::UnsupportedCommand(other).into()),
        }
    }

    fn tick(&mut self, ctx: &mut ServiceContext<'_>, _delta_ms: u32) {
        self.refresh(ctx);
    }

    fn reset(&mut self, ctx: &mut ServiceContext<'_>) {
        self.refresh(ctx);
        if self.reset_pending {
            self.reset_pending = false;
            self.device.reset();
        }
    }
}
