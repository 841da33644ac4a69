//! WiFi service: scan results over a pipe, connect/disconnect, IP events.

use heapless::Deque;
use log::{info, warn};

use super::{ServiceContext, ServiceHandler};
use crate::bus::pipe::{PipeOrigin, PipePair};
use crate::consts::wifi;
use crate::error::{CodecError, Error};
use crate::ports::{AccessPoint, WifiPort};

/// Encoded size of one scan result record.
pub const AP_RECORD_LEN: usize = 49;
const SSID_FIELD_LEN: usize = 33;
/// Scan results streamed per scan; the radio's order decides which stay.
pub const MAX_SCAN_RESULTS: usize = 32;

/// `flags u32 | reserved u32 | rssi i8 | channel u8 | bssid [6] | ssid [33]`,
/// the ssid NUL padded (and truncated to 32 bytes).
pub fn encode_ap(ap: &AccessPoint) -> [u8; AP_RECORD_LEN] {
    let mut out = [0u8; AP_RECORD_LEN];
    out[0..4].copy_from_slice(&ap.flags.to_le_bytes());
    out[8] = ap.rssi as u8;
    out[9] = ap.channel;
    out[10..16].copy_from_slice(&ap.bssid);
    let ssid = ap.ssid.as_bytes();
    let n = ssid.len().min(SSID_FIELD_LEN - 1);
    out[16..16 + n].copy_from_slice(&ssid[..n]);
    out
}

/// `ssid NUL [password NUL]`.  A missing or empty password means an open
/// network.
fn parse_credentials(payload: &[u8]) -> Option<(&str, Option<&str>)> {
    let mut parts = payload.split(|b| *b == 0);
    let ssid = parts.next().filter(|s| !s.is_empty())?;
    // The ssid must be NUL terminated.
    if ssid.len() == payload.len() {
        return None;
    }
    let password = parts.next().filter(|p| !p.is_empty());
    let ssid = core::str::from_utf8(ssid).ok()?;
    let password = match password {
        Some(p) => Some(core::str::from_utf8(p).ok()?),
        None => None,
    };
    Some((ssid, password))
}

struct ScanStream {
    pair: PipePair,
    pending: Deque<[u8; AP_RECORD_LEN], MAX_SCAN_RESULTS>,
}

pub struct WifiService {
    radio: Box<dyn WifiPort>,
    scan: Option<ScanStream>,
    had_ip: bool,
}

impl WifiService {
    pub fn new(radio: Box<dyn WifiPort>) -> Self {
        Self {
            radio,
            scan: None,
            had_ip: false,
        }
    }

    /// Push queued scan records into the pipe; finish it once all are sent.
    fn flush_scan(&mut self, ctx: &mut ServiceContext<'_>) {
        let Some(scan) = self.scan.as_mut() else {
            return;
        };
        let inbound = scan.pair.inbound;
        if !ctx.pipes.is_open(inbound) {
            info!("WIFI[{}]: scan pipe closed by host", ctx.service_id);
            self.scan = None;
            return;
        }
        while let Some(record) = scan.pending.front() {
            if ctx.pipes.is_full(inbound) {
                return;
            }
            if let Err(e) = ctx.pipes.send_data(inbound, record) {
                warn!("WIFI[{}]: scan record lost: {}", ctx.service_id, e);
            }
            scan.pending.pop_front();
        }
        if let Err(e) = ctx.pipes.finish(inbound) {
            warn!("WIFI[{}]: finishing scan pipe: {}", ctx.service_id, e);
        }
        self.scan = None;
    }

    fn start_scan(
        &mut self,
        ctx: &mut ServiceContext<'_>,
        descriptor: &[u8],
    ) -> Result<Option<Vec<u8>>, Error> {
        if let Some(old) = self.scan.take() {
            let _ = ctx.pipes.close(old.pair.inbound);
        }
        let origin = PipeOrigin {
            service_id: ctx.service_id,
            command_code: wifi::CMD_SCAN,
        };
        let pair = ctx.pipes.open(origin, descriptor)?;
        let results = match self.radio.scan() {
            Ok(r) => r,
            Err(e) => {
                warn!("WIFI[{}]: scan failed: {}", ctx.service_id, e);
                let _ = ctx.pipes.close(pair.inbound);
                return Err(e.into());
            }
        };
        info!("WIFI[{}]: scan found {} network(s)", ctx.service_id, results.len());
        if results.len() > MAX_SCAN_RESULTS {
            warn!(
                "WIFI[{}]: {} scan result(s) over the limit dropped",
                ctx.service_id,
                results.len() - MAX_SCAN_RESULTS
            );
        }
        let mut pending = Deque::new();
        for ap in results.iter().take(MAX_SCAN_RESULTS) {
            let _ = pending.push_back(encode_ap(ap));
        }
        self.scan = Some(ScanStream { pair, pending });
        self.flush_scan(ctx);
        Ok(Some(pair.to_bytes().to_vec()))
    }
}

impl ServiceHandler for WifiService {
    fn command(
        &mut self,
        ctx: &mut ServiceContext<'_>,
        code: u16,
        payload: &[u8],
    ) -> Result<Option<Vec<u8>>, Error> {
        match code {
            wifi::CMD_SCAN => self.start_scan(ctx, payload),
            wifi::CMD_CONNECT => {
                let (ssid, password) =
                    parse_credentials(payload).ok_or(CodecError::BadPayload(code))?;
                info!("WIFI[{}]: connecting to {:?}", ctx.service_id, ssid);
                self.radio.connect(ssid, password)?;
                Ok(None)
            }
            wifi::CMD_DISCONNECT => {
                info!("WIFI[{}]: disconnect", ctx.service_id);
                self.radio.disconnect();
                Ok(None)
            }
            other => Err(CodecError::UnsupportedCommand(other).into()),
        }
    }

    fn tick(&mut self, ctx: &mut ServiceContext<'_>, _delta_ms: u32) {
        self.flush_scan(ctx);

        let has_ip = self.radio.has_ip();
        if has_ip == self.had_ip {
            return;
        }
        self.had_ip = has_ip;
        let code = if has_ip {
            wifi::EVENT_GOT_IP
        } else {
            wifi::EVENT_LOST_IP
        };
        info!("WIFI[{}]: {}", ctx.service_id, if has_ip { "got IP" } else { "lost IP" });
        if let Err(e) = ctx.emit(code, &[]) {
            warn!("WIFI[{}]: IP event dropped: {}", ctx.service_id, e);
        }
    }

    fn reset(&mut self, _ctx: &mut ServiceContext<'_>) {
        self.scan = None;
        self.had_ip = false;
        self.radio.disconnect();
    }
}
