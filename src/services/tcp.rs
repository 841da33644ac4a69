//! TCP service: one TLS connection tunnelled through a pipe pair.
//!
//! ```text
//!  host ── Open(descriptor) ──▶ reply: inbound u16 | outbound u16
//!  host ══ meta OpenSsl(port u16, host) ══▶ connect
//!       ◀═ data (empty) ═══════════════════  connected
//!  host ══ data (outdata) ═════════════════▶ socket.send
//!       ◀═ data (indata) ══════════════════  socket.recv
//!       ◀═ meta Error(i32) ════════════════  protocol misuse
//! ```
//!
//! A socket failure closes the pipe pair; the host sees `PipeClosed`.

use log::{info, warn};

use super::{ServiceContext, ServiceHandler};
use crate::bus::pipe::{PIPE_DEPTH, PipeOrigin, PipePair, PipeRecord};
use crate::consts::{MAX_PAYLOAD, tcp};
use crate::error::{CodecError, Error};
use crate::ports::SocketPort;

pub struct TcpService {
    socket: Box<dyn SocketPort>,
    pipe: Option<PipePair>,
    ssl_requested: bool,
    connected: bool,
}

impl TcpService {
    pub fn new(socket: Box<dyn SocketPort>) -> Self {
        Self {
            socket,
            pipe: None,
            ssl_requested: false,
            connected: false,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn pipe(&self) -> Option<PipePair> {
        self.pipe
    }

    fn teardown(&mut self, ctx: &mut ServiceContext<'_>) {
        if self.connected || self.ssl_requested {
            self.socket.close();
        }
        if let Some(pair) = self.pipe.take() {
            // Already gone if the host closed it.
            let _ = ctx.pipes.close(pair.inbound);
            info!("TCP[{}]: connection closed", ctx.service_id);
        }
        self.connected = false;
        self.ssl_requested = false;
    }

    fn send_error(ctx: &mut ServiceContext<'_>, pair: PipePair, err: tcp::TcpError) {
        let code = (err as i32).to_le_bytes();
        if let Err(e) = ctx.pipes.send_meta(pair.inbound, tcp::PIPE_CMD_ERROR, &code) {
            warn!("TCP[{}]: error record lost: {}", ctx.service_id, e);
        }
    }

    fn handle_record(&mut self, ctx: &mut ServiceContext<'_>, pair: PipePair, record: PipeRecord) {
        match record {
            PipeRecord::Meta { code, bytes } if code == tcp::PIPE_CMD_OPEN_SSL => {
                if self.ssl_requested {
                    Self::send_error(ctx, pair, tcp::TcpError::InvalidCommand);
                    return;
                }
                let Some((port, host)) = parse_open_ssl(&bytes) else {
                    Self::send_error(ctx, pair, tcp::TcpError::InvalidCommandPayload);
                    return;
                };
                self.ssl_requested = true;
                match self.socket.connect_tls(host, port) {
                    Ok(()) => {
                        info!("TCP[{}]: connected to {}:{}", ctx.service_id, host, port);
                        self.connected = true;
                        if let Err(e) = ctx.pipes.send_data(pair.inbound, &[]) {
                            warn!("TCP[{}]: connect notice lost: {}", ctx.service_id, e);
                        }
                    }
                    Err(e) => {
                        warn!("TCP[{}]: connect to {}:{} failed: {}", ctx.service_id, host, port, e);
                        self.teardown(ctx);
                    }
                }
            }
            PipeRecord::Meta { .. } => Self::send_error(ctx, pair, tcp::TcpError::InvalidCommand),
            PipeRecord::Data(bytes) => {
                if !self.connected {
                    Self::send_error(ctx, pair, tcp::TcpError::InvalidCommand);
                    return;
                }
                if let Err(e) = self.socket.send(&bytes) {
                    warn!("TCP[{}]: send failed: {}", ctx.service_id, e);
                    self.teardown(ctx);
                }
            }
        }
    }

    fn pump_socket(&mut self, ctx: &mut ServiceContext<'_>, pair: PipePair) {
        let mut buf = [0u8; MAX_PAYLOAD];
        for _ in 0..PIPE_DEPTH {
            if ctx.pipes.is_full(pair.inbound) {
                break;
            }
            match self.socket.recv(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    if let Err(e) = ctx.pipes.send_data(pair.inbound, &buf[..n.min(MAX_PAYLOAD)]) {
                        warn!("TCP[{}]: indata lost: {}", ctx.service_id, e);
                        break;
                    }
                }
                Err(e) => {
                    warn!("TCP[{}]: receive failed: {}", ctx.service_id, e);
                    self.teardown(ctx);
                    break;
                }
            }
        }
    }
}

/// `port u16 LE` followed by the host name, optionally NUL-terminated.
fn parse_open_ssl(bytes: &[u8]) -> Option<(u16, &str)> {
    let (port, host) = bytes.split_first_chunk::<2>()?;
    let host = host.strip_suffix(&[0]).unwrap_or(host);
    if host.is_empty() || host.contains(&0) {
        return None;
    }
    Some((u16::from_le_bytes(*port), core::str::from_utf8(host).ok()?))
}

impl ServiceHandler for TcpService {
    fn command(
        &mut self,
        ctx: &mut ServiceContext<'_>,
        code: u16,
        payload: &[u8],
    ) -> Result<Option<Vec<u8>>, Error> {
        if code != tcp::CMD_OPEN {
            return Err(CodecError::UnsupportedCommand(code).into());
        }
        if self.pipe.is_some() {
            self.teardown(ctx);
        }
        let origin = PipeOrigin {
            service_id: ctx.service_id,
            command_code: code,
        };
        let pair = ctx.pipes.open(origin, payload)?;
        self.pipe = Some(pair);
        Ok(Some(pair.to_bytes().to_vec()))
    }

    fn tick(&mut self, ctx: &mut ServiceContext<'_>, _delta_ms: u32) {
        let Some(pair) = self.pipe else {
            return;
        };
        if !ctx.pipes.is_open(pair.inbound) {
            self.teardown(ctx);
            return;
        }

        for _ in 0..PIPE_DEPTH {
            match ctx.pipes.receive(pair.outbound) {
                Ok(Some(rec)) => self.handle_record(ctx, pair, rec.record),
                Ok(None) => break,
                Err(_) => {
                    self.teardown(ctx);
                    return;
                }
            }
            if self.pipe.is_none() {
                return;
            }
        }

        if self.connected {
            self.pump_socket(ctx, pair);
        }
    }

    fn reset(&mut self, ctx: &mut ServiceContext<'_>) {
        self.teardown(ctx);
    }
}
