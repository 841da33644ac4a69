//! Pipe transport.
//!
//! A command (e.g. `TCP.Open`, `Wifi.Scan`) opens a pipe pair; records then
//! flow independently of the register/command channel until the pair is
//! closed.
//!
//! ```text
//!              inbound  (device → host)   scan results, TCP indata
//!  service  ═══════════════════════════▶  host
//!           ◀═══════════════════════════
//!              outbound (host → device)   TCP outdata, meta commands
//! ```
//!
//! Each direction is a bounded `embassy-sync` channel.  Everything runs in
//! one context, so the channels use `NoopRawMutex`.

use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::channel::Channel;
use heapless::Vec as HVec;
use log::{debug, info, warn};

use crate::consts::MAX_PAYLOAD;
use crate::error::PipeError;

/// Records queued per direction.
pub const PIPE_DEPTH: usize = 8;

/// Longest opening descriptor blob.
pub const MAX_DESCRIPTOR_LEN: usize = 16;

// ── Types ─────────────────────────────────────────────────────

/// Opaque pipe identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PipeHandle(u16);

impl PipeHandle {
    pub const fn raw(self) -> u16 {
        self.0
    }

    pub const fn from_raw(raw: u16) -> Self {
        Self(raw)
    }
}

impl core::fmt::Display for PipeHandle {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Request that opened a pipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipeOrigin {
    pub service_id: u8,
    pub command_code: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipePair {
    /// Device → host.
    pub inbound: PipeHandle,
    /// Host → device.
    pub outbound: PipeHandle,
}

impl PipePair {
    /// Reply payload of a pipe-opening command: `inbound u16 | outbound u16`.
    pub fn to_bytes(self) -> [u8; 4] {
        let mut out = [0u8; 4];
        out[..2].copy_from_slice(&self.inbound.raw().to_le_bytes());
        out[2..].copy_from_slice(&self.outbound.raw().to_le_bytes());
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let (inbound, rest) = bytes.split_first_chunk::<2>()?;
        let (outbound, _) = rest.split_first_chunk::<2>()?;
        Some(Self {
            inbound: PipeHandle(u16::from_le_bytes(*inbound)),
            outbound: PipeHandle(u16::from_le_bytes(*outbound)),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipeRecord {
    Data(HVec<u8, MAX_PAYLOAD>),
    Meta {
        code: u16,
        bytes: HVec<u8, MAX_PAYLOAD>,
    },
}

impl PipeRecord {
    pub fn data(bytes: &[u8]) -> Result<Self, PipeError> {
        HVec::from_slice(bytes)
            .map(Self::Data)
            .map_err(|_| PipeError::RecordTooLarge)
    }

    pub fn meta(code: u16, bytes: &[u8]) -> Result<Self, PipeError> {
        HVec::from_slice(bytes)
            .map(|bytes| Self::Meta { code, bytes })
            .map_err(|_| PipeError::RecordTooLarge)
    }

    pub fn bytes(&self) -> &[u8] {
        match self {
            Self::Data(b) | Self::Meta { bytes: b, .. } => b,
        }
    }
}

/// A received record with the sequence number assigned at send time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sequenced {
    pub seq: u16,
    pub record: PipeRecord,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipeState {
    /// Opened, nothing sent yet.
    Open,
    Streaming,
    Closed,
}

// ── Table ─────────────────────────────────────────────────────

struct PipeEnd {
    handle: PipeHandle,
    queue: Channel<NoopRawMutex, Sequenced, PIPE_DEPTH>,
    next_seq: u16,
    finished: bool,
    dropped: u32,
}

impl PipeEnd {
    fn new(handle: PipeHandle) -> Self {
        Self {
            handle,
            queue: Channel::new(),
            next_seq: 0,
            finished: false,
            dropped: 0,
        }
    }
}

struct PipeSlot {
    origin: PipeOrigin,
    descriptor: HVec<u8, MAX_DESCRIPTOR_LEN>,
    inbound: PipeEnd,
    outbound: PipeEnd,
    streaming: bool,
}

impl PipeSlot {
    fn end(&self, handle: PipeHandle) -> &PipeEnd {
        if self.inbound.handle == handle {
            &self.inbound
        } else {
            &self.outbound
        }
    }

    fn end_mut(&mut self, handle: PipeHandle) -> &mut PipeEnd {
        if self.inbound.handle == handle {
            &mut self.inbound
        } else {
            &mut self.outbound
        }
    }

    fn owns(&self, handle: PipeHandle) -> bool {
        self.inbound.handle == handle || self.outbound.handle == handle
    }
}

/// All open pipe pairs of one device.
pub struct PipeTable {
    slots: Vec<PipeSlot>,
    max_pipes: usize,
    next_handle: u16,
}

impl PipeTable {
    pub fn new(max_pipes: usize) -> Self {
        Self {
            slots: Vec::new(),
            // Every pair needs two distinct non-zero u16 handles.
            max_pipes: max_pipes.min(usize::from(u16::MAX) / 2),
            next_handle: 1,
        }
    }

    /// Open a pair for the request `origin`.  `descriptor` is the opaque
    /// inbound-pipe blob carried by the opening command.
    pub fn open(&mut self, origin: PipeOrigin, descriptor: &[u8]) -> Result<PipePair, PipeError> {
        if descriptor.is_empty() {
            return Err(PipeError::BadDescriptor);
        }
        let descriptor = HVec::from_slice(descriptor).map_err(|_| PipeError::BadDescriptor)?;
        if self.slots.len() >= self.max_pipes {
            warn!("PIPE: table full ({} pairs)", self.slots.len());
            return Err(PipeError::TableFull);
        }

        let pair = self.alloc_pair();
        self.slots.push(PipeSlot {
            origin,
            descriptor,
            inbound: PipeEnd::new(pair.inbound),
            outbound: PipeEnd::new(pair.outbound),
            streaming: false,
        });
        info!(
            "PIPE: opened {}/{} for service {} cmd 0x{:x}",
            pair.inbound, pair.outbound, origin.service_id, origin.command_code
        );
        Ok(pair)
    }

    /// Queue a record.  Returns its sequence number.
    pub fn send(&mut self, handle: PipeHandle, record: PipeRecord) -> Result<u16, PipeError> {
        let slot = self.slot_mut(handle)?;
        slot.streaming = true;
        let end = slot.end_mut(handle);
        if end.finished {
            return Err(PipeError::Closed);
        }
        let seq = end.next_seq;
        match end.queue.try_send(Sequenced { seq, record }) {
            Ok(()) => {
                end.next_seq = end.next_seq.wrapping_add(1);
                Ok(seq)
            }
            Err(_) => {
                end.dropped = end.dropped.wrapping_add(1);
                warn!("PIPE: {} full, record dropped", handle);
                Err(PipeError::Full)
            }
        }
    }

    pub fn send_data(&mut self, handle: PipeHandle, bytes: &[u8]) -> Result<u16, PipeError> {
        self.send(handle, PipeRecord::data(bytes)?)
    }

    pub fn send_meta(&mut self, handle: PipeHandle, code: u16, bytes: &[u8]) -> Result<u16, PipeError> {
        self.send(handle, PipeRecord::meta(code, bytes)?)
    }

    /// Take the oldest queued record, `Ok(None)` if nothing is pending.
    /// A finished direction tears its pair down once drained.
    pub fn receive(&mut self, handle: PipeHandle) -> Result<Option<Sequenced>, PipeError> {
        let slot = self.slot_mut(handle)?;
        let end = slot.end_mut(handle);
        let record = end.queue.try_receive().ok();
        let drained = end.finished && end.queue.is_empty();
        if drained {
            self.remove(handle);
        }
        Ok(record)
    }

    /// Graceful half-close: queued records stay receivable, further sends
    /// fail.
    pub fn finish(&mut self, handle: PipeHandle) -> Result<(), PipeError> {
        let slot = self.slot_mut(handle)?;
        let end = slot.end_mut(handle);
        end.finished = true;
        let drained = end.queue.is_empty();
        debug!("PIPE: {} finished", handle);
        if drained {
            self.remove(handle);
        }
        Ok(())
    }

    /// Tear down both directions immediately, discarding queued records.
    pub fn close(&mut self, handle: PipeHandle) -> Result<(), PipeError> {
        self.slot_mut(handle)?;
        self.remove(handle);
        Ok(())
    }

    pub fn close_all(&mut self) {
        if !self.slots.is_empty() {
            info!("PIPE: closing {} pair(s)", self.slots.len());
        }
        self.slots.clear();
    }

    pub fn state(&self, handle: PipeHandle) -> PipeState {
        match self.slot(handle) {
            None => PipeState::Closed,
            Some(s) if s.streaming => PipeState::Streaming,
            Some(_) => PipeState::Open,
        }
    }

    pub fn is_open(&self, handle: PipeHandle) -> bool {
        self.slot(handle).is_some()
    }

    pub fn origin(&self, handle: PipeHandle) -> Option<PipeOrigin> {
        self.slot(handle).map(|s| s.origin)
    }

    pub fn descriptor(&self, handle: PipeHandle) -> Option<&[u8]> {
        self.slot(handle).map(|s| s.descriptor.as_slice())
    }

    /// The other direction of the same pair.
    pub fn peer(&self, handle: PipeHandle) -> Option<PipeHandle> {
        self.slot(handle).map(|s| {
            if s.inbound.handle == handle {
                s.outbound.handle
            } else {
                s.inbound.handle
            }
        })
    }

    /// Records dropped on this direction because its queue was full.
    pub fn dropped(&self, handle: PipeHandle) -> u32 {
        self.slot(handle).map_or(0, |s| s.end(handle).dropped)
    }

    /// Whether a send on this direction would fail with `Full`.
    pub fn is_full(&self, handle: PipeHandle) -> bool {
        self.slot(handle).is_some_and(|s| s.end(handle).queue.is_full())
    }

    pub fn open_count(&self) -> usize {
        self.slots.len()
    }

    // ── Internal ──────────────────────────────────────────────

    fn slot(&self, handle: PipeHandle) -> Option<&PipeSlot> {
        self.slots.iter().find(|s| s.owns(handle))
    }

    fn slot_mut(&mut self, handle: PipeHandle) -> Result<&mut PipeSlot, PipeError> {
        self.slots
            .iter_mut()
            .find(|s| s.owns(handle))
            .ok_or(PipeError::Closed)
    }

    fn remove(&mut self, handle: PipeHandle) {
        if let Some(idx) = self.slots.iter().position(|s| s.owns(handle)) {
            let slot = self.slots.swap_remove(idx);
            info!("PIPE: closed {}/{}", slot.inbound.handle, slot.outbound.handle);
        }
    }

    fn alloc_pair(&mut self) -> PipePair {
        loop {
            let inbound = PipeHandle(self.next_handle);
            let outbound = PipeHandle(self.next_handle.wrapping_add(1));
            self.next_handle = self.next_handle.wrapping_add(2);
            if self.next_handle == 0 {
                self.next_handle = 1;
            }
            if inbound.0 != 0
                && outbound.0 != 0
                && self.slot(inbound).is_none()
                && self.slot(outbound).is_none()
            {
                return PipePair { inbound, outbound };
            }
        }
    }
}
