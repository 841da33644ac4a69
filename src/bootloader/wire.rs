//! Bootloader wire formats.
//!
//! `PageData` payload:
//! ```text
//! ┌──────────────┬─────────────┬──────────┬───────────┬──────────────┐
//! │ page_address │ page_offset │ chunk_no │ chunk_max │ data (≥ 4 B) │
//! │ LE u32       │ LE u16      │ LE u16   │ LE u16    │              │
//! └──────────────┴─────────────┴──────────┴───────────┴──────────────┘
//! ```
//!
//! `PageData` report: `session_id u32 | error u32 | page_address u32`.
//! `Info` report: `service_class u32 | page_size u32 | flashable_size u32 | device_class u32`.

use crate::consts::bootloader as boot;
use crate::error::BootloaderError;

/// Fixed header in front of the chunk data.
pub const PAGE_DATA_HEADER_LEN: usize = 10;

/// Smallest data slice a chunk may carry.
pub const MIN_CHUNK_DATA: usize = 4;

/// One parsed `PageData` chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageChunk<'a> {
    pub page_address: u32,
    pub page_offset: u16,
    pub chunk_no: u16,
    pub chunk_max: u16,
    pub data: &'a [u8],
}

impl<'a> PageChunk<'a> {
    pub fn parse(payload: &'a [u8]) -> Result<Self, BootloaderError> {
        if payload.len() < PAGE_DATA_HEADER_LEN + MIN_CHUNK_DATA {
            return Err(BootloaderError::PacketTooSmall);
        }
        let (header, data) = payload.split_at(PAGE_DATA_HEADER_LEN);
        Ok(Self {
            page_address: u32::from_le_bytes([header[0], header[1], header[2], header[3]]),
            page_offset: u16::from_le_bytes([header[4], header[5]]),
            chunk_no: u16::from_le_bytes([header[6], header[7]]),
            chunk_max: u16::from_le_bytes([header[8], header[9]]),
            data,
        })
    }

    /// Inverse of [`parse`](Self::parse), used by hosts and tests.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(PAGE_DATA_HEADER_LEN + self.data.len());
        out.extend_from_slice(&self.page_address.to_le_bytes());
        out.extend_from_slice(&self.page_offset.to_le_bytes());
        out.extend_from_slice(&self.chunk_no.to_le_bytes());
        out.extend_from_slice(&self.chunk_max.to_le_bytes());
        out.extend_from_slice(self.data);
        out
    }
}

/// Best-effort page address of a payload too short to parse.
pub fn peek_page_address(payload: &[u8]) -> u32 {
    match payload {
        [a, b, c, d, ..] => u32::from_le_bytes([*a, *b, *c, *d]),
        _ => 0,
    }
}

/// Reply to a completed page or a rejected chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageReport {
    pub session_id: u32,
    /// `NoError` (0) or a [`BootloaderError`] code.
    pub error: u32,
    pub page_address: u32,
}

impl PageReport {
    pub const LEN: usize = 12;

    pub fn encode(&self) -> [u8; Self::LEN] {
        let mut out = [0u8; Self::LEN];
        out[0..4].copy_from_slice(&self.session_id.to_le_bytes());
        out[4..8].copy_from_slice(&self.error.to_le_bytes());
        out[8..12].copy_from_slice(&self.page_address.to_le_bytes());
        out
    }

    pub fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != Self::LEN {
            return None;
        }
        let word = |i: usize| u32::from_le_bytes([bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]]);
        Some(Self {
            session_id: word(0),
            error: word(4),
            page_address: word(8),
        })
    }

    pub fn is_success(&self) -> bool {
        self.error == boot::ERROR_NO_ERROR
    }

    pub fn rejection(&self) -> Option<BootloaderError> {
        BootloaderError::from_code(self.error)
    }
}

/// Reply to `Info`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InfoReply {
    pub service_class: u32,
    pub page_size: u32,
    pub flashable_size: u32,
    pub device_class: u32,
}

impl InfoReply {
    pub const LEN: usize = 16;

    pub fn new(page_size: u32, flashable_size: u32, device_class: u32) -> Self {
        Self {
            service_class: boot::SERVICE_CLASS,
            page_size,
            flashable_size,
            device_class,
        }
    }

    pub fn encode(&self) -> [u8; Self::LEN] {
        let mut out = [0u8; Self::LEN];
        for (i, word) in [
            self.service_class,
            self.page_size,
            self.flashable_size,
            self.device_class,
        ]
        .into_iter()
        .enumerate()
        {
            out[i * 4..i * 4 + 4].copy_from_slice(&word.to_le_bytes());
        }
        out
    }

    pub fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != Self::LEN {
            return None;
        }
        let word = |i: usize| u32::from_le_bytes([bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]]);
        Some(Self {
            service_class: word(0),
            page_size: word(4),
            flashable_size: word(8),
            device_class: word(12),
        })
    }
}

/// `SetSession` payload: exactly one u32.
pub fn parse_session(payload: &[u8]) -> Option<u32> {
    let bytes: [u8; 4] = payload.try_into().ok()?;
    Some(u32::from_le_bytes(bytes))
}
