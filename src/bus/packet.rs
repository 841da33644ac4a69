//! Inbound packets and outbound reports.
//!
//! Header parsing belongs to the transport; the core only sees
//! `(service_id, code, payload)` plus the ACK flag.

use crate::error::Error;
use crate::events::BusEvent;

/// Inbound packet addressed to one service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Packet<'a> {
    pub code: u16,
    pub payload: &'a [u8],
    /// The sender asked for a transport-level acknowledgement.
    pub ack_requested: bool,
}

impl<'a> Packet<'a> {
    pub const fn new(code: u16, payload: &'a [u8]) -> Self {
        Self {
            code,
            payload,
            ack_requested: false,
        }
    }

    pub const fn with_ack(mut self) -> Self {
        self.ack_requested = true;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    /// Command result, register value, announce or event.
    Data,
    /// Transport-level acknowledgement with an empty payload.
    Ack,
    /// Structured error: `report_code u16 LE` followed by UTF-8 text.
    Error,
}

/// Outbound packet produced by the core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub service_id: u8,
    pub code: u16,
    pub kind: ReportKind,
    pub payload: Vec<u8>,
}

impl Report {
    pub fn data(service_id: u8, code: u16, payload: Vec<u8>) -> Self {
        Self {
            service_id,
            code,
            kind: ReportKind::Data,
            payload,
        }
    }

    pub fn ack(service_id: u8, code: u16) -> Self {
        Self {
            service_id,
            code,
            kind: ReportKind::Ack,
            payload: Vec::new(),
        }
    }

    pub fn error(service_id: u8, code: u16, err: &Error) -> Self {
        let text = err.to_string();
        let mut payload = Vec::with_capacity(2 + text.len());
        payload.extend_from_slice(&err.report_code().to_le_bytes());
        payload.extend_from_slice(text.as_bytes());
        Self {
            service_id,
            code,
            kind: ReportKind::Error,
            payload,
        }
    }

    pub fn event(event: &BusEvent) -> Self {
        Self::data(event.service_id, event.report_code(), event.payload.to_vec())
    }

    /// Error code of an error report.
    pub fn error_code(&self) -> Option<u16> {
        match (self.kind, self.payload.as_slice()) {
            (ReportKind::Error, [lo, hi, ..]) => Some(u16::from_le_bytes([*lo, *hi])),
            _ => None,
        }
    }
}
