//! Command codec.
//!
//! One total decode function turns a `(code, payload)` pair into a tagged
//! [`Operation`].  Code space:
//!
//! ```text
//! 0x0000..=0x0003  generic service operations (Announce, Calibrate, Description)
//! 0x1000..=0x1FFF  GetRegister(code & 0xFFF)      payload must be empty
//! 0x2000..=0x2FFF  SetRegister(code & 0xFFF)      payload = new value
//! 0x8000..=0xFFFF  events (outbound only)
//! everything else  service-specific, looked up in the CommandTable
//! ```

use log::debug;

use crate::consts::base;
use crate::error::CodecError;

// ---------------------------------------------------------------------------
// Command table
// ---------------------------------------------------------------------------

/// Payload shape a service-specific command accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadRule {
    Empty,
    Exact(usize),
    AtLeast(usize),
    Any,
}

impl PayloadRule {
    pub const fn accepts(&self, len: usize) -> bool {
        match self {
            Self::Empty => len == 0,
            Self::Exact(n) => len == *n,
            Self::AtLeast(n) => len >= *n,
            Self::Any => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandSpec {
    pub code: u16,
    pub name: &'static str,
    pub payload: PayloadRule,
}

impl CommandSpec {
    pub const fn new(code: u16, name: &'static str, payload: PayloadRule) -> Self {
        Self {
            code,
            name,
            payload,
        }
    }
}

/// Service-specific commands of one service.
#[derive(Debug, Clone, Copy)]
pub struct CommandTable {
    specs: &'static [CommandSpec],
}

impl CommandTable {
    /// A service with no service-specific commands.
    pub const EMPTY: Self = Self { specs: &[] };

    /// Validate a static table: no reserved codes, no duplicates.
    pub fn new(specs: &'static [CommandSpec]) -> Result<Self, CodecError> {
        for (i, spec) in specs.iter().enumerate() {
            if is_reserved(spec.code) {
                return Err(CodecError::ReservedCode(spec.code));
            }
            if specs[..i].iter().any(|s| s.code == spec.code) {
                return Err(CodecError::DuplicateCommand(spec.code));
            }
        }
        Ok(Self { specs })
    }

    pub fn lookup(&self, code: u16) -> Option<&'static CommandSpec> {
        self.specs.iter().find(|s| s.code == code)
    }

    pub fn specs(&self) -> &'static [CommandSpec] {
        self.specs
    }
}

/// Whether `code` belongs to a range no service may claim.
pub const fn is_reserved(code: u16) -> bool {
    matches!(code, 0x0000..=0x0003 | 0x1000..=0x2fff | 0x8000..=0xffff)
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// Operations every service understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenericOp<'a> {
    Announce,
    Calibrate,
    Description,
    GetRegister(u16),
    SetRegister { addr: u16, value: &'a [u8] },
}

/// Result of decoding one inbound command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation<'a> {
    Generic(GenericOp<'a>),
    ServiceSpecific { code: u16, payload: &'a [u8] },
}

impl Operation<'_> {
    /// Command code this operation was decoded from.
    pub fn code(&self) -> u16 {
        match self {
            Self::Generic(GenericOp::Announce) => base::CMD_ANNOUNCE,
            Self::Generic(GenericOp::Calibrate) => base::CMD_CALIBRATE,
            Self::Generic(GenericOp::Description) => base::CMD_DESCRIPTION,
            Self::Generic(GenericOp::GetRegister(addr)) => get_register_code(*addr),
            Self::Generic(GenericOp::SetRegister { addr, .. }) => set_register_code(*addr),
            Self::ServiceSpecific { code, .. } => *code,
        }
    }
}

/// Decode a command against a service's command table.
pub fn decode<'a>(
    code: u16,
    payload: &'a [u8],
    table: &CommandTable,
) -> Result<Operation<'a>, CodecError> {
    let generic = match code {
        base::CMD_ANNOUNCE => Some(GenericOp::Announce),
        base::CMD_CALIBRATE => Some(GenericOp::Calibrate),
        base::CMD_DESCRIPTION => Some(GenericOp::Description),
        _ => None,
    };
    if let Some(op) = generic {
        if !payload.is_empty() {
            debug!("CODEC: ignoring {} trailing bytes on 0x{:x}", payload.len(), code);
        }
        return Ok(Operation::Generic(op));
    }

    let addr = code & base::REGISTER_ADDR_MASK;
    match code & 0xf000 {
        base::CMD_GET_REGISTER => {
            if payload.is_empty() {
                Ok(Operation::Generic(GenericOp::GetRegister(addr)))
            } else {
                Err(CodecError::BadPayload(code))
            }
        }
        base::CMD_SET_REGISTER => Ok(Operation::Generic(GenericOp::SetRegister {
            addr,
            value: payload,
        })),
        _ => {
            let spec = table
                .lookup(code)
                .ok_or(CodecError::UnsupportedCommand(code))?;
            if spec.payload.accepts(payload.len()) {
                Ok(Operation::ServiceSpecific { code, payload })
            } else {
                Err(CodecError::BadPayload(code))
            }
        }
    }
}

pub const fn get_register_code(addr: u16) -> u16 {
    base::CMD_GET_REGISTER | (addr & base::REGISTER_ADDR_MASK)
}

pub const fn set_register_code(addr: u16) -> u16 {
    base::CMD_SET_REGISTER | (addr & base::REGISTER_ADDR_MASK)
}

pub const fn event_code(event: u16) -> u16 {
    base::EVENT_FLAG | event
}
