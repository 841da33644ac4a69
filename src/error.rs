//! Unified error types for the bus core.
//!
//! A single `Error` enum that every subsystem converts into, so the
//! dispatcher can turn any failure into one typed error report.  All
//! variants are `Copy` so they pass through the dispatch path without
//! allocation.

use core::fmt;

use crate::consts::bootloader as boot;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fallible operation in the crate funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Register table or register access failure.
    Register(RegisterError),
    /// Command code or payload could not be decoded.
    Codec(CodecError),
    /// Pipe transport failure.
    Pipe(PipeError),
    /// A `PageData` chunk was rejected.
    Bootloader(BootloaderError),
    /// No service is registered under this id.
    UnknownService(u8),
    /// A service handler or its port failed.
    Service(&'static str),
    /// Configuration is invalid or could not be loaded.
    Config(&'static str),
}

impl Error {
    /// Numeric code carried in the first two bytes of an error report.
    pub fn report_code(&self) -> u16 {
        match self {
            Self::Codec(CodecError::UnsupportedCommand(_) | CodecError::ReservedCode(_)) => 1,
            Self::Codec(CodecError::BadPayload(_)) => 2,
            Self::Register(RegisterError::UnknownRegister(_)) => 3,
            Self::Register(RegisterError::ReadOnly(_)) => 4,
            Self::Register(RegisterError::BadLength { .. }) => 5,
            Self::Pipe(PipeError::Closed) => 6,
            Self::Pipe(PipeError::Full) => 7,
            Self::Pipe(PipeError::TableFull) => 8,
            Self::Pipe(PipeError::BadDescriptor | PipeError::RecordTooLarge) => 9,
            _ => 10,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Register(e) => write!(f, "register: {e}"),
            Self::Codec(e) => write!(f, "codec: {e}"),
            Self::Pipe(e) => write!(f, "pipe: {e}"),
            Self::Bootloader(e) => write!(f, "bootloader: {e}"),
            Self::UnknownService(id) => write!(f, "unknown service {id}"),
            Self::Service(msg) => write!(f, "service: {msg}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Register errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterError {
    /// The address has no mapping in this service's table.
    UnknownRegister(u16),
    /// Read-only or constant register, or a constant after sealing.
    ReadOnly(u16),
    /// Value length does not fit the declared register type.
    BadLength { addr: u16, len: usize },
    /// Two descriptors in one table share an address.
    Duplicate(u16),
    /// Address does not fit the 12-bit register space.
    AddressOutOfRange(u16),
    /// A register snapshot could not be encoded or decoded.
    BadSnapshot,
}

impl fmt::Display for RegisterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownRegister(a) => write!(f, "unknown register 0x{a:x}"),
            Self::ReadOnly(a) => write!(f, "register 0x{a:x} is read-only"),
            Self::BadLength { addr, len } => {
                write!(f, "bad length {len} for register 0x{addr:x}")
            }
            Self::Duplicate(a) => write!(f, "duplicate register 0x{a:x}"),
            Self::AddressOutOfRange(a) => write!(f, "register address 0x{a:x} out of range"),
            Self::BadSnapshot => write!(f, "bad register snapshot"),
        }
    }
}

impl From<RegisterError> for Error {
    fn from(e: RegisterError) -> Self {
        Self::Register(e)
    }
}

// ---------------------------------------------------------------------------
// Codec errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecError {
    /// Payload violates the rule declared for the command code.
    BadPayload(u16),
    /// Code is not generic and not in the service's command table.
    UnsupportedCommand(u16),
    /// A command table entry uses a reserved code.
    ReservedCode(u16),
    /// Two command table entries share a code.
    DuplicateCommand(u16),
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadPayload(c) => write!(f, "bad payload for command 0x{c:x}"),
            Self::UnsupportedCommand(c) => write!(f, "unsupported command 0x{c:x}"),
            Self::ReservedCode(c) => write!(f, "command code 0x{c:x} is reserved"),
            Self::DuplicateCommand(c) => write!(f, "duplicate command 0x{c:x}"),
        }
    }
}

impl From<CodecError> for Error {
    fn from(e: CodecError) -> Self {
        Self::Codec(e)
    }
}

// ---------------------------------------------------------------------------
// Pipe errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipeError {
    /// The handle is unknown or its pipe was closed.
    Closed,
    /// The direction's queue is full; the record was dropped.
    Full,
    /// No free pipe slot.
    TableFull,
    /// The opening descriptor blob is empty or too long.
    BadDescriptor,
    /// The record payload exceeds the packet payload limit.
    RecordTooLarge,
}

impl fmt::Display for PipeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "pipe closed"),
            Self::Full => write!(f, "pipe full"),
            Self::TableFull => write!(f, "pipe table full"),
            Self::BadDescriptor => write!(f, "bad pipe descriptor"),
            Self::RecordTooLarge => write!(f, "pipe record too large"),
        }
    }
}

impl From<PipeError> for Error {
    fn from(e: PipeError) -> Self {
        Self::Pipe(e)
    }
}

// ---------------------------------------------------------------------------
// Bootloader errors
// ---------------------------------------------------------------------------

/// Per-chunk rejection reasons.  Non-fatal to the flashing session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootloaderError {
    PacketTooSmall,
    OutOfFlashableRange,
    InvalidPageOffset,
    NotPageAligned,
    /// The flash port failed to write a completed page.
    FlashWriteFailed,
}

impl BootloaderError {
    /// Wire code reported in the `page_error` field.
    pub const fn code(self) -> u32 {
        match self {
            Self::PacketTooSmall => boot::ERROR_PACKET_TOO_SMALL,
            Self::OutOfFlashableRange => boot::ERROR_OUT_OF_FLASHABLE_RANGE,
            Self::InvalidPageOffset => boot::ERROR_INVALID_PAGE_OFFSET,
            Self::NotPageAligned => boot::ERROR_NOT_PAGE_ALIGNED,
            Self::FlashWriteFailed => boot::ERROR_FLASH_WRITE_FAILED,
        }
    }

    /// Inverse of [`code`](Self::code).  `NoError` maps to `None`.
    pub const fn from_code(code: u32) -> Option<Self> {
        match code {
            boot::ERROR_PACKET_TOO_SMALL => Some(Self::PacketTooSmall),
            boot::ERROR_OUT_OF_FLASHABLE_RANGE => Some(Self::OutOfFlashableRange),
            boot::ERROR_INVALID_PAGE_OFFSET => Some(Self::InvalidPageOffset),
            boot::ERROR_NOT_PAGE_ALIGNED => Some(Self::NotPageAligned),
            boot::ERROR_FLASH_WRITE_FAILED => Some(Self::FlashWriteFailed),
            _ => None,
        }
    }
}

impl fmt::Display for BootloaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PacketTooSmall => write!(f, "packet too small"),
            Self::OutOfFlashableRange => write!(f, "page outside flashable range"),
            Self::InvalidPageOffset => write!(f, "invalid page offset"),
            Self::NotPageAligned => write!(f, "page address not aligned"),
            Self::FlashWriteFailed => write!(f, "flash write failed"),
        }
    }
}

impl From<BootloaderError> for Error {
    fn from(e: BootloaderError) -> Self {
        Self::Bootloader(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
