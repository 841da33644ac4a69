//! Register store: a service's typed register values and permissions.
//!
//! Every service owns one [`RegisterStore`] built from a static table of
//! [`RegisterDescriptor`]s.  The table is the only source of truth for a
//! register's width, access mode and cross-register coupling, so two
//! services that reuse an address (e.g. `0x101`) never interfere.
//!
//! ```text
//!   host SetRegister ──▶ write()   ── access + length check ── couplings
//!   device refresh   ──▶ update()  ── length check (constants refused)
//!   device init      ──▶ preset()  ── anything, until seal()
//! ```

pub mod snapshot;

use std::collections::BTreeMap;

use log::debug;

use crate::error::RegisterError;

/// Highest address reachable through the `0x1000 | addr` convention.
pub const MAX_REGISTER_ADDR: u16 = 0x0fff;

// ---------------------------------------------------------------------------
// Descriptor types
// ---------------------------------------------------------------------------

/// Declared wire type of a register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterType {
    Bool,
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    /// Fixed point `uINT.FRAC`, e.g. `u22.10` is 4 bytes.
    Fixed { int_bits: u8, frac_bits: u8 },
    /// Byte string of at most `max_len` bytes.
    Bytes { max_len: usize },
    /// Up to `max_elems` elements of `elem_size` bytes each.
    Array { elem_size: usize, max_elems: usize },
}

impl RegisterType {
    /// Byte width of fixed-width types; `None` for variable-length ones.
    pub const fn width(&self) -> Option<usize> {
        match self {
            Self::Bool | Self::U8 | Self::I8 => Some(1),
            Self::U16 | Self::I16 => Some(2),
            Self::U32 | Self::I32 => Some(4),
            Self::U64 => Some(8),
            Self::Fixed {
                int_bits,
                frac_bits,
            } => Some((*int_bits as usize + *frac_bits as usize) / 8),
            Self::Bytes { .. } | Self::Array { .. } => None,
        }
    }

    /// Whether a value of `len` bytes fits this type.
    pub const fn accepts(&self, len: usize) -> bool {
        match self {
            Self::Bytes { max_len } => len <= *max_len,
            Self::Array {
                elem_size,
                max_elems,
            } => *elem_size > 0 && len % *elem_size == 0 && len / *elem_size <= *max_elems,
            _ => match self.width() {
                Some(w) => len == w,
                None => false,
            },
        }
    }
}

/// Access mode declared for a register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    ReadOnly,
    ReadWrite,
    /// Fixed at device initialization.
    Const,
}

/// A register whose value is reset when its owner is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Coupling {
    pub target: u16,
    pub value: &'static [u8],
}

/// One row of a service's register table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterDescriptor {
    pub addr: u16,
    pub name: &'static str,
    pub ty: RegisterType,
    pub access: Access,
    /// Initial value; empty means all-zero for fixed-width types.
    pub default: &'static [u8],
    pub coupling: &'static [Coupling],
}

impl RegisterDescriptor {
    pub const fn new(addr: u16, name: &'static str, ty: RegisterType, access: Access) -> Self {
        Self {
            addr,
            name,
            ty,
            access,
            default: &[],
            coupling: &[],
        }
    }

    pub const fn with_default(mut self, default: &'static [u8]) -> Self {
        self.default = default;
        self
    }

    pub const fn with_coupling(mut self, coupling: &'static [Coupling]) -> Self {
        self.coupling = coupling;
        self
    }

    fn initial_value(&self) -> Vec<u8> {
        if self.default.is_empty() {
            vec![0; self.ty.width().unwrap_or(0)]
        } else {
            self.default.to_vec()
        }
    }
}

/// Borrowed view of a register's current value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterValue<'a> {
    pub bytes: &'a [u8],
    pub ty: RegisterType,
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

struct Entry {
    desc: &'static RegisterDescriptor,
    value: Vec<u8>,
}

/// Typed register values of one service.
pub struct RegisterStore {
    entries: BTreeMap<u16, Entry>,
    sealed: bool,
}

impl RegisterStore {
    /// Build a store from a static table, validating it.
    pub fn new(table: &'static [RegisterDescriptor]) -> Result<Self, RegisterError> {
        let mut entries = BTreeMap::new();
        for desc in table {
            if desc.addr > MAX_REGISTER_ADDR {
                return Err(RegisterError::AddressOutOfRange(desc.addr));
            }
            let value = desc.initial_value();
            if !desc.ty.accepts(value.len()) {
                return Err(RegisterError::BadLength {
                    addr: desc.addr,
                    len: value.len(),
                });
            }
            if entries.insert(desc.addr, Entry { desc, value }).is_some() {
                return Err(RegisterError::Duplicate(desc.addr));
            }
        }

        // Coupling targets must exist and their reset values must fit, so a
        // coupled write can never fail half-way.
        for entry in entries.values() {
            for c in entry.desc.coupling {
                let target = entries
                    .get(&c.target)
                    .ok_or(RegisterError::UnknownRegister(c.target))?;
                if !target.desc.ty.accepts(c.value.len()) {
                    return Err(RegisterError::BadLength {
                        addr: c.target,
                        len: c.value.len(),
                    });
                }
            }
        }

        Ok(Self {
            entries,
            sealed: false,
        })
    }

    /// Read a register's current value.
    pub fn read(&self, addr: u16) -> Result<RegisterValue<'_>, RegisterError> {
        let entry = self
            .entries
            .get(&addr)
            .ok_or(RegisterError::UnknownRegister(addr))?;
        Ok(RegisterValue {
            bytes: &entry.value,
            ty: entry.desc.ty,
        })
    }

    /// Host-initiated write (`SetRegister`).  Applies declared couplings
    /// together with the write.
    pub fn write(&mut self, addr: u16, bytes: &[u8]) -> Result<(), RegisterError> {
        let entry = self
            .entries
            .get(&addr)
            .ok_or(RegisterError::UnknownRegister(addr))?;
        if entry.desc.access != Access::ReadWrite {
            return Err(RegisterError::ReadOnly(addr));
        }
        if !entry.desc.ty.accepts(bytes.len()) {
            return Err(RegisterError::BadLength {
                addr,
                len: bytes.len(),
            });
        }
        let coupling = entry.desc.coupling;

        self.set_raw(addr, bytes);
        for c in coupling {
            debug!("REG: write 0x{:x} resets 0x{:x}", addr, c.target);
            self.set_raw(c.target, c.value);
        }
        Ok(())
    }

    /// Device-side initialization.  Accepts any register, including
    /// constants, until [`seal`](Self::seal) is called.
    pub fn preset(&mut self, addr: u16, bytes: &[u8]) -> Result<(), RegisterError> {
        let entry = self
            .entries
            .get(&addr)
            .ok_or(RegisterError::UnknownRegister(addr))?;
        if self.sealed && entry.desc.access == Access::Const {
            return Err(RegisterError::ReadOnly(addr));
        }
        if !entry.desc.ty.accepts(bytes.len()) {
            return Err(RegisterError::BadLength {
                addr,
                len: bytes.len(),
            });
        }
        self.set_raw(addr, bytes);
        Ok(())
    }

    /// Freeze constant registers.  Idempotent.
    pub fn seal(&mut self) {
        self.sealed = true;
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Device-side refresh of a read-only or read-write register
    /// (sensor readings, uptime).  Constants are refused.
    pub fn update(&mut self, addr: u16, bytes: &[u8]) -> Result<(), RegisterError> {
        let entry = self
            .entries
            .get(&addr)
            .ok_or(RegisterError::UnknownRegister(addr))?;
        if entry.desc.access == Access::Const {
            return Err(RegisterError::ReadOnly(addr));
        }
        if !entry.desc.ty.accepts(bytes.len()) {
            return Err(RegisterError::BadLength {
                addr,
                len: bytes.len(),
            });
        }
        self.set_raw(addr, bytes);
        Ok(())
    }

    /// Restore every non-constant register to its table default.
    pub fn reset_to_defaults(&mut self) {
        for entry in self.entries.values_mut() {
            if entry.desc.access != Access::Const {
                entry.value = entry.desc.initial_value();
            }
        }
    }

    pub fn contains(&self, addr: u16) -> bool {
        self.entries.contains_key(&addr)
    }

    pub fn descriptor(&self, addr: u16) -> Option<&'static RegisterDescriptor> {
        self.entries.get(&addr).map(|e| e.desc)
    }

    /// Addresses in ascending order.
    pub fn addresses(&self) -> impl Iterator<Item = u16> + '_ {
        self.entries.keys().copied()
    }

    /// Little-endian unsigned view of a register of up to 8 bytes.
    pub fn read_uint(&self, addr: u16) -> Option<u64> {
        let value = self.read(addr).ok()?;
        if value.bytes.is_empty() || value.bytes.len() > 8 {
            return None;
        }
        let mut buf = [0u8; 8];
        buf[..value.bytes.len()].copy_from_slice(value.bytes);
        Some(u64::from_le_bytes(buf))
    }

    fn set_raw(&mut self, addr: u16, bytes: &[u8]) {
        if let Some(entry) = self.entries.get_mut(&addr) {
            entry.value.clear();
            entry.value.extend_from_slice(bytes);
        }
    }
}
