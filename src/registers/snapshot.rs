//! Persist and restore writable register values.
//!
//! Only `ReadWrite` registers are captured; read-only values are refreshed
//! by the device and constants are fixed at initialization.  The encoded
//! form is postcard, small enough for an NVS blob or a flash page.

use log::warn;
use serde::{Deserialize, Serialize};

use super::{Access, RegisterStore};
use crate::error::{Error, RegisterError};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterSnapshot {
    entries: Vec<(u16, Vec<u8>)>,
}

impl RegisterSnapshot {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        postcard::to_allocvec(self).map_err(|_| RegisterError::BadSnapshot.into())
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        postcard::from_bytes(bytes).map_err(|e| {
            warn!("REG: snapshot decode failed: {}", e);
            RegisterError::BadSnapshot.into()
        })
    }
}

impl RegisterStore {
    /// Capture every read-write register.
    pub fn snapshot(&self) -> RegisterSnapshot {
        let entries = self
            .entries
            .iter()
            .filter(|(_, e)| e.desc.access == Access::ReadWrite)
            .map(|(addr, e)| (*addr, e.value.clone()))
            .collect();
        RegisterSnapshot { entries }
    }

    /// Apply a snapshot.  Entries that no longer match the table (unknown
    /// address, changed access or width) are skipped.  Couplings are not
    /// applied.  Returns the number of registers restored.
    pub fn restore(&mut self, snapshot: &RegisterSnapshot) -> usize {
        let mut restored = 0;
        for (addr, value) in &snapshot.entries {
            let fits = self.entries.get(addr).is_some_and(|e| {
                e.desc.access == Access::ReadWrite && e.desc.ty.accepts(value.len())
            });
            if fits {
                self.set_raw(*addr, value);
                restored += 1;
            } else {
                warn!("REG: snapshot entry 0x{:x} skipped", addr);
            }
        }
        restored
    }
}
