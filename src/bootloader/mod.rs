//! Bootloader page flasher.
//!
//! Flow: SetSession → N × PageData (any order within a page) → page write
//!
//! ```text
//!  Idle ──SetSession──▶ SessionSet ──PageData──▶ Assembling(page)
//!                           ▲                         │ last missing chunk
//!                           │                         ▼
//!                           └──── (no open page) ── Flashing ──▶ Assembling(next)
//! ```
//!
//! Partial pages live in an arena keyed by page address, so a resent,
//! reordered or abandoned page never touches another page's bytes.  A
//! rejected chunk is reported and dropped; the session survives.  A new
//! `SetSession` id is the only way to abort.

pub mod wire;

use std::collections::BTreeMap;

use log::{debug, info, warn};

use crate::config::FlashGeometry;
use crate::error::{BootloaderError, Error};
use crate::ports::FlashPort;

pub use wire::{InfoReply, MIN_CHUNK_DATA, PAGE_DATA_HEADER_LEN, PageChunk, PageReport};

// ── State ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlasherState {
    Idle,
    SessionSet { session_id: u32 },
    /// At least one page is partially received; `page_address` is the newest.
    Assembling { session_id: u32, page_address: u32 },
    /// A page write is in progress.
    Flashing { session_id: u32, page_address: u32 },
}

/// What a `PageData` chunk led to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkOutcome {
    /// No session is set; the chunk was dropped without a reply.
    NoSession,
    /// Stored; the page is still incomplete.
    Pending { page_address: u32 },
    /// The page was complete and has been written.
    Written { page_address: u32 },
    /// Resend of the last written page's final chunk; nothing written.
    Duplicate { page_address: u32 },
    Rejected {
        page_address: u32,
        error: BootloaderError,
    },
}

impl ChunkOutcome {
    /// Report owed to the host, if any.  Only completed pages and rejected
    /// chunks are answered.
    pub fn report(&self, session_id: u32) -> Option<PageReport> {
        match *self {
            Self::NoSession | Self::Pending { .. } => None,
            Self::Written { page_address } | Self::Duplicate { page_address } => Some(PageReport {
                session_id,
                error: crate::consts::bootloader::ERROR_NO_ERROR,
                page_address,
            }),
            Self::Rejected {
                page_address,
                error,
            } => Some(PageReport {
                session_id,
                error: error.code(),
                page_address,
            }),
        }
    }
}

// ── Page arena ────────────────────────────────────────────────

struct ChunkSlot {
    offset: u16,
    data: Vec<u8>,
}

struct PageAssembly {
    chunk_max: u16,
    chunks: BTreeMap<u16, ChunkSlot>,
    opened_seq: u64,
}

impl PageAssembly {
    fn is_complete(&self) -> bool {
        self.chunks.len() == usize::from(self.chunk_max) + 1
    }
}

/// Final chunk of the most recently written page.
struct LastFlashed {
    page_address: u32,
    chunk_no: u16,
    offset: u16,
    data: Vec<u8>,
    /// The chunk was sent again after the write.  A new assembly of the
    /// same page starts with it, so a re-flash that sends its unchanged
    /// tail first can still complete.
    resent: bool,
}

impl LastFlashed {
    fn matches(&self, chunk: &PageChunk<'_>) -> bool {
        self.page_address == chunk.page_address
            && self.chunk_no == chunk.chunk_no
            && chunk.chunk_no == chunk.chunk_max
            && self.offset == chunk.page_offset
            && self.data == chunk.data
    }

    /// Slot to pre-load into a new assembly that starts with `chunk`.
    fn seed_for(&self, chunk: &PageChunk<'_>) -> Option<(u16, ChunkSlot)> {
        let begin = usize::from(chunk.page_offset);
        let end = begin + chunk.data.len();
        let seed_begin = usize::from(self.offset);
        let seed_end = seed_begin + self.data.len();
        let fits = self.resent
            && self.page_address == chunk.page_address
            && self.chunk_no == chunk.chunk_max
            && self.chunk_no != chunk.chunk_no
            && (end <= seed_begin || seed_end <= begin);
        fits.then(|| {
            (
                self.chunk_no,
                ChunkSlot {
                    offset: self.offset,
                    data: self.data.clone(),
                },
            )
        })
    }
}

// ── Flasher ───────────────────────────────────────────────────

pub struct Flasher {
    geometry: FlashGeometry,
    session: Option<u32>,
    pages: BTreeMap<u32, PageAssembly>,
    next_seq: u64,
    last_flashed: Option<LastFlashed>,
    flashing: Option<u32>,
    pages_written: u32,
}

impl Flasher {
    /// Build a flasher for `geometry`, which must pass
    /// [`FlashGeometry::validate`].
    pub fn new(geometry: FlashGeometry) -> Result<Self, Error> {
        geometry.validate()?;
        Ok(Self {
            geometry,
            session: None,
            pages: BTreeMap::new(),
            next_seq: 0,
            last_flashed: None,
            flashing: None,
            pages_written: 0,
        })
    }

    pub fn geometry(&self) -> &FlashGeometry {
        &self.geometry
    }

    pub fn session_id(&self) -> Option<u32> {
        self.session
    }

    pub fn state(&self) -> FlasherState {
        let Some(session_id) = self.session else {
            return FlasherState::Idle;
        };
        if let Some(page_address) = self.flashing {
            return FlasherState::Flashing {
                session_id,
                page_address,
            };
        }
        match self
            .pages
            .iter()
            .max_by_key(|(_, p)| p.opened_seq)
            .map(|(addr, _)| *addr)
        {
            Some(page_address) => FlasherState::Assembling {
                session_id,
                page_address,
            },
            None => FlasherState::SessionSet { session_id },
        }
    }

    /// Number of partially received pages.
    pub fn open_pages(&self) -> usize {
        self.pages.len()
    }

    /// Pages written since construction.
    pub fn pages_written(&self) -> u32 {
        self.pages_written
    }

    /// Set the flashing session.  A different id aborts every partial page.
    /// Returns `true` if the session changed.
    pub fn set_session(&mut self, session_id: u32) -> bool {
        if self.session == Some(session_id) {
            debug!("BOOT: session 0x{:x} unchanged", session_id);
            return false;
        }
        if !self.pages.is_empty() {
            warn!(
                "BOOT: session 0x{:x} aborts {} partial page(s)",
                session_id,
                self.pages.len()
            );
        }
        self.pages.clear();
        self.last_flashed = None;
        self.session = Some(session_id);
        info!("BOOT: session 0x{:x} set", session_id);
        true
    }

    /// Abort everything and return to `Idle`.
    pub fn reset(&mut self) {
        self.session = None;
        self.pages.clear();
        self.last_flashed = None;
        self.flashing = None;
        info!("BOOT: reset");
    }

    /// Handle one `PageData` payload.
    pub fn page_data(&mut self, payload: &[u8], flash: &mut dyn FlashPort) -> ChunkOutcome {
        if self.session.is_none() {
            debug!("BOOT: PageData without session dropped");
            return ChunkOutcome::NoSession;
        }

        let chunk = match PageChunk::parse(payload) {
            Ok(c) => c,
            Err(error) => {
                return self.reject(wire::peek_page_address(payload), error);
            }
        };
        if let Err(error) = self.validate(&chunk) {
            return self.reject(chunk.page_address, error);
        }

        if !self.pages.contains_key(&chunk.page_address) {
            if let Some(last) = self.last_flashed.as_mut().filter(|l| l.matches(&chunk)) {
                debug!("BOOT: duplicate final chunk for page 0x{:x}", chunk.page_address);
                last.resent = true;
                return ChunkOutcome::Duplicate {
                    page_address: chunk.page_address,
                };
            }
        }

        self.store(&chunk);

        let complete = self
            .pages
            .get(&chunk.page_address)
            .is_some_and(PageAssembly::is_complete);
        if complete {
            self.flash_page(chunk.page_address, flash)
        } else {
            ChunkOutcome::Pending {
                page_address: chunk.page_address,
            }
        }
    }

    // ── Internal ──────────────────────────────────────────────

    fn reject(&self, page_address: u32, error: BootloaderError) -> ChunkOutcome {
        warn!("BOOT: chunk for page 0x{:x} rejected: {}", page_address, error);
        ChunkOutcome::Rejected {
            page_address,
            error,
        }
    }

    fn validate(&self, chunk: &PageChunk<'_>) -> Result<(), BootloaderError> {
        let page_size = u64::from(self.geometry.page_size);
        let start = u64::from(chunk.page_address);

        if start < u64::from(self.geometry.flash_start)
            || start + page_size > u64::from(self.geometry.flash_end)
        {
            return Err(BootloaderError::OutOfFlashableRange);
        }

        let offset = u64::from(chunk.page_offset);
        if offset + chunk.data.len() as u64 > page_size || chunk.chunk_no > chunk.chunk_max {
            return Err(BootloaderError::InvalidPageOffset);
        }
        if let Some(page) = self.pages.get(&chunk.page_address) {
            if page.chunk_max != chunk.chunk_max {
                return Err(BootloaderError::InvalidPageOffset);
            }
            let begin = usize::from(chunk.page_offset);
            let end = begin + chunk.data.len();
            for (no, slot) in &page.chunks {
                if *no == chunk.chunk_no {
                    if slot.offset != chunk.page_offset {
                        return Err(BootloaderError::InvalidPageOffset);
                    }
                    continue;
                }
                let other_begin = usize::from(slot.offset);
                let other_end = other_begin + slot.data.len();
                if begin < other_end && other_begin < end {
                    return Err(BootloaderError::InvalidPageOffset);
                }
            }
        }

        if start % page_size != 0 {
            return Err(BootloaderError::NotPageAligned);
        }
        Ok(())
    }

    fn store(&mut self, chunk: &PageChunk<'_>) {
        if !self.pages.contains_key(&chunk.page_address) {
            while self.pages.len() >= self.geometry.max_open_pages {
                let Some(oldest) = self
                    .pages
                    .iter()
                    .min_by_key(|(_, p)| p.opened_seq)
                    .map(|(addr, _)| *addr)
                else {
                    break;
                };
                debug!("BOOT: discarding partial page 0x{:x}", oldest);
                self.pages.remove(&oldest);
            }
            let mut chunks = BTreeMap::new();
            if let Some((no, slot)) = self.last_flashed.as_ref().and_then(|l| l.seed_for(chunk)) {
                debug!("BOOT: page 0x{:x} reopened with its resent final chunk", chunk.page_address);
                chunks.insert(no, slot);
            }
            self.pages.insert(
                chunk.page_address,
                PageAssembly {
                    chunk_max: chunk.chunk_max,
                    chunks,
                    opened_seq: self.next_seq,
                },
            );
            self.next_seq += 1;
        }

        if let Some(page) = self.pages.get_mut(&chunk.page_address) {
            page.chunks.insert(
                chunk.chunk_no,
                ChunkSlot {
                    offset: chunk.page_offset,
                    data: chunk.data.to_vec(),
                },
            );
        }
    }

    fn flash_page(&mut self, page_address: u32, flash: &mut dyn FlashPort) -> ChunkOutcome {
        let Some(page) = self.pages.remove(&page_address) else {
            return ChunkOutcome::Pending { page_address };
        };

        let mut image = vec![0xffu8; self.geometry.page_size as usize];
        for slot in page.chunks.values() {
            let begin = usize::from(slot.offset);
            image[begin..begin + slot.data.len()].copy_from_slice(&slot.data);
        }

        self.flashing = Some(page_address);
        let result = flash.write_page(page_address, &image);
        self.flashing = None;

        match result {
            Ok(()) => {
                self.pages_written = self.pages_written.wrapping_add(1);
                self.last_flashed = page.chunks.get(&page.chunk_max).map(|slot| LastFlashed {
                    page_address,
                    chunk_no: page.chunk_max,
                    offset: slot.offset,
                    data: slot.data.clone(),
                    resent: false,
                });
                info!("BOOT: page 0x{:x} written", page_address);
                ChunkOutcome::Written { page_address }
            }
            Err(e) => {
                warn!("BOOT: page 0x{:x} write failed: {}", page_address, e);
                ChunkOutcome::Rejected {
                    page_address,
                    error: BootloaderError::FlashWriteFailed,
                }
            }
        }
    }
}
