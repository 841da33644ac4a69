//! Fuzz target: `PageChunk::parse` and `Flasher::page_data`
//!
//! Splits the input into length-prefixed `PageData` payloads and feeds them
//! to a flasher with an open session.  Only aligned, in-range, full pages
//! may ever reach the flash port.
//!
//! cargo fuzz run fuzz_page_data

#![no_main]

use libfuzzer_sys::fuzz_target;
use regbus::bootloader::{Flasher, PageChunk};
use regbus::config::FlashGeometry;
use regbus::ports::{FlashPort, PortError};

const GEOMETRY: FlashGeometry = FlashGeometry {
    page_size: 128,
    flash_start: 0x200,
    flash_end: 0x1200,
    max_open_pages: 2,
};

struct CheckedFlash;

impl FlashPort for CheckedFlash {
    fn write_page(&mut self, page_address: u32, data: &[u8]) -> Result<(), PortError> {
        assert_eq!(data.len(), GEOMETRY.page_size as usize);
        assert_eq!(page_address % GEOMETRY.page_size, 0);
        assert!(page_address >= GEOMETRY.flash_start);
        assert!(page_address + GEOMETRY.page_size <= GEOMETRY.flash_end);
        Ok(())
    }
}

fuzz_target!(|data: &[u8]| {
    let Ok(mut flasher) = Flasher::new(GEOMETRY) else {
        return;
    };
    let mut flash = CheckedFlash;
    flasher.set_session(1);

    let mut rest = data;
    while let Some((&len, tail)) = rest.split_first() {
        let take = usize::from(len).min(tail.len());
        let (payload, next) = tail.split_at(take);
        rest = next;

        if let Ok(chunk) = PageChunk::parse(payload) {
            assert!(!chunk.data.is_empty());
        }
        let _ = flasher.page_data(payload, &mut flash);
    }

    flasher.reset();
    assert_eq!(flasher.open_pages(), 0);
});
