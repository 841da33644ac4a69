//! End-to-end flashing through the dispatcher: `Info`, `SetSession`,
//! `PageData` and per-chunk reports against a recording flash port.

use regbus::{BootloaderError, Error};
use regbus::bootloader::{InfoReply, PageChunk, PageReport};
use regbus::bus::{Dispatcher, Packet, ReportKind};
use regbus::config::{BusConfig, FlashGeometry};
use regbus::consts::{bootloader as boot, control};
use regbus::services::{BootloaderService, catalog};

use crate::mock_hw::{MockFlash, bus_with};

const PAGE: u32 = 256;
const CHUNK: u16 = 64;

fn flashing_bus() -> (Dispatcher, u8, MockFlash) {
    let config = BusConfig {
        device_class: 0x3f00_0001,
        flash: FlashGeometry {
            page_size: PAGE,
            flash_start: 0x400,
            flash_end: 0x1400,
            max_open_pages: 1,
        },
        ..BusConfig::default()
    };
    let flash = MockFlash::default();
    let service =
        BootloaderService::new(config.flash, config.device_class, Box::new(flash.clone())).unwrap();
    let (mut bus, _) = bus_with(config);
    let id = bus
        .add_service(boot::SERVICE_CLASS, &catalog::BOOTLOADER, Box::new(service))
        .unwrap();
    (bus, id, flash)
}

fn chunk(page_address: u32, chunk_no: u16, chunk_max: u16, fill: u8) -> Vec<u8> {
    let data = vec![fill; usize::from(CHUNK)];
    PageChunk {
        page_address,
        page_offset: chunk_no * CHUNK,
        chunk_no,
        chunk_max,
        data: &data,
    }
    .encode()
}

fn set_session(bus: &mut Dispatcher, id: u8, session: u32) {
    let r = bus
        .dispatch(id, &Packet::new(boot::CMD_SET_SESSION, &session.to_le_bytes()))
        .unwrap();
    assert_eq!(r.payload, session.to_le_bytes());
}

fn page_data(bus: &mut Dispatcher, id: u8, payload: &[u8]) -> Option<PageReport> {
    bus.dispatch(id, &Packet::new(boot::CMD_PAGE_DATA, payload))
        .map(|r| PageReport::decode(&r.payload).expect("page report"))
}

#[test]
fn info_describes_flash_layout() {
    let (mut bus, id, _) = flashing_bus();
    let r = bus.dispatch(id, &Packet::new(boot::CMD_INFO, &[])).unwrap();
    let info = InfoReply::decode(&r.payload).unwrap();
    assert_eq!(info.service_class, 0x1ffa_9948);
    assert_eq!(info.page_size, PAGE);
    assert_eq!(info.flashable_size, 0x1000);
    assert_eq!(info.device_class, 0x3f00_0001);

    // Control announce advertises the bootloader class.
    let r = bus.dispatch(0, &Packet::new(0x0, &[])).unwrap();
    assert_eq!(r.payload, boot::SERVICE_CLASS.to_le_bytes());
}

#[test]
fn full_page_is_written_once_and_reported() {
    let (mut bus, id, flash) = flashing_bus();
    set_session(&mut bus, id, 42);

    for n in 0..3 {
        assert_eq!(page_data(&mut bus, id, &chunk(0x400, n, 3, n as u8)), None);
    }
    assert!(flash.0.borrow().writes.is_empty());

    let report = page_data(&mut bus, id, &chunk(0x400, 3, 3, 3)).unwrap();
    assert!(report.is_success());
    assert_eq!(report.session_id, 42);
    assert_eq!(report.page_address, 0x400);

    let writes = &flash.0.borrow().writes;
    assert_eq!(writes.len(), 1);
    let (addr, image) = &writes[0];
    assert_eq!(*addr, 0x400);
    assert_eq!(image.len(), PAGE as usize);
    assert!(image[..64].iter().all(|b| *b == 0));
    assert!(image[192..].iter().all(|b| *b == 3));
}

#[test]
fn out_of_order_chunks_write_once() {
    let (mut bus, id, flash) = flashing_bus();
    set_session(&mut bus, id, 7);

    for n in [2, 0, 3] {
        assert_eq!(page_data(&mut bus, id, &chunk(0x500, n, 3, 0xa5)), None);
    }
    let report = page_data(&mut bus, id, &chunk(0x500, 1, 3, 0xa5)).unwrap();
    assert!(report.is_success());
    assert_eq!(flash.0.borrow().writes.len(), 1);
}

#[test]
fn rejections_are_reported_per_chunk() {
    let (mut bus, id, flash) = flashing_bus();
    set_session(&mut bus, id, 1);

    let cases = [
        (chunk(0x401, 0, 3, 0), BootloaderError::NotPageAligned),
        (chunk(0x1400, 0, 3, 0), BootloaderError::OutOfFlashableRange),
        (chunk(0x0, 0, 3, 0), BootloaderError::OutOfFlashableRange),
        (chunk(0x400, 0, 3, 0)[..12].to_vec(), BootloaderError::PacketTooSmall),
    ];
    for (payload, expected) in cases {
        let report = page_data(&mut bus, id, &payload).unwrap();
        assert_eq!(report.rejection(), Some(expected));
        assert_eq!(report.session_id, 1);
    }

    // Offset past the end of the page.
    let data = [0u8; 64];
    let bad = PageChunk {
        page_address: 0x400,
        page_offset: 224,
        chunk_no: 0,
        chunk_max: 3,
        data: &data,
    }
    .encode();
    let report = page_data(&mut bus, id, &bad).unwrap();
    assert_eq!(report.rejection(), Some(BootloaderError::InvalidPageOffset));
    assert!(flash.0.borrow().writes.is_empty());
}

#[test]
fn last_page_of_the_region_is_writable() {
    let (mut bus, id, flash) = flashing_bus();
    set_session(&mut bus, id, 11);

    let last = 0x1400 - PAGE;
    for n in 0..3 {
        assert_eq!(page_data(&mut bus, id, &chunk(last, n, 3, 0x5a)), None);
    }
    let report = page_data(&mut bus, id, &chunk(last, 3, 3, 0x5a)).unwrap();
    assert!(report.is_success());
    assert_eq!(report.page_address, 0x1300);

    let next = page_data(&mut bus, id, &chunk(last + PAGE, 0, 3, 0x5a)).unwrap();
    assert_eq!(next.rejection(), Some(BootloaderError::OutOfFlashableRange));

    let writes = &flash.0.borrow().writes;
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].0, 0x1300);
}

#[test]
fn reflash_of_last_page_with_tail_first() {
    let (mut bus, id, flash) = flashing_bus();
    set_session(&mut bus, id, 12);
    for n in 0..4 {
        page_data(&mut bus, id, &chunk(0x400, n, 3, 0x11));
    }

    // Same tail, new head, tail arrives first.
    let tail = page_data(&mut bus, id, &chunk(0x400, 3, 3, 0x11)).unwrap();
    assert!(tail.is_success());
    for n in [1, 0] {
        assert_eq!(page_data(&mut bus, id, &chunk(0x400, n, 3, 0x77)), None);
    }
    let report = page_data(&mut bus, id, &chunk(0x400, 2, 3, 0x77)).unwrap();
    assert!(report.is_success());

    let writes = &flash.0.borrow().writes;
    assert_eq!(writes.len(), 2);
    let image = &writes[1].1;
    assert!(image[..192].iter().all(|b| *b == 0x77));
    assert!(image[192..].iter().all(|b| *b == 0x11));
}

#[test]
fn bootloader_service_rejects_bad_geometry() {
    let geometry = FlashGeometry {
        page_size: 1 << 31,
        flash_start: 0,
        flash_end: u32::MAX,
        max_open_pages: 1,
    };
    let built = BootloaderService::new(geometry, 0, Box::new(MockFlash::default()));
    assert!(matches!(built, Err(Error::Config(_))));
}

#[test]
fn page_data_without_session_is_dropped() {
    let (mut bus, id, flash) = flashing_bus();
    let r = bus.dispatch(id, &Packet::new(boot::CMD_PAGE_DATA, &chunk(0x400, 0, 0, 1)));
    assert_eq!(r, None);
    let r = bus
        .dispatch(id, &Packet::new(boot::CMD_PAGE_DATA, &chunk(0x400, 0, 0, 1)).with_ack())
        .unwrap();
    assert_eq!(r.kind, ReportKind::Ack);
    assert!(flash.0.borrow().writes.is_empty());
}

#[test]
fn new_session_discards_partial_page() {
    let (mut bus, id, flash) = flashing_bus();
    set_session(&mut bus, id, 42);
    page_data(&mut bus, id, &chunk(0x400, 0, 3, 0x11));
    page_data(&mut bus, id, &chunk(0x400, 1, 3, 0x11));

    set_session(&mut bus, id, 99);
    // The old head is gone, so the tail alone cannot complete the page.
    assert_eq!(page_data(&mut bus, id, &chunk(0x400, 2, 3, 0x22)), None);
    assert_eq!(page_data(&mut bus, id, &chunk(0x400, 3, 3, 0x22)), None);
    assert!(flash.0.borrow().writes.is_empty());

    assert_eq!(page_data(&mut bus, id, &chunk(0x400, 0, 3, 0x22)), None);
    let report = page_data(&mut bus, id, &chunk(0x400, 1, 3, 0x22)).unwrap();
    assert_eq!(report.session_id, 99);
    let writes = &flash.0.borrow().writes;
    assert_eq!(writes.len(), 1);
    assert!(writes[0].1.iter().all(|b| *b == 0x22));
}

#[test]
fn duplicate_final_chunk_is_acknowledged_without_rewrite() {
    let (mut bus, id, flash) = flashing_bus();
    set_session(&mut bus, id, 5);
    for n in 0..2 {
        page_data(&mut bus, id, &chunk(0x600, n, 1, 0x33));
    }
    assert_eq!(flash.0.borrow().writes.len(), 1);

    let again = page_data(&mut bus, id, &chunk(0x600, 1, 1, 0x33)).unwrap();
    assert!(again.is_success());
    assert_eq!(again.page_address, 0x600);
    assert_eq!(flash.0.borrow().writes.len(), 1);
}

#[test]
fn flash_failure_is_reported() {
    let (mut bus, id, flash) = flashing_bus();
    flash.0.borrow_mut().fail = true;
    set_session(&mut bus, id, 8);
    page_data(&mut bus, id, &chunk(0x400, 0, 1, 0));
    let report = page_data(&mut bus, id, &chunk(0x400, 1, 1, 0)).unwrap();
    assert_eq!(report.rejection(), Some(BootloaderError::FlashWriteFailed));
}

#[test]
fn device_reset_aborts_session() {
    let (mut bus, id, flash) = flashing_bus();
    set_session(&mut bus, id, 3);
    page_data(&mut bus, id, &chunk(0x400, 0, 1, 0));

    bus.dispatch(0, &Packet::new(control::CMD_RESET, &[]));

    // No session any more: chunks vanish silently.
    assert_eq!(page_data(&mut bus, id, &chunk(0x400, 1, 1, 0)), None);
    assert!(flash.0.borrow().writes.is_empty());
}

#[test]
fn set_session_requires_four_bytes() {
    let (mut bus, id, _) = flashing_bus();
    let r = bus
        .dispatch(id, &Packet::new(boot::CMD_SET_SESSION, &[1, 2, 3]))
        .unwrap();
    assert_eq!(r.error_code(), Some(2));
}
