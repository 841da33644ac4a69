//! Bus event queue.
//!
//! Events are produced by:
//! - Service handlers (button down, WiFi got IP, tilt detected)
//! - The device side, through [`Dispatcher::emit_event`](crate::bus::Dispatcher::emit_event)
//!
//! Events are consumed by the caller's bus loop, which drains them in FIFO
//! order and broadcasts each one as a report with code `0x8000 | event`.
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌──────────────┐
//! │ Handlers    │────▶│  EventQueue  │────▶│  Bus loop    │
//! │ Device code │────▶│  (bounded)   │     │  (consumer)  │
//! └─────────────┘     └──────────────┘     └──────────────┘
//! ```

use heapless::{Deque, Vec};
use log::warn;

use crate::consts::{MAX_PAYLOAD, base::EVENT_FLAG};
use crate::error::{Error, Result};

/// Maximum number of pending events.
pub const EVENT_QUEUE_CAP: usize = 32;

/// An unsolicited notification emitted by one service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusEvent {
    pub service_id: u8,
    /// Service-scoped event code (without the `0x8000` flag).
    pub code: u16,
    pub payload: Vec<u8, MAX_PAYLOAD>,
}

impl BusEvent {
    pub fn new(service_id: u8, code: u16, payload: &[u8]) -> Result<Self> {
        if code & EVENT_FLAG != 0 {
            return Err(Error::Service("event code overlaps the event flag"));
        }
        let payload = Vec::from_slice(payload).map_err(|_| Error::Service("event argument too long"))?;
        Ok(Self {
            service_id,
            code,
            payload,
        })
    }

    /// Command code carried by the broadcast report.
    pub fn report_code(&self) -> u16 {
        EVENT_FLAG | self.code
    }
}

/// Bounded FIFO of pending events.  Overflow drops the new event.
pub struct EventQueue {
    queue: Deque<BusEvent, EVENT_QUEUE_CAP>,
    dropped: u32,
}

impl EventQueue {
    pub const fn new() -> Self {
        Self {
            queue: Deque::new(),
            dropped: 0,
        }
    }

    /// Returns `false` if the queue is full (event dropped).
    pub fn push(&mut self, event: BusEvent) -> bool {
        match self.queue.push_back(event) {
            Ok(()) => true,
            Err(ev) => {
                self.dropped = self.dropped.wrapping_add(1);
                warn!(
                    "EVT: queue full, dropped event 0x{:x} from service {}",
                    ev.code, ev.service_id
                );
                false
            }
        }
    }

    pub fn pop(&mut self) -> Option<BusEvent> {
        self.queue.pop_front()
    }

    /// Drain all pending events into a callback, oldest first.
    pub fn drain(&mut self, mut handler: impl FnMut(BusEvent)) {
        while let Some(event) = self.pop() {
            handler(event);
        }
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Events dropped because the queue was full.
    pub fn dropped_count(&self) -> u32 {
        self.dropped
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}
