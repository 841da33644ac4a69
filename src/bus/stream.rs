//! Register streaming.
//!
//! A service whose table has `IsStreaming` and `Reading` pushes its
//! `Reading` register as an unsolicited `GetRegister` report every
//! `StreamingInterval` milliseconds while `IsStreaming` is non-zero.  The
//! `StreamManager` tracks one service's subscription; the dispatcher owns
//! one per streaming-capable service.

use crate::consts::base;
use crate::registers::RegisterStore;

/// Stream subscription state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// `IsStreaming` is zero, no reports sent.
    Inactive,
    /// Streaming at the effective interval.
    Active { interval_ms: u32 },
    /// Bus detached; resumes on attach.
    Paused { interval_ms: u32 },
}

pub struct StreamManager {
    state: StreamState,
    elapsed_ms: u32,
    min_interval_ms: u32,
    default_interval_ms: u32,
    /// Number of reports produced.
    sent_count: u32,
}

impl StreamManager {
    pub fn new(min_interval_ms: u32, default_interval_ms: u32) -> Self {
        Self {
            state: StreamState::Inactive,
            elapsed_ms: 0,
            min_interval_ms,
            default_interval_ms,
            sent_count: 0,
        }
    }

    /// Whether a register table supports streaming at all.
    pub fn supported(regs: &RegisterStore) -> bool {
        regs.contains(base::REG_IS_STREAMING) && regs.contains(base::REG_READING)
    }

    /// Start streaming.  The interval is floored at the configured minimum.
    pub fn subscribe(&mut self, interval_ms: u32) {
        let interval_ms = interval_ms.max(self.min_interval_ms);
        if self.state != (StreamState::Active { interval_ms }) {
            self.elapsed_ms = 0;
        }
        self.state = StreamState::Active { interval_ms };
    }

    pub fn unsubscribe(&mut self) {
        self.state = StreamState::Inactive;
    }

    pub fn pause(&mut self) {
        if let StreamState::Active { interval_ms } = self.state {
            self.state = StreamState::Paused { interval_ms };
        }
    }

    pub fn resume(&mut self) {
        if let StreamState::Paused { interval_ms } = self.state {
            self.state = StreamState::Active { interval_ms };
            self.elapsed_ms = 0;
        }
    }

    /// Follow the `IsStreaming` / `StreamingInterval` registers.
    pub fn sync(&mut self, regs: &RegisterStore) {
        let streaming = regs.read_uint(base::REG_IS_STREAMING).unwrap_or(0) != 0;
        if !streaming {
            self.unsubscribe();
            return;
        }
        let interval = match regs.read_uint(base::REG_STREAMING_INTERVAL) {
            Some(0) | None => self.default_interval_ms,
            Some(v) => u32::try_from(v).unwrap_or(u32::MAX),
        };
        if let StreamState::Paused { .. } = self.state {
            self.state = StreamState::Paused {
                interval_ms: interval.max(self.min_interval_ms),
            };
        } else {
            self.subscribe(interval);
        }
    }

    /// Advance the clock.  Returns `true` if a report is due.
    pub fn tick(&mut self, delta_ms: u32) -> bool {
        match self.state {
            StreamState::Active { interval_ms } => {
                self.elapsed_ms = self.elapsed_ms.saturating_add(delta_ms);
                if self.elapsed_ms >= interval_ms {
                    self.elapsed_ms %= interval_ms;
                    self.sent_count = self.sent_count.wrapping_add(1);
                    true
                } else {
                    false
                }
            }
            _ => false,
        }
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn sent_count(&self) -> u32 {
        self.sent_count
    }
}
