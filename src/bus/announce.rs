//! Announce scheduler.
//!
//! Bus enumeration needs every service to be heard from within a bounded
//! window.  The control service announces itself every
//! `announce_interval_ms`; any other service that has not produced an
//! announce report within the same window is flagged as due for a query.
//!
//! ```text
//!   caller's loop ──tick(Δ)──▶ AnnounceScheduler ──▶ [SelfAnnounce, QueryDue(n)…]
//!                                                         │
//!                                   Dispatcher ◀──────────┘ builds reports,
//!                                                           calls AnnounceDelegate
//! ```
//!
//! Nothing here owns a timer.  Time only advances through `tick`, and only
//! between `attach` and `detach`.

use log::info;

/// What a tick made due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnounceDue {
    /// The control service (id 0) should broadcast its announce report.
    SelfAnnounce,
    /// A non-control service was not announced within the window.
    QueryDue(u8),
}

pub struct AnnounceScheduler {
    interval_ms: u32,
    attached: bool,
    control_elapsed_ms: u32,
    /// Time since each service was last announced, indexed by service id.
    since_seen_ms: Vec<u32>,
}

impl AnnounceScheduler {
    pub fn new(interval_ms: u32) -> Self {
        Self {
            interval_ms: interval_ms.max(1),
            attached: false,
            control_elapsed_ms: 0,
            since_seen_ms: vec![0],
        }
    }

    pub fn interval_ms(&self) -> u32 {
        self.interval_ms
    }

    /// Start scheduling (bus attach).  Windows restart from zero.
    pub fn attach(&mut self) {
        if !self.attached {
            info!("ANN: attached (every {} ms)", self.interval_ms);
        }
        self.attached = true;
        self.restart();
    }

    /// Stop scheduling (bus detach).
    pub fn detach(&mut self) {
        if self.attached {
            info!("ANN: detached");
        }
        self.attached = false;
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    /// Track a newly added service.
    pub fn add_service(&mut self, service_id: u8) {
        let idx = usize::from(service_id);
        if self.since_seen_ms.len() <= idx {
            self.since_seen_ms.resize(idx + 1, 0);
        }
    }

    /// `service_id` produced an announce report; its window restarts.
    pub fn mark_announced(&mut self, service_id: u8) {
        if service_id == 0 {
            self.control_elapsed_ms = 0;
        } else if let Some(t) = self.since_seen_ms.get_mut(usize::from(service_id)) {
            *t = 0;
        }
    }

    /// Restart every window.
    pub fn restart(&mut self) {
        self.control_elapsed_ms = 0;
        self.since_seen_ms.iter_mut().for_each(|t| *t = 0);
    }

    /// Advance the clock.  Returns everything that became due, control first.
    pub fn tick(&mut self, delta_ms: u32) -> Vec<AnnounceDue> {
        let mut due = Vec::new();
        if !self.attached {
            return due;
        }

        self.control_elapsed_ms = self.control_elapsed_ms.saturating_add(delta_ms);
        if self.control_elapsed_ms >= self.interval_ms {
            self.control_elapsed_ms %= self.interval_ms;
            due.push(AnnounceDue::SelfAnnounce);
        }

        for (id, elapsed) in self.since_seen_ms.iter_mut().enumerate().skip(1) {
            *elapsed = elapsed.saturating_add(delta_ms);
            if *elapsed >= self.interval_ms {
                *elapsed = 0;
                due.push(AnnounceDue::QueryDue(id as u8));
            }
        }
        due
    }
}
