//! Port traits: the boundary between the bus core and the device.
//!
//! ```text
//!   Device adapter ──▶ Port trait ──▶ service handler (protocol core)
//! ```
//!
//! Flash, MCU housekeeping, sockets and the WiFi radio are reached only
//! through these traits, so the whole core runs against in-memory mocks
//! in tests.  All port errors are typed; handlers turn them into error
//! reports, never panics.

use crate::bus::Report;

// ───────────────────────────────────────────────────────────────
// Flash port (bootloader → flash controller)
// ───────────────────────────────────────────────────────────────

/// Writes one fully assembled page.  The call is a bounded synchronous
/// step: the flasher does not continue until it returns.
pub trait FlashPort {
    /// `data.len()` always equals the configured page size.
    fn write_page(&mut self, page_address: u32, data: &[u8]) -> Result<(), PortError>;
}

// ───────────────────────────────────────────────────────────────
// Device port (control service → MCU)
// ───────────────────────────────────────────────────────────────

pub trait DevicePort {
    /// Blink a status LED or similar so a human can find the device.
    fn identify(&mut self);

    /// Reset the device.  Called after the bus core has reset its own state.
    fn reset(&mut self);

    /// Microseconds since boot.
    fn uptime_us(&self) -> u64;

    /// MCU temperature in °C, if the chip has a sensor.
    fn temperature_c(&self) -> Option<i16>;
}

// ───────────────────────────────────────────────────────────────
// Command port (basic services → actuator / sensor driver)
// ───────────────────────────────────────────────────────────────

/// Executes service-specific commands of a register-only service
/// (e.g. `PlayTone`, `Run`).  `Ok(Some(bytes))` becomes a data report.
pub trait CommandPort {
    fn execute(&mut self, code: u16, payload: &[u8]) -> Result<Option<Vec<u8>>, PortError>;
}

// ───────────────────────────────────────────────────────────────
// Socket port (TCP service → network stack)
// ───────────────────────────────────────────────────────────────

pub trait SocketPort {
    /// Open a TLS connection.  Only one connection exists per service.
    fn connect_tls(&mut self, host: &str, port: u16) -> Result<(), PortError>;

    fn send(&mut self, data: &[u8]) -> Result<(), PortError>;

    /// Non-blocking receive.  `Ok(0)` means nothing is pending.
    fn recv(&mut self, buf: &mut [u8]) -> Result<usize, PortError>;

    fn close(&mut self);
}

// ───────────────────────────────────────────────────────────────
// WiFi port (WiFi service → radio)
// ───────────────────────────────────────────────────────────────

/// One scan result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessPoint {
    /// `consts::wifi::AP_*` bits.
    pub flags: u32,
    pub rssi: i8,
    pub channel: u8,
    pub bssid: [u8; 6],
    pub ssid: String,
}

pub trait WifiPort {
    fn scan(&mut self) -> Result<Vec<AccessPoint>, PortError>;

    fn connect(&mut self, ssid: &str, password: Option<&str>) -> Result<(), PortError>;

    fn disconnect(&mut self);

    /// Whether the station currently holds an IP address.  Polled on
    /// every tick to emit `GotIp` / `LostIp`.
    fn has_ip(&self) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Announce delegate (decouples the scheduler from the transport)
// ───────────────────────────────────────────────────────────────

/// Callbacks the dispatcher invokes from [`tick`](crate::bus::Dispatcher::tick).
///
/// The scheduler knows nothing about the physical bus; the caller's bus
/// loop implements this by writing reports to the wire.
pub trait AnnounceDelegate {
    /// The control service's periodic announce report is due.
    fn on_self_announce(&mut self, report: &Report);

    /// `service_id` has not announced within the window and should be queried.
    fn on_query_due(&mut self, service_id: u8);

    /// An unsolicited report (e.g. a streamed register reading).
    fn on_broadcast(&mut self, _report: &Report) {}
}

// ───────────────────────────────────────────────────────────────
// Error type
// ───────────────────────────────────────────────────────────────

/// Errors from any port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortError {
    /// Hardware or network I/O failed.
    Io,
    /// The resource is busy; the request may be retried.
    Busy,
    /// The peer or device refused the request.
    Refused,
    /// The operation is not available on this device.
    Unsupported,
}

impl core::fmt::Display for PortError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Io => write!(f, "I/O error"),
            Self::Busy => write!(f, "busy"),
            Self::Refused => write!(f, "refused"),
            Self::Unsupported => write!(f, "unsupported"),
        }
    }
}

impl From<PortError> for crate::error::Error {
    fn from(e: PortError) -> Self {
        match e {
            PortError::Io => Self::Service("port I/O error"),
            PortError::Busy => Self::Service("port busy"),
            PortError::Refused => Self::Service("port refused request"),
            PortError::Unsupported => Self::Service("port operation unsupported"),
        }
    }
}
