//! Bus configuration parameters
//!
//! All tunable parameters for a device's bus core.  Values can be loaded
//! from a JSON file; anything missing falls back to the defaults below.

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Flash layout seen by the bootloader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlashGeometry {
    /// Erase/write granularity in bytes (power of two, at most 65536)
    pub page_size: u32,
    /// First flashable address (inclusive)
    pub flash_start: u32,
    /// End of the flashable region (exclusive)
    pub flash_end: u32,
    /// Partial pages kept at once before the oldest is discarded
    pub max_open_pages: usize,
}

impl FlashGeometry {
    /// Bytes available for flashing.
    pub fn flashable_size(&self) -> u32 {
        self.flash_end.saturating_sub(self.flash_start)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.page_size == 0 || !self.page_size.is_power_of_two() {
            return Err(Error::Config("page_size must be a non-zero power of two"));
        }
        if self.page_size > 0x1_0000 {
            return Err(Error::Config("page_size exceeds the u16 page offset range"));
        }
        if self.flash_end <= self.flash_start {
            return Err(Error::Config("flash region is empty"));
        }
        if self.flash_start % self.page_size != 0 || self.flash_end % self.page_size != 0 {
            return Err(Error::Config("flash bounds must be page aligned"));
        }
        if self.max_open_pages == 0 {
            return Err(Error::Config("max_open_pages must be at least 1"));
        }
        Ok(())
    }
}

impl Default for FlashGeometry {
    fn default() -> Self {
        Self {
            page_size: 1024,
            flash_start: 0,
            flash_end: 0x1_0000, // 64 KiB
            max_open_pages: 1,
        }
    }
}

/// Core bus configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    // --- Enumeration ---
    /// Control service self-announce period (milliseconds)
    pub announce_interval_ms: u32,

    // --- Streaming ---
    /// Floor applied to `StreamingInterval` writes (milliseconds)
    pub min_streaming_interval_ms: u32,
    /// Interval used when a service never wrote `StreamingInterval`
    pub default_streaming_interval_ms: u32,

    // --- Pipes ---
    /// Maximum concurrently open pipe pairs
    pub max_pipes: usize,

    // --- Identity (control service constants) ---
    pub device_description: String,
    pub device_class: u32,
    pub firmware_version: String,

    // --- Bootloader ---
    pub flash: FlashGeometry,
}

impl BusConfig {
    /// Load a JSON config file and validate it.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading bus config {}", path.display()))?;
        let config: Self = serde_json::from_str(&text)
            .with_context(|| format!("parsing bus config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.announce_interval_ms == 0 {
            return Err(Error::Config("announce_interval_ms must be non-zero"));
        }
        if self.min_streaming_interval_ms == 0 {
            return Err(Error::Config("min_streaming_interval_ms must be non-zero"));
        }
        if self.default_streaming_interval_ms < self.min_streaming_interval_ms {
            return Err(Error::Config("default streaming interval below the floor"));
        }
        if self.max_pipes == 0 || self.max_pipes > usize::from(u16::MAX) / 2 {
            return Err(Error::Config("max_pipes out of range"));
        }
        self.flash.validate()
    }
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            // Enumeration
            announce_interval_ms: 500,

            // Streaming
            min_streaming_interval_ms: 20,
            default_streaming_interval_ms: 100,

            // Pipes
            max_pipes: 8,

            // Identity
            device_description: String::from("regbus device"),
            device_class: 0,
            firmware_version: String::from(env!("CARGO_PKG_VERSION")),

            // Bootloader
            flash: FlashGeometry::default(),
        }
    }
}
