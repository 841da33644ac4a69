//! Protocol vocabulary: command codes, register addresses and event codes.
//!
//! Codes are scoped per service.  The same number means different things
//! in different modules (e.g. `button::EVENT_DOWN` and
//! `gamepad::EVENT_DOWN` are both `0x1`), which is why lookups always go
//! through a service's own tables in [`crate::services::catalog`].

/// Largest payload a single packet (or pipe record) may carry.
pub const MAX_PAYLOAD: usize = 236;

/// Service class announced by the control service.
pub const CONTROL_SERVICE_CLASS: u32 = 0x0;

// ── Common commands and registers ─────────────────────────────

pub mod base {
    /// Enumeration data for control, advertisement data otherwise.
    pub const CMD_ANNOUNCE: u16 = 0x0;
    pub const CMD_CALIBRATE: u16 = 0x2;
    pub const CMD_DESCRIPTION: u16 = 0x3;
    /// `0x1000 | N` fetches register `N`.
    pub const CMD_GET_REGISTER: u16 = 0x1000;
    /// `0x2000 | N` sets register `N`.
    pub const CMD_SET_REGISTER: u16 = 0x2000;
    /// Low 12 bits of a get/set code carry the register address.
    pub const REGISTER_ADDR_MASK: u16 = 0x0fff;
    /// Events travel as `0x8000 | event_code`.
    pub const EVENT_FLAG: u16 = 0x8000;

    /// Read-write u32.
    pub const REG_INTENSITY: u16 = 0x1;
    /// Read-write i32.
    pub const REG_VALUE: u16 = 0x2;
    /// Read-write bool.
    pub const REG_IS_STREAMING: u16 = 0x3;
    /// Read-write ms u32.
    pub const REG_STREAMING_INTERVAL: u16 = 0x4;
    /// Read-write i32.
    pub const REG_LOW_THRESHOLD: u16 = 0x5;
    /// Read-write i32.
    pub const REG_HIGH_THRESHOLD: u16 = 0x6;
    /// Read-write mA u16.
    pub const REG_MAX_POWER: u16 = 0x7;
    /// Read-only i32.
    pub const REG_READING: u16 = 0x101;
}

pub mod sensor {
    pub const REG_IS_STREAMING: u16 = super::base::REG_IS_STREAMING;
    pub const REG_STREAMING_INTERVAL: u16 = super::base::REG_STREAMING_INTERVAL;
}

pub mod accelerometer {
    pub const REG_FORCES: u16 = 0x101;

    pub const EVENT_TILT_UP: u16 = 0x1;
    pub const EVENT_TILT_DOWN: u16 = 0x2;
    pub const EVENT_TILT_LEFT: u16 = 0x3;
    pub const EVENT_TILT_RIGHT: u16 = 0x4;
    pub const EVENT_FACE_UP: u16 = 0x5;
    pub const EVENT_FACE_DOWN: u16 = 0x6;
    pub const EVENT_FREEFALL: u16 = 0x7;
    pub const EVENT_FORCE_3G: u16 = 0x8;
    pub const EVENT_FORCE_6G: u16 = 0x9;
    pub const EVENT_FORCE_8G: u16 = 0xa;
    pub const EVENT_SHAKE: u16 = 0xb;
    pub const EVENT_FORCE_2G: u16 = 0xc;
}

pub mod bootloader {
    /// Fixed service class answered by every bootloader.
    pub const SERVICE_CLASS: u32 = 0x1ffa_9948;

    /// No args.  Same code as the generic announce.
    pub const CMD_INFO: u16 = 0x0;
    pub const CMD_PAGE_DATA: u16 = 0x80;
    /// Argument: session_id u32.
    pub const CMD_SET_SESSION: u16 = 0x81;

    pub const ERROR_NO_ERROR: u32 = 0x0;
    pub const ERROR_PACKET_TOO_SMALL: u32 = 0x1;
    pub const ERROR_OUT_OF_FLASHABLE_RANGE: u32 = 0x2;
    pub const ERROR_INVALID_PAGE_OFFSET: u32 = 0x3;
    pub const ERROR_NOT_PAGE_ALIGNED: u32 = 0x4;
    /// Local extension: the flash port failed to commit a page.
    pub const ERROR_FLASH_WRITE_FAILED: u32 = 0x80;
}

pub mod button {
    /// Read-only bool.
    pub const REG_PRESSED: u16 = 0x101;

    pub const EVENT_DOWN: u16 = 0x1;
    pub const EVENT_UP: u16 = 0x2;
    /// Emitted with `up` when the press lasted at most 500 ms.
    pub const EVENT_CLICK: u16 = 0x3;
    /// Emitted with `up` when the press lasted more than 500 ms.
    pub const EVENT_LONG_CLICK: u16 = 0x4;
}

pub mod control {
    pub const CMD_NOOP: u16 = 0x80;
    pub const CMD_IDENTIFY: u16 = 0x81;
    pub const CMD_RESET: u16 = 0x82;

    /// Constant string.
    pub const REG_DEVICE_DESCRIPTION: u16 = 0x180;
    /// Constant u32.
    pub const REG_DEVICE_CLASS: u16 = 0x181;
    /// Read-only °C i16.
    pub const REG_TEMPERATURE: u16 = 0x182;
    /// Constant u32.
    pub const REG_BOOTLOADER_DEVICE_CLASS: u16 = 0x184;
    /// Constant string.
    pub const REG_FIRMWARE_VERSION: u16 = 0x185;
    /// Read-only μs u64.
    pub const REG_UPTIME: u16 = 0x186;
}

pub mod rotary_encoder {
    /// Read-only i32.
    pub const REG_POSITION: u16 = 0x101;
    /// Constant u16.
    pub const REG_CLICKS_PER_TURN: u16 = 0x180;
}

pub mod gamepad {
    pub const CMD_ANNOUNCE: u16 = 0x0;
    pub const REG_BUTTONS: u16 = 0x101;
    pub const EVENT_DOWN: u16 = 0x1;
    pub const EVENT_UP: u16 = 0x2;

    /// Button identifiers (u16 on the wire).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    #[repr(u16)]
    pub enum GamepadButton {
        Left = 0x1,
        Up = 0x2,
        Right = 0x3,
        Down = 0x4,
        A = 0x5,
        B = 0x6,
        Menu = 0x7,
        MenuAlt = 0x8,
        Reset = 0x9,
        Exit = 0xa,
    }

    impl TryFrom<u16> for GamepadButton {
        type Error = u16;

        fn try_from(raw: u16) -> Result<Self, u16> {
            Ok(match raw {
                0x1 => Self::Left,
                0x2 => Self::Up,
                0x3 => Self::Right,
                0x4 => Self::Down,
                0x5 => Self::A,
                0x6 => Self::B,
                0x7 => Self::Menu,
                0x8 => Self::MenuAlt,
                0x9 => Self::Reset,
                0xa => Self::Exit,
                other => return Err(other),
            })
        }
    }
}

pub mod humidity {
    /// Read-only %RH u22.10.
    pub const REG_HUMIDITY: u16 = 0x101;
}

pub mod light {
    pub const REG_BRIGHTNESS: u16 = 0x1;
    pub const REG_MAX_POWER: u16 = 0x7;
    pub const REG_LIGHT_TYPE: u16 = 0x80;
    pub const REG_NUM_PIXELS: u16 = 0x81;
    /// Read-only; may lag `brightness` when power limited.
    pub const REG_ACTUAL_BRIGHTNESS: u16 = 0x180;

    /// Argument: program bytes.
    pub const CMD_RUN: u16 = 0x81;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    #[repr(u8)]
    pub enum LightType {
        Ws2812bGrb = 0x0,
        Apa102 = 0x10,
        Sk9822 = 0x11,
    }

    impl TryFrom<u8> for LightType {
        type Error = u8;

        fn try_from(raw: u8) -> Result<Self, u8> {
            match raw {
                0x0 => Ok(Self::Ws2812bGrb),
                0x10 => Ok(Self::Apa102),
                0x11 => Ok(Self::Sk9822),
                other => Err(other),
            }
        }
    }
}

pub mod logger {
    pub const REG_MIN_PRIORITY: u16 = 0x80;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
    #[repr(u8)]
    pub enum LoggerPriority {
        Debug = 0x0,
        Log = 0x1,
        Warning = 0x2,
        Error = 0x3,
    }

    impl TryFrom<u8> for LoggerPriority {
        type Error = u8;

        fn try_from(raw: u8) -> Result<Self, u8> {
            match raw {
                0x0 => Ok(Self::Debug),
                0x1 => Ok(Self::Log),
                0x2 => Ok(Self::Warning),
                0x3 => Ok(Self::Error),
                other => Err(other),
            }
        }
    }
}

pub mod motor {
    pub const REG_ENABLED: u16 = 0x1;
    /// Read-write fraction i16; sign selects direction.
    pub const REG_DUTY: u16 = 0x2;
}

pub mod multitouch {
    /// Read-only i32[].
    pub const REG_CAPACITY: u16 = 0x101;

    pub const EVENT_TOUCH: u16 = 0x1;
    pub const EVENT_RELEASE: u16 = 0x2;
    pub const EVENT_TAP: u16 = 0x3;
    pub const EVENT_LONG_PRESS: u16 = 0x4;
    pub const EVENT_SWIPE_POS: u16 = 0x10;
    pub const EVENT_SWIPE_NEG: u16 = 0x11;
}

pub mod music {
    pub const REG_VOLUME: u16 = 0x1;
    /// Argument: period u16, duty u16, duration u16.
    pub const CMD_PLAY_TONE: u16 = 0x80;
}

pub mod power {
    pub const REG_ENABLED: u16 = 0x1;
    pub const REG_MAX_POWER: u16 = 0x7;
    pub const REG_KEEP_ON_PULSE_DURATION: u16 = 0x80;
    pub const REG_KEEP_ON_PULSE_PERIOD: u16 = 0x81;
    pub const REG_CURRENT_DRAW: u16 = 0x101;
    pub const REG_BATTERY_VOLTAGE: u16 = 0x180;
    pub const REG_OVERLOAD: u16 = 0x181;
    pub const REG_BATTERY_CHARGE: u16 = 0x182;
    pub const REG_BATTERY_CAPACITY: u16 = 0x183;
}

pub mod pwm_light {
    pub const REG_BRIGHTNESS: u16 = 0x1;
    pub const REG_MAX_POWER: u16 = 0x7;
    /// Writing `steps` restarts the animation.
    pub const REG_CURRENT_ITERATION: u16 = 0x80;
    pub const REG_MAX_ITERATIONS: u16 = 0x81;
    pub const REG_STEPS: u16 = 0x82;
    pub const REG_MAX_STEPS: u16 = 0x180;
}

pub mod servo {
    pub const REG_ENABLED: u16 = 0x1;
    /// Read-write μs u32.
    pub const REG_PULSE: u16 = 0x2;
}

pub mod slider {
    /// Read-only fraction u16.
    pub const REG_POSITION: u16 = 0x101;
}

pub mod tcp {
    /// Argument: inbound pipe descriptor.
    pub const CMD_OPEN: u16 = 0x80;

    /// Pipe meta command: port u16 followed by the host name.
    pub const PIPE_CMD_OPEN_SSL: u16 = 0x1;
    /// Pipe meta command carrying an error code (i32).
    pub const PIPE_CMD_ERROR: u16 = 0x0;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    #[repr(i32)]
    pub enum TcpError {
        InvalidCommand = 0x1,
        InvalidCommandPayload = 0x2,
    }

    impl TryFrom<i32> for TcpError {
        type Error = i32;

        fn try_from(raw: i32) -> Result<Self, i32> {
            match raw {
                0x1 => Ok(Self::InvalidCommand),
                0x2 => Ok(Self::InvalidCommandPayload),
                other => Err(other),
            }
        }
    }
}

pub mod temperature {
    /// Read-only °C u22.10.
    pub const REG_TEMPERATURE: u16 = 0x101;
}

pub mod wifi {
    /// Argument: results pipe descriptor.
    pub const CMD_SCAN: u16 = 0x80;
    /// Argument: ssid NUL [password NUL].
    pub const CMD_CONNECT: u16 = 0x81;
    pub const CMD_DISCONNECT: u16 = 0x82;

    pub const EVENT_GOT_IP: u16 = 0x1;
    pub const EVENT_LOST_IP: u16 = 0x2;

    pub const AP_HAS_PASSWORD: u32 = 0x1;
    pub const AP_WPS: u32 = 0x2;
    pub const AP_HAS_SECONDARY_CHANNEL_ABOVE: u32 = 0x4;
    pub const AP_HAS_SECONDARY_CHANNEL_BELOW: u32 = 0x8;
    pub const AP_IEEE_802_11B: u32 = 0x100;
    pub const AP_IEEE_802_11A: u32 = 0x200;
    pub const AP_IEEE_802_11G: u32 = 0x400;
    pub const AP_IEEE_802_11N: u32 = 0x800;
    pub const AP_IEEE_802_11AC: u32 = 0x1000;
    pub const AP_IEEE_802_11AX: u32 = 0x2000;
    pub const AP_IEEE_802_LONG_RANGE: u32 = 0x8000;
}
