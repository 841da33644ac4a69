//! Static register and command tables for the known service kinds.
//!
//! Every table is built from [`crate::consts`]; widths and access modes
//! follow the protocol catalogue.  Sensors share the streaming block
//! (`IsStreaming`, `StreamingInterval`) in front of their reading.

use super::ServiceDescriptor;
use crate::bus::codec::{CommandSpec, PayloadRule};
use crate::consts::{
    accelerometer, base, bootloader, button, control, gamepad, humidity, light, logger, motor,
    multitouch, music, power, pwm_light, rotary_encoder, servo, slider, tcp, temperature, wifi,
};
use crate::registers::{Access, Coupling, RegisterDescriptor, RegisterType};

use Access::{Const, ReadOnly, ReadWrite};
use RegisterType::{Bool, I16, I32, U8, U16, U32, U64};

const U22_10: RegisterType = RegisterType::Fixed {
    int_bits: 22,
    frac_bits: 10,
};

const IS_STREAMING: RegisterDescriptor =
    RegisterDescriptor::new(base::REG_IS_STREAMING, "is_streaming", Bool, ReadWrite);

const STREAMING_INTERVAL: RegisterDescriptor = RegisterDescriptor::new(
    base::REG_STREAMING_INTERVAL,
    "streaming_interval",
    U32,
    ReadWrite,
)
.with_default(&[100, 0, 0, 0]);

// ── Infrastructure services ───────────────────────────────────

pub static CONTROL: ServiceDescriptor = ServiceDescriptor {
    name: "control",
    registers: &[
        RegisterDescriptor::new(
            control::REG_DEVICE_DESCRIPTION,
            "device_description",
            RegisterType::Bytes { max_len: 64 },
            Const,
        ),
        RegisterDescriptor::new(control::REG_DEVICE_CLASS, "device_class", U32, Const),
        RegisterDescriptor::new(control::REG_TEMPERATURE, "temperature", I16, ReadOnly),
        RegisterDescriptor::new(
            control::REG_BOOTLOADER_DEVICE_CLASS,
            "bootloader_device_class",
            U32,
            Const,
        ),
        RegisterDescriptor::new(
            control::REG_FIRMWARE_VERSION,
            "firmware_version",
            RegisterType::Bytes { max_len: 32 },
            Const,
        ),
        RegisterDescriptor::new(control::REG_UPTIME, "uptime", U64, ReadOnly),
    ],
    commands: &[
        CommandSpec::new(control::CMD_NOOP, "noop", PayloadRule::Any),
        CommandSpec::new(control::CMD_IDENTIFY, "identify", PayloadRule::Empty),
        CommandSpec::new(control::CMD_RESET, "reset", PayloadRule::Empty),
    ],
};

pub static BOOTLOADER: ServiceDescriptor = ServiceDescriptor {
    name: "bootloader",
    registers: &[],
    commands: &[
        CommandSpec::new(bootloader::CMD_PAGE_DATA, "page_data", PayloadRule::Any),
        CommandSpec::new(bootloader::CMD_SET_SESSION, "set_session", PayloadRule::Exact(4)),
    ],
};

pub static LOGGER: ServiceDescriptor = ServiceDescriptor {
    name: "logger",
    registers: &[RegisterDescriptor::new(logger::REG_MIN_PRIORITY, "min_priority", U8, ReadWrite)
        .with_default(&[logger::LoggerPriority::Warning as u8])],
    commands: &[],
};

pub static TCP: ServiceDescriptor = ServiceDescriptor {
    name: "tcp",
    registers: &[],
    commands: &[CommandSpec::new(tcp::CMD_OPEN, "open", PayloadRule::AtLeast(1))],
};

pub static WIFI: ServiceDescriptor = ServiceDescriptor {
    name: "wifi",
    registers: &[],
    commands: &[
        CommandSpec::new(wifi::CMD_SCAN, "scan", PayloadRule::AtLeast(1)),
        CommandSpec::new(wifi::CMD_CONNECT, "connect", PayloadRule::AtLeast(2)),
        CommandSpec::new(wifi::CMD_DISCONNECT, "disconnect", PayloadRule::Empty),
    ],
};

// ── Sensors ───────────────────────────────────────────────────

pub static TEMPERATURE: ServiceDescriptor = ServiceDescriptor {
    name: "temperature",
    registers: &[
        IS_STREAMING,
        STREAMING_INTERVAL,
        RegisterDescriptor::new(temperature::REG_TEMPERATURE, "temperature", U22_10, ReadOnly),
    ],
    commands: &[],
};

pub static HUMIDITY: ServiceDescriptor = ServiceDescriptor {
    name: "humidity",
    registers: &[
        IS_STREAMING,
        STREAMING_INTERVAL,
        RegisterDescriptor::new(humidity::REG_HUMIDITY, "humidity", U22_10, ReadOnly),
    ],
    commands: &[],
};

pub static ACCELEROMETER: ServiceDescriptor = ServiceDescriptor {
    name: "accelerometer",
    registers: &[
        IS_STREAMING,
        STREAMING_INTERVAL,
        // x, y, z as i16 fractions of 1 g
        RegisterDescriptor::new(
            accelerometer::REG_FORCES,
            "forces",
            RegisterType::Array {
                elem_size: 2,
                max_elems: 3,
            },
            ReadOnly,
        ),
    ],
    commands: &[],
};

pub static BUTTON: ServiceDescriptor = ServiceDescriptor {
    name: "button",
    registers: &[
        IS_STREAMING,
        STREAMING_INTERVAL,
        RegisterDescriptor::new(button::REG_PRESSED, "pressed", Bool, ReadOnly),
    ],
    commands: &[],
};

pub static ROTARY_ENCODER: ServiceDescriptor = ServiceDescriptor {
    name: "rotary_encoder",
    registers: &[
        IS_STREAMING,
        STREAMING_INTERVAL,
        RegisterDescriptor::new(rotary_encoder::REG_POSITION, "position", I32, ReadOnly),
        RegisterDescriptor::new(rotary_encoder::REG_CLICKS_PER_TURN, "clicks_per_turn", U16, Const),
    ],
    commands: &[],
};

pub static SLIDER: ServiceDescriptor = ServiceDescriptor {
    name: "slider",
    registers: &[
        IS_STREAMING,
        STREAMING_INTERVAL,
        RegisterDescriptor::new(slider::REG_POSITION, "position", U16, ReadOnly),
    ],
    commands: &[],
};

pub static MULTITOUCH: ServiceDescriptor = ServiceDescriptor {
    name: "multitouch",
    registers: &[
        IS_STREAMING,
        STREAMING_INTERVAL,
        RegisterDescriptor::new(
            multitouch::REG_CAPACITY,
            "capacity",
            RegisterType::Array {
                elem_size: 4,
                max_elems: 16,
            },
            ReadOnly,
        ),
    ],
    commands: &[],
};

pub static GAMEPAD: ServiceDescriptor = ServiceDescriptor {
    name: "gamepad",
    registers: &[
        IS_STREAMING,
        STREAMING_INTERVAL,
        // (button u16, pressure u8) pairs
        RegisterDescriptor::new(
            gamepad::REG_BUTTONS,
            "buttons",
            RegisterType::Array {
                elem_size: 3,
                max_elems: 10,
            },
            ReadOnly,
        ),
    ],
    commands: &[],
};

// ── Actuators ─────────────────────────────────────────────────

pub static LIGHT: ServiceDescriptor = ServiceDescriptor {
    name: "light",
    registers: &[
        RegisterDescriptor::new(light::REG_BRIGHTNESS, "brightness", U8, ReadWrite)
            .with_default(&[15]),
        RegisterDescriptor::new(light::REG_MAX_POWER, "max_power", U16, ReadWrite)
            .with_default(&[0xf4, 0x01]),
        RegisterDescriptor::new(light::REG_LIGHT_TYPE, "light_type", U8, ReadWrite),
        RegisterDescriptor::new(light::REG_NUM_PIXELS, "num_pixels", U16, ReadWrite)
            .with_default(&[15, 0]),
        RegisterDescriptor::new(light::REG_ACTUAL_BRIGHTNESS, "actual_brightness", U8, ReadOnly),
    ],
    commands: &[CommandSpec::new(light::CMD_RUN, "run", PayloadRule::AtLeast(1))],
};

const STEPS_RESET: &[Coupling] = &[Coupling {
    target: pwm_light::REG_CURRENT_ITERATION,
    value: &[0, 0],
}];

pub static PWM_LIGHT: ServiceDescriptor = ServiceDescriptor {
    name: "pwm_light",
    registers: &[
        RegisterDescriptor::new(pwm_light::REG_BRIGHTNESS, "brightness", U16, ReadWrite),
        RegisterDescriptor::new(pwm_light::REG_MAX_POWER, "max_power", U16, ReadWrite)
            .with_default(&[100, 0]),
        RegisterDescriptor::new(pwm_light::REG_CURRENT_ITERATION, "current_iteration", U16, ReadWrite),
        RegisterDescriptor::new(pwm_light::REG_MAX_ITERATIONS, "max_iterations", U16, ReadWrite)
            .with_default(&[0xff, 0xff]),
        // (duration u16, brightness u16) pairs
        RegisterDescriptor::new(
            pwm_light::REG_STEPS,
            "steps",
            RegisterType::Array {
                elem_size: 4,
                max_elems: 32,
            },
            ReadWrite,
        )
        .with_coupling(STEPS_RESET),
        RegisterDescriptor::new(pwm_light::REG_MAX_STEPS, "max_steps", U8, Const)
            .with_default(&[32]),
    ],
    commands: &[],
};

pub static MOTOR: ServiceDescriptor = ServiceDescriptor {
    name: "motor",
    registers: &[
        RegisterDescriptor::new(motor::REG_ENABLED, "enabled", Bool, ReadWrite),
        RegisterDescriptor::new(motor::REG_DUTY, "duty", I16, ReadWrite),
    ],
    commands: &[],
};

pub static SERVO: ServiceDescriptor = ServiceDescriptor {
    name: "servo",
    registers: &[
        RegisterDescriptor::new(servo::REG_ENABLED, "enabled", Bool, ReadWrite),
        RegisterDescriptor::new(servo::REG_PULSE, "pulse", U32, ReadWrite)
            .with_default(&[0xdc, 0x05, 0, 0]),
    ],
    commands: &[],
};

pub static MUSIC: ServiceDescriptor = ServiceDescriptor {
    name: "music",
    registers: &[RegisterDescriptor::new(music::REG_VOLUME, "volume", U8, ReadWrite)
        .with_default(&[0xff])],
    commands: &[CommandSpec::new(music::CMD_PLAY_TONE, "play_tone", PayloadRule::Exact(6))],
};

pub static POWER: ServiceDescriptor = ServiceDescriptor {
    name: "power",
    registers: &[
        RegisterDescriptor::new(power::REG_ENABLED, "enabled", Bool, ReadWrite).with_default(&[1]),
        RegisterDescriptor::new(power::REG_MAX_POWER, "max_power", U16, ReadWrite)
            .with_default(&[0xf4, 0x01]),
        RegisterDescriptor::new(
            power::REG_KEEP_ON_PULSE_DURATION,
            "keep_on_pulse_duration",
            U16,
            ReadWrite,
        ),
        RegisterDescriptor::new(
            power::REG_KEEP_ON_PULSE_PERIOD,
            "keep_on_pulse_period",
            U16,
            ReadWrite,
        ),
        RegisterDescriptor::new(power::REG_CURRENT_DRAW, "current_draw", U16, ReadOnly),
        RegisterDescriptor::new(power::REG_BATTERY_VOLTAGE, "battery_voltage", U16, ReadOnly),
        RegisterDescriptor::new(power::REG_OVERLOAD, "overload", Bool, ReadOnly),
        RegisterDescriptor::new(power::REG_BATTERY_CHARGE, "battery_charge", U16, ReadOnly),
        RegisterDescriptor::new(power::REG_BATTERY_CAPACITY, "battery_capacity", U32, Const),
    ],
    commands: &[],
};

/// Every descriptor in this module.
pub static ALL: [&ServiceDescriptor; 19] = [
    &CONTROL,
    &BOOTLOADER,
    &LOGGER,
    &TCP,
    &WIFI,
    &TEMPERATURE,
    &HUMIDITY,
    &ACCELEROMETER,
    &BUTTON,
    &ROTARY_ENCODER,
    &SLIDER,
    &MULTITOUCH,
    &GAMEPAD,
    &LIGHT,
    &PWM_LIGHT,
    &MOTOR,
    &SERVO,
    &MUSIC,
    &POWER,
];
