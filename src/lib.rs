//! Regbus device library.
//!
//! The protocol core of a register-oriented device bus: typed per-service
//! register tables, command decoding and dispatch, pipes, events, announce
//! scheduling and the bootloader page flasher.  Hardware and network are
//! reached only through the traits in [`ports`], so everything here runs
//! on the host against mocks.

#![deny(unused_must_use)]

pub mod bootloader;
pub mod bus;
pub mod config;
pub mod consts;
pub mod events;
pub mod ports;
pub mod registers;
pub mod services;

mod error;

pub use error::{BootloaderError, CodecError, Error, PipeError, RegisterError, Result};
