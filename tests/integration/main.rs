//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises a specific subsystem
//! through the dispatcher against mock ports.  No hardware required.

mod bootloader_flow_tests;
mod dispatch_tests;
mod pipe_service_tests;
