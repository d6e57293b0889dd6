//! Test-support utilities shared by Gauntlet's own test binaries.

pub mod log;

pub use log::init_global_test_logging;
