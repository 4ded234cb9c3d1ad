//! Shared tracing setup for Fitmarket binaries
//!
//! Library code only emits events through the `tracing` macros; installing a
//! subscriber is left to the binary via [`init::init_tracing`].

pub mod config;
pub mod init;

pub use config::{InstrumentationConfig, LogFormat};
pub use init::init_tracing;
