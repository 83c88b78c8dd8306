//! # Core Runtime Module
//!
//! Foundational runtime infrastructure for the video platform core:
//! - Logging and tracing setup (`tracing-subscriber`)
//! - Redaction helpers for values that must not reach logs
//!
//! Other workspace crates log through `tracing` macros only; the host calls
//! [`logging::init_logging`] once at startup.

pub mod error;
pub mod logging;

pub use error::{Error, Result};
pub use logging::{init_logging, LogFormat, LogLevel, LoggingConfig};
