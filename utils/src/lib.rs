//! Shared utilities for the custody wallet core.

pub mod logging;

pub use logging::{init_logging, LogFormat, LoggingError};
