//! Logger setup and per-module gated logging macros.
//!
//! Modules that log on hot paths (every browser event, every enqueue) define
//! a module-level flag and use the macros instead of the bare `log` ones:
//! ```ignore
//! const ENABLE_LOGS: bool = true;
//!
//! use crate::{log_debug, log_info};
//!
//! log_info!("tab {} mapped", 42);
//! ```

use log::LevelFilter;

/// Initialise `env_logger` from `RUST_LOG`, falling back to `Info`
/// (`Debug` when `verbose > 0`). Output goes to stderr so that the host's
/// stdout carries nothing but protocol replies.
pub fn init(verbose: u8) {
    let default_level = match verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    let mut builder = env_logger::Builder::new();
    builder.filter_level(default_level);
    builder.parse_default_env();
    builder.target(env_logger::Target::Stderr);

    // A second init (tests, embedding) keeps the first logger.
    let _ = builder.try_init();
}

/// Info log gated by the calling module's `ENABLE_LOGS` const.
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::info!($($arg)*);
        }
    };
}

/// Warn log gated by the calling module's `ENABLE_LOGS` const.
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::warn!($($arg)*);
        }
    };
}

/// Error log gated by the calling module's `ENABLE_LOGS` const.
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::error!($($arg)*);
        }
    };
}

/// Debug log gated by the calling module's `ENABLE_LOGS` const.
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::debug!($($arg)*);
        }
    };
}
