//! # logloom-core
//!
//! Core crate for Logloom. Contains configuration schemas, the plugin
//! manifest model, the log record value types, tracing initialization,
//! and the unified error system.
//!
//! This crate has **no** internal dependencies on other Logloom crates.

pub mod config;
pub mod error;
pub mod logging;
pub mod types;

pub use error::AppError;
pub use error::AppResult;
pub use types::record::{LogLevel, LogRecord};
