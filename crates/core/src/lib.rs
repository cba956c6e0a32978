//! Core functionality shared by the device identifier attestation crates.
//!
//! This crate carries the ambient pieces every other member relies on:
//! the core error type, structured logging initialisation, and the TOML
//! configuration model.

pub mod config;
pub mod error;
pub mod logging;

pub use config::{AttestationSettings, Config, LogFormat, LoggingConfig};
pub use error::{CoreError, Result};
