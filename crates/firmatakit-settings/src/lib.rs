//! firmatakit Settings Crate
//!
//! Loads, validates and saves adaptor configuration files.

pub mod config;
pub mod error;

pub use config::AdaptorSettings;
pub use error::{SettingsError, SettingsResult};
