//! Adaptor configuration
//!
//! One [`AdaptorSettings`] describes how to reach a board and how long to
//! wait for it. Settings load from and save to `.toml` or `.json` files;
//! missing keys take their defaults.

use firmatakit_communication::{AdaptorConfig, FirmataAdaptor, DEFAULT_BAUD_RATE};
use firmatakit_core::DEFAULT_STREAM_CAPACITY;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{SettingsError, SettingsResult};

/// Largest I2C delay the protocol can carry
const MAX_I2C_DELAY_US: u16 = 0x3FFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Json,
    Toml,
}

impl Format {
    fn from_path(path: &Path) -> SettingsResult<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Ok(Format::Json),
            Some("toml") => Ok(Format::Toml),
            other => Err(SettingsError::UnsupportedFormat(
                other.unwrap_or("none").to_string(),
            )),
        }
    }
}

/// Settings for one adaptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptorSettings {
    /// Adaptor name
    pub name: String,
    /// Serial port of the board
    pub port: String,
    /// Serial baud rate
    pub baud_rate: u32,
    /// Read timeout in milliseconds
    pub read_timeout_ms: u64,
    /// Handshake timeout in milliseconds
    pub handshake_timeout_ms: u64,
    /// Delay between I2C write and read in microseconds
    pub i2c_delay_us: u16,
    /// Frames buffered per event stream
    pub stream_capacity: usize,
}

impl Default for AdaptorSettings {
    fn default() -> Self {
        let config = AdaptorConfig::default();
        Self {
            name: "firmata".to_string(),
            port: "/dev/ttyACM0".to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout_ms: config.read_timeout.as_millis() as u64,
            handshake_timeout_ms: config.handshake_timeout.as_millis() as u64,
            i2c_delay_us: config.i2c_delay_us,
            stream_capacity: DEFAULT_STREAM_CAPACITY,
        }
    }
}

impl AdaptorSettings {
    /// Create settings with defaults for `port`
    pub fn for_port(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            ..Self::default()
        }
    }

    /// Default settings file location (`<config dir>/firmatakit/firmatakit.toml`)
    pub fn default_path() -> SettingsResult<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join("firmatakit").join("firmatakit.toml"))
            .ok_or_else(|| {
                SettingsError::ConfigDirectory("no configuration directory on this platform".into())
            })
    }

    /// Load settings from a `.toml` or `.json` file and validate them
    pub fn load_from_file(path: &Path) -> SettingsResult<Self> {
        let format = Format::from_path(path)?;
        let content = std::fs::read_to_string(path)
            .map_err(|e| SettingsError::LoadError(format!("{}: {}", path.display(), e)))?;

        let settings: Self = match format {
            Format::Json => serde_json::from_str(&content)?,
            Format::Toml => toml::from_str(&content)?,
        };

        settings.validate()?;
        tracing::debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Save settings to a `.toml` or `.json` file
    pub fn save_to_file(&self, path: &Path) -> SettingsResult<()> {
        self.validate()?;

        let content = match Format::from_path(path)? {
            Format::Json => serde_json::to_string_pretty(self)?,
            Format::Toml => toml::to_string_pretty(self)?,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| SettingsError::SaveError(format!("{}: {}", parent.display(), e)))?;
        }
        std::fs::write(path, content)
            .map_err(|e| SettingsError::SaveError(format!("{}: {}", path.display(), e)))?;

        tracing::debug!("Saved settings to {}", path.display());
        Ok(())
    }

    /// Validate settings
    pub fn validate(&self) -> SettingsResult<()> {
        if self.port.trim().is_empty() {
            return Err(SettingsError::invalid("port", "must not be empty"));
        }
        if self.baud_rate == 0 {
            return Err(SettingsError::invalid("baud_rate", "must be > 0"));
        }
        if self.read_timeout_ms == 0 {
            return Err(SettingsError::invalid("read_timeout_ms", "must be > 0"));
        }
        if self.handshake_timeout_ms == 0 {
            return Err(SettingsError::invalid("handshake_timeout_ms", "must be > 0"));
        }
        if self.i2c_delay_us > MAX_I2C_DELAY_US {
            return Err(SettingsError::invalid(
                "i2c_delay_us",
                format!("must be <= {}", MAX_I2C_DELAY_US),
            ));
        }
        if self.stream_capacity == 0 {
            return Err(SettingsError::invalid("stream_capacity", "must be > 0"));
        }
        Ok(())
    }

    /// Timing configuration for the adaptor
    pub fn to_adaptor_config(&self) -> AdaptorConfig {
        AdaptorConfig {
            read_timeout: Duration::from_millis(self.read_timeout_ms),
            handshake_timeout: Duration::from_millis(self.handshake_timeout_ms),
            i2c_delay_us: self.i2c_delay_us,
        }
    }

    /// Build a serial adaptor from these settings
    pub fn build_adaptor(&self) -> SettingsResult<FirmataAdaptor> {
        self.validate()?;
        Ok(
            FirmataAdaptor::serial(self.name.clone(), self.port.clone(), self.baud_rate)
                .with_config(self.to_adaptor_config()),
        )
    }
}
