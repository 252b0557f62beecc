//! Error handling for firmatakit
//!
//! Provides error types for all layers of the adaptor:
//! - Configuration errors (missing connector, bad settings)
//! - Transport errors (open/read/write/close on the byte stream)
//! - State errors (operation on a board that is not connected)
//! - Command errors (bad pin identifiers or values)
//! - Gateway errors (device or event lookup failures)
//!
//! Protocol errors (noise on the serial line) are never surfaced; the decoder
//! resynchronises and logs them instead.
//!
//! All error types use `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Configuration error type
///
/// Fatal to the operation that needed the configuration; never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// No transport-opening function was supplied to the adaptor
    #[error("no board attached")]
    NoConnector,

    /// A configuration value is invalid
    #[error("Invalid configuration value for {key}: {reason}")]
    InvalidValue {
        /// The configuration key.
        key: String,
        /// Why the value was rejected.
        reason: String,
    },
}

/// Transport error type
///
/// Represents failures of the underlying duplex byte stream.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Failed to open the transport
    #[error("Failed to open port {port}: {reason}")]
    FailedToOpen {
        /// The port or connection identifier.
        port: String,
        /// The reason the transport failed to open.
        reason: String,
    },

    /// Reading from the transport failed
    #[error("Transport read failed: {reason}")]
    Read {
        /// The reason for the read failure.
        reason: String,
    },

    /// Writing to the transport failed
    #[error("Transport write failed: {reason}")]
    Write {
        /// The reason for the write failure.
        reason: String,
    },

    /// Closing the transport failed
    #[error("{reason}")]
    Close {
        /// The reason for the close failure.
        reason: String,
    },
}

/// State error type
///
/// Raised when an operation is attempted in the wrong lifecycle state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    /// The adaptor has no connected board
    #[error("no board connected")]
    NotConnected,

    /// The adaptor is already connected
    #[error("board already connected")]
    AlreadyConnected,
}

/// Command error type
///
/// Raised before anything is written when a command's arguments cannot be encoded.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// Pin identifier is not a number in the protocol's pin range
    #[error("Invalid pin: {pin}")]
    InvalidPin {
        /// The rejected pin identifier.
        pin: String,
    },

    /// Value does not fit the command's encoding
    #[error("Value {value} out of range (max {max})")]
    ValueOutOfRange {
        /// The rejected value.
        value: u32,
        /// The largest encodable value.
        max: u32,
    },
}

/// Gateway error type
///
/// Lookup failures reported by the event streaming boundary instead of subscribing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// No device registered under the owner/device pair
    #[error("No Device found with the name {device} on {owner}")]
    DeviceNotFound {
        /// The owning entity (e.g. a robot).
        owner: String,
        /// The device name.
        device: String,
    },

    /// The device does not advertise the requested event
    #[error("No Event found with the name {event}")]
    EventNotFound {
        /// The event name.
        event: String,
    },
}

impl GatewayError {
    /// JSON body reported to the gateway's own caller
    pub fn body(&self) -> serde_json::Value {
        serde_json::json!({ "error": self.to_string() })
    }
}

/// Main error type for firmatakit
///
/// A unified error type that can represent any error from all layers.
/// This is the primary error type used in public APIs.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Transport error
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// State error
    #[error(transparent)]
    State(#[from] StateError),

    /// Command error
    #[error(transparent)]
    Command(#[from] CommandError),

    /// Gateway error
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// Standard I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an error from a string message
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }

    /// Check if this is a configuration error
    pub fn is_config_error(&self) -> bool {
        matches!(self, Error::Config(_))
    }

    /// Check if this is a transport error
    pub fn is_transport_error(&self) -> bool {
        matches!(self, Error::Transport(_) | Error::Io(_))
    }

    /// Check if this is a state error
    pub fn is_state_error(&self) -> bool {
        matches!(self, Error::State(_))
    }

    /// Check if this is a command error
    pub fn is_command_error(&self) -> bool {
        matches!(self, Error::Command(_))
    }
}

/// Result type using Error
pub type Result<T> = std::result::Result<T, Error>;
