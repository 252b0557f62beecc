//! # firmatakit Core
//!
//! Core types and infrastructure for firmatakit.
//! Provides the error hierarchy, the per-board event bus, shared pin
//! data types, and the gateway boundary used to stream events out.

pub mod data;
pub mod error;
pub mod event_bus;
pub mod gateway;

pub use data::PinMode;

pub use error::{
    CommandError, ConfigError, Error, GatewayError, Result, StateError, TransportError,
};

pub use event_bus::{
    after, Event, EventBus, EventPayload, FirmwareInfo, FirmwareVersion, I2cReply,
    PinCapabilities, PinCapability, PinState, SubscriptionId,
};

pub use gateway::{sse_frame, DeviceRegistry, EventStream, Eventer, DEFAULT_STREAM_CAPACITY};
