//! # Event Bus Module
//!
//! Named, per-device event streams with publish/subscribe semantics.
//!
//! ## Overview
//!
//! - Each board owns one [`EventBus`]; stream names such as `digital_read_2`
//!   or `i2c_reply` are unique within it
//! - Subscribers are persistent (every publish) or one-shot (next publish only)
//! - Publishing never queues: a payload with no subscriber is dropped
//! - [`after`] schedules a delayed callback on the Tokio runtime
//!
//! ## Usage
//!
//! ```rust,ignore
//! use firmatakit_core::event_bus::{EventBus, EventPayload};
//!
//! let bus = EventBus::new();
//!
//! // One-shot subscription, removed after the first delivery
//! bus.once("digital_read_2", |payload| {
//!     println!("pin 2: {:?}", payload.as_bytes());
//! });
//!
//! bus.publish("digital_read_2", vec![0x01]);
//! ```

mod bus;
mod events;

pub use bus::*;
pub use events::*;
