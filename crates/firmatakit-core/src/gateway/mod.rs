//! # Gateway Boundary
//!
//! The part of the event-streaming gateway that touches the event bus:
//! device lookup by owner and name, event lookup on the device, and a
//! persistent subscription framed for server-sent delivery.

mod registry;
mod stream;

pub use registry::{DeviceRegistry, Eventer};
pub use stream::{sse_frame, EventStream, DEFAULT_STREAM_CAPACITY};
