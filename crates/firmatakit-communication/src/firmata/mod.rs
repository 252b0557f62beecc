//! # Firmata
//!
//! Protocol constants, the command encoder, the resumable decoder, the
//! [`Board`] state machine and the [`FirmataAdaptor`] facade.

pub mod adaptor;
pub mod board;
pub mod command_creator;
pub mod decoder;
pub mod protocol;

pub use adaptor::{parse_pin, AdaptorConfig, AdaptorState, FirmataAdaptor};
pub use board::{Board, Pin};
pub use command_creator::CommandCreator;
pub use decoder::{Decoder, FirmataMessage};
