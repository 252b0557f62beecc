//! # firmatakit Communication
//!
//! Transports and the Firmata protocol for firmatakit.
//! Supports serial ports and in-process pipes, decodes the Firmata byte
//! stream into events on a per-board bus, and exposes blocking-style reads
//! and writes through [`FirmataAdaptor`].

pub mod communication;
pub mod firmata;

pub use communication::{
    fixed_connector, is_valid_port, list_ports, serial::DEFAULT_BAUD_RATE, serial_connector,
    Connector, DeviceEnd, MemoryTransport, NullTransport, SerialPortInfo, SerialTransport,
    Transport,
};

pub use firmata::{
    parse_pin, AdaptorConfig, AdaptorState, Board, CommandCreator, Decoder, FirmataAdaptor,
    FirmataMessage, Pin,
};
