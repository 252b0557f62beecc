//! Event payload definitions for the event bus.
//!
//! Every publish carries one [`EventPayload`]. Payloads are cloneable so the
//! bus can hand each subscriber its own copy, and serialisable so the
//! streaming gateway can forward them as JSON.

use serde::Serialize;

use crate::data::PinMode;

/// Data published on an event stream
///
/// Serialises untagged: `Bytes` becomes a JSON array, `Text` a string,
/// `Empty` becomes `null` and the structured variants become objects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum EventPayload {
    /// Notification without data
    Empty,
    /// Raw bytes (digital and analog reads are published this way)
    Bytes(Vec<u8>),
    /// Text data
    Text(String),
    /// Protocol version report
    Version(FirmwareVersion),
    /// Firmware identity report
    Firmware(FirmwareInfo),
    /// Pin capability table
    Capabilities(Vec<PinCapabilities>),
    /// Analog channel per pin (`None` for pins without an analog channel)
    AnalogMapping(Vec<Option<u8>>),
    /// Pin state report
    PinState(PinState),
    /// I2C reply
    I2cReply(I2cReply),
}

impl EventPayload {
    /// Borrow the payload as a byte slice, if it carries bytes
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            EventPayload::Bytes(bytes) => Some(bytes),
            EventPayload::I2cReply(reply) => Some(&reply.data),
            _ => None,
        }
    }

    /// Short variant name for logging
    pub fn kind(&self) -> &'static str {
        match self {
            EventPayload::Empty => "empty",
            EventPayload::Bytes(_) => "bytes",
            EventPayload::Text(_) => "text",
            EventPayload::Version(_) => "version",
            EventPayload::Firmware(_) => "firmware",
            EventPayload::Capabilities(_) => "capabilities",
            EventPayload::AnalogMapping(_) => "analog_mapping",
            EventPayload::PinState(_) => "pin_state",
            EventPayload::I2cReply(_) => "i2c_reply",
        }
    }
}

impl From<Vec<u8>> for EventPayload {
    fn from(bytes: Vec<u8>) -> Self {
        EventPayload::Bytes(bytes)
    }
}

impl From<&[u8]> for EventPayload {
    fn from(bytes: &[u8]) -> Self {
        EventPayload::Bytes(bytes.to_vec())
    }
}

impl From<String> for EventPayload {
    fn from(text: String) -> Self {
        EventPayload::Text(text)
    }
}

impl From<I2cReply> for EventPayload {
    fn from(reply: I2cReply) -> Self {
        EventPayload::I2cReply(reply)
    }
}

/// Protocol version (major.minor)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct FirmwareVersion {
    /// Major version.
    pub major: u8,
    /// Minor version.
    pub minor: u8,
}

impl std::fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Firmware identity reported during the handshake
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct FirmwareInfo {
    /// Firmware sketch name, e.g. `StandardFirmata.ino`.
    pub name: String,
    /// Firmware version.
    pub version: FirmwareVersion,
}

/// One supported mode of a pin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PinCapability {
    /// The supported mode.
    pub mode: PinMode,
    /// Resolution in bits for that mode.
    pub resolution: u8,
}

/// All supported modes of one pin
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct PinCapabilities {
    /// Pin index.
    pub pin: u8,
    /// Supported modes, in report order.
    pub modes: Vec<PinCapability>,
}

impl PinCapabilities {
    /// Whether the pin lists `mode`
    pub fn supports(&self, mode: PinMode) -> bool {
        self.modes.iter().any(|c| c.mode == mode)
    }
}

/// Pin state report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PinState {
    /// Pin index.
    pub pin: u8,
    /// Current mode, or `None` when the board reports a mode this crate does not know.
    pub mode: Option<PinMode>,
    /// Current value.
    pub value: u32,
}

/// Reply to an I2C read request
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct I2cReply {
    /// 7-bit peripheral address.
    pub address: u16,
    /// Register the data was read from.
    pub register: u16,
    /// Bytes read.
    pub data: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_json() {
        assert_eq!(serde_json::to_string(&EventPayload::Empty).unwrap(), "null");
        assert_eq!(
            serde_json::to_string(&EventPayload::Bytes(vec![1, 2])).unwrap(),
            "[1,2]"
        );
        let reply = EventPayload::I2cReply(I2cReply {
            address: 0x48,
            register: 0,
            data: vec![100],
        });
        assert_eq!(
            serde_json::to_string(&reply).unwrap(),
            r#"{"address":72,"register":0,"data":[100]}"#
        );
    }

    #[test]
    fn test_as_bytes() {
        assert_eq!(EventPayload::from(vec![7u8]).as_bytes(), Some(&[7u8][..]));
        assert_eq!(EventPayload::Text("x".into()).as_bytes(), None);
    }
}
