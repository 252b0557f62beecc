//! Firmata byte-stream decoder
//!
//! A resumable state machine turning raw bytes into [`FirmataMessage`]s.
//! Bytes may be fed in any chunk size, including one at a time; the decoder
//! keeps its partial message between calls.
//!
//! Noise is recovered locally: stray data bytes and unknown status bytes are
//! skipped, and a status byte that interrupts an incomplete message aborts it
//! and starts the next one.

use firmatakit_core::{
    FirmwareInfo, FirmwareVersion, I2cReply, PinCapabilities, PinCapability, PinMode, PinState,
};

use super::protocol::*;

/// A decoded protocol message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FirmataMessage {
    /// Protocol version
    ReportVersion(FirmwareVersion),
    /// Value of an analog channel
    AnalogReport {
        /// Analog channel.
        channel: u8,
        /// 14-bit value.
        value: u16,
    },
    /// Values of the eight pins of a digital port
    DigitalReport {
        /// Port index (pins `8*port ..= 8*port+7`).
        port: u8,
        /// One bit per pin, LSB = lowest pin.
        value: u8,
    },
    /// Firmware name and version
    FirmwareReport(FirmwareInfo),
    /// Supported modes of every pin
    CapabilityReport(Vec<PinCapabilities>),
    /// Analog channel of every pin
    AnalogMappingReport(Vec<Option<u8>>),
    /// Mode and value of one pin
    PinStateReport(PinState),
    /// I2C read result
    I2cReply(I2cReply),
    /// String message
    StringData(String),
    /// Sysex with a sub-command this decoder does not interpret
    UnknownSysex {
        /// Sub-command byte.
        command: u8,
        /// Payload after the sub-command.
        payload: Vec<u8>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Command { command: u8, expected: usize },
    Sysex,
}

/// Resumable Firmata decoder
#[derive(Debug)]
pub struct Decoder {
    state: State,
    buffer: Vec<u8>,
}

impl Decoder {
    /// Create a decoder in the idle state
    pub fn new() -> Self {
        Self {
            state: State::Idle,
            buffer: Vec::with_capacity(64),
        }
    }

    /// Whether the decoder is between messages
    pub fn is_idle(&self) -> bool {
        self.state == State::Idle
    }

    /// Feed bytes, returning every message completed by them in order
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<FirmataMessage> {
        bytes.iter().filter_map(|&b| self.push(b)).collect()
    }

    /// Feed a single byte
    pub fn push(&mut self, byte: u8) -> Option<FirmataMessage> {
        match self.state {
            State::Idle => self.start(byte),
            State::Command { command, expected } => {
                if is_status(byte) {
                    tracing::debug!(
                        "Incomplete command 0x{:02X} interrupted by 0x{:02X}",
                        command,
                        byte
                    );
                    self.reset();
                    return self.start(byte);
                }
                self.buffer.push(byte);
                if self.buffer.len() < expected {
                    return None;
                }
                let message = decode_command(command, &self.buffer);
                self.reset();
                message
            }
            State::Sysex => {
                if byte == END_SYSEX {
                    let message = decode_sysex(&self.buffer);
                    self.reset();
                    return message;
                }
                if is_status(byte) {
                    tracing::debug!(
                        "Sysex of {} bytes interrupted by 0x{:02X}",
                        self.buffer.len(),
                        byte
                    );
                    self.reset();
                    return self.start(byte);
                }
                if self.buffer.len() >= MAX_SYSEX_SIZE {
                    tracing::debug!("Discarding oversized sysex message");
                    self.reset();
                    return None;
                }
                self.buffer.push(byte);
                None
            }
        }
    }

    fn start(&mut self, byte: u8) -> Option<FirmataMessage> {
        if byte == START_SYSEX {
            self.state = State::Sysex;
        } else if let Some(expected) = data_length(byte) {
            self.state = State::Command {
                command: byte,
                expected,
            };
        } else if is_status(byte) {
            tracing::trace!("Ignoring command byte 0x{:02X}", byte);
        }
        None
    }

    fn reset(&mut self) {
        self.state = State::Idle;
        self.buffer.clear();
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

fn is_status(byte: u8) -> bool {
    byte & 0x80 != 0
}

fn decode_command(command: u8, data: &[u8]) -> Option<FirmataMessage> {
    match command {
        REPORT_VERSION => Some(FirmataMessage::ReportVersion(FirmwareVersion {
            major: data[0],
            minor: data[1],
        })),
        c if c & 0xF0 == DIGITAL_MESSAGE => Some(FirmataMessage::DigitalReport {
            port: c & 0x0F,
            value: from_7bit_pair(data[0], data[1]) as u8,
        }),
        c if c & 0xF0 == ANALOG_MESSAGE => Some(FirmataMessage::AnalogReport {
            channel: c & 0x0F,
            value: from_7bit_pair(data[0], data[1]),
        }),
        _ => None,
    }
}

fn decode_sysex(buffer: &[u8]) -> Option<FirmataMessage> {
    let Some((&command, payload)) = buffer.split_first() else {
        tracing::debug!("Empty sysex message");
        return None;
    };

    let message = match command {
        REPORT_FIRMWARE => decode_firmware(payload),
        CAPABILITY_RESPONSE => decode_capabilities(payload).map(FirmataMessage::CapabilityReport),
        ANALOG_MAPPING_RESPONSE => Some(FirmataMessage::AnalogMappingReport(
            payload
                .iter()
                .map(|&channel| (channel != NO_VALUE).then_some(channel))
                .collect(),
        )),
        PIN_STATE_RESPONSE => decode_pin_state(payload),
        I2C_REPLY => decode_i2c_reply(payload),
        STRING_DATA => Some(FirmataMessage::StringData(
            String::from_utf8_lossy(&decode_7bit_bytes(payload)).into_owned(),
        )),
        _ => Some(FirmataMessage::UnknownSysex {
            command,
            payload: payload.to_vec(),
        }),
    };

    if message.is_none() {
        tracing::debug!(
            "Malformed sysex 0x{:02X} with {} payload bytes",
            command,
            payload.len()
        );
    }
    message
}

fn decode_firmware(payload: &[u8]) -> Option<FirmataMessage> {
    let (version, name) = payload.split_at_checked(2)?;
    let name = decode_7bit_bytes(name)
        .into_iter()
        .filter(|&b| b != 0)
        .collect::<Vec<u8>>();
    Some(FirmataMessage::FirmwareReport(FirmwareInfo {
        name: String::from_utf8_lossy(&name).into_owned(),
        version: FirmwareVersion {
            major: version[0],
            minor: version[1],
        },
    }))
}

/// Pins are listed in order as (mode, resolution) pairs, each pin closed by 0x7F
///
/// A report listing more pins than the protocol can address is dropped.
fn decode_capabilities(payload: &[u8]) -> Option<Vec<PinCapabilities>> {
    let mut pins = Vec::new();
    let mut modes = Vec::new();
    let mut i = 0;

    while i < payload.len() {
        let byte = payload[i];
        if byte == NO_VALUE {
            let pin = match u8::try_from(pins.len()) {
                Ok(pin) if pin <= MAX_PIN => pin,
                _ => {
                    tracing::debug!("Capability report lists more than {} pins", MAX_PIN + 1);
                    return None;
                }
            };
            pins.push(PinCapabilities {
                pin,
                modes: std::mem::take(&mut modes),
            });
            i += 1;
            continue;
        }

        let Some(&resolution) = payload.get(i + 1) else {
            break;
        };
        match PinMode::from_u8(byte) {
            Some(mode) => modes.push(PinCapability { mode, resolution }),
            None => tracing::debug!("Unknown pin mode 0x{:02X} in capability report", byte),
        }
        i += 2;
    }

    Some(pins)
}

fn decode_pin_state(payload: &[u8]) -> Option<FirmataMessage> {
    if payload.len() < 3 {
        return None;
    }
    Some(FirmataMessage::PinStateReport(PinState {
        pin: payload[0],
        mode: PinMode::from_u8(payload[1]),
        value: decode_7bit_value(&payload[2..]),
    }))
}

fn decode_i2c_reply(payload: &[u8]) -> Option<FirmataMessage> {
    if payload.len() < 4 {
        return None;
    }
    Some(FirmataMessage::I2cReply(I2cReply {
        address: from_7bit_pair(payload[0], payload[1]),
        register: from_7bit_pair(payload[2], payload[3]),
        data: decode_7bit_bytes(&payload[4..]),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_version() {
        let mut decoder = Decoder::new();
        assert_eq!(
            decoder.feed(&[0xF9, 2, 5]),
            vec![FirmataMessage::ReportVersion(FirmwareVersion {
                major: 2,
                minor: 5
            })]
        );
        assert!(decoder.is_idle());
    }

    #[test]
    fn test_analog_report() {
        let mut decoder = Decoder::new();
        assert_eq!(
            decoder.feed(&[0xE1, 0x05, 0x01]),
            vec![FirmataMessage::AnalogReport {
                channel: 1,
                value: 133
            }]
        );
    }

    #[test]
    fn test_digital_report() {
        let mut decoder = Decoder::new();
        assert_eq!(
            decoder.feed(&[0x91, 0x01, 0x01]),
            vec![FirmataMessage::DigitalReport {
                port: 1,
                value: 0x81
            }]
        );
    }

    #[test]
    fn test_partial_message_is_kept_between_calls() {
        let mut decoder = Decoder::new();
        assert!(decoder.feed(&[0xE0, 0x10]).is_empty());
        assert!(!decoder.is_idle());
        assert_eq!(
            decoder.feed(&[0x00]),
            vec![FirmataMessage::AnalogReport {
                channel: 0,
                value: 16
            }]
        );
    }

    #[test]
    fn test_unknown_bytes_are_ignored() {
        let mut decoder = Decoder::new();
        let messages = decoder.feed(&[0x12, 0xF4, 0x03, 0x01, 0xF1, 0xE2, 0x01, 0x00]);
        assert_eq!(
            messages,
            vec![FirmataMessage::AnalogReport {
                channel: 2,
                value: 1
            }]
        );
    }

    #[test]
    fn test_interrupted_command_resyncs() {
        let mut decoder = Decoder::new();
        let messages = decoder.feed(&[0x90, 0x01, 0xE0, 0x02, 0x00]);
        assert_eq!(
            messages,
            vec![FirmataMessage::AnalogReport {
                channel: 0,
                value: 2
            }]
        );
    }

    #[test]
    fn test_interrupted_sysex_resyncs() {
        let mut decoder = Decoder::new();
        let messages = decoder.feed(&[0xF0, 0x79, 0x02, 0xF0, 0x71, b'A', 0x00, 0xF7]);
        assert_eq!(messages, vec![FirmataMessage::StringData("A".to_string())]);
    }

    #[test]
    fn test_capabilities() {
        let mut decoder = Decoder::new();
        let messages = decoder.feed(&[
            0xF0, 0x6C, 0x7F, 0x00, 0x01, 0x01, 0x01, 0x03, 0x08, 0x7F, 0xF7,
        ]);
        assert_eq!(
            messages,
            vec![FirmataMessage::CapabilityReport(vec![
                PinCapabilities {
                    pin: 0,
                    modes: vec![]
                },
                PinCapabilities {
                    pin: 1,
                    modes: vec![
                        PinCapability {
                            mode: PinMode::Input,
                            resolution: 1
                        },
                        PinCapability {
                            mode: PinMode::Output,
                            resolution: 1
                        },
                        PinCapability {
                            mode: PinMode::Pwm,
                            resolution: 8
                        },
                    ]
                },
            ])]
        );
    }

    fn capability_report(pins: usize) -> Vec<u8> {
        let mut bytes = vec![0xF0, 0x6C];
        bytes.extend(std::iter::repeat_n(0x7F, pins));
        bytes.push(0xF7);
        bytes
    }

    #[test]
    fn test_capabilities_up_to_max_pin() {
        let mut decoder = Decoder::new();
        match decoder.feed(&capability_report(128)).as_slice() {
            [FirmataMessage::CapabilityReport(pins)] => {
                assert_eq!(pins.len(), 128);
                assert_eq!(pins[127].pin, 127);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_oversized_capabilities_dropped() {
        let mut decoder = Decoder::new();
        assert!(decoder.feed(&capability_report(129)).is_empty());
        assert!(decoder.feed(&capability_report(300)).is_empty());
        assert!(decoder.is_idle());
    }

    #[test]
    fn test_analog_mapping() {
        let mut decoder = Decoder::new();
        assert_eq!(
            decoder.feed(&[0xF0, 0x6A, 0x7F, 0x7F, 0x00, 0x01, 0xF7]),
            vec![FirmataMessage::AnalogMappingReport(vec![
                None,
                None,
                Some(0),
                Some(1)
            ])]
        );
    }

    #[test]
    fn test_pin_state() {
        let mut decoder = Decoder::new();
        assert_eq!(
            decoder.feed(&[0xF0, 0x6E, 13, 0x01, 0x01, 0xF7]),
            vec![FirmataMessage::PinStateReport(PinState {
                pin: 13,
                mode: Some(PinMode::Output),
                value: 1
            })]
        );
        assert!(decoder.feed(&[0xF0, 0x6E, 13, 0xF7]).is_empty());
    }

    #[test]
    fn test_i2c_reply() {
        let mut decoder = Decoder::new();
        assert_eq!(
            decoder.feed(&[0xF0, 0x77, 0x48, 0x00, 0x00, 0x00, 0x64, 0x00, 0x7F, 0x01, 0xF7]),
            vec![FirmataMessage::I2cReply(I2cReply {
                address: 0x48,
                register: 0,
                data: vec![0x64, 0xFF]
            })]
        );
    }

    #[test]
    fn test_unknown_sysex() {
        let mut decoder = Decoder::new();
        assert_eq!(
            decoder.feed(&[0xF0, 0x61, 0x01, 0xF7]),
            vec![FirmataMessage::UnknownSysex {
                command: 0x61,
                payload: vec![0x01]
            }]
        );
        assert!(decoder.feed(&[0xF0, 0xF7]).is_empty());
    }

    #[test]
    fn test_oversized_sysex_is_discarded() {
        let mut decoder = Decoder::new();
        let mut bytes = vec![0xF0, 0x71];
        bytes.extend(std::iter::repeat(0x41).take(MAX_SYSEX_SIZE + 10));
        bytes.push(0xF7);
        bytes.extend([0xF9, 2, 3]);

        assert_eq!(
            decoder.feed(&bytes),
            vec![FirmataMessage::ReportVersion(FirmwareVersion {
                major: 2,
                minor: 3
            })]
        );
    }
}
