//! Firmata wire constants and event names.
//!
//! Status bytes have the high bit set; all data bytes are 7-bit. Multi-byte
//! values are split into 7-bit groups, least significant first.

/// Digital port message (low nibble = port)
pub const DIGITAL_MESSAGE: u8 = 0x90;
/// Analog message (low nibble = channel inbound, pin outbound)
pub const ANALOG_MESSAGE: u8 = 0xE0;
/// Enable/disable analog channel reporting (low nibble = channel)
pub const REPORT_ANALOG: u8 = 0xC0;
/// Enable/disable digital port reporting (low nibble = port)
pub const REPORT_DIGITAL: u8 = 0xD0;
/// Set a pin's mode
pub const SET_PIN_MODE: u8 = 0xF4;
/// Set a single digital pin's value
pub const SET_DIGITAL_PIN_VALUE: u8 = 0xF5;
/// Protocol version report/query
pub const REPORT_VERSION: u8 = 0xF9;
/// Reset the board
pub const SYSTEM_RESET: u8 = 0xFF;
/// Start of an extended message
pub const START_SYSEX: u8 = 0xF0;
/// End of an extended message
pub const END_SYSEX: u8 = 0xF7;

// Sysex sub-commands
/// Ask for the analog channel mapping
pub const ANALOG_MAPPING_QUERY: u8 = 0x69;
/// Analog channel mapping reply
pub const ANALOG_MAPPING_RESPONSE: u8 = 0x6A;
/// Ask for supported modes of every pin
pub const CAPABILITY_QUERY: u8 = 0x6B;
/// Capability reply
pub const CAPABILITY_RESPONSE: u8 = 0x6C;
/// Ask for one pin's state
pub const PIN_STATE_QUERY: u8 = 0x6D;
/// Pin state reply
pub const PIN_STATE_RESPONSE: u8 = 0x6E;
/// Analog write to pins above 15 or values above 14 bits
pub const EXTENDED_ANALOG: u8 = 0x6F;
/// String message
pub const STRING_DATA: u8 = 0x71;
/// I2C read/write request
pub const I2C_REQUEST: u8 = 0x76;
/// I2C reply
pub const I2C_REPLY: u8 = 0x77;
/// I2C configuration
pub const I2C_CONFIG: u8 = 0x78;
/// Firmware name and version query/report
pub const REPORT_FIRMWARE: u8 = 0x79;
/// Set the sampling interval
pub const SAMPLING_INTERVAL: u8 = 0x7A;

/// I2C request mode bits for a write
pub const I2C_MODE_WRITE: u8 = 0x00;
/// I2C request mode bits for a one-shot read
pub const I2C_MODE_READ: u8 = 0x01 << 3;

/// Separator between pins in a capability report, and "no channel" in an
/// analog mapping report
pub const NO_VALUE: u8 = 0x7F;

/// Highest pin index addressable by the protocol
pub const MAX_PIN: u8 = 0x7F;
/// Highest digital port or analog channel a report toggle can address
pub const MAX_REPORT_INDEX: u8 = 0x0F;
/// Largest value carried by two 7-bit groups
pub const MAX_U14: u16 = 0x3FFF;
/// Sysex payloads longer than this are discarded
pub const MAX_SYSEX_SIZE: usize = 4096;

/// Event published with the protocol version
pub const EVENT_REPORT_VERSION: &str = "report_version";
/// Event published with the firmware identity
pub const EVENT_FIRMWARE: &str = "firmware_query";
/// Event published with the capability table
pub const EVENT_CAPABILITIES: &str = "capability_query";
/// Event published with the analog mapping
pub const EVENT_ANALOG_MAPPING: &str = "analog_mapping_query";
/// Event published with each I2C reply
pub const EVENT_I2C_REPLY: &str = "i2c_reply";
/// Event published with each string message
pub const EVENT_STRING_DATA: &str = "string_data";

/// Event names every board advertises from the start
pub const BOARD_EVENTS: [&str; 6] = [
    EVENT_REPORT_VERSION,
    EVENT_FIRMWARE,
    EVENT_CAPABILITIES,
    EVENT_ANALOG_MAPPING,
    EVENT_I2C_REPLY,
    EVENT_STRING_DATA,
];

/// Event carrying digital values of `pin`
pub fn digital_read_event(pin: u8) -> String {
    format!("digital_read_{}", pin)
}

/// Event carrying values of analog `channel`
pub fn analog_read_event(channel: u8) -> String {
    format!("analog_read_{}", channel)
}

/// Event carrying state reports of `pin`
pub fn pin_state_event(pin: u8) -> String {
    format!("pin_{}_state", pin)
}

/// Number of data bytes following a fixed-length inbound command, if the
/// status byte starts one
pub fn data_length(command: u8) -> Option<usize> {
    match command {
        REPORT_VERSION => Some(2),
        c if c & 0xF0 == DIGITAL_MESSAGE => Some(2),
        c if c & 0xF0 == ANALOG_MESSAGE => Some(2),
        _ => None,
    }
}

/// Split a 14-bit value into (lsb, msb) 7-bit groups
pub fn to_7bit_pair(value: u16) -> [u8; 2] {
    [(value & 0x7F) as u8, ((value >> 7) & 0x7F) as u8]
}

/// Join a (lsb, msb) pair of 7-bit groups
pub fn from_7bit_pair(lsb: u8, msb: u8) -> u16 {
    u16::from(lsb & 0x7F) | (u16::from(msb & 0x7F) << 7)
}

/// Encode bytes as 7-bit pairs (used for strings and I2C data)
pub fn encode_7bit_bytes(data: &[u8]) -> Vec<u8> {
    data.iter()
        .flat_map(|&b| [b & 0x7F, (b >> 7) & 0x01])
        .collect()
}

/// Decode 7-bit pairs back into bytes; a trailing odd byte is ignored
pub fn decode_7bit_bytes(data: &[u8]) -> Vec<u8> {
    data.chunks_exact(2)
        .map(|pair| (pair[0] & 0x7F) | (pair[1] << 7))
        .collect()
}

/// Decode a value spread over any number of 7-bit groups, LSB first
pub fn decode_7bit_value(data: &[u8]) -> u32 {
    data.iter()
        .take(4)
        .enumerate()
        .fold(0u32, |acc, (i, &b)| acc | (u32::from(b & 0x7F) << (7 * i)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_length() {
        assert_eq!(data_length(0x90), Some(2));
        assert_eq!(data_length(0x9F), Some(2));
        assert_eq!(data_length(0xE5), Some(2));
        assert_eq!(data_length(REPORT_VERSION), Some(2));
        assert_eq!(data_length(START_SYSEX), None);
        assert_eq!(data_length(SET_PIN_MODE), None);
        assert_eq!(data_length(0x42), None);
    }

    #[test]
    fn test_7bit_pair() {
        assert_eq!(to_7bit_pair(1023), [0x7F, 0x07]);
        assert_eq!(from_7bit_pair(0x7F, 0x07), 1023);
        assert_eq!(from_7bit_pair(0x05, 0x01), 133);
    }

    #[test]
    fn test_7bit_bytes() {
        assert_eq!(encode_7bit_bytes(&[0xFF, 0x01]), vec![0x7F, 0x01, 0x01, 0x00]);
        assert_eq!(decode_7bit_bytes(&[0x7F, 0x01, 0x01, 0x00, 0x33]), vec![0xFF, 0x01]);
    }

    #[test]
    fn test_7bit_value() {
        assert_eq!(decode_7bit_value(&[0x01]), 1);
        assert_eq!(decode_7bit_value(&[0x00, 0x01]), 128);
        assert_eq!(decode_7bit_value(&[0x7F, 0x7F, 0x01]), 0x7FFF);
    }

    #[test]
    fn test_event_names() {
        assert_eq!(digital_read_event(1), "digital_read_1");
        assert_eq!(analog_read_event(0), "analog_read_0");
        assert_eq!(pin_state_event(13), "pin_13_state");
    }
}
