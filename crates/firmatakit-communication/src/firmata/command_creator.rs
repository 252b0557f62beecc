//! Firmata Command Creator
//!
//! Builds the wire bytes for every outbound command. Arguments are masked to
//! their field widths here; range checks with proper errors happen in
//! [`crate::firmata::Board`] before anything is encoded.

use firmatakit_core::PinMode;

use super::protocol::*;

/// Stateless builder for outbound Firmata messages
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandCreator;

impl CommandCreator {
    /// Wrap a sub-command and payload in sysex markers
    pub fn sysex(command: u8, payload: &[u8]) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(payload.len() + 3);
        bytes.push(START_SYSEX);
        bytes.push(command & 0x7F);
        bytes.extend(payload.iter().map(|b| b & 0x7F));
        bytes.push(END_SYSEX);
        bytes
    }

    /// Reset the board
    pub fn system_reset() -> Vec<u8> {
        vec![SYSTEM_RESET]
    }

    /// Ask for the protocol version
    pub fn report_version_query() -> Vec<u8> {
        vec![REPORT_VERSION]
    }

    /// Ask for the firmware name and version
    pub fn firmware_query() -> Vec<u8> {
        Self::sysex(REPORT_FIRMWARE, &[])
    }

    /// Ask for the capability table
    pub fn capability_query() -> Vec<u8> {
        Self::sysex(CAPABILITY_QUERY, &[])
    }

    /// Ask for the analog channel mapping
    pub fn analog_mapping_query() -> Vec<u8> {
        Self::sysex(ANALOG_MAPPING_QUERY, &[])
    }

    /// Ask for one pin's mode and value
    pub fn pin_state_query(pin: u8) -> Vec<u8> {
        Self::sysex(PIN_STATE_QUERY, &[pin])
    }

    /// Set a pin's mode
    pub fn pin_mode(pin: u8, mode: PinMode) -> Vec<u8> {
        vec![SET_PIN_MODE, pin & 0x7F, mode.as_u8()]
    }

    /// Write all eight pins of a digital port
    pub fn digital_port(port: u8, value: u8) -> Vec<u8> {
        vec![
            DIGITAL_MESSAGE | (port & 0x0F),
            value & 0x7F,
            (value >> 7) & 0x01,
        ]
    }

    /// Write a single digital pin
    pub fn digital_pin_value(pin: u8, high: bool) -> Vec<u8> {
        vec![SET_DIGITAL_PIN_VALUE, pin & 0x7F, u8::from(high)]
    }

    /// Analog (PWM/servo) write
    ///
    /// Pins up to 15 with 14-bit values use the compact analog message;
    /// anything else goes through the extended analog sysex.
    pub fn analog_write(pin: u8, value: u32) -> Vec<u8> {
        if pin <= 0x0F && value <= u32::from(MAX_U14) {
            let [lsb, msb] = to_7bit_pair(value as u16);
            return vec![ANALOG_MESSAGE | pin, lsb, msb];
        }

        let mut payload = vec![pin & 0x7F];
        let mut remaining = value;
        loop {
            payload.push((remaining & 0x7F) as u8);
            remaining >>= 7;
            if remaining == 0 && payload.len() >= 3 {
                break;
            }
        }
        Self::sysex(EXTENDED_ANALOG, &payload)
    }

    /// Enable or disable reporting of an analog channel
    pub fn report_analog(channel: u8, enable: bool) -> Vec<u8> {
        vec![REPORT_ANALOG | (channel & 0x0F), u8::from(enable)]
    }

    /// Enable or disable reporting of a digital port
    pub fn report_digital(port: u8, enable: bool) -> Vec<u8> {
        vec![REPORT_DIGITAL | (port & 0x0F), u8::from(enable)]
    }

    /// Set how often analog values are sampled and reported
    pub fn sampling_interval(interval_ms: u16) -> Vec<u8> {
        Self::sysex(SAMPLING_INTERVAL, &to_7bit_pair(interval_ms))
    }

    /// Configure the I2C bus with a read delay in microseconds
    pub fn i2c_config(delay_us: u16) -> Vec<u8> {
        Self::sysex(I2C_CONFIG, &to_7bit_pair(delay_us))
    }

    /// Request `count` bytes from the peripheral at `address`
    pub fn i2c_read_request(address: u8, count: u16) -> Vec<u8> {
        let [lsb, msb] = to_7bit_pair(count);
        Self::sysex(I2C_REQUEST, &[address, I2C_MODE_READ, lsb, msb])
    }

    /// Write `data` to the peripheral at `address`
    pub fn i2c_write_request(address: u8, data: &[u8]) -> Vec<u8> {
        let mut payload = vec![address, I2C_MODE_WRITE];
        payload.extend(encode_7bit_bytes(data));
        Self::sysex(I2C_REQUEST, &payload)
    }

    /// Send a string message
    pub fn string_data(text: &str) -> Vec<u8> {
        Self::sysex(STRING_DATA, &encode_7bit_bytes(text.as_bytes()))
    }
}
