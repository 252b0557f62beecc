//! Arduino Uno R3 running StandardFirmata 2.3

#![allow(dead_code)]

/// Firmware report: "StandardFirmata.ino" v2.3
pub const FIRMWARE: &[u8] = &[
    240, 121, 2, 3, 83, 0, 116, 0, 97, 0, 110, 0, 100, 0, 97, 0, 114, 0, 100, 0, 70, 0, 105, 0,
    114, 0, 109, 0, 97, 0, 116, 0, 97, 0, 46, 0, 105, 0, 110, 0, 111, 0, 247,
];

/// Capability report for 20 pins
pub const CAPABILITIES: &[u8] = &[
    240, 108, 127, 127, 0, 1, 1, 1, 4, 14, 127, 0, 1, 1, 1, 3, 8, 4, 14, 127, 0, 1, 1, 1, 4, 14,
    127, 0, 1, 1, 1, 3, 8, 4, 14, 127, 0, 1, 1, 1, 3, 8, 4, 14, 127, 0, 1, 1, 1, 4, 14, 127, 0, 1,
    1, 1, 4, 14, 127, 0, 1, 1, 1, 3, 8, 4, 14, 127, 0, 1, 1, 1, 3, 8, 4, 14, 127, 0, 1, 1, 1, 3, 8,
    4, 14, 127, 0, 1, 1, 1, 4, 14, 127, 0, 1, 1, 1, 4, 14, 127, 0, 1, 1, 1, 2, 10, 127, 0, 1, 1, 1,
    2, 10, 127, 0, 1, 1, 1, 2, 10, 127, 0, 1, 1, 1, 2, 10, 127, 0, 1, 1, 1, 2, 10, 6, 1, 127, 0, 1,
    1, 1, 2, 10, 6, 1, 127, 247,
];

/// Analog mapping: channels 0-5 on pins 14-19
pub const ANALOG_MAPPING: &[u8] = &[
    240, 106, 127, 127, 127, 127, 127, 127, 127, 127, 127, 127, 127, 127, 127, 127, 0, 1, 2, 3, 4,
    5, 247,
];

/// Board-side answers to the handshake queries
pub fn standard_firmata(request: &[u8]) -> Vec<u8> {
    match request {
        [0xF0, 0x79, 0xF7] => FIRMWARE.to_vec(),
        [0xF0, 0x6B, 0xF7] => CAPABILITIES.to_vec(),
        [0xF0, 0x69, 0xF7] => ANALOG_MAPPING.to_vec(),
        _ => Vec::new(),
    }
}
