//! Board data types shared between the protocol layer and event payloads.

use serde::{Deserialize, Serialize};

/// Operating mode of a board pin
///
/// Discriminants are the protocol's wire values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PinMode {
    /// Digital input
    Input = 0x00,
    /// Digital output
    Output = 0x01,
    /// Analog input
    Analog = 0x02,
    /// PWM output
    Pwm = 0x03,
    /// Servo output
    Servo = 0x04,
    /// Shift register
    Shift = 0x05,
    /// I2C bus pin
    I2c = 0x06,
    /// OneWire bus pin
    OneWire = 0x07,
    /// Stepper driver
    Stepper = 0x08,
    /// Rotary encoder
    Encoder = 0x09,
    /// Hardware/software serial
    Serial = 0x0A,
    /// Digital input with pull-up
    Pullup = 0x0B,
}

impl PinMode {
    /// Decode a wire value
    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0x00 => Self::Input,
            0x01 => Self::Output,
            0x02 => Self::Analog,
            0x03 => Self::Pwm,
            0x04 => Self::Servo,
            0x05 => Self::Shift,
            0x06 => Self::I2c,
            0x07 => Self::OneWire,
            0x08 => Self::Stepper,
            0x09 => Self::Encoder,
            0x0A => Self::Serial,
            0x0B => Self::Pullup,
            _ => return None,
        })
    }

    /// Wire value of this mode
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Whether the board reports digital values for pins in this mode
    pub fn is_digital_input(self) -> bool {
        matches!(self, Self::Input | Self::Pullup)
    }
}

impl std::fmt::Display for PinMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Input => write!(f, "input"),
            Self::Output => write!(f, "output"),
            Self::Analog => write!(f, "analog"),
            Self::Pwm => write!(f, "pwm"),
            Self::Servo => write!(f, "servo"),
            Self::Shift => write!(f, "shift"),
            Self::I2c => write!(f, "i2c"),
            Self::OneWire => write!(f, "onewire"),
            Self::Stepper => write!(f, "stepper"),
            Self::Encoder => write!(f, "encoder"),
            Self::Serial => write!(f, "serial"),
            Self::Pullup => write!(f, "pullup"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pin_mode_wire_values() {
        for value in 0..=0x0B {
            let mode = PinMode::from_u8(value).unwrap();
            assert_eq!(mode.as_u8(), value);
        }
        assert_eq!(PinMode::from_u8(0x7F), None);
    }

    #[test]
    fn test_digital_input_modes() {
        assert!(PinMode::Input.is_digital_input());
        assert!(PinMode::Pullup.is_digital_input());
        assert!(!PinMode::Output.is_digital_input());
        assert!(!PinMode::Analog.is_digital_input());
    }
}
