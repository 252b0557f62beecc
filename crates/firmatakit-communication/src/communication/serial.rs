//! Serial port transport
//!
//! Opens a Firmata board over USB serial and lists candidate ports.
//! StandardFirmata talks at 57600 baud, 8N1, no flow control.

use firmatakit_core::{Error, Result, TransportError};
use parking_lot::Mutex;
use std::io::{self, Read, Write};
use std::sync::Arc;
use std::time::Duration;

use super::{Connector, Transport};

/// Baud rate used by StandardFirmata
pub const DEFAULT_BAUD_RATE: u32 = 57_600;

/// Information about an available serial port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialPortInfo {
    /// Port name (e.g., "/dev/ttyACM0", "COM3")
    pub port_name: String,

    /// Port description (e.g., "USB Arduino Uno")
    pub description: String,

    /// Manufacturer name if available
    pub manufacturer: Option<String>,

    /// Serial number if available
    pub serial_number: Option<String>,

    /// USB vendor ID if applicable
    pub vid: Option<u16>,

    /// USB product ID if applicable
    pub pid: Option<u16>,
}

impl SerialPortInfo {
    /// Create a new port info
    pub fn new(port_name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            port_name: port_name.into(),
            description: description.into(),
            manufacturer: None,
            serial_number: None,
            vid: None,
            pid: None,
        }
    }

    /// Set manufacturer
    pub fn with_manufacturer(mut self, manufacturer: impl Into<String>) -> Self {
        self.manufacturer = Some(manufacturer.into());
        self
    }

    /// Set serial number
    pub fn with_serial_number(mut self, serial_number: impl Into<String>) -> Self {
        self.serial_number = Some(serial_number.into());
        self
    }

    /// Set USB IDs
    pub fn with_usb_ids(mut self, vid: u16, pid: u16) -> Self {
        self.vid = Some(vid);
        self.pid = Some(pid);
        self
    }
}

/// List serial ports that look like a microcontroller board
pub fn list_ports() -> Result<Vec<SerialPortInfo>> {
    let ports = serialport::available_ports().map_err(|e| {
        tracing::error!("Failed to enumerate serial ports: {}", e);
        Error::other(format!("Failed to enumerate ports: {}", e))
    })?;

    Ok(ports
        .iter()
        .filter(|port| is_valid_port(&port.port_name))
        .map(|port| {
            let info = SerialPortInfo::new(&port.port_name, port_description(port));
            match &port.port_type {
                serialport::SerialPortType::UsbPort(usb) => {
                    let mut info = info.with_usb_ids(usb.vid, usb.pid);
                    if let Some(ref mfg) = usb.manufacturer {
                        info = info.with_manufacturer(mfg);
                    }
                    if let Some(ref serial) = usb.serial_number {
                        info = info.with_serial_number(serial);
                    }
                    info
                }
                _ => info,
            }
        })
        .collect())
}

/// Check if a port name matches a USB/ACM style board port
///
/// - Windows: COM*
/// - Linux: /dev/ttyUSB*, /dev/ttyACM*
/// - macOS: /dev/cu.usbserial-*, /dev/cu.usbmodem*
pub fn is_valid_port(port_name: &str) -> bool {
    if let Some(number) = port_name.strip_prefix("COM") {
        return !number.is_empty() && number.chars().all(|c| c.is_ascii_digit());
    }

    port_name.starts_with("/dev/ttyUSB")
        || port_name.starts_with("/dev/ttyACM")
        || port_name.starts_with("/dev/cu.usbserial-")
        || port_name.starts_with("/dev/cu.usbmodem")
}

fn port_description(port: &serialport::SerialPortInfo) -> String {
    match &port.port_type {
        serialport::SerialPortType::UsbPort(usb) => format!(
            "USB {} {}",
            usb.manufacturer.as_deref().unwrap_or("Device"),
            usb.product.as_deref().unwrap_or("Serial Port")
        ),
        serialport::SerialPortType::BluetoothPort => "Bluetooth Serial".to_string(),
        serialport::SerialPortType::PciPort => "PCI Serial".to_string(),
        _ => "Serial Port".to_string(),
    }
}

/// Transport over a native serial port
///
/// The port handle is cloned so reads and writes lock separately. Reads use a
/// short timeout so the decode loop notices a close promptly.
pub struct SerialTransport {
    port_name: String,
    reader: Mutex<Option<Box<dyn serialport::SerialPort>>>,
    writer: Mutex<Option<Box<dyn serialport::SerialPort>>>,
}

impl SerialTransport {
    /// Open `port_name` at `baud_rate`, 8N1
    pub fn open(port_name: &str, baud_rate: u32) -> Result<Self> {
        let failed = |e: serialport::Error| {
            tracing::error!("Failed to open serial port {}: {}", port_name, e);
            TransportError::FailedToOpen {
                port: port_name.to_string(),
                reason: e.to_string(),
            }
        };

        let reader = serialport::new(port_name, baud_rate)
            .timeout(Duration::from_millis(10))
            .data_bits(serialport::DataBits::Eight)
            .stop_bits(serialport::StopBits::One)
            .parity(serialport::Parity::None)
            .flow_control(serialport::FlowControl::None)
            .open()
            .map_err(failed)?;
        let writer = reader.try_clone().map_err(failed)?;

        tracing::info!("Opened {} at {} baud", port_name, baud_rate);
        Ok(Self {
            port_name: port_name.to_string(),
            reader: Mutex::new(Some(reader)),
            writer: Mutex::new(Some(writer)),
        })
    }
}

impl Transport for SerialTransport {
    fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        match self.reader.lock().as_mut() {
            Some(port) => port.read(buf),
            None => Ok(0),
        }
    }

    fn write(&self, data: &[u8]) -> io::Result<usize> {
        match self.writer.lock().as_mut() {
            Some(port) => {
                let n = port.write(data)?;
                port.flush()?;
                Ok(n)
            }
            None => Err(io::Error::new(io::ErrorKind::NotConnected, "port closed")),
        }
    }

    fn close(&self) -> io::Result<()> {
        self.writer.lock().take();
        self.reader.lock().take();
        tracing::info!("Closed {}", self.port_name);
        Ok(())
    }

    fn name(&self) -> String {
        self.port_name.clone()
    }
}

impl std::fmt::Debug for SerialTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialTransport")
            .field("port_name", &self.port_name)
            .finish()
    }
}

/// Connector opening serial ports at `baud_rate`
pub fn serial_connector(baud_rate: u32) -> Connector {
    Arc::new(move |port: &str| {
        let transport: Arc<dyn Transport> = Arc::new(SerialTransport::open(port, baud_rate)?);
        Ok(transport)
    })
}
