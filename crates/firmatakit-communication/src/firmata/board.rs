//! Firmata board state machine
//!
//! A [`Board`] owns the transport, decodes inbound bytes, keeps the pin table
//! and firmware identity up to date, and publishes decoded reports on its
//! event bus. It also encodes and writes every outbound command.

use firmatakit_core::{
    CommandError, Event, EventBus, EventPayload, Eventer, FirmwareInfo, FirmwareVersion,
    PinCapability, PinMode, Result, StateError, TransportError,
};
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeSet;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use super::command_creator::CommandCreator;
use super::decoder::{Decoder, FirmataMessage};
use super::protocol::*;
use crate::communication::Transport;

/// First digital pin of the analog header on an Arduino Uno
const DEFAULT_ANALOG_PIN_OFFSET: u8 = 14;
const READ_BUFFER_SIZE: usize = 256;

/// What the board knows about one pin
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pin {
    /// Modes reported by the capability query.
    pub modes: Vec<PinCapability>,
    /// Mode last set or reported.
    pub mode: Option<PinMode>,
    /// Value last written or reported.
    pub value: u32,
    /// Analog channel, if the pin has one.
    pub analog_channel: Option<u8>,
}

impl Pin {
    /// Whether the capability report lists `mode` for this pin
    pub fn supports(&self, mode: PinMode) -> bool {
        self.modes.iter().any(|c| c.mode == mode)
    }
}

#[derive(Debug, Default)]
struct PinTable {
    pins: Vec<Pin>,
    /// Set once a capability report has been processed
    reported: bool,
}

impl PinTable {
    fn get_or_insert(&mut self, pin: u8) -> &mut Pin {
        let index = usize::from(pin);
        if index >= self.pins.len() {
            self.pins.resize_with(index + 1, Pin::default);
        }
        &mut self.pins[index]
    }
}

/// One Firmata-speaking controller
pub struct Board {
    transport: Arc<dyn Transport>,
    bus: Arc<EventBus>,
    decoder: Mutex<Decoder>,
    pins: RwLock<PinTable>,
    firmware: RwLock<Option<FirmwareInfo>>,
    version: RwLock<Option<FirmwareVersion>>,
    events: RwLock<BTreeSet<String>>,
    read_error: Mutex<Option<TransportError>>,
    closed: AtomicBool,
}

impl Board {
    /// Create a board on an open transport
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            bus: Arc::new(EventBus::new()),
            decoder: Mutex::new(Decoder::new()),
            pins: RwLock::new(PinTable::default()),
            firmware: RwLock::new(None),
            version: RwLock::new(None),
            events: RwLock::new(BOARD_EVENTS.iter().map(|s| s.to_string()).collect()),
            read_error: Mutex::new(None),
            closed: AtomicBool::new(false),
        }
    }

    /// The board's event bus
    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// Name of the underlying transport
    pub fn transport_name(&self) -> String {
        self.transport.name()
    }

    /// Firmware identity, once reported
    pub fn firmware(&self) -> Option<FirmwareInfo> {
        self.firmware.read().clone()
    }

    /// Protocol version, once reported
    pub fn version(&self) -> Option<FirmwareVersion> {
        *self.version.read()
    }

    /// Snapshot of the pin table
    pub fn pins(&self) -> Vec<Pin> {
        self.pins.read().pins.clone()
    }

    /// Snapshot of one pin
    pub fn pin(&self, pin: u8) -> Option<Pin> {
        self.pins.read().pins.get(usize::from(pin)).cloned()
    }

    /// Mode last set or reported for `pin`
    pub fn pin_mode(&self, pin: u8) -> Option<PinMode> {
        self.pin(pin).and_then(|p| p.mode)
    }

    /// Whether `pin` supports `mode`
    ///
    /// `None` when no capability report covers the pin.
    pub fn supports(&self, pin: u8, mode: PinMode) -> Option<bool> {
        let table = self.pins.read();
        if !table.reported {
            return None;
        }
        table
            .pins
            .get(usize::from(pin))
            .map(|p| p.supports(mode))
    }

    /// Digital pin carrying analog `channel`
    ///
    /// Falls back to `channel + 14` when the mapping is unknown.
    pub fn analog_pin_for_channel(&self, channel: u8) -> u8 {
        self.pins
            .read()
            .pins
            .iter()
            .position(|p| p.analog_channel == Some(channel))
            .and_then(|pin| u8::try_from(pin).ok())
            .unwrap_or_else(|| channel.saturating_add(DEFAULT_ANALOG_PIN_OFFSET).min(MAX_PIN))
    }

    /// The read error that stopped the decode loop, if any
    pub fn read_error(&self) -> Option<TransportError> {
        self.read_error.lock().clone()
    }

    /// Whether the board has been closed
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub(crate) fn register_event(&self, name: &str) {
        if !self.events.read().contains(name) {
            self.events.write().insert(name.to_string());
        }
    }

    /// Decode `bytes` and publish every completed message
    ///
    /// Returns the number of messages decoded. Messages are handled in the
    /// order their terminating bytes arrived.
    pub fn process(&self, bytes: &[u8]) -> usize {
        tracing::trace!("RX {:02X?}", bytes);
        let messages = self.decoder.lock().feed(bytes);
        let count = messages.len();
        for message in messages {
            self.handle(message);
        }
        count
    }

    fn handle(&self, message: FirmataMessage) {
        tracing::debug!("Decoded {:?}", message);
        match message {
            FirmataMessage::ReportVersion(version) => {
                *self.version.write() = Some(version);
                self.bus
                    .publish(EVENT_REPORT_VERSION, EventPayload::Version(version));
            }
            FirmataMessage::AnalogReport { channel, value } => {
                if let Some(pin) = self
                    .pins
                    .write()
                    .pins
                    .iter_mut()
                    .find(|p| p.analog_channel == Some(channel))
                {
                    pin.value = u32::from(value);
                }
                self.bus.publish(
                    &analog_read_event(channel),
                    u32::from(value).to_be_bytes().to_vec(),
                );
            }
            FirmataMessage::DigitalReport { port, value } => self.handle_digital_report(port, value),
            FirmataMessage::FirmwareReport(info) => {
                tracing::info!("Firmware {} v{}", info.name, info.version);
                *self.firmware.write() = Some(info.clone());
                self.bus.publish(EVENT_FIRMWARE, EventPayload::Firmware(info));
            }
            FirmataMessage::CapabilityReport(capabilities) => {
                {
                    let mut table = self.pins.write();
                    table.pins.resize_with(capabilities.len(), Pin::default);
                    for (pin, caps) in table.pins.iter_mut().zip(&capabilities) {
                        pin.modes = caps.modes.clone();
                    }
                    table.reported = true;
                }
                {
                    let mut events = self.events.write();
                    for caps in &capabilities {
                        events.insert(digital_read_event(caps.pin));
                        events.insert(pin_state_event(caps.pin));
                    }
                }
                tracing::debug!("Board reports {} pins", capabilities.len());
                self.bus
                    .publish(EVENT_CAPABILITIES, EventPayload::Capabilities(capabilities));
            }
            FirmataMessage::AnalogMappingReport(mapping) => {
                {
                    let mut table = self.pins.write();
                    for (pin, channel) in mapping.iter().enumerate().take(usize::from(MAX_PIN) + 1) {
                        table.get_or_insert(pin as u8).analog_channel = *channel;
                    }
                }
                {
                    let mut events = self.events.write();
                    for channel in mapping.iter().flatten() {
                        events.insert(analog_read_event(*channel));
                    }
                }
                self.bus
                    .publish(EVENT_ANALOG_MAPPING, EventPayload::AnalogMapping(mapping));
            }
            FirmataMessage::PinStateReport(state) => {
                {
                    let mut table = self.pins.write();
                    let pin = table.get_or_insert(state.pin.min(MAX_PIN));
                    pin.mode = state.mode;
                    pin.value = state.value;
                }
                self.bus
                    .publish(&pin_state_event(state.pin), EventPayload::PinState(state));
            }
            FirmataMessage::I2cReply(reply) => {
                self.bus.publish(EVENT_I2C_REPLY, reply);
            }
            FirmataMessage::StringData(text) => {
                self.bus.publish(EVENT_STRING_DATA, EventPayload::Text(text));
            }
            FirmataMessage::UnknownSysex { command, payload } => {
                tracing::debug!(
                    "Dropping unknown sysex 0x{:02X} ({} bytes)",
                    command,
                    payload.len()
                );
            }
        }
    }

    fn handle_digital_report(&self, port: u8, value: u8) {
        let mut publish = Vec::with_capacity(8);
        {
            let mut table = self.pins.write();
            for bit in 0..8u8 {
                let pin = port * 8 + bit;
                let level = (value >> bit) & 0x01;
                if !table.reported {
                    publish.push((pin, level));
                    continue;
                }
                if let Some(entry) = table.pins.get_mut(usize::from(pin)) {
                    if entry.mode.is_some_and(PinMode::is_digital_input) {
                        entry.value = u32::from(level);
                        publish.push((pin, level));
                    }
                }
            }
        }

        for (pin, level) in publish {
            self.bus.publish(&digital_read_event(pin), vec![level]);
        }
    }

    fn write(&self, bytes: &[u8]) -> Result<()> {
        if self.is_closed() {
            return Err(StateError::NotConnected.into());
        }
        tracing::trace!("TX {:02X?}", bytes);
        self.transport.write_all(bytes).map_err(|e| {
            TransportError::Write {
                reason: e.to_string(),
            }
            .into()
        })
    }

    /// Reset the board
    pub fn reset(&self) -> Result<()> {
        self.write(&CommandCreator::system_reset())
    }

    /// Ask for the protocol version
    pub fn query_report_version(&self) -> Result<()> {
        self.write(&CommandCreator::report_version_query())
    }

    /// Ask for the firmware identity
    pub fn query_firmware(&self) -> Result<()> {
        self.write(&CommandCreator::firmware_query())
    }

    /// Ask for the capability table
    pub fn query_capabilities(&self) -> Result<()> {
        self.write(&CommandCreator::capability_query())
    }

    /// Ask for the analog mapping
    pub fn query_analog_mapping(&self) -> Result<()> {
        self.write(&CommandCreator::analog_mapping_query())
    }

    /// Ask for one pin's mode and value
    pub fn query_pin_state(&self, pin: u8) -> Result<()> {
        check_pin(pin)?;
        self.write(&CommandCreator::pin_state_query(pin))
    }

    /// Set a pin's mode
    ///
    /// A mode missing from the capability report is logged and sent anyway.
    pub fn set_pin_mode(&self, pin: u8, mode: PinMode) -> Result<()> {
        check_pin(pin)?;
        if self.supports(pin, mode) == Some(false) {
            tracing::warn!("Pin {} does not report support for {} mode", pin, mode);
        }
        self.write(&CommandCreator::pin_mode(pin, mode))?;
        self.pins.write().get_or_insert(pin).mode = Some(mode);
        Ok(())
    }

    /// Drive a digital pin
    ///
    /// The whole port is written, using the tracked values of its other pins.
    pub fn digital_write(&self, pin: u8, high: bool) -> Result<()> {
        check_pin(pin)?;
        let port = pin / 8;
        let port_value = {
            let mut table = self.pins.write();
            table.get_or_insert(pin).value = u32::from(high);
            (0..8u8).fold(0u8, |acc, bit| {
                let level = table
                    .pins
                    .get(usize::from(port * 8 + bit))
                    .is_some_and(|p| p.value != 0);
                acc | (u8::from(level) << bit)
            })
        };
        self.write(&CommandCreator::digital_port(port, port_value))
    }

    /// Analog (PWM/servo) write
    pub fn analog_write(&self, pin: u8, value: u32) -> Result<()> {
        check_pin(pin)?;
        self.write(&CommandCreator::analog_write(pin, value))?;
        self.pins.write().get_or_insert(pin).value = value;
        Ok(())
    }

    /// Enable or disable reports for digital `port`
    pub fn report_digital(&self, port: u8, enable: bool) -> Result<()> {
        check_range(u32::from(port), u32::from(MAX_REPORT_INDEX))?;
        self.write(&CommandCreator::report_digital(port, enable))
    }

    /// Enable or disable reports for analog `channel`
    pub fn report_analog(&self, channel: u8, enable: bool) -> Result<()> {
        check_range(u32::from(channel), u32::from(MAX_REPORT_INDEX))?;
        self.write(&CommandCreator::report_analog(channel, enable))
    }

    /// Set the analog sampling interval
    pub fn set_sampling_interval(&self, interval_ms: u16) -> Result<()> {
        check_range(u32::from(interval_ms), u32::from(MAX_U14))?;
        self.write(&CommandCreator::sampling_interval(interval_ms))
    }

    /// Configure the I2C bus
    pub fn i2c_config(&self, delay_us: u16) -> Result<()> {
        check_range(u32::from(delay_us), u32::from(MAX_U14))?;
        self.write(&CommandCreator::i2c_config(delay_us))
    }

    /// Request `count` bytes from the I2C peripheral at `address`
    pub fn i2c_read_request(&self, address: u8, count: u16) -> Result<()> {
        check_range(u32::from(address), 0x7F)?;
        check_range(u32::from(count), u32::from(MAX_U14))?;
        self.write(&CommandCreator::i2c_read_request(address, count))
    }

    /// Write `data` to the I2C peripheral at `address`
    pub fn i2c_write_request(&self, address: u8, data: &[u8]) -> Result<()> {
        check_range(u32::from(address), 0x7F)?;
        self.write(&CommandCreator::i2c_write_request(address, data))
    }

    /// Send a string message
    pub fn send_string(&self, text: &str) -> Result<()> {
        self.write(&CommandCreator::string_data(text))
    }

    /// Start the decode loop on its own thread
    ///
    /// The loop ends at end of stream, on a non-transient read error, or
    /// once the board is closed.
    pub fn spawn_reader(self: &Arc<Self>) -> Result<JoinHandle<()>> {
        let board = Arc::clone(self);
        let handle = std::thread::Builder::new()
            .name(format!("firmata-decode-{}", self.transport.name()))
            .spawn(move || board.read_loop())?;
        Ok(handle)
    }

    fn read_loop(&self) {
        let mut buf = [0u8; READ_BUFFER_SIZE];
        tracing::debug!("Decode loop started on {}", self.transport.name());

        while !self.is_closed() {
            match self.transport.read(&mut buf) {
                Ok(0) => {
                    tracing::debug!("End of stream on {}", self.transport.name());
                    break;
                }
                Ok(n) => {
                    self.process(&buf[..n]);
                }
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::TimedOut
                            | io::ErrorKind::WouldBlock
                            | io::ErrorKind::Interrupted
                    ) => {}
                Err(e) => {
                    if !self.is_closed() {
                        let error = TransportError::Read {
                            reason: e.to_string(),
                        };
                        tracing::warn!("{} on {}", error, self.transport.name());
                        *self.read_error.lock() = Some(error);
                    }
                    break;
                }
            }
        }

        tracing::debug!("Decode loop stopped on {}", self.transport.name());
    }

    /// Close the transport
    ///
    /// Only the first call closes; later calls succeed without doing anything.
    pub fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        tracing::info!("Closing board on {}", self.transport.name());
        self.transport.close().map_err(|e| {
            TransportError::Close {
                reason: e.to_string(),
            }
            .into()
        })
    }
}

impl Eventer for Board {
    fn event(&self, name: &str) -> Option<Event> {
        self.events
            .read()
            .contains(name)
            .then(|| Event::new(Arc::clone(&self.bus), name))
    }

    fn event_names(&self) -> Vec<String> {
        self.events.read().iter().cloned().collect()
    }
}

impl std::fmt::Debug for Board {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Board")
            .field("transport", &self.transport.name())
            .field("firmware", &*self.firmware.read())
            .field("pins", &self.pins.read().pins.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}

fn check_pin(pin: u8) -> Result<()> {
    if pin > MAX_PIN {
        return Err(CommandError::InvalidPin {
            pin: pin.to_string(),
        }
        .into());
    }
    Ok(())
}

pub(crate) fn check_range(value: u32, max: u32) -> Result<()> {
    if value > max {
        return Err(CommandError::ValueOutOfRange { value, max }.into());
    }
    Ok(())
}
