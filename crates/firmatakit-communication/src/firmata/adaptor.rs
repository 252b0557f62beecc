//! Firmata adaptor
//!
//! The synchronous-looking facade over a [`Board`]: connection lifecycle,
//! the bootstrap handshake, request/response reads bounded by a timeout,
//! and fire-and-forget writes.
//!
//! Reads subscribe one-shot to the matching event *before* sending their
//! request, then wait at most `read_timeout`. A read that times out returns
//! a sentinel (`-1` or an empty vector) rather than an error. Two concurrent
//! reads on the same event race: only one receives the next report and the
//! other times out.

use firmatakit_core::{
    CommandError, ConfigError, Event, EventBus, EventPayload, Eventer, PinMode, Result,
    StateError, SubscriptionId,
};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

use super::board::{check_range, Board};
use super::protocol::*;
use crate::communication::{fixed_connector, serial_connector, Connector, Transport};

/// Timing configuration for an adaptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdaptorConfig {
    /// How long a read waits for its report
    pub read_timeout: Duration,
    /// How long the handshake waits for all bootstrap reports
    pub handshake_timeout: Duration,
    /// Delay the board waits between an I2C write and read, in microseconds
    pub i2c_delay_us: u16,
}

impl Default for AdaptorConfig {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_millis(50),
            handshake_timeout: Duration::from_secs(1),
            i2c_delay_us: 0,
        }
    }
}

/// Lifecycle state of an adaptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdaptorState {
    /// Never connected, or the last connect failed
    Unconnected,
    /// Transport open, handshake in progress
    Connecting,
    /// Handshake finished
    Connected,
    /// Transport closed by `disconnect`
    Disconnected,
    /// Released by `finalize`
    Finalized,
}

impl std::fmt::Display for AdaptorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AdaptorState::Unconnected => "unconnected",
            AdaptorState::Connecting => "connecting",
            AdaptorState::Connected => "connected",
            AdaptorState::Disconnected => "disconnected",
            AdaptorState::Finalized => "finalized",
        };
        write!(f, "{}", s)
    }
}

/// Adaptor driving one Firmata board
pub struct FirmataAdaptor {
    name: String,
    port: String,
    connector: Option<Connector>,
    config: AdaptorConfig,
    state: RwLock<AdaptorState>,
    board: RwLock<Option<Arc<Board>>>,
    i2c_address: Mutex<u8>,
}

impl FirmataAdaptor {
    /// Create an adaptor with no way to open its port
    ///
    /// `connect` fails with "no board attached" until a connector is supplied.
    pub fn new(name: impl Into<String>, port: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            port: port.into(),
            connector: None,
            config: AdaptorConfig::default(),
            state: RwLock::new(AdaptorState::Unconnected),
            board: RwLock::new(None),
            i2c_address: Mutex::new(0),
        }
    }

    /// Create an adaptor that opens `port` as a serial port
    pub fn serial(name: impl Into<String>, port: impl Into<String>, baud_rate: u32) -> Self {
        Self::new(name, port).with_connector(serial_connector(baud_rate))
    }

    /// Use `connector` to open the port
    pub fn with_connector(mut self, connector: Connector) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Connect over an already open transport
    pub fn with_transport(self, transport: Arc<dyn Transport>) -> Self {
        self.with_connector(fixed_connector(transport))
    }

    /// Override timing
    pub fn with_config(mut self, config: AdaptorConfig) -> Self {
        self.config = config;
        self
    }

    /// Adaptor name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Port the connector opens
    pub fn port(&self) -> &str {
        &self.port
    }

    /// Timing configuration
    pub fn config(&self) -> &AdaptorConfig {
        &self.config
    }

    /// Current lifecycle state
    pub fn state(&self) -> AdaptorState {
        *self.state.read()
    }

    /// The attached board, if any
    pub fn board(&self) -> Option<Arc<Board>> {
        self.board.read().clone()
    }

    /// Firmware name reported during the handshake
    pub fn firmware_name(&self) -> Option<String> {
        self.board()
            .and_then(|board| board.firmware())
            .map(|info| info.name)
    }

    /// Names of the events the attached board advertises
    pub fn events(&self) -> Vec<String> {
        self.event_names()
    }

    fn set_state(&self, state: AdaptorState) {
        let previous = std::mem::replace(&mut *self.state.write(), state);
        if previous != state {
            tracing::debug!("{}: {} -> {}", self.name, previous, state);
        }
    }

    fn connected_board(&self) -> Result<Arc<Board>> {
        self.board().ok_or_else(|| StateError::NotConnected.into())
    }

    /// Open the transport, start decoding and run the handshake
    ///
    /// Missing handshake reports are tolerated: the adaptor is connected once
    /// the handshake deadline passes even if the board stayed silent.
    pub async fn connect(&self) -> Result<()> {
        if matches!(
            self.state(),
            AdaptorState::Connecting | AdaptorState::Connected
        ) {
            return Err(StateError::AlreadyConnected.into());
        }

        let connector = self.connector.as_ref().ok_or(ConfigError::NoConnector)?;
        let transport = connector(&self.port).map_err(|e| {
            tracing::error!("{}: failed to open {}: {}", self.name, self.port, e);
            e
        })?;

        let board = Arc::new(Board::new(transport));
        *self.board.write() = Some(Arc::clone(&board));
        self.set_state(AdaptorState::Connecting);

        let result = match board.spawn_reader() {
            Ok(_) => self.handshake(&board).await,
            Err(e) => Err(e),
        };

        if let Err(e) = result {
            tracing::error!("{}: connect failed: {}", self.name, e);
            if let Err(close_err) = board.close() {
                tracing::warn!("{}: close after failed connect: {}", self.name, close_err);
            }
            self.board.write().take();
            self.set_state(AdaptorState::Unconnected);
            return Err(e);
        }

        self.set_state(AdaptorState::Connected);
        match board.firmware() {
            Some(info) => tracing::info!(
                "{}: connected to {} v{} on {}",
                self.name,
                info.name,
                info.version,
                self.port
            ),
            None => tracing::info!("{}: connected on {}", self.name, self.port),
        }
        Ok(())
    }

    async fn handshake(&self, board: &Board) -> Result<()> {
        let bus = board.bus();
        let pending: Vec<_> = [EVENT_FIRMWARE, EVENT_CAPABILITIES, EVENT_ANALOG_MAPPING]
            .into_iter()
            .map(|name| {
                let (id, rx) = once_channel(bus, name);
                (name, id, rx)
            })
            .collect();

        let sent = board
            .reset()
            .and_then(|_| board.query_firmware())
            .and_then(|_| board.query_capabilities())
            .and_then(|_| board.query_analog_mapping());
        if let Err(e) = sent {
            for (_, id, _) in &pending {
                bus.unsubscribe(*id);
            }
            return Err(e);
        }

        let deadline = tokio::time::Instant::now() + self.config.handshake_timeout;
        for (name, id, rx) in pending {
            match tokio::time::timeout_at(deadline, rx).await {
                Ok(Ok(_)) => tracing::debug!("{}: handshake received {}", self.name, name),
                _ => {
                    bus.unsubscribe(id);
                    tracing::warn!("{}: handshake got no {} report", self.name, name);
                }
            }
        }
        Ok(())
    }

    /// Close the transport
    pub fn disconnect(&self) -> Result<()> {
        let board = self
            .board
            .write()
            .take()
            .ok_or(StateError::NotConnected)?;
        self.set_state(AdaptorState::Disconnected);
        board.close()
    }

    /// Release the board, collecting every close error
    ///
    /// Safe to call more than once.
    pub fn finalize(&self) -> Vec<firmatakit_core::Error> {
        let mut errors = Vec::new();
        if let Some(board) = self.board.write().take() {
            if let Err(e) = board.close() {
                tracing::warn!("{}: close failed: {}", self.name, e);
                errors.push(e);
            }
        }
        self.set_state(AdaptorState::Finalized);
        errors
    }

    async fn await_payload(
        &self,
        bus: &EventBus,
        id: SubscriptionId,
        rx: oneshot::Receiver<EventPayload>,
    ) -> Option<EventPayload> {
        match tokio::time::timeout(self.config.read_timeout, rx).await {
            Ok(Ok(payload)) => Some(payload),
            _ => {
                bus.unsubscribe(id);
                None
            }
        }
    }

    fn ensure_mode(&self, board: &Board, pin: u8, mode: PinMode) -> Result<()> {
        if board.pin_mode(pin) == Some(mode) {
            return Ok(());
        }
        board.set_pin_mode(pin, mode)
    }

    /// Read a digital pin: `Ok(0)`/`Ok(1)`, or `Ok(-1)` on timeout
    pub async fn digital_read(&self, pin: &str) -> Result<i32> {
        let pin = parse_pin(pin)?;
        check_range(u32::from(pin / 8), u32::from(MAX_REPORT_INDEX))?;
        let board = self.connected_board()?;
        let event = digital_read_event(pin);
        board.register_event(&event);

        let (id, rx) = once_channel(board.bus(), &event);
        let sent = self
            .ensure_mode(&board, pin, PinMode::Input)
            .and_then(|_| board.report_digital(pin / 8, true));
        if let Err(e) = sent {
            board.bus().unsubscribe(id);
            return Err(e);
        }

        Ok(self
            .await_payload(board.bus(), id, rx)
            .await
            .map_or(-1, |payload| payload_to_int(&payload)))
    }

    /// Read an analog channel, or `Ok(-1)` on timeout
    ///
    /// `pin` is the analog channel number; the digital pin it lives on comes
    /// from the board's analog mapping.
    pub async fn analog_read(&self, pin: &str) -> Result<i32> {
        let channel = parse_pin(pin)?;
        check_range(u32::from(channel), u32::from(MAX_REPORT_INDEX))?;
        let board = self.connected_board()?;
        let event = analog_read_event(channel);
        board.register_event(&event);

        let (id, rx) = once_channel(board.bus(), &event);
        let analog_pin = board.analog_pin_for_channel(channel);
        let sent = self
            .ensure_mode(&board, analog_pin, PinMode::Analog)
            .and_then(|_| board.report_analog(channel, true));
        if let Err(e) = sent {
            board.bus().unsubscribe(id);
            return Err(e);
        }

        Ok(self
            .await_payload(board.bus(), id, rx)
            .await
            .map_or(-1, |payload| payload_to_int(&payload)))
    }

    /// Drive a digital pin low (0) or high (anything else)
    pub fn digital_write(&self, pin: &str, level: u8) -> Result<()> {
        let pin = parse_pin(pin)?;
        let board = self.connected_board()?;
        self.ensure_mode(&board, pin, PinMode::Output)?;
        board.digital_write(pin, level != 0)
    }

    /// Write a PWM duty cycle
    pub fn pwm_write(&self, pin: &str, level: u8) -> Result<()> {
        let pin = parse_pin(pin)?;
        let board = self.connected_board()?;
        self.ensure_mode(&board, pin, PinMode::Pwm)?;
        board.analog_write(pin, u32::from(level))
    }

    /// Move a servo to `angle` degrees
    pub fn servo_write(&self, pin: &str, angle: u8) -> Result<()> {
        let pin = parse_pin(pin)?;
        let board = self.connected_board()?;
        self.ensure_mode(&board, pin, PinMode::Servo)?;
        board.analog_write(pin, u32::from(angle))
    }

    /// Configure the I2C bus and remember `address` for later reads and writes
    pub fn i2c_start(&self, address: u8) -> Result<()> {
        let board = self.connected_board()?;
        if address > 0x7F {
            return Err(CommandError::ValueOutOfRange {
                value: u32::from(address),
                max: 0x7F,
            }
            .into());
        }
        board.i2c_config(self.config.i2c_delay_us)?;
        *self.i2c_address.lock() = address;
        Ok(())
    }

    /// Read `count` bytes from the I2C peripheral, or an empty vector on timeout
    ///
    /// Until `i2c_start` is called requests go to address 0.
    pub async fn i2c_read(&self, count: u16) -> Result<Vec<u8>> {
        let board = self.connected_board()?;
        let address = *self.i2c_address.lock();

        let (id, rx) = once_channel(board.bus(), EVENT_I2C_REPLY);
        if let Err(e) = board.i2c_read_request(address, count) {
            board.bus().unsubscribe(id);
            return Err(e);
        }

        Ok(self
            .await_payload(board.bus(), id, rx)
            .await
            .and_then(|payload| payload.as_bytes().map(<[u8]>::to_vec))
            .unwrap_or_default())
    }

    /// Write bytes to the I2C peripheral
    pub fn i2c_write(&self, data: &[u8]) -> Result<()> {
        let board = self.connected_board()?;
        let address = *self.i2c_address.lock();
        board.i2c_write_request(address, data)
    }
}

impl Eventer for FirmataAdaptor {
    fn event(&self, name: &str) -> Option<Event> {
        self.board().and_then(|board| board.event(name))
    }

    fn event_names(&self) -> Vec<String> {
        self.board()
            .map(|board| board.event_names())
            .unwrap_or_default()
    }
}

impl std::fmt::Debug for FirmataAdaptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FirmataAdaptor")
            .field("name", &self.name)
            .field("port", &self.port)
            .field("state", &self.state())
            .field("config", &self.config)
            .finish()
    }
}

fn once_channel(bus: &EventBus, name: &str) -> (SubscriptionId, oneshot::Receiver<EventPayload>) {
    let (tx, rx) = oneshot::channel();
    let id = bus.once(name, move |payload| {
        let _ = tx.send(payload);
    });
    (id, rx)
}

/// Parse a decimal pin identifier in the protocol's pin range
pub fn parse_pin(pin: &str) -> Result<u8> {
    pin.trim()
        .parse::<u8>()
        .ok()
        .filter(|p| *p <= MAX_PIN)
        .ok_or_else(|| {
            CommandError::InvalidPin {
                pin: pin.to_string(),
            }
            .into()
        })
}

/// Decode a big-endian byte payload into an integer
fn payload_to_int(payload: &EventPayload) -> i32 {
    match payload.as_bytes() {
        Some(bytes) => bytes
            .iter()
            .fold(0i32, |acc, &b| acc.wrapping_shl(8) | i32::from(b)),
        None => {
            tracing::debug!("Expected bytes, got {} payload", payload.kind());
            -1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pin() {
        assert_eq!(parse_pin("13").unwrap(), 13);
        assert_eq!(parse_pin(" 0 ").unwrap(), 0);
        assert_eq!(parse_pin("127").unwrap(), 127);
        for bad in ["128", "-1", "A0", "", "1.5"] {
            assert!(parse_pin(bad).unwrap_err().is_command_error(), "{}", bad);
        }
    }

    #[test]
    fn test_payload_to_int() {
        assert_eq!(payload_to_int(&EventPayload::Bytes(vec![0x01])), 1);
        assert_eq!(payload_to_int(&EventPayload::Bytes(vec![0, 0, 0, 0x85])), 133);
        assert_eq!(payload_to_int(&EventPayload::Bytes(vec![0x03, 0xFF])), 1023);
        assert_eq!(payload_to_int(&EventPayload::Text("x".into())), -1);
    }

    #[test]
    fn test_default_config() {
        let config = AdaptorConfig::default();
        assert_eq!(config.read_timeout, Duration::from_millis(50));
        assert_eq!(config.handshake_timeout, Duration::from_secs(1));
        assert_eq!(config.i2c_delay_us, 0);
    }

    #[tokio::test]
    async fn test_connect_without_connector() {
        let adaptor = FirmataAdaptor::new("board", "/dev/null");
        let err = adaptor.connect().await.unwrap_err();
        assert!(err.is_config_error());
        assert_eq!(err.to_string(), "no board attached");
        assert_eq!(adaptor.state(), AdaptorState::Unconnected);
    }

    #[test]
    fn test_operations_need_a_board() {
        let adaptor = FirmataAdaptor::new("board", "/dev/null");
        assert!(adaptor.digital_write("1", 1).unwrap_err().is_state_error());
        assert!(adaptor.i2c_start(0x48).unwrap_err().is_state_error());
        assert!(adaptor.event("i2c_reply").is_none());
        assert!(adaptor.events().is_empty());
    }
}
