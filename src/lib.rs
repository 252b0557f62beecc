//! # firmatakit
//!
//! Drive Firmata-speaking microcontroller boards (an Arduino running
//! StandardFirmata, for instance) from a host process.
//!
//! ## Architecture
//!
//! firmatakit is organized as a workspace with multiple crates:
//!
//! 1. **firmatakit-core** - Errors, the per-board event bus, pin data types
//!    and the event streaming boundary
//! 2. **firmatakit-communication** - Transports, the Firmata decoder and
//!    encoder, the `Board` state machine and the `FirmataAdaptor` facade
//! 3. **firmatakit-settings** - Adaptor configuration files
//! 4. **firmatakit** - This crate: re-exports, logging setup and the
//!    `firmatakit` binary
//!
//! ## Example
//!
//! ```no_run
//! use firmatakit::FirmataAdaptor;
//!
//! # async fn run() -> firmatakit::Result<()> {
//! let adaptor = FirmataAdaptor::serial("uno", "/dev/ttyACM0", 57_600);
//! adaptor.connect().await?;
//! adaptor.digital_write("13", 1)?;
//! let level = adaptor.analog_read("0").await?;
//! println!("A0 = {}", level);
//! adaptor.finalize();
//! # Ok(())
//! # }
//! ```

pub use firmatakit_communication::firmata::protocol;

pub use firmatakit_core::{
    after, sse_frame, CommandError, ConfigError, DeviceRegistry, Error, Event, EventBus,
    EventPayload, EventStream, Eventer, FirmwareInfo, FirmwareVersion, GatewayError, I2cReply,
    PinCapabilities, PinCapability, PinMode, PinState, Result, StateError, SubscriptionId,
    TransportError, DEFAULT_STREAM_CAPACITY,
};

pub use firmatakit_communication::{
    fixed_connector, list_ports, parse_pin, serial_connector, AdaptorConfig, AdaptorState, Board,
    CommandCreator, Connector, Decoder, DeviceEnd, FirmataAdaptor, FirmataMessage,
    MemoryTransport, NullTransport, Pin, SerialPortInfo, SerialTransport, Transport,
    DEFAULT_BAUD_RATE,
};

pub use firmatakit_settings::{AdaptorSettings, SettingsError, SettingsResult};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date (set at compile time)
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Initialize logging with the default configuration
///
/// Sets up structured logging with:
/// - Console output with pretty formatting on stderr, leaving stdout for
///   event frames
/// - RUST_LOG environment variable support (defaults to `info`)
pub fn init_logging() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_line_number(true)
        .pretty();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}
