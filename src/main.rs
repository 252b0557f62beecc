//! `firmatakit` - connect to a Firmata board and stream its events
//!
//! ```bash
//! firmatakit /dev/ttyACM0 analog_read_0 digital_read_2
//! firmatakit --config uno.toml string_data
//! firmatakit --list
//! ```
//!
//! Each published payload is printed to stdout as a server-sent-events
//! frame (`data: <json>`). Logs go to stderr.

use anyhow::{Context, Result};
use clap::Parser;
use firmatakit::protocol::EVENT_STRING_DATA;
use firmatakit::{
    init_logging, list_ports, AdaptorSettings, DeviceRegistry, EventStream, FirmataAdaptor,
    BUILD_DATE, VERSION,
};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

const OWNER: &str = "firmatakit";

#[derive(Parser)]
#[command(name = "firmatakit")]
#[command(about = "Connect to a Firmata board and stream its events", long_about = None)]
struct Cli {
    /// Serial port of the board (overrides the config file)
    port: Option<String>,

    /// Events to stream, e.g. analog_read_0 digital_read_2
    events: Vec<String>,

    /// Adaptor settings file (.toml or .json)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Baud rate (overrides the config file)
    #[arg(long)]
    baud: Option<u32>,

    /// List candidate serial ports and exit
    #[arg(long)]
    list: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging()?;
    let cli = Cli::parse();
    tracing::info!("firmatakit {} (built {})", VERSION, BUILD_DATE);

    if cli.list {
        for port in list_ports()? {
            println!("{}\t{}", port.port_name, port.description);
        }
        return Ok(());
    }

    let mut settings = match &cli.config {
        Some(path) => AdaptorSettings::load_from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => AdaptorSettings::default(),
    };
    if let Some(port) = cli.port {
        settings.port = port;
    }
    if let Some(baud) = cli.baud {
        settings.baud_rate = baud;
    }

    let adaptor = Arc::new(settings.build_adaptor()?);
    adaptor
        .connect()
        .await
        .with_context(|| format!("connecting to {}", settings.port))?;

    match adaptor.board().and_then(|board| board.firmware()) {
        Some(info) => eprintln!("Connected to {} v{}", info.name, info.version),
        None => eprintln!("Connected to {} (no firmware report)", settings.port),
    }

    let registry = DeviceRegistry::new();
    registry.register(OWNER, adaptor.name(), adaptor.clone());

    let events = if cli.events.is_empty() {
        vec![EVENT_STRING_DATA.to_string()]
    } else {
        cli.events
    };

    let mut tasks = Vec::new();
    for event in &events {
        enable_reporting(&adaptor, event).await;
        match EventStream::open(
            &registry,
            OWNER,
            adaptor.name(),
            event,
            settings.stream_capacity,
        ) {
            Ok(mut stream) => tasks.push(tokio::spawn(async move {
                while let Some(frame) = stream.next_frame().await {
                    if emit_frame(&mut std::io::stdout().lock(), &frame).is_err() {
                        break;
                    }
                }
            })),
            Err(e) => eprintln!("{}", e.body()),
        }
    }

    tokio::signal::ctrl_c().await?;
    for task in tasks {
        task.abort();
    }

    for err in adaptor.finalize() {
        tracing::warn!("Finalize: {}", err);
    }
    Ok(())
}

/// Write one frame and flush it so piped readers see it immediately
fn emit_frame(out: &mut impl Write, frame: &str) -> std::io::Result<()> {
    out.write_all(frame.as_bytes())?;
    out.flush()
}

/// Ask the board to start reporting the pin or channel behind `event`
async fn enable_reporting(adaptor: &FirmataAdaptor, event: &str) {
    let result = if let Some(channel) = event.strip_prefix("analog_read_") {
        adaptor.analog_read(channel).await.map(|_| ())
    } else if let Some(pin) = event.strip_prefix("digital_read_") {
        adaptor.digital_read(pin).await.map(|_| ())
    } else {
        Ok(())
    };

    if let Err(e) = result {
        tracing::warn!("Cannot enable reporting for {}: {}", event, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        data: Vec<u8>,
        flushed: usize,
    }

    impl Write for Recorder {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            self.flushed = self.data.len();
            Ok(())
        }
    }

    #[test]
    fn test_emit_frame_flushes_each_frame() {
        let mut out = Recorder::default();
        emit_frame(&mut out, "data: 1\n\n").unwrap();
        assert_eq!(out.flushed, out.data.len());
        emit_frame(&mut out, "data: 2\n\n").unwrap();
        assert_eq!(out.data, b"data: 1\n\ndata: 2\n\n");
        assert_eq!(out.flushed, out.data.len());
    }
}
