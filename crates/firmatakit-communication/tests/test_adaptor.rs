mod common;

use common::{ANALOG_MAPPING, CAPABILITIES, FIRMWARE};
use firmatakit_communication::{
    AdaptorConfig, AdaptorState, Connector, FirmataAdaptor, NullTransport, Transport,
};
use firmatakit_core::{after, Error, Eventer, FirmwareVersion, I2cReply, PinMode, Result};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn test_config() -> AdaptorConfig {
    AdaptorConfig {
        read_timeout: Duration::from_millis(100),
        handshake_timeout: Duration::from_millis(500),
        i2c_delay_us: 0,
    }
}

/// Connect while feeding the board a StandardFirmata handshake
async fn connect(adaptor: &Arc<FirmataAdaptor>) -> Result<()> {
    let a = adaptor.clone();
    after(Duration::from_millis(1), move || {
        if let Some(board) = a.board() {
            board.process(FIRMWARE);
            board.process(CAPABILITIES);
            board.process(ANALOG_MAPPING);
        }
    });
    adaptor.connect().await
}

fn new_adaptor(transport: Arc<NullTransport>) -> Arc<FirmataAdaptor> {
    Arc::new(
        FirmataAdaptor::new("board", "/dev/null")
            .with_transport(transport)
            .with_config(test_config()),
    )
}

async fn init_adaptor() -> (Arc<FirmataAdaptor>, Arc<NullTransport>) {
    let transport = Arc::new(NullTransport::new());
    let adaptor = new_adaptor(transport.clone());
    connect(&adaptor).await.unwrap();
    transport.clear();
    (adaptor, transport)
}

#[tokio::test]
async fn test_adaptor_identity() {
    let (adaptor, _) = init_adaptor().await;
    assert_eq!(adaptor.name(), "board");
    assert_eq!(adaptor.port(), "/dev/null");
    assert_eq!(adaptor.state(), AdaptorState::Connected);
}

#[tokio::test]
async fn test_handshake_populates_board() {
    let (adaptor, _) = init_adaptor().await;
    let board = adaptor.board().unwrap();

    assert_eq!(adaptor.firmware_name().as_deref(), Some("StandardFirmata.ino"));
    assert_eq!(
        board.firmware().unwrap().version,
        FirmwareVersion { major: 2, minor: 3 }
    );
    assert_eq!(board.pins().len(), 20);
    for channel in 0..6u8 {
        assert_eq!(board.analog_pin_for_channel(channel), 14 + channel);
    }
    assert_eq!(board.supports(3, PinMode::Pwm), Some(true));
    assert_eq!(board.supports(2, PinMode::Pwm), Some(false));
    assert_eq!(board.supports(18, PinMode::I2c), Some(true));
    assert!(adaptor.events().contains(&"digital_read_19".to_string()));
    assert!(adaptor.events().contains(&"analog_read_5".to_string()));
}

#[tokio::test]
async fn test_handshake_sends_queries() {
    let transport = Arc::new(NullTransport::new());
    let adaptor = new_adaptor(transport.clone());
    connect(&adaptor).await.unwrap();

    assert_eq!(
        transport.writes(),
        vec![
            vec![0xFF],
            vec![0xF0, 0x79, 0xF7],
            vec![0xF0, 0x6B, 0xF7],
            vec![0xF0, 0x69, 0xF7],
        ]
    );
}

#[tokio::test]
async fn test_finalize() {
    let (adaptor, transport) = init_adaptor().await;
    assert!(adaptor.finalize().is_empty());
    assert!(transport.is_closed());
    assert_eq!(adaptor.state(), AdaptorState::Finalized);
    assert!(adaptor.finalize().is_empty());

    let transport = Arc::new(NullTransport::with_close_error("close error"));
    let adaptor = new_adaptor(transport);
    connect(&adaptor).await.unwrap();
    let errors = adaptor.finalize();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].to_string(), "close error");
}

#[tokio::test]
async fn test_finalize_never_connected() {
    let adaptor = FirmataAdaptor::new("board", "/dev/null");
    assert!(adaptor.finalize().is_empty());
}

#[tokio::test]
async fn test_disconnect() {
    let adaptor = FirmataAdaptor::new("board", "/dev/null");
    assert_eq!(
        adaptor.disconnect().unwrap_err().to_string(),
        "no board connected"
    );

    let (adaptor, transport) = init_adaptor().await;
    adaptor.disconnect().unwrap();
    assert!(transport.is_closed());
    assert_eq!(adaptor.state(), AdaptorState::Disconnected);
    assert!(adaptor.disconnect().unwrap_err().is_state_error());
    assert!(adaptor.digital_write("1", 1).unwrap_err().is_state_error());
}

#[tokio::test]
async fn test_connect() {
    let transport = Arc::new(NullTransport::new());
    let adaptor = new_adaptor(transport);
    assert!(connect(&adaptor).await.is_ok());
    assert!(adaptor.connect().await.unwrap_err().is_state_error());

    let failing: Connector = Arc::new(|_port: &str| -> Result<Arc<dyn Transport>> {
        Err(Error::other("connect error"))
    });
    let adaptor = FirmataAdaptor::new("board", "/dev/null").with_connector(failing);
    assert_eq!(
        adaptor.connect().await.unwrap_err().to_string(),
        "connect error"
    );
    assert_eq!(adaptor.state(), AdaptorState::Unconnected);
    assert!(adaptor.board().is_none());
}

#[tokio::test]
async fn test_connect_with_silent_board() {
    let transport = Arc::new(NullTransport::new());
    let adaptor = FirmataAdaptor::new("board", "/dev/null")
        .with_transport(transport)
        .with_config(AdaptorConfig {
            handshake_timeout: Duration::from_millis(20),
            ..test_config()
        });

    adaptor.connect().await.unwrap();
    assert_eq!(adaptor.state(), AdaptorState::Connected);
    assert!(adaptor.firmware_name().is_none());

    let board = adaptor.board().unwrap();
    assert_eq!(board.bus().total_subscribers(), 0);
    assert_eq!(board.supports(3, PinMode::Pwm), None);
}

#[tokio::test]
async fn test_reconnect_after_disconnect() {
    let (adaptor, _) = init_adaptor().await;
    adaptor.disconnect().unwrap();
    connect(&adaptor).await.unwrap();
    assert_eq!(adaptor.state(), AdaptorState::Connected);
}

#[tokio::test]
async fn test_servo_write() {
    let (adaptor, transport) = init_adaptor().await;
    adaptor.servo_write("9", 90).unwrap();
    adaptor.servo_write("9", 45).unwrap();
    assert_eq!(
        transport.writes(),
        vec![vec![0xF4, 9, 0x04], vec![0xE9, 90, 0], vec![0xE9, 45, 0]]
    );
}

#[tokio::test]
async fn test_pwm_write() {
    let (adaptor, transport) = init_adaptor().await;
    adaptor.pwm_write("3", 255).unwrap();
    assert_eq!(
        transport.writes(),
        vec![vec![0xF4, 3, 0x03], vec![0xE3, 0x7F, 0x01]]
    );
}

#[tokio::test]
async fn test_pwm_write_on_unsupported_pin_is_still_sent() {
    let (adaptor, transport) = init_adaptor().await;
    adaptor.pwm_write("1", 50).unwrap();
    assert_eq!(
        transport.writes(),
        vec![vec![0xF4, 1, 0x03], vec![0xE1, 50, 0]]
    );
}

#[tokio::test]
async fn test_digital_write() {
    let (adaptor, transport) = init_adaptor().await;
    adaptor.digital_write("13", 1).unwrap();
    adaptor.digital_write("12", 1).unwrap();
    adaptor.digital_write("13", 0).unwrap();
    assert_eq!(
        transport.writes(),
        vec![
            vec![0xF4, 13, 0x01],
            vec![0x91, 0x20, 0x00],
            vec![0xF4, 12, 0x01],
            vec![0x91, 0x30, 0x00],
            vec![0x91, 0x10, 0x00],
        ]
    );
}

#[tokio::test]
async fn test_invalid_pin() {
    let (adaptor, transport) = init_adaptor().await;
    assert!(adaptor.digital_write("A0", 1).unwrap_err().is_command_error());
    assert!(adaptor.pwm_write("200", 1).unwrap_err().is_command_error());
    assert!(adaptor.digital_read("x").await.unwrap_err().is_command_error());
    assert!(transport.writes().is_empty());
}

#[tokio::test]
async fn test_digital_read() {
    let (adaptor, transport) = init_adaptor().await;
    let board = adaptor.board().unwrap();

    // -1 on no data
    assert_eq!(adaptor.digital_read("1").await.unwrap(), -1);
    assert_eq!(board.bus().subscriber_count("digital_read_1"), 0);
    assert_eq!(
        transport.writes(),
        vec![vec![0xF4, 1, 0x00], vec![0xD0, 0x01]]
    );

    let b = board.clone();
    after(Duration::from_millis(5), move || {
        b.bus().publish("digital_read_1", vec![0x01]);
    });
    assert_eq!(adaptor.digital_read("1").await.unwrap(), 1);
}

#[tokio::test]
async fn test_digital_read_from_port_report() {
    let (adaptor, _) = init_adaptor().await;
    let board = adaptor.board().unwrap();

    let b = board.clone();
    after(Duration::from_millis(5), move || {
        b.process(&[0x90, 0x04, 0x00]);
    });
    assert_eq!(adaptor.digital_read("2").await.unwrap(), 1);
}

#[tokio::test]
async fn test_analog_read() {
    let (adaptor, transport) = init_adaptor().await;
    let board = adaptor.board().unwrap();

    // -1 on no data
    assert_eq!(adaptor.analog_read("1").await.unwrap(), -1);
    assert_eq!(
        transport.writes(),
        vec![vec![0xF4, 15, 0x02], vec![0xC1, 0x01]]
    );

    let value: i32 = 133;
    let b = board.clone();
    after(Duration::from_millis(5), move || {
        b.bus().publish("analog_read_1", value.to_be_bytes().to_vec());
    });
    assert_eq!(adaptor.analog_read("1").await.unwrap(), 133);
}

#[tokio::test]
async fn test_analog_read_from_report() {
    let (adaptor, _) = init_adaptor().await;
    let board = adaptor.board().unwrap();

    let b = board.clone();
    after(Duration::from_millis(5), move || {
        b.process(&[0xE0, 0x7F, 0x07]);
    });
    assert_eq!(adaptor.analog_read("0").await.unwrap(), 1023);
    assert_eq!(board.pin(14).unwrap().value, 1023);
}

#[tokio::test]
async fn test_i2c_start() {
    let (adaptor, transport) = init_adaptor().await;
    adaptor.i2c_start(0x48).unwrap();
    assert_eq!(transport.written(), vec![0xF0, 0x78, 0x00, 0x00, 0xF7]);
    assert!(adaptor.i2c_start(0x80).unwrap_err().is_command_error());
}

#[tokio::test]
async fn test_i2c_read() {
    let (adaptor, transport) = init_adaptor().await;
    let board = adaptor.board().unwrap();

    // [] on no data
    assert!(adaptor.i2c_read(1).await.unwrap().is_empty());
    assert_eq!(board.bus().subscriber_count("i2c_reply"), 0);
    assert_eq!(
        transport.written(),
        vec![0xF0, 0x76, 0x00, 0x08, 0x01, 0x00, 0xF7]
    );

    let b = board.clone();
    after(Duration::from_millis(5), move || {
        b.bus().publish(
            "i2c_reply",
            I2cReply {
                address: 0,
                register: 0,
                data: vec![100],
            },
        );
    });
    assert_eq!(adaptor.i2c_read(1).await.unwrap(), vec![100]);
}

#[tokio::test]
async fn test_i2c_read_after_start_uses_address() {
    let (adaptor, transport) = init_adaptor().await;
    adaptor.i2c_start(0x48).unwrap();
    transport.clear();

    assert!(adaptor.i2c_read(2).await.unwrap().is_empty());
    assert_eq!(
        transport.written(),
        vec![0xF0, 0x76, 0x48, 0x08, 0x02, 0x00, 0xF7]
    );
}

#[tokio::test]
async fn test_i2c_write() {
    let (adaptor, transport) = init_adaptor().await;
    adaptor.i2c_start(0x48).unwrap();
    transport.clear();

    adaptor.i2c_write(&[0x00, 0x01]).unwrap();
    assert_eq!(
        transport.written(),
        vec![0xF0, 0x76, 0x48, 0x00, 0x00, 0x00, 0x01, 0x00, 0xF7]
    );
}

#[tokio::test]
async fn test_concurrent_reads_on_different_pins() {
    let (adaptor, _) = init_adaptor().await;
    let board = adaptor.board().unwrap();

    let b = board.clone();
    after(Duration::from_millis(5), move || {
        b.bus().publish("analog_read_2", vec![0, 0, 0, 7]);
        b.bus().publish("digital_read_4", vec![1]);
    });

    let (analog, digital) = tokio::join!(adaptor.analog_read("2"), adaptor.digital_read("4"));
    assert_eq!(analog.unwrap(), 7);
    assert_eq!(digital.unwrap(), 1);
}

#[tokio::test]
async fn test_out_of_range_analog_read_has_no_side_effects() {
    let (adaptor, transport) = init_adaptor().await;
    let board = adaptor.board().unwrap();

    let err = adaptor.analog_read("100").await.unwrap_err();
    assert!(err.is_command_error());
    assert!(transport.writes().is_empty());
    assert!(board.event("analog_read_100").is_none());
    assert_eq!(board.pin_mode(114), None);
    assert_eq!(board.bus().subscriber_count("analog_read_100"), 0);
}

/// Accepts the connection, then fails every write
#[derive(Default)]
struct UnpluggedTransport {
    closed: AtomicBool,
}

impl Transport for UnpluggedTransport {
    fn read(&self, _buf: &mut [u8]) -> io::Result<usize> {
        Ok(0)
    }

    fn write(&self, _data: &[u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "device unplugged"))
    }

    fn close(&self) -> io::Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn name(&self) -> String {
        "unplugged".to_string()
    }
}

#[tokio::test]
async fn test_handshake_write_failure_closes_board() {
    let transport = Arc::new(UnpluggedTransport::default());
    let adaptor = FirmataAdaptor::new("board", "/dev/null")
        .with_transport(transport.clone())
        .with_config(test_config());

    let err = adaptor.connect().await.unwrap_err();
    assert!(err.is_transport_error());
    assert!(err.to_string().contains("device unplugged"));
    assert_eq!(adaptor.state(), AdaptorState::Unconnected);
    assert!(adaptor.board().is_none());
    assert!(transport.closed.load(Ordering::SeqCst));
    assert!(adaptor.disconnect().unwrap_err().is_state_error());
}
