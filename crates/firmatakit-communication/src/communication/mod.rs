//! Transports carrying Firmata bytes.
//!
//! A board only needs a duplex byte stream. [`Transport`] is that stream;
//! [`Connector`] is the function an adaptor calls to open one for a port.

pub mod memory;
pub mod serial;

use firmatakit_core::Result;
use std::io;
use std::sync::Arc;

pub use memory::{DeviceEnd, MemoryTransport, NullTransport};
pub use serial::{is_valid_port, list_ports, serial_connector, SerialPortInfo, SerialTransport};

/// Duplex byte stream shared by the decode thread and the command writers
///
/// Methods take `&self`: implementations lock their read and write paths
/// independently so a blocked read never stalls a write.
pub trait Transport: Send + Sync {
    /// Read available bytes into `buf`
    ///
    /// `Ok(0)` means end of stream. `TimedOut`, `WouldBlock` and
    /// `Interrupted` errors are treated as "nothing yet" by callers.
    fn read(&self, buf: &mut [u8]) -> io::Result<usize>;

    /// Write some of `data`, returning how much was written
    fn write(&self, data: &[u8]) -> io::Result<usize>;

    /// Write all of `data`
    fn write_all(&self, mut data: &[u8]) -> io::Result<()> {
        while !data.is_empty() {
            match self.write(data) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "failed to write whole buffer",
                    ))
                }
                Ok(n) => data = &data[n..],
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Close the stream; later reads return EOF
    fn close(&self) -> io::Result<()>;

    /// Human readable name (usually the port)
    fn name(&self) -> String;
}

/// Opens a transport for a port name
pub type Connector = Arc<dyn Fn(&str) -> Result<Arc<dyn Transport>> + Send + Sync>;

/// A connector that ignores the port and hands out `transport`
pub fn fixed_connector(transport: Arc<dyn Transport>) -> Connector {
    Arc::new(move |_port: &str| Ok(Arc::clone(&transport)))
}
