//! In-process transports
//!
//! [`MemoryTransport`] is a duplex pipe whose far side, a [`DeviceEnd`],
//! plays the board: it injects reports and collects commands. An optional
//! responder answers each host write synchronously, which is enough to
//! script a handshake. [`NullTransport`] never produces data and just
//! records what was written.

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::Transport;

type Responder = Arc<dyn Fn(&[u8]) -> Vec<u8> + Send + Sync>;

#[derive(Default)]
struct PipeState {
    data: VecDeque<u8>,
    closed: bool,
}

/// One direction of the duplex pipe
#[derive(Default)]
struct Pipe {
    state: Mutex<PipeState>,
    ready: Condvar,
}

impl Pipe {
    fn push(&self, bytes: &[u8]) -> bool {
        let mut state = self.state.lock();
        if state.closed {
            return false;
        }
        state.data.extend(bytes);
        self.ready.notify_all();
        true
    }

    /// Block until data is available or the pipe is closed
    fn pop_into(&self, buf: &mut [u8]) -> usize {
        let mut state = self.state.lock();
        while state.data.is_empty() && !state.closed {
            self.ready.wait(&mut state);
        }
        let n = buf.len().min(state.data.len());
        for (slot, byte) in buf.iter_mut().zip(state.data.drain(..n)) {
            *slot = byte;
        }
        n
    }

    fn drain(&self) -> Vec<u8> {
        self.state.lock().data.drain(..).collect()
    }

    fn close(&self) {
        self.state.lock().closed = true;
        self.ready.notify_all();
    }

    fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}

/// Host side of an in-memory duplex pipe
pub struct MemoryTransport {
    name: String,
    inbound: Arc<Pipe>,
    outbound: Arc<Pipe>,
    responder: Option<Responder>,
    close_error: Option<String>,
}

/// Device side of a [`MemoryTransport`]
#[derive(Clone)]
pub struct DeviceEnd {
    inbound: Arc<Pipe>,
    outbound: Arc<Pipe>,
}

impl MemoryTransport {
    /// Create a connected host/device pair
    pub fn pair(name: impl Into<String>) -> (Self, DeviceEnd) {
        let inbound = Arc::new(Pipe::default());
        let outbound = Arc::new(Pipe::default());
        let device = DeviceEnd {
            inbound: Arc::clone(&inbound),
            outbound: Arc::clone(&outbound),
        };
        let transport = Self {
            name: name.into(),
            inbound,
            outbound,
            responder: None,
            close_error: None,
        };
        (transport, device)
    }

    /// Answer every host write with the bytes `responder` returns
    pub fn with_responder<F>(mut self, responder: F) -> Self
    where
        F: Fn(&[u8]) -> Vec<u8> + Send + Sync + 'static,
    {
        self.responder = Some(Arc::new(responder));
        self
    }

    /// Make `close` fail with `message`
    pub fn with_close_error(mut self, message: impl Into<String>) -> Self {
        self.close_error = Some(message.into());
        self
    }
}

impl Transport for MemoryTransport {
    fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(self.inbound.pop_into(buf))
    }

    fn write(&self, data: &[u8]) -> io::Result<usize> {
        if !self.outbound.push(data) {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed"));
        }
        if let Some(responder) = &self.responder {
            let reply = responder(data);
            if !reply.is_empty() {
                self.inbound.push(&reply);
            }
        }
        Ok(data.len())
    }

    fn close(&self) -> io::Result<()> {
        self.outbound.close();
        self.inbound.close();
        match &self.close_error {
            Some(message) => Err(io::Error::other(message.clone())),
            None => Ok(()),
        }
    }

    fn name(&self) -> String {
        self.name.clone()
    }
}

impl std::fmt::Debug for MemoryTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryTransport")
            .field("name", &self.name)
            .field("responder", &self.responder.is_some())
            .finish()
    }
}

impl DeviceEnd {
    /// Send bytes to the host
    ///
    /// Returns false if the host already closed the transport.
    pub fn send(&self, bytes: &[u8]) -> bool {
        self.inbound.push(bytes)
    }

    /// Take every byte the host has written so far
    pub fn received(&self) -> Vec<u8> {
        self.outbound.drain()
    }

    /// Signal end of stream to the host
    pub fn hang_up(&self) {
        self.inbound.close();
    }

    /// Whether the host closed the transport
    pub fn is_closed(&self) -> bool {
        self.outbound.is_closed()
    }
}

impl std::fmt::Debug for DeviceEnd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceEnd")
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Transport that reads end-of-stream and records writes
#[derive(Debug, Default)]
pub struct NullTransport {
    writes: Mutex<Vec<Vec<u8>>>,
    close_error: Option<String>,
    closed: AtomicBool,
}

impl NullTransport {
    /// Create a transport whose close succeeds
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a transport whose close fails with `message`
    pub fn with_close_error(message: impl Into<String>) -> Self {
        Self {
            close_error: Some(message.into()),
            ..Self::default()
        }
    }

    /// Every write so far, one entry per call
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.writes.lock().clone()
    }

    /// Every written byte so far
    pub fn written(&self) -> Vec<u8> {
        self.writes.lock().concat()
    }

    /// Forget recorded writes
    pub fn clear(&self) {
        self.writes.lock().clear();
    }

    /// Whether `close` was called
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Transport for NullTransport {
    fn read(&self, _buf: &mut [u8]) -> io::Result<usize> {
        Ok(0)
    }

    fn write(&self, data: &[u8]) -> io::Result<usize> {
        self.writes.lock().push(data.to_vec());
        Ok(data.len())
    }

    fn close(&self) -> io::Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        match &self.close_error {
            Some(message) => Err(io::Error::other(message.clone())),
            None => Ok(()),
        }
    }

    fn name(&self) -> String {
        "null".to_string()
    }
}
