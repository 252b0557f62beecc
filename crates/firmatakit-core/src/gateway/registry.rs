//! Device lookup for the streaming gateway.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::event_bus::Event;

/// Capability of a device that exposes named event streams
///
/// The gateway needs nothing else from a device.
pub trait Eventer: Send + Sync {
    /// Look up an advertised event stream, `None` if the device has no such event
    fn event(&self, name: &str) -> Option<Event>;

    /// Names of all advertised events, sorted
    fn event_names(&self) -> Vec<String>;
}

/// Devices reachable by the gateway, keyed by owner and device name
#[derive(Default)]
pub struct DeviceRegistry {
    devices: RwLock<HashMap<(String, String), Arc<dyn Eventer>>>,
}

impl DeviceRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a device, returning the one it replaced
    pub fn register(
        &self,
        owner: impl Into<String>,
        device: impl Into<String>,
        eventer: Arc<dyn Eventer>,
    ) -> Option<Arc<dyn Eventer>> {
        let key = (owner.into(), device.into());
        tracing::debug!("Registering device {}/{}", key.0, key.1);
        self.devices.write().insert(key, eventer)
    }

    /// Remove a device
    pub fn remove(&self, owner: &str, device: &str) -> Option<Arc<dyn Eventer>> {
        self.devices
            .write()
            .remove(&(owner.to_string(), device.to_string()))
    }

    /// Look up a device
    pub fn lookup(&self, owner: &str, device: &str) -> Option<Arc<dyn Eventer>> {
        self.devices
            .read()
            .get(&(owner.to_string(), device.to_string()))
            .cloned()
    }

    /// Names of the devices registered under `owner`, sorted
    pub fn devices(&self, owner: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .devices
            .read()
            .keys()
            .filter(|(o, _)| o == owner)
            .map(|(_, d)| d.clone())
            .collect();
        names.sort();
        names
    }
}

impl std::fmt::Debug for DeviceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceRegistry")
            .field("devices", &self.devices.read().len())
            .finish()
    }
}
