use mac_address::MacAddress;
use tokio::sync::watch;

use crate::messages::Presence;

/// One tracked device. The writing half of the state cell lives here, and the
/// handle is owned by exactly one monitor loop; every other component reads
/// through [`DeviceRegistry::snapshot`].
#[derive(Debug)]
pub struct DeviceHandle {
    pub name: String,
    pub address: MacAddress,
    state: watch::Sender<Presence>,
}

impl DeviceHandle {
    pub fn set_state(&self, state: Presence) {
        self.state.send_replace(state);
    }

    pub fn state(&self) -> Presence {
        *self.state.borrow()
    }
}

/// Read-only view of a device at the moment the snapshot was taken.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceSnapshot {
    pub name: String,
    pub address: MacAddress,
    pub state: Presence,
}

/// Device list partitioned by address. Registration hands out the single
/// writable handle per device; the registry itself only ever reads.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    entries: Vec<(String, MacAddress, watch::Receiver<Presence>)>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        DeviceRegistry::default()
    }

    /// Devices start out away until their loop observes otherwise.
    pub fn register(&mut self, name: String, address: MacAddress) -> DeviceHandle {
        let (tx, rx) = watch::channel(Presence::NotHome);
        self.entries.push((name.clone(), address, rx));
        DeviceHandle {
            name,
            address,
            state: tx,
        }
    }

    pub fn snapshot(&self) -> Vec<DeviceSnapshot> {
        self.entries
            .iter()
            .map(|(name, address, rx)| DeviceSnapshot {
                name: name.clone(),
                address: *address,
                state: *rx.borrow(),
            })
            .collect()
    }
}
