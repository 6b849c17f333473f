use serde::Serialize;

/// RSSI marker reported when a device was not observed this cycle.
pub const ABSENT_RSSI: i32 = -99;

/// Presence state derived from an RSSI sample.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Presence {
    Home,
    NotHome,
}

/// Payload published on every classification. The field names are the wire
/// contract; `id` and `name` both carry the device name so consumers can key
/// on either.
#[derive(Clone, Debug, Serialize)]
pub struct PresenceEvent {
    pub id: String,
    pub name: String,
    pub state: Presence,
    pub rssi: i32,
}

impl PresenceEvent {
    pub fn new(device_name: &str, state: Presence, rssi: i32) -> Self {
        PresenceEvent {
            id: device_name.to_string(),
            name: device_name.to_string(),
            state,
            rssi,
        }
    }
}
