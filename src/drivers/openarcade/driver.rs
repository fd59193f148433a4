use uuid::Uuid;

use super::hid_report::STATE_REPORT_SIZE;

// Advertised local name of OpenArcade peripherals
pub const DEVICE_NAME: &str = "NimBLE_GATT";

// GATT identifiers
pub const SERVICE_UUID: Uuid = Uuid::from_u128(0x666f7065_6e61_7263_6164_650000000001);
pub const STATE_CHAR_UUID: Uuid = Uuid::from_u128(0x666f7065_6e61_7263_6164_650000000002);
pub const INFO_CHAR_UUID: Uuid = Uuid::from_u128(0x666f7065_6e61_7263_6164_650000000003);

/// Decode the bitmask carried by a state notification. Payloads shorter
/// than a full report are rejected; extra trailing bytes are ignored.
pub fn decode_state(data: &[u8]) -> Option<u32> {
    let bytes: [u8; STATE_REPORT_SIZE] = data.get(..STATE_REPORT_SIZE)?.try_into().ok()?;
    Some(u32::from_le_bytes(bytes))
}

/// Tracks the input state of a single connected peripheral
#[derive(Debug, Default)]
pub struct Driver {
    state: u32,
}

impl Driver {
    pub fn new() -> Self {
        Self::default()
    }

    /// The last reported bitmask
    pub fn state(&self) -> u32 {
        self.state
    }

    /// Handle a state notification. Returns the new bitmask only when it
    /// differs from the current one.
    pub fn handle_notification(&mut self, data: &[u8]) -> Option<u32> {
        let Some(state) = decode_state(data) else {
            log::trace!("Ignoring short state notification: {data:02x?}");
            return None;
        };
        if state == self.state {
            return None;
        }
        self.state = state;
        Some(state)
    }
}
