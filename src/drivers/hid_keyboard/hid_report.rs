//! USB boot keyboard input report written to the HID gadget.
use packed_struct::prelude::*;

/// Size of the boot keyboard input report
pub const KEYBOARD_REPORT_SIZE: usize = 8;
/// Number of simultaneous non-modifier keys in a report
pub const MAX_KEYS: usize = 6;

// Keyboard Input Report
//
// modifiers | reserved | key 1 | key 2 | key 3 | key 4 | key 5 | key 6
// 00          00         05      28      00      00      00      00
#[derive(PackedStruct, Debug, Copy, Clone, PartialEq, Eq, Default)]
#[packed_struct(bit_numbering = "msb0", size_bytes = "8")]
pub struct KeyboardReport {
    // BYTE 0
    #[packed_field(bytes = "0")]
    pub modifiers: u8,
    // BYTE 1
    #[packed_field(bytes = "1")]
    pub reserved: u8,
    // BYTE 2-7
    #[packed_field(bytes = "2..=7")]
    pub keys: [u8; 6],
}

impl KeyboardReport {
    /// Non-zero key codes in the report
    pub fn pressed_keys(&self) -> impl Iterator<Item = u8> + '_ {
        self.keys.iter().copied().filter(|key| *key != 0)
    }
}
