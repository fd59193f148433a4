//! HID keyboard usage codes and the tables used to resolve them.
use std::collections::{BTreeMap, HashMap};

pub const KEY_A: u8 = 0x04;
pub const KEY_B: u8 = 0x05;
pub const KEY_C: u8 = 0x06;
pub const KEY_D: u8 = 0x07;
pub const KEY_E: u8 = 0x08;
pub const KEY_F: u8 = 0x09;
pub const KEY_G: u8 = 0x0A;
pub const KEY_H: u8 = 0x0B;
pub const KEY_ENTER: u8 = 0x28;
pub const KEY_SPACE: u8 = 0x2C;
pub const KEY_RIGHT: u8 = 0x4F;
pub const KEY_LEFT: u8 = 0x50;
pub const KEY_DOWN: u8 = 0x51;
pub const KEY_UP: u8 = 0x52;

pub const KEY_LEFT_CONTROL: u8 = 0xE0;
pub const KEY_LEFT_SHIFT: u8 = 0xE1;
pub const KEY_LEFT_ALT: u8 = 0xE2;
pub const KEY_LEFT_GUI: u8 = 0xE3;
pub const KEY_RIGHT_CONTROL: u8 = 0xE4;
pub const KEY_RIGHT_SHIFT: u8 = 0xE5;
pub const KEY_RIGHT_ALT: u8 = 0xE6;
pub const KEY_RIGHT_GUI: u8 = 0xE7;

/// Modifier key codes and their bit in the report modifier byte
const MODIFIERS: [(u8, u8); 8] = [
    (KEY_LEFT_CONTROL, 0x01),
    (KEY_LEFT_SHIFT, 0x02),
    (KEY_LEFT_ALT, 0x04),
    (KEY_LEFT_GUI, 0x08),
    (KEY_RIGHT_CONTROL, 0x10),
    (KEY_RIGHT_SHIFT, 0x20),
    (KEY_RIGHT_ALT, 0x40),
    (KEY_RIGHT_GUI, 0x80),
];

/// Built-in bit index to key code mapping. Bits 0 and 1 both produce `B`.
const DEFAULT_MAPPING: [(u8, u8); 14] = [
    (0, KEY_B),
    (1, KEY_B),
    (2, KEY_C),
    (3, KEY_D),
    (4, KEY_E),
    (5, KEY_F),
    (6, KEY_G),
    (7, KEY_H),
    (8, KEY_LEFT),
    (9, KEY_RIGHT),
    (10, KEY_UP),
    (11, KEY_DOWN),
    (12, KEY_SPACE),
    (13, KEY_ENTER),
];

/// Symbolic names accepted in mapping configuration
const KEY_NAMES: &[(&str, u8)] = &[
    ("HID_KEY_A", KEY_A),
    ("HID_KEY_B", KEY_B),
    ("HID_KEY_C", KEY_C),
    ("HID_KEY_D", KEY_D),
    ("HID_KEY_E", KEY_E),
    ("HID_KEY_F", KEY_F),
    ("HID_KEY_G", KEY_G),
    ("HID_KEY_H", KEY_H),
    ("HID_KEY_I", 0x0C),
    ("HID_KEY_J", 0x0D),
    ("HID_KEY_K", 0x0E),
    ("HID_KEY_L", 0x0F),
    ("HID_KEY_M", 0x10),
    ("HID_KEY_N", 0x11),
    ("HID_KEY_O", 0x12),
    ("HID_KEY_P", 0x13),
    ("HID_KEY_Q", 0x14),
    ("HID_KEY_R", 0x15),
    ("HID_KEY_S", 0x16),
    ("HID_KEY_T", 0x17),
    ("HID_KEY_U", 0x18),
    ("HID_KEY_V", 0x19),
    ("HID_KEY_W", 0x1A),
    ("HID_KEY_X", 0x1B),
    ("HID_KEY_Y", 0x1C),
    ("HID_KEY_Z", 0x1D),
    ("HID_KEY_1", 0x1E),
    ("HID_KEY_2", 0x1F),
    ("HID_KEY_3", 0x20),
    ("HID_KEY_4", 0x21),
    ("HID_KEY_5", 0x22),
    ("HID_KEY_6", 0x23),
    ("HID_KEY_7", 0x24),
    ("HID_KEY_8", 0x25),
    ("HID_KEY_9", 0x26),
    ("HID_KEY_0", 0x27),
    ("HID_KEY_ENTER", KEY_ENTER),
    ("HID_KEY_ESCAPE", 0x29),
    ("HID_KEY_BACKSPACE", 0x2A),
    ("HID_KEY_TAB", 0x2B),
    ("HID_KEY_SPACE", KEY_SPACE),
    ("HID_KEY_MINUS", 0x2D),
    ("HID_KEY_EQUAL", 0x2E),
    ("HID_KEY_BRACKET_LEFT", 0x2F),
    ("HID_KEY_BRACKET_RIGHT", 0x30),
    ("HID_KEY_BACKSLASH", 0x31),
    ("HID_KEY_SEMICOLON", 0x33),
    ("HID_KEY_APOSTROPHE", 0x34),
    ("HID_KEY_GRAVE", 0x35),
    ("HID_KEY_COMMA", 0x36),
    ("HID_KEY_PERIOD", 0x37),
    ("HID_KEY_SLASH", 0x38),
    ("HID_KEY_CAPS_LOCK", 0x39),
    ("HID_KEY_F1", 0x3A),
    ("HID_KEY_F2", 0x3B),
    ("HID_KEY_F3", 0x3C),
    ("HID_KEY_F4", 0x3D),
    ("HID_KEY_F5", 0x3E),
    ("HID_KEY_F6", 0x3F),
    ("HID_KEY_F7", 0x40),
    ("HID_KEY_F8", 0x41),
    ("HID_KEY_F9", 0x42),
    ("HID_KEY_F10", 0x43),
    ("HID_KEY_F11", 0x44),
    ("HID_KEY_F12", 0x45),
    ("HID_KEY_PRINT_SCREEN", 0x46),
    ("HID_KEY_SCROLL_LOCK", 0x47),
    ("HID_KEY_PAUSE", 0x48),
    ("HID_KEY_INSERT", 0x49),
    ("HID_KEY_HOME", 0x4A),
    ("HID_KEY_PAGE_UP", 0x4B),
    ("HID_KEY_DELETE", 0x4C),
    ("HID_KEY_END", 0x4D),
    ("HID_KEY_PAGE_DOWN", 0x4E),
    ("HID_KEY_RIGHT", KEY_RIGHT),
    ("HID_KEY_LEFT", KEY_LEFT),
    ("HID_KEY_DOWN", KEY_DOWN),
    ("HID_KEY_UP", KEY_UP),
    ("HID_KEY_LEFT_CONTROL", KEY_LEFT_CONTROL),
    ("HID_KEY_LEFT_SHIFT", KEY_LEFT_SHIFT),
    ("HID_KEY_LEFT_ALT", KEY_LEFT_ALT),
    ("HID_KEY_LEFT_GUI", KEY_LEFT_GUI),
    ("HID_KEY_RIGHT_CONTROL", KEY_RIGHT_CONTROL),
    ("HID_KEY_RIGHT_SHIFT", KEY_RIGHT_SHIFT),
    ("HID_KEY_RIGHT_ALT", KEY_RIGHT_ALT),
    ("HID_KEY_RIGHT_GUI", KEY_RIGHT_GUI),
];

/// Immutable lookup tables for key codes, built once at startup and shared
/// between the mapping resolver, the aggregator and the output sink.
#[derive(Debug, Clone)]
pub struct KeycodeTable {
    by_name: HashMap<&'static str, u8>,
    names: HashMap<u8, &'static str>,
    modifiers: HashMap<u8, u8>,
    default_mapping: BTreeMap<u8, u8>,
}

impl Default for KeycodeTable {
    fn default() -> Self {
        Self::new()
    }
}

impl KeycodeTable {
    pub fn new() -> Self {
        let by_name = KEY_NAMES.iter().copied().collect();
        let names = KEY_NAMES.iter().map(|(name, code)| (*code, *name)).collect();
        Self {
            by_name,
            names,
            modifiers: MODIFIERS.into_iter().collect(),
            default_mapping: DEFAULT_MAPPING.into_iter().collect(),
        }
    }

    /// Look up a key code by its symbolic name (e.g. "HID_KEY_A")
    pub fn lookup(&self, name: &str) -> Option<u8> {
        self.by_name.get(name).copied()
    }

    /// Returns the symbolic name of the given key code
    pub fn name_of(&self, code: u8) -> Option<&'static str> {
        self.names.get(&code).copied()
    }

    /// Returns the modifier byte bit for modifier key codes
    pub fn modifier_bit(&self, code: u8) -> Option<u8> {
        self.modifiers.get(&code).copied()
    }

    /// The built-in bit index to key code mapping
    pub fn default_mapping(&self) -> &BTreeMap<u8, u8> {
        &self.default_mapping
    }
}
