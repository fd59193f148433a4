//! Resolves per-device control mappings into bit index to key code tables.
use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
    time::SystemTime,
};

use serde_json::Value;

use crate::{
    config::{ConfigStore, DeviceEntry, DEFAULT_MODE},
    drivers::openarcade::descriptor::{ControlDescriptor, DeviceDescriptor},
};

use super::keycode::KeycodeTable;

/// Bit index to key code
pub type Mapping = BTreeMap<u8, u8>;

/// A keycode as written in the mapping configuration
#[derive(Debug, Clone, PartialEq)]
pub enum KeycodeSpec {
    /// Numeric key code
    Code(u64),
    /// `{"keycode": ...}` wrapper around another spec
    Wrapped(Box<KeycodeSpec>),
    /// Symbolic name, hexadecimal ("0x..") or decimal string
    Text(String),
    Unsupported,
}

impl From<&Value> for KeycodeSpec {
    fn from(value: &Value) -> Self {
        match value {
            Value::Number(number) => match number.as_u64() {
                Some(code) => KeycodeSpec::Code(code),
                None => KeycodeSpec::Unsupported,
            },
            Value::Object(map) => match map.get("keycode") {
                Some(inner @ (Value::Number(_) | Value::String(_))) => {
                    KeycodeSpec::Wrapped(Box::new(KeycodeSpec::from(inner)))
                }
                _ => KeycodeSpec::Unsupported,
            },
            Value::String(text) => KeycodeSpec::Text(text.clone()),
            _ => KeycodeSpec::Unsupported,
        }
    }
}

impl KeycodeSpec {
    /// Resolve the spec into a key code. Values that do not fit a key code
    /// are unresolved.
    pub fn resolve(&self, keycodes: &KeycodeTable) -> Option<u8> {
        match self {
            KeycodeSpec::Code(code) => u8::try_from(*code).ok(),
            KeycodeSpec::Wrapped(inner) => inner.resolve(keycodes),
            KeycodeSpec::Text(text) => {
                if let Some(code) = keycodes.lookup(text) {
                    return Some(code);
                }
                if let Some(hex) = text.strip_prefix("0x") {
                    if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
                        return None;
                    }
                    return u8::from_str_radix(hex, 16).ok();
                }
                if !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit()) {
                    return text.parse::<u8>().ok();
                }
                None
            }
            KeycodeSpec::Unsupported => None,
        }
    }
}

/// Resolve a single mapping entry into a key code
pub fn resolve_keycode(entry: &Value, keycodes: &KeycodeTable) -> Option<u8> {
    KeycodeSpec::from(entry).resolve(keycodes)
}

/// Mapping key for a control id as found in a descriptor
fn control_key(id: &Value) -> Option<String> {
    match id {
        Value::Number(number) => Some(number.to_string()),
        Value::String(text) => Some(text.clone()),
        _ => None,
    }
}

/// Build the bit index to key code table for one device. Controls come from
/// the device's stored descriptor, or the given defaults when it has none.
/// Bits without a usable mapping entry keep their default key code.
pub fn resolve_mapping(
    entry: &DeviceEntry,
    default_controls: &[ControlDescriptor],
    keycodes: &KeycodeTable,
) -> Mapping {
    let mode = if entry.active_mode.is_empty() {
        DEFAULT_MODE
    } else {
        entry.active_mode.as_str()
    };
    let empty = BTreeMap::new();
    let mapping_cfg = entry
        .modes
        .get(mode)
        .map(|mode| &mode.mapping)
        .unwrap_or(&empty);

    // (control id key, bit index) for every control with a bit position
    let stored_controls = entry
        .descriptor
        .as_ref()
        .and_then(|descriptor| descriptor.get("controls"))
        .and_then(Value::as_array)
        .filter(|controls| !controls.is_empty());
    let controls: Vec<(Option<String>, u8)> = match stored_controls {
        Some(controls) => controls
            .iter()
            .filter_map(|control| {
                let bit = control.get("bit_index")?.as_u64()?;
                let bit = u8::try_from(bit).ok()?;
                let key = control.get("id").and_then(control_key);
                Some((key, bit))
            })
            .collect(),
        None => default_controls
            .iter()
            .filter_map(|control| Some((Some(control.id.to_string()), control.bit_index?)))
            .collect(),
    };

    let defaults = keycodes.default_mapping();
    let mut mapping = Mapping::new();
    for (key, bit) in controls {
        let resolved = key
            .and_then(|key| mapping_cfg.get(&key))
            .and_then(|value| resolve_keycode(value, keycodes));
        match resolved {
            Some(code) => {
                mapping.insert(bit, code);
            }
            None => {
                if let Some(code) = defaults.get(&bit) {
                    mapping.insert(bit, *code);
                }
            }
        }
    }
    for (bit, code) in defaults.iter() {
        mapping.entry(*bit).or_insert(*code);
    }

    mapping
}

/// Per-device resolved mappings, rebuilt whenever the registry file changes
/// on disk.
#[derive(Debug)]
pub struct MappingCache {
    store: Arc<ConfigStore>,
    keycodes: Arc<KeycodeTable>,
    default_controls: Vec<ControlDescriptor>,
    mappings: HashMap<String, Mapping>,
    mtime: Option<SystemTime>,
}

impl MappingCache {
    /// Create a cache from the store's current in-memory document
    pub fn new(store: Arc<ConfigStore>, keycodes: Arc<KeycodeTable>) -> Self {
        let mut cache = Self {
            store,
            keycodes,
            default_controls: DeviceDescriptor::default_controls(),
            mappings: HashMap::new(),
            mtime: None,
        };
        cache.rebuild();
        cache
    }

    fn rebuild(&mut self) {
        let document = self.store.get_all();
        self.mappings = document
            .devices
            .iter()
            .map(|(device_id, entry)| {
                let mapping = resolve_mapping(entry, &self.default_controls, &self.keycodes);
                (device_id.clone(), mapping)
            })
            .collect();
    }

    /// Reload the registry and rebuild every mapping if the backing file
    /// changed since the last build. Returns false when nothing changed.
    pub fn refresh(&mut self) -> bool {
        let mtime = self.store.modified();
        if mtime == self.mtime {
            return false;
        }
        log::debug!("Registry changed, rebuilding mappings");
        self.store.load();
        self.rebuild();
        self.mtime = mtime;
        true
    }

    /// Rebuild every mapping from the store's in-memory document. Used after
    /// changes made in this process, which may not move the file's
    /// modification time or may not have reached the file at all.
    pub fn invalidate(&mut self) {
        self.rebuild();
    }

    /// The resolved mapping for the given device. Unknown devices use the
    /// default mapping.
    pub fn get(&self, device_id: &str) -> &Mapping {
        self.mappings
            .get(device_id)
            .unwrap_or(self.keycodes.default_mapping())
    }

    pub fn keycodes(&self) -> &KeycodeTable {
        &self.keycodes
    }
}
