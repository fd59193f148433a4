pub mod path;


use std::{
    collections::BTreeMap,
    fs, io,
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard, PoisonError},
    time::SystemTime,
};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

/// Version of the registry document layout
pub const SCHEMA_VERSION: u32 = 1;
/// Mode selected for newly registered devices
pub const DEFAULT_MODE: &str = "keyboard";
/// Modes every device entry is guaranteed to have, with their output kind
pub const BUILTIN_MODES: [(&str, &str); 2] =
    [("keyboard", "hid_keyboard"), ("gamepad", "hid_gamepad")];

/// Represents all possible errors persisting the device registry
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not write: {0}")]
    IoError(#[from] io::Error),
    #[error("Unable to serialize: {0}")]
    SerializeError(#[from] serde_json::Error),
}

/// The persisted registry of known devices
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(from = "RawDocument")]
pub struct RegistryDocument {
    pub schema_version: u32,
    pub devices: BTreeMap<String, DeviceEntry>,
    /// Device entries that could not be read. They are written back as-is.
    #[serde(skip)]
    pub unreadable: BTreeMap<String, Value>,
}

impl Default for RegistryDocument {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            devices: BTreeMap::new(),
            unreadable: BTreeMap::new(),
        }
    }
}

/// Registry document as found on disk, before device entries are checked
#[derive(Deserialize)]
struct RawDocument {
    #[serde(default)]
    schema_version: Value,
    #[serde(default, deserialize_with = "null_as_default")]
    devices: BTreeMap<String, Value>,
}

impl From<RawDocument> for RegistryDocument {
    fn from(raw: RawDocument) -> Self {
        let schema_version = raw
            .schema_version
            .as_u64()
            .and_then(|version| u32::try_from(version).ok())
            .unwrap_or(SCHEMA_VERSION);
        let mut devices = BTreeMap::new();
        let mut unreadable = BTreeMap::new();
        for (device_id, value) in raw.devices {
            match DeviceEntry::deserialize(&value) {
                Ok(entry) => {
                    devices.insert(device_id, entry);
                }
                Err(e) => {
                    log::warn!("Keeping unreadable registry entry {device_id} unchanged: {e}");
                    unreadable.insert(device_id, value);
                }
            }
        }
        Self {
            schema_version,
            devices,
            unreadable,
        }
    }
}

/// Everything remembered about a single peripheral
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct DeviceEntry {
    #[serde(default, deserialize_with = "null_as_default")]
    pub device_id: String,
    #[serde(default)]
    pub last_seen: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub connected: bool,
    /// Decoded capability descriptor, if the device reported one
    #[serde(default)]
    pub descriptor: Option<Value>,
    #[serde(default = "default_mode", deserialize_with = "mode_or_default")]
    pub active_mode: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub modes: BTreeMap<String, ModeConfig>,
    /// Layout data owned by the configuration UI
    #[serde(default = "default_ui", deserialize_with = "ui_or_default")]
    pub ui: Value,
    /// Fields written by other tools are kept as-is
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl DeviceEntry {
    /// Create the entry for a device seen for the first time
    pub fn new(device_id: &str) -> Self {
        let mut entry = Self {
            device_id: device_id.to_string(),
            last_seen: None,
            connected: false,
            descriptor: None,
            active_mode: default_mode(),
            modes: BTreeMap::new(),
            ui: default_ui(),
            extra: BTreeMap::new(),
        };
        entry.ensure_modes();
        entry
    }

    /// Re-add any missing built-in mode
    fn ensure_modes(&mut self) {
        for (name, output) in BUILTIN_MODES {
            self.modes
                .entry(name.to_string())
                .or_insert_with(|| ModeConfig::new(output));
        }
    }

    /// The mapping table of the active mode
    pub fn active_mapping(&self) -> Option<&BTreeMap<String, Value>> {
        self.modes.get(&self.active_mode).map(|mode| &mode.mapping)
    }
}

/// Output kind and control mapping of one mode
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
#[serde(rename_all = "snake_case")]
pub struct ModeConfig {
    /// Output kind, `null` for modes created without one
    #[serde(default)]
    pub output: Option<String>,
    /// Control id to keycode spec
    #[serde(default, deserialize_with = "null_as_default")]
    pub mapping: BTreeMap<String, Value>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl ModeConfig {
    pub fn new(output: &str) -> Self {
        Self {
            output: Some(output.to_string()),
            ..Default::default()
        }
    }
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

fn default_mode() -> String {
    DEFAULT_MODE.to_string()
}

fn default_ui() -> Value {
    json!({ "layout": {} })
}

/// Treat an explicit `null` like a missing field
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn mode_or_default<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let mode = Option::<String>::deserialize(deserializer)?;
    Ok(mode.filter(|mode| !mode.is_empty()).unwrap_or_else(default_mode))
}

fn ui_or_default<'de, D>(deserializer: D) -> Result<Value, D::Error>
where
    D: Deserializer<'de>,
{
    let ui = Value::deserialize(deserializer)?;
    Ok(if ui.is_null() { default_ui() } else { ui })
}

/// Current time as an RFC 3339 UTC timestamp
pub fn timestamp() -> Option<String> {
    match OffsetDateTime::now_utc().format(&Rfc3339) {
        Ok(value) => Some(value),
        Err(e) => {
            log::warn!("Unable to format timestamp: {e:?}");
            None
        }
    }
}

/// Thread-safe, file-backed device registry. Every operation takes the same
/// lock, and getters hand out owned copies so callers never observe a
/// document while it is being mutated.
#[derive(Debug)]
pub struct ConfigStore {
    path: PathBuf,
    document: Mutex<RegistryDocument>,
}

impl ConfigStore {
    /// Create a store backed by the given file. Nothing is read until
    /// [ConfigStore::load] is called.
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            document: Mutex::new(RegistryDocument::default()),
        }
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    /// Modification time of the backing file, if it exists
    pub fn modified(&self) -> Option<SystemTime> {
        fs::metadata(&self.path).and_then(|m| m.modified()).ok()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryDocument> {
        self.document.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the in-memory document with the contents of the backing file.
    /// A missing or unreadable file yields an empty registry.
    pub fn load(&self) -> RegistryDocument {
        let mut document = self.read_document();
        for (device_id, entry) in document.devices.iter_mut() {
            if entry.device_id.is_empty() {
                entry.device_id = device_id.clone();
            }
            entry.ensure_modes();
        }

        let mut guard = self.lock();
        *guard = document;
        guard.clone()
    }

    fn read_document(&self) -> RegistryDocument {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::debug!("No registry at {:?}, starting empty", self.path);
                return RegistryDocument::default();
            }
            Err(e) => {
                log::warn!("Unable to read registry {:?}: {e}", self.path);
                return RegistryDocument::default();
            }
        };
        match serde_json::from_str(&content) {
            Ok(document) => document,
            Err(e) => {
                log::warn!("Registry {:?} is corrupt, starting empty: {e}", self.path);
                RegistryDocument::default()
            }
        }
    }

    /// Write the document to a temporary file and atomically rename it over
    /// the backing file.
    pub fn save(&self) -> Result<(), ConfigError> {
        let guard = self.lock();

        // Going through a Value sorts every object by key
        let mut value = serde_json::to_value(&*guard)?;
        if let Some(devices) = value.get_mut("devices").and_then(Value::as_object_mut) {
            for (device_id, entry) in guard.unreadable.iter() {
                devices
                    .entry(device_id.clone())
                    .or_insert_with(|| entry.clone());
            }
        }
        let mut content = serde_json::to_string_pretty(&value)?;
        content.push('\n');

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut tmp_path = self.path.clone().into_os_string();
        tmp_path.push(".tmp");
        let tmp_path = PathBuf::from(tmp_path);
        fs::write(&tmp_path, content)?;
        fs::rename(&tmp_path, &self.path)?;
        log::trace!("Saved registry to {:?}", self.path);

        Ok(())
    }

    /// Returns a copy of the whole registry
    pub fn get_all(&self) -> RegistryDocument {
        self.lock().clone()
    }

    /// Returns a copy of the entry for the given device
    pub fn get_device(&self, device_id: &str) -> Option<DeviceEntry> {
        self.lock().devices.get(device_id).cloned()
    }

    /// Apply the given update to a device entry, creating the entry first if
    /// the device is unknown. Returns a copy of the updated entry.
    pub fn upsert_device<F>(&self, device_id: &str, update: F) -> DeviceEntry
    where
        F: FnOnce(&mut DeviceEntry),
    {
        let mut guard = self.lock();
        if guard.unreadable.remove(device_id).is_some() {
            log::warn!("Replacing unreadable registry entry {device_id}");
        }
        let entry = guard
            .devices
            .entry(device_id.to_string())
            .or_insert_with(|| DeviceEntry::new(device_id));
        update(entry);
        entry.clone()
    }

    pub fn set_descriptor(&self, device_id: &str, descriptor: Value) -> DeviceEntry {
        self.upsert_device(device_id, |entry| entry.descriptor = Some(descriptor))
    }

    pub fn set_active_mode(&self, device_id: &str, mode: &str) -> DeviceEntry {
        self.upsert_device(device_id, |entry| entry.active_mode = mode.to_string())
    }

    /// Map a control to a keycode spec in the given mode. The mode is
    /// created if it does not exist yet.
    pub fn set_mapping(
        &self,
        device_id: &str,
        mode: &str,
        control_id: &str,
        mapping: Value,
    ) -> DeviceEntry {
        self.upsert_device(device_id, |entry| {
            entry
                .modes
                .entry(mode.to_string())
                .or_default()
                .mapping
                .insert(control_id.to_string(), mapping);
        })
    }

    /// Record the link state of a device. Connecting also refreshes the
    /// last seen time.
    pub fn set_connected(&self, device_id: &str, connected: bool) -> DeviceEntry {
        self.upsert_device(device_id, |entry| {
            entry.connected = connected;
            if connected {
                entry.last_seen = timestamp();
            }
        })
    }

    pub fn set_last_seen(&self, device_id: &str) -> DeviceEntry {
        self.upsert_device(device_id, |entry| entry.last_seen = timestamp())
    }
}
