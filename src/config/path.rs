//! Module for locating the OpenArcade device registry

use std::path::PathBuf;

/// Registry location used if one cannot be found with XDG
const FALLBACK_REGISTRY_PATH: &str = "/etc/openarcade/config.json";

/// File name of the device registry
const REGISTRY_FILE_NAME: &str = "config.json";

/// Returns the path of the device registry (e.g. "~/.config/openarcade/config.json")
pub fn get_registry_path() -> PathBuf {
    let Ok(base_dirs) = xdg::BaseDirectories::with_prefix("openarcade") else {
        log::warn!("Unable to determine config base path. Using fallback path.");
        return PathBuf::from(FALLBACK_REGISTRY_PATH);
    };

    base_dirs.get_config_home().join(REGISTRY_FILE_NAME)
}
