//! Line-oriented JSON configuration service on the USB serial gadget. Each
//! request is one JSON object per line and gets exactly one reply line.
#[cfg(test)]
mod daemon_test;

use std::{error::Error, path::Path};

use log::Level;
use serde_json::{json, Map, Value};
use tokio::{
    fs::OpenOptions,
    io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader},
};

use crate::config::ConfigStore;

type Request = Map<String, Value>;

fn failure(error: &str) -> Value {
    json!({"ok": false, "error": error})
}

/// Returns the field as a non-empty string
fn required_str<'a>(request: &'a Request, field: &str) -> Option<&'a str> {
    request
        .get(field)
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
}

/// Returns the field unless it is absent or null
fn required_value<'a>(request: &'a Request, field: &str) -> Option<&'a Value> {
    request.get(field).filter(|value| !value.is_null())
}

fn save(store: &ConfigStore) -> Value {
    match store.save() {
        Ok(()) => json!({"ok": true}),
        Err(e) => {
            log::error!("Unable to save device registry: {e}");
            failure("save_failed")
        }
    }
}

/// Execute a single request against the store and return the reply
pub fn handle_command(store: &ConfigStore, request: &Value) -> Value {
    let Some(request) = request.as_object() else {
        return failure("missing_cmd");
    };
    let cmd = match request.get("cmd") {
        None | Some(Value::Null) => return failure("missing_cmd"),
        Some(Value::String(cmd)) if cmd.is_empty() => return failure("missing_cmd"),
        Some(Value::String(cmd)) => cmd.as_str(),
        Some(_) => return failure("unknown_cmd"),
    };

    match cmd {
        "ping" => json!({"ok": true, "reply": "pong"}),
        "list_devices" => {
            let document = store.get_all();
            json!({"ok": true, "devices": document.devices})
        }
        "get_device" => {
            let Some(device_id) = required_str(request, "device_id") else {
                return failure("missing_device_id");
            };
            json!({"ok": true, "device": store.get_device(device_id)})
        }
        "set_descriptor" => {
            let (Some(device_id), Some(descriptor)) = (
                required_str(request, "device_id"),
                required_value(request, "descriptor"),
            ) else {
                return failure("missing_fields");
            };
            store.set_descriptor(device_id, descriptor.clone());
            save(store)
        }
        "set_mapping" => {
            let (Some(device_id), Some(mode), Some(control_id), Some(mapping)) = (
                required_str(request, "device_id"),
                required_str(request, "mode"),
                required_value(request, "control_id"),
                required_value(request, "mapping"),
            ) else {
                return failure("missing_fields");
            };
            // Control ids are always stored as strings
            let control_id = match control_id {
                Value::String(id) => id.clone(),
                other => other.to_string(),
            };
            store.set_mapping(device_id, mode, &control_id, mapping.clone());
            save(store)
        }
        "set_active_mode" => {
            let (Some(device_id), Some(mode)) = (
                required_str(request, "device_id"),
                required_str(request, "mode"),
            ) else {
                return failure("missing_fields");
            };
            store.set_active_mode(device_id, mode);
            save(store)
        }
        "set_last_seen" => {
            let Some(device_id) = required_str(request, "device_id") else {
                return failure("missing_device_id");
            };
            store.set_last_seen(device_id);
            save(store)
        }
        _ => failure("unknown_cmd"),
    }
}

async fn write_reply<W>(writer: &mut W, reply: &Value) -> Result<(), Box<dyn Error + Send + Sync>>
where
    W: AsyncWrite + Unpin,
{
    let mut line = serde_json::to_string(reply)?;
    line.push('\n');
    writer.write_all(line.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

/// Answer requests read from `reader` until end of input. The store is
/// reloaded before every request so edits made by the bridge are visible.
pub async fn serve<R, W>(
    store: &ConfigStore,
    mut reader: R,
    mut writer: W,
    verbose: bool,
) -> Result<(), Box<dyn Error + Send + Sync>>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let level = if verbose { Level::Info } else { Level::Debug };
    let mut buf = Vec::new();
    loop {
        buf.clear();
        let read = reader.read_until(b'\n', &mut buf).await?;
        // A line cut off by end of input is dropped
        if read == 0 || buf.last() != Some(&b'\n') {
            log::log!(level, "Serial connection closed");
            break;
        }
        let line = String::from_utf8_lossy(&buf);
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let request: Value = match serde_json::from_str(line) {
            Ok(request) => request,
            Err(e) => {
                log::log!(level, "Invalid JSON received: {e}");
                write_reply(&mut writer, &failure("invalid_json")).await?;
                continue;
            }
        };
        store.load();
        log::log!(level, "Received: {request}");
        let reply = handle_command(store, &request);
        log::log!(level, "Responding: {reply}");
        write_reply(&mut writer, &reply).await?;
    }

    Ok(())
}

/// Serve configuration requests on the given serial device. Failing to open
/// the device is an error.
pub async fn run<P: AsRef<Path>>(
    device: P,
    store: &ConfigStore,
    verbose: bool,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let device = device.as_ref();
    store.load();

    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(device)
        .await
        .map_err(|e| format!("Failed to open {}: {e}", device.display()))?;
    let reader = BufReader::new(file.try_clone().await?);
    log::info!("Serving configuration requests on {}", device.display());

    serve(store, reader, file, verbose).await
}
