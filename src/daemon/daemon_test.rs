use std::error::Error;

use serde_json::{json, Value};

use crate::{
    config::ConfigStore,
    daemon::{handle_command, run, serve},
};

const DEVICE: &str = "AA:BB:CC:DD:EE:FF";

fn replies(output: &[u8]) -> Vec<Value> {
    String::from_utf8_lossy(output)
        .lines()
        .map(|line| serde_json::from_str(line).expect("should reply with JSON"))
        .collect()
}

#[tokio::test]
async fn test_handle_command() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let store = ConfigStore::new(dir.path().join("config.json"));
    store.load();

    let reply = handle_command(&store, &json!({"cmd": "ping"}));
    assert_eq!(reply, json!({"ok": true, "reply": "pong"}));

    let reply = handle_command(&store, &json!({"cmd": "get_device", "device_id": DEVICE}));
    assert_eq!(reply, json!({"ok": true, "device": null}));

    let request = json!({
        "cmd": "set_mapping",
        "device_id": DEVICE,
        "mode": "keyboard",
        "control_id": 2,
        "mapping": {"keycode": "HID_KEY_C"},
    });
    assert_eq!(handle_command(&store, &request), json!({"ok": true}));

    let reply = handle_command(&store, &json!({"cmd": "get_device", "device_id": DEVICE}));
    println!("{reply:#}");
    let device = &reply["device"];
    assert_eq!(device["active_mode"], json!("keyboard"));
    assert_eq!(
        device["modes"]["keyboard"]["mapping"]["2"],
        json!({"keycode": "HID_KEY_C"})
    );

    let request = json!({"cmd": "set_active_mode", "device_id": DEVICE, "mode": "gamepad"});
    assert_eq!(handle_command(&store, &request), json!({"ok": true}));
    let request = json!({"cmd": "set_descriptor", "device_id": DEVICE, "descriptor": {"controls": []}});
    assert_eq!(handle_command(&store, &request), json!({"ok": true}));
    let request = json!({"cmd": "set_last_seen", "device_id": DEVICE});
    assert_eq!(handle_command(&store, &request), json!({"ok": true}));

    let reply = handle_command(&store, &json!({"cmd": "list_devices"}));
    assert_eq!(reply["devices"][DEVICE]["active_mode"], json!("gamepad"));
    assert!(reply["devices"][DEVICE]["last_seen"].is_string());

    // Mutations are saved
    let reloaded = ConfigStore::new(store.path()).load();
    assert_eq!(reloaded.devices[DEVICE].active_mode, "gamepad");

    Ok(())
}

#[tokio::test]
async fn test_handle_command_errors() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let store = ConfigStore::new(dir.path().join("config.json"));
    store.load();

    let error = |request: Value| handle_command(&store, &request)["error"].clone();
    assert_eq!(error(json!({})), json!("missing_cmd"));
    assert_eq!(error(json!({"cmd": ""})), json!("missing_cmd"));
    assert_eq!(error(json!([1, 2])), json!("missing_cmd"));
    assert_eq!(error(json!({"cmd": "reboot"})), json!("unknown_cmd"));
    assert_eq!(error(json!({"cmd": "get_device"})), json!("missing_device_id"));
    assert_eq!(error(json!({"cmd": "set_last_seen", "device_id": ""})), json!("missing_device_id"));
    assert_eq!(
        error(json!({"cmd": "set_mapping", "device_id": DEVICE, "mode": "keyboard"})),
        json!("missing_fields")
    );
    assert_eq!(
        error(json!({"cmd": "set_descriptor", "device_id": DEVICE, "descriptor": null})),
        json!("missing_fields")
    );
    assert_eq!(error(json!({"cmd": "set_active_mode", "device_id": DEVICE})), json!("missing_fields"));

    // Nothing was created
    assert!(store.get_all().devices.is_empty());
    assert!(!store.path().exists());

    Ok(())
}

#[tokio::test]
async fn test_serve() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let store = ConfigStore::new(dir.path().join("config.json"));

    let input = concat!(
        "{\"cmd\":\"ping\"}\n",
        "\n",
        "not json\n",
        "{\"cmd\":\"set_active_mode\",\"device_id\":\"AA:BB:CC:DD:EE:FF\",\"mode\":\"gamepad\"}\r\n",
        "{\"cmd\":\"list_devices\"}\n",
        "{\"cmd\":\"ping\"}",
    );
    let mut output = Vec::new();
    serve(&store, input.as_bytes(), &mut output, true)
        .await
        .expect("should serve requests");

    let text = String::from_utf8(output.clone())?;
    println!("{text}");
    assert!(text.starts_with("{\"ok\":true,\"reply\":\"pong\"}\n"));

    let replies = replies(&output);
    assert_eq!(replies.len(), 4);
    assert_eq!(replies[1], json!({"ok": false, "error": "invalid_json"}));
    assert_eq!(replies[2], json!({"ok": true}));
    assert_eq!(replies[3]["devices"][DEVICE]["active_mode"], json!("gamepad"));

    Ok(())
}

#[tokio::test]
async fn test_run_missing_device() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let store = ConfigStore::new(dir.path().join("config.json"));

    let result = run(dir.path().join("ttyGS0"), &store, false).await;
    assert!(result.is_err());

    Ok(())
}
