use std::{error::Error, time::Duration};

use tokio::sync::{mpsc, watch};

use crate::{
    bluetooth::{mock::MockTransport, Advertisement, BluetoothError},
    drivers::openarcade::driver::DEVICE_NAME,
    input::discovery::Discovery,
    sync::wait_for_shutdown,
};

fn advertisement(address: &str, name: Option<&str>) -> Advertisement {
    Advertisement {
        address: address.to_string(),
        local_name: name.map(str::to_string),
    }
}

#[tokio::test]
async fn test_scan_filters_by_name() -> Result<(), Box<dyn Error>> {
    let transport = MockTransport::new();
    transport.push_scan(Ok(vec![
        advertisement("AA:BB:CC:DD:EE:FF", Some(DEVICE_NAME)),
        advertisement("11:22:33:44:55:66", Some("Headphones")),
        advertisement("22:33:44:55:66:77", None),
        advertisement("AA:BB:CC:DD:EE:FF", Some(DEVICE_NAME)),
        advertisement("99:88:77:66:55:44", Some(DEVICE_NAME)),
    ]));
    let discovery = Discovery::new(transport, DEVICE_NAME);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let count = discovery.scan_once(&tx).await?;
    assert_eq!(count, 2);

    let mut found = Vec::new();
    while let Ok(address) = rx.try_recv() {
        found.push(address);
    }
    assert_eq!(found, vec!["AA:BB:CC:DD:EE:FF", "99:88:77:66:55:44"]);

    Ok(())
}

#[tokio::test]
async fn test_scan_error() -> Result<(), Box<dyn Error>> {
    let transport = MockTransport::new();
    transport.push_scan(Err(BluetoothError::NoAdapter));
    let discovery = Discovery::new(transport, DEVICE_NAME);

    let (tx, _rx) = mpsc::unbounded_channel();
    let result = discovery.scan_once(&tx).await;
    assert!(matches!(result, Err(BluetoothError::NoAdapter)));

    Ok(())
}

#[tokio::test]
async fn test_run_recovers_from_errors() -> Result<(), Box<dyn Error>> {
    let transport = MockTransport::new();
    transport.push_scan(Err(BluetoothError::NoAdapter));
    transport.push_scan(Ok(vec![advertisement(
        "AA:BB:CC:DD:EE:FF",
        Some(DEVICE_NAME),
    )]));
    let delay = Duration::from_millis(5);
    let discovery =
        Discovery::new(transport.clone(), DEVICE_NAME).with_timing(Duration::ZERO, delay, delay);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let task = tokio::spawn(async move { discovery.run(tx, shutdown_rx).await.is_ok() });

    let address = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("should discover after the failed scan");
    assert_eq!(address.as_deref(), Some("AA:BB:CC:DD:EE:FF"));

    // Scanning continues until shutdown
    tokio::time::sleep(Duration::from_millis(30)).await;
    shutdown_tx.send(true)?;
    let stopped = tokio::time::timeout(Duration::from_secs(5), task).await??;
    assert!(stopped);
    println!("Ran {} scans", transport.scan_count());
    assert!(transport.scan_count() > 2);

    Ok(())
}

#[tokio::test]
async fn test_wait_for_shutdown() -> Result<(), Box<dyn Error>> {
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    assert!(!wait_for_shutdown(&mut shutdown_rx, Duration::from_millis(5)).await);

    let task = tokio::spawn(async move {
        wait_for_shutdown(&mut shutdown_rx, Duration::from_secs(60)).await
    });
    tokio::time::sleep(Duration::from_millis(10)).await;
    shutdown_tx.send(true)?;
    let stopped = tokio::time::timeout(Duration::from_secs(5), task).await??;
    assert!(stopped);

    Ok(())
}
