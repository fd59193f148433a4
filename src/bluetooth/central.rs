use std::{collections::HashSet, hash::Hash, time::Duration};

use btleplug::{
    api::{Central as _, CentralEvent, Characteristic, Manager as _, Peripheral as _, ScanFilter},
    platform::{Adapter, Manager, Peripheral},
};
use futures::{Stream, StreamExt};

use crate::drivers::openarcade::driver::{INFO_CHAR_UUID, SERVICE_UUID, STATE_CHAR_UUID};

use super::{Advertisement, BluetoothError, Link, NotificationStream, Transport};

/// [Transport] backed by the host's first Bluetooth adapter
#[derive(Clone)]
pub struct BtleCentral {
    adapter: Adapter,
}

impl BtleCentral {
    /// Open the first adapter of the platform Bluetooth manager
    pub async fn new() -> Result<Self, BluetoothError> {
        let manager = Manager::new().await?;
        let adapters = manager.adapters().await?;
        let adapter = adapters
            .into_iter()
            .next()
            .ok_or(BluetoothError::NoAdapter)?;
        if let Ok(info) = adapter.adapter_info().await {
            log::debug!("Using bluetooth adapter: {info}");
        }
        Ok(Self { adapter })
    }

    async fn find_peripheral(&self, address: &str) -> Result<Peripheral, BluetoothError> {
        let peripherals = self.adapter.peripherals().await?;
        peripherals
            .into_iter()
            .find(|p| p.address().to_string() == address)
            .ok_or_else(|| BluetoothError::NotFound(address.to_string()))
    }
}

/// Collect the distinct values `select` picks out of `stream` until `window`
/// has elapsed or the stream ends. Values keep the order they first appeared.
pub async fn collect_during<S, T, F>(mut stream: S, window: Duration, mut select: F) -> Vec<T>
where
    S: Stream + Unpin,
    T: Eq + Hash + Clone,
    F: FnMut(S::Item) -> Option<T>,
{
    let mut seen = HashSet::new();
    let mut values = Vec::new();
    let deadline = tokio::time::sleep(window);
    tokio::pin!(deadline);
    loop {
        tokio::select! {
            _ = &mut deadline => break,
            item = stream.next() => {
                let Some(item) = item else {
                    break;
                };
                let Some(value) = select(item) else {
                    continue;
                };
                if seen.insert(value.clone()) {
                    values.push(value);
                }
            }
        }
    }
    values
}

impl Transport for BtleCentral {
    type Link = BtleLink;

    async fn scan(&self, duration: Duration) -> Result<Vec<Advertisement>, BluetoothError> {
        // Only peripherals heard during this scan count, not every device the
        // adapter still has cached
        let events = self.adapter.events().await?;
        self.adapter.start_scan(ScanFilter::default()).await?;
        let ids = collect_during(events, duration, |event| match event {
            CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) => Some(id),
            _ => None,
        })
        .await;
        if let Err(e) = self.adapter.stop_scan().await {
            log::debug!("Unable to stop scan: {e}");
        }

        let mut advertisements = Vec::new();
        for id in ids {
            let peripheral = match self.adapter.peripheral(&id).await {
                Ok(peripheral) => peripheral,
                Err(e) => {
                    log::trace!("Peripheral {id:?} went away: {e}");
                    continue;
                }
            };
            let local_name = match peripheral.properties().await {
                Ok(Some(properties)) => properties.local_name,
                Ok(None) => None,
                Err(e) => {
                    log::trace!("Unable to read properties of {}: {e}", peripheral.address());
                    None
                }
            };
            advertisements.push(Advertisement {
                address: peripheral.address().to_string(),
                local_name,
            });
        }

        Ok(advertisements)
    }

    async fn connect(&self, address: &str) -> Result<BtleLink, BluetoothError> {
        let peripheral = self.find_peripheral(address).await?;
        if !peripheral.is_connected().await? {
            peripheral.connect().await?;
        }
        peripheral.discover_services().await?;
        if !peripheral.services().iter().any(|s| s.uuid == SERVICE_UUID) {
            log::debug!("Peripheral {address} does not list the OpenArcade service");
        }

        let characteristics = peripheral.characteristics();
        let Some(state_char) = characteristics
            .iter()
            .find(|c| c.uuid == STATE_CHAR_UUID)
            .cloned()
        else {
            if let Err(e) = peripheral.disconnect().await {
                log::debug!("Unable to disconnect {address}: {e}");
            }
            return Err(BluetoothError::MissingCharacteristic {
                address: address.to_string(),
                uuid: STATE_CHAR_UUID,
            });
        };
        let info_char = characteristics
            .iter()
            .find(|c| c.uuid == INFO_CHAR_UUID)
            .cloned();

        Ok(BtleLink {
            address: address.to_string(),
            peripheral,
            state_char,
            info_char,
        })
    }
}

/// Connection to a controller through btleplug
pub struct BtleLink {
    address: String,
    peripheral: Peripheral,
    state_char: Characteristic,
    info_char: Option<Characteristic>,
}

impl Link for BtleLink {
    fn address(&self) -> &str {
        self.address.as_str()
    }

    async fn notifications(&self) -> Result<NotificationStream, BluetoothError> {
        self.peripheral.subscribe(&self.state_char).await?;
        let stream = self.peripheral.notifications().await?;
        let uuid = self.state_char.uuid;
        let stream = stream
            .filter(move |notification| futures::future::ready(notification.uuid == uuid))
            .map(|notification| notification.value);
        Ok(Box::pin(stream))
    }

    async fn read_descriptor(&self) -> Result<Option<Vec<u8>>, BluetoothError> {
        let Some(info_char) = self.info_char.as_ref() else {
            return Ok(None);
        };
        let data = self.peripheral.read(info_char).await?;
        Ok(Some(data))
    }

    async fn is_connected(&self) -> bool {
        self.peripheral.is_connected().await.unwrap_or(false)
    }

    async fn disconnect(&self) -> Result<(), BluetoothError> {
        self.peripheral.disconnect().await?;
        Ok(())
    }
}
