//! Bluetooth LE transport used to discover and talk to controllers.
pub mod central;
#[cfg(test)]
pub mod mock;

use std::{future::Future, pin::Pin, time::Duration};

use futures::Stream;
use thiserror::Error;

/// Possible errors talking to the Bluetooth stack or a peripheral
#[derive(Error, Debug)]
pub enum BluetoothError {
    #[error("bluetooth stack error: {0}")]
    Stack(#[from] btleplug::Error),
    #[error("no bluetooth adapter found")]
    NoAdapter,
    #[error("peripheral `{0}` not found")]
    NotFound(String),
    #[error("peripheral `{address}` has no characteristic {uuid}")]
    MissingCharacteristic { address: String, uuid: uuid::Uuid },
    #[error("peripheral `{0}` disconnected")]
    Disconnected(String),
    #[error("timed out connecting to `{0}`")]
    Timeout(String),
}

/// A peripheral seen during a scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advertisement {
    pub address: String,
    pub local_name: Option<String>,
}

/// Stream of state notification payloads from a connected peripheral
pub type NotificationStream = Pin<Box<dyn Stream<Item = Vec<u8>> + Send>>;

/// Entry point into the Bluetooth stack
pub trait Transport: Clone + Send + Sync + 'static {
    type Link: Link;

    /// Scan for the given duration and return every advertiser seen
    fn scan(
        &self,
        duration: Duration,
    ) -> impl Future<Output = Result<Vec<Advertisement>, BluetoothError>> + Send;

    /// Connect to the peripheral with the given address
    fn connect(
        &self,
        address: &str,
    ) -> impl Future<Output = Result<Self::Link, BluetoothError>> + Send;
}

/// An open connection to a single peripheral
pub trait Link: Send + Sync + 'static {
    fn address(&self) -> &str;

    /// Subscribe to state notifications
    fn notifications(&self) -> impl Future<Output = Result<NotificationStream, BluetoothError>> + Send;

    /// Read the raw capability descriptor. Returns `None` if the peripheral
    /// does not expose one.
    fn read_descriptor(&self) -> impl Future<Output = Result<Option<Vec<u8>>, BluetoothError>> + Send;

    fn is_connected(&self) -> impl Future<Output = bool> + Send;

    fn disconnect(&self) -> impl Future<Output = Result<(), BluetoothError>> + Send;
}
