//! In-memory [Transport] used to exercise discovery and session handling.
use std::{
    collections::{HashMap, VecDeque},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use super::{Advertisement, BluetoothError, Link, NotificationStream, Transport};

/// Handle used by a test to drive a connected mock peripheral
#[derive(Clone)]
pub struct MockPeripheral {
    tx: UnboundedSender<Option<Vec<u8>>>,
    connected: Arc<AtomicBool>,
}

impl MockPeripheral {
    /// Send a state notification
    pub fn notify(&self, data: &[u8]) {
        let _ = self.tx.send(Some(data.to_vec()));
    }

    /// Drop the link as if the peripheral went out of range
    pub fn drop_link(&self) {
        self.connected.store(false, Ordering::SeqCst);
        let _ = self.tx.send(None);
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
struct MockState {
    scans: VecDeque<Result<Vec<Advertisement>, BluetoothError>>,
    scan_count: usize,
    connect_attempts: Vec<String>,
    failing: Vec<String>,
    descriptors: HashMap<String, Vec<u8>>,
    pending: HashMap<String, (UnboundedReceiver<Option<Vec<u8>>>, Arc<AtomicBool>)>,
}

#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the result of the next scan
    pub fn push_scan(&self, result: Result<Vec<Advertisement>, BluetoothError>) {
        self.state.lock().unwrap().scans.push_back(result);
    }

    /// Register a peripheral that accepts connections
    pub fn add_peripheral(&self, address: &str) -> MockPeripheral {
        let (tx, rx) = mpsc::unbounded_channel();
        let connected = Arc::new(AtomicBool::new(true));
        self.state
            .lock()
            .unwrap()
            .pending
            .insert(address.to_string(), (rx, connected.clone()));
        MockPeripheral { tx, connected }
    }

    /// Make connection attempts to the given address fail
    pub fn fail_connect(&self, address: &str) {
        self.state.lock().unwrap().failing.push(address.to_string());
    }

    /// Expose a capability descriptor for the given address
    pub fn set_descriptor(&self, address: &str, data: Vec<u8>) {
        self.state
            .lock()
            .unwrap()
            .descriptors
            .insert(address.to_string(), data);
    }

    pub fn connect_attempts(&self) -> Vec<String> {
        self.state.lock().unwrap().connect_attempts.clone()
    }

    pub fn scan_count(&self) -> usize {
        self.state.lock().unwrap().scan_count
    }
}

impl Transport for MockTransport {
    type Link = MockLink;

    async fn scan(&self, _duration: Duration) -> Result<Vec<Advertisement>, BluetoothError> {
        let mut state = self.state.lock().unwrap();
        state.scan_count += 1;
        state.scans.pop_front().unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn connect(&self, address: &str) -> Result<MockLink, BluetoothError> {
        let mut state = self.state.lock().unwrap();
        state.connect_attempts.push(address.to_string());
        if state.failing.iter().any(|a| a == address) {
            return Err(BluetoothError::NotFound(address.to_string()));
        }
        let (rx, connected) = state
            .pending
            .remove(address)
            .ok_or_else(|| BluetoothError::NotFound(address.to_string()))?;
        Ok(MockLink {
            address: address.to_string(),
            rx: Mutex::new(Some(rx)),
            connected,
            descriptor: state.descriptors.get(address).cloned(),
        })
    }
}

pub struct MockLink {
    address: String,
    rx: Mutex<Option<UnboundedReceiver<Option<Vec<u8>>>>>,
    connected: Arc<AtomicBool>,
    descriptor: Option<Vec<u8>>,
}

impl Link for MockLink {
    fn address(&self) -> &str {
        self.address.as_str()
    }

    async fn notifications(&self) -> Result<NotificationStream, BluetoothError> {
        let rx = self
            .rx
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| BluetoothError::Disconnected(self.address.clone()))?;
        // A `None` marker ends the stream like a lost link
        let stream = futures::stream::unfold(rx, |mut rx| async move {
            let value = rx.recv().await??;
            Some((value, rx))
        });
        Ok(Box::pin(stream))
    }

    async fn read_descriptor(&self) -> Result<Option<Vec<u8>>, BluetoothError> {
        Ok(self.descriptor.clone())
    }

    async fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn disconnect(&self) -> Result<(), BluetoothError> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }
}
