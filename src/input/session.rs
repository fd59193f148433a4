use std::{fmt::Debug, sync::Arc, time::Duration};

use futures::StreamExt;
use tokio::{sync::mpsc::UnboundedSender, task::JoinHandle, time};

use crate::{
    bluetooth::{BluetoothError, Link, Transport},
    constants::CONNECT_TIMEOUT,
    drivers::openarcade::driver::Driver,
};

/// Lifecycle of a controller session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Discovered,
    Connecting,
    Connected,
    Disconnected,
}

/// Events sent from session tasks to the session manager
pub enum SessionEvent<L> {
    /// The link is up and subscribed to state notifications
    Connected {
        address: String,
        link: Arc<L>,
        descriptor: Option<Vec<u8>>,
    },
    /// The link could not be established
    ConnectFailed { address: String, error: String },
    /// Raw state notification payload
    Notification { address: String, data: Vec<u8> },
    /// An established link was lost
    Disconnected { address: String },
}

impl<L> Debug for SessionEvent<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connected {
                address,
                descriptor,
                ..
            } => f
                .debug_struct("Connected")
                .field("address", address)
                .field("descriptor", &descriptor.as_ref().map(|d| d.len()))
                .finish(),
            Self::ConnectFailed { address, error } => f
                .debug_struct("ConnectFailed")
                .field("address", address)
                .field("error", error)
                .finish(),
            Self::Notification { address, data } => f
                .debug_struct("Notification")
                .field("address", address)
                .field("data", data)
                .finish(),
            Self::Disconnected { address } => f
                .debug_struct("Disconnected")
                .field("address", address)
                .finish(),
        }
    }
}

/// A controller tracked by the session manager
pub struct Session<L> {
    pub address: String,
    pub state: SessionState,
    pub driver: Driver,
    pub link: Option<Arc<L>>,
    task: Option<JoinHandle<()>>,
}

impl<L: Link> Session<L> {
    pub fn new(address: String) -> Self {
        Self {
            address,
            state: SessionState::Discovered,
            driver: Driver::new(),
            link: None,
            task: None,
        }
    }

    /// Start the task that connects to the controller and forwards its
    /// notifications as [SessionEvent]s.
    pub fn start<T>(
        &mut self,
        transport: T,
        link_check: Duration,
        tx: UnboundedSender<SessionEvent<L>>,
    ) where
        T: Transport<Link = L>,
    {
        self.state = SessionState::Connecting;
        let address = self.address.clone();
        self.task = Some(tokio::spawn(run_session(transport, address, link_check, tx)));
    }

    /// Disconnect the link and stop the session task
    pub async fn close(mut self) {
        self.state = SessionState::Disconnected;
        if let Some(link) = self.link.take() {
            if let Err(e) = link.disconnect().await {
                log::warn!("Unable to disconnect {}: {e}", self.address);
            }
        }
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Connect to the controller at the given address and forward its state
/// notifications until the link goes down.
async fn run_session<T: Transport>(
    transport: T,
    address: String,
    link_check: Duration,
    tx: UnboundedSender<SessionEvent<T::Link>>,
) {
    log::debug!("Connecting to {address}");
    let link = match time::timeout(CONNECT_TIMEOUT, transport.connect(&address)).await {
        Ok(Ok(link)) => Arc::new(link),
        Ok(Err(e)) => {
            let _ = tx.send(SessionEvent::ConnectFailed {
                address,
                error: e.to_string(),
            });
            return;
        }
        Err(_) => {
            let error = BluetoothError::Timeout(address.clone()).to_string();
            let _ = tx.send(SessionEvent::ConnectFailed { address, error });
            return;
        }
    };

    let mut notifications = match link.notifications().await {
        Ok(stream) => stream,
        Err(e) => {
            if let Err(e) = link.disconnect().await {
                log::debug!("Unable to disconnect {address}: {e}");
            }
            let _ = tx.send(SessionEvent::ConnectFailed {
                address,
                error: e.to_string(),
            });
            return;
        }
    };

    log::debug!("Subscribed to state notifications of {}", link.address());

    let descriptor = match link.read_descriptor().await {
        Ok(descriptor) => descriptor,
        Err(e) => {
            log::debug!("Unable to read descriptor from {address}: {e}");
            None
        }
    };

    let event = SessionEvent::Connected {
        address: address.clone(),
        link: link.clone(),
        descriptor,
    };
    if tx.send(event).is_err() {
        return;
    }

    let mut interval = time::interval(link_check);
    loop {
        tokio::select! {
            value = notifications.next() => {
                let Some(data) = value else {
                    log::debug!("Notification stream from {address} ended");
                    break;
                };
                let event = SessionEvent::Notification { address: address.clone(), data };
                if tx.send(event).is_err() {
                    return;
                }
            }
            _ = interval.tick() => {
                if !link.is_connected().await {
                    log::debug!("Link to {address} is down");
                    break;
                }
            }
        }
    }

    let _ = tx.send(SessionEvent::Disconnected { address });
}
