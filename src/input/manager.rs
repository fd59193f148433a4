use std::{collections::HashMap, error::Error, sync::Arc, time::Duration};

use tokio::sync::{
    mpsc::{self, UnboundedReceiver, UnboundedSender},
    watch,
};

use crate::{
    bluetooth::Transport,
    config::ConfigStore,
    constants::{LINK_CHECK_INTERVAL, MAPPING_REFRESH_INTERVAL},
    drivers::openarcade::descriptor::parse_info_tlv,
};

use super::{
    aggregator::Aggregator,
    session::{Session, SessionEvent, SessionState},
};

/// Manages one [Session] per discovered controller. Session tasks report
/// back over a channel, so the session table is only ever touched from the
/// manager loop. Every state change is aggregated into a new keyboard report.
pub struct SessionManager<T: Transport> {
    transport: T,
    store: Arc<ConfigStore>,
    aggregator: Aggregator,
    sessions: HashMap<String, Session<T::Link>>,
    tx: UnboundedSender<SessionEvent<T::Link>>,
    rx: UnboundedReceiver<SessionEvent<T::Link>>,
    link_check_interval: Duration,
}

impl<T: Transport> SessionManager<T> {
    pub fn new(transport: T, store: Arc<ConfigStore>, aggregator: Aggregator) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            transport,
            store,
            aggregator,
            sessions: HashMap::new(),
            tx,
            rx,
            link_check_interval: LINK_CHECK_INTERVAL,
        }
    }

    /// Override how often idle sessions verify their link
    pub fn with_link_check_interval(mut self, interval: Duration) -> Self {
        self.link_check_interval = interval;
        self
    }

    /// Process discovered addresses and session events until shutdown is
    /// signaled. All open sessions are disconnected before returning.
    pub async fn run(
        &mut self,
        mut discovered: UnboundedReceiver<String>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        log::debug!("Starting session manager");
        let mut refresh = tokio::time::interval(MAPPING_REFRESH_INTERVAL);

        while !*shutdown.borrow() {
            tokio::select! {
                result = shutdown.changed() => {
                    if result.is_err() {
                        break;
                    }
                }
                Some(address) = discovered.recv() => {
                    self.on_discovered(address);
                }
                Some(event) = self.rx.recv() => {
                    log::trace!("Received session event: {:?}", event);
                    self.on_session_event(event);
                }
                _ = refresh.tick() => {
                    self.refresh_mappings();
                }
            }
        }

        self.close_all().await;
        log::debug!("Session manager stopped");

        Ok(())
    }

    /// Start a session for a newly discovered controller. Discovery reports
    /// the same controller on every scan, so addresses that already have a
    /// session are ignored.
    fn on_discovered(&mut self, address: String) {
        if let Some(session) = self.sessions.get(&address) {
            log::trace!("Session for {address} already {:?}", session.state);
            return;
        }
        log::info!("Found controller {address}");

        let mut session = Session::new(address.clone());
        session.start(
            self.transport.clone(),
            self.link_check_interval,
            self.tx.clone(),
        );
        self.sessions.insert(address, session);
    }

    fn on_session_event(&mut self, event: SessionEvent<T::Link>) {
        match event {
            SessionEvent::Connected {
                address,
                link,
                descriptor,
            } => {
                let Some(session) = self.sessions.get_mut(&address) else {
                    log::debug!("Ignoring connection to {address} without a session");
                    return;
                };
                log::info!("Connected to controller {address}");
                session.state = SessionState::Connected;
                session.link = Some(link);

                self.store.set_connected(&address, true);
                if let Some(data) = descriptor {
                    self.store_descriptor(&address, &data);
                }
                self.save();
                self.aggregator.invalidate();
            }
            SessionEvent::ConnectFailed { address, error } => {
                log::warn!("Unable to connect to {address}: {error}");
                self.sessions.remove(&address);
            }
            SessionEvent::Notification { address, data } => {
                let Some(session) = self.sessions.get_mut(&address) else {
                    return;
                };
                if session.state != SessionState::Connected {
                    return;
                }
                let old_state = session.driver.state();
                let Some(new_state) = session.driver.handle_notification(&data) else {
                    return;
                };
                log::trace!(
                    "{address} state {old_state:#010x} -> {new_state:#010x} (changed {:#010x})",
                    old_state ^ new_state
                );
                self.aggregate();
            }
            SessionEvent::Disconnected { address } => {
                if self.sessions.remove(&address).is_none() {
                    return;
                }
                log::info!("Controller {address} disconnected");
                self.store.set_connected(&address, false);
                self.save();
                self.aggregate();
            }
        }
    }

    /// Decode a capability descriptor and record it in the registry
    fn store_descriptor(&self, address: &str, data: &[u8]) {
        let Some(descriptor) = parse_info_tlv(data) else {
            log::debug!("Controller {address} reported an empty descriptor");
            return;
        };
        log::debug!(
            "Controller {address} reports {} controls",
            descriptor.controls.len()
        );
        match serde_json::to_value(&descriptor) {
            Ok(value) => {
                self.store.set_descriptor(address, value);
            }
            Err(e) => log::warn!("Unable to serialize descriptor of {address}: {e}"),
        }
    }

    fn save(&self) {
        if let Err(e) = self.store.save() {
            log::error!("Unable to save device registry: {e}");
        }
    }

    /// Pick up registry changes and re-send the report if keys are held
    fn refresh_mappings(&mut self) {
        if !self.aggregator.refresh() {
            return;
        }
        let active = self
            .sessions
            .values()
            .any(|s| s.state == SessionState::Connected && s.driver.state() != 0);
        if active {
            self.aggregate();
        }
    }

    /// Build and send the keyboard report for all connected controllers
    fn aggregate(&mut self) {
        let states = self
            .sessions
            .values()
            .filter(|s| s.state == SessionState::Connected)
            .map(|s| (s.address.as_str(), s.driver.state()));
        self.aggregator.aggregate(states);
    }

    /// Disconnect every session and mark the controllers disconnected
    async fn close_all(&mut self) {
        let sessions: Vec<Session<T::Link>> = self.sessions.drain().map(|(_, s)| s).collect();
        if sessions.is_empty() {
            return;
        }
        for session in sessions {
            log::info!("Disconnecting controller {}", session.address);
            if session.state == SessionState::Connected {
                self.store.set_connected(&session.address, false);
            }
            session.close().await;
        }
        self.save();
    }
}
