use std::{collections::HashSet, error::Error, time::Duration};

use tokio::sync::{mpsc::UnboundedSender, watch};

use crate::{
    bluetooth::{BluetoothError, Transport},
    constants::{SCAN_DELAY, SCAN_DURATION, SCAN_ERROR_DELAY},
    sync::wait_for_shutdown,
};

/// Periodically scans for controllers and forwards their addresses to the
/// session manager.
pub struct Discovery<T: Transport> {
    transport: T,
    device_name: String,
    scan_duration: Duration,
    scan_delay: Duration,
    error_delay: Duration,
}

impl<T: Transport> Discovery<T> {
    pub fn new(transport: T, device_name: &str) -> Self {
        Self {
            transport,
            device_name: device_name.to_string(),
            scan_duration: SCAN_DURATION,
            scan_delay: SCAN_DELAY,
            error_delay: SCAN_ERROR_DELAY,
        }
    }

    /// Override the scan length and the pauses between scans
    pub fn with_timing(
        mut self,
        scan_duration: Duration,
        scan_delay: Duration,
        error_delay: Duration,
    ) -> Self {
        self.scan_duration = scan_duration;
        self.scan_delay = scan_delay;
        self.error_delay = error_delay;
        self
    }

    /// Run a single scan and send the address of every matching advertiser.
    /// Returns the number of addresses sent.
    pub async fn scan_once(&self, tx: &UnboundedSender<String>) -> Result<usize, BluetoothError> {
        let advertisements = self.transport.scan(self.scan_duration).await?;
        let mut seen = HashSet::new();
        for advertisement in advertisements {
            if advertisement.local_name.as_deref() != Some(self.device_name.as_str()) {
                continue;
            }
            if !seen.insert(advertisement.address.clone()) {
                continue;
            }
            log::trace!("Discovered {}", advertisement.address);
            if tx.send(advertisement.address).is_err() {
                break;
            }
        }
        Ok(seen.len())
    }

    /// Scan until shutdown is signaled. Scan failures are logged and retried.
    pub async fn run(
        &self,
        tx: UnboundedSender<String>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        log::debug!("Starting discovery for '{}'", self.device_name);
        while !*shutdown.borrow() {
            match self.scan_once(&tx).await {
                Ok(count) => log::debug!("Scan found {count} controller(s)"),
                Err(e) => {
                    log::error!("Scan failed: {e}");
                    if wait_for_shutdown(&mut shutdown, self.error_delay).await {
                        break;
                    }
                }
            }
            if tx.is_closed() {
                log::debug!("Session manager is gone");
                break;
            }
            if wait_for_shutdown(&mut shutdown, self.scan_delay).await {
                break;
            }
        }
        log::debug!("Discovery stopped");

        Ok(())
    }
}
