//! Wires discovery, the session manager and the keyboard output into three
//! stages, each running on its own thread with a single-threaded runtime.
use std::{
    error::Error,
    future::Future,
    io,
    path::PathBuf,
    sync::Arc,
    thread::{self, JoinHandle},
    time::Duration,
};

use tokio::{
    runtime::Builder,
    sync::{mpsc, watch},
};

use crate::{
    bluetooth::{BluetoothError, Transport},
    config::{path::get_registry_path, ConfigStore},
    constants::{
        DEFAULT_HID_DEVICE, LINK_CHECK_INTERVAL, SCAN_DELAY, SCAN_DURATION, SCAN_ERROR_DELAY,
    },
    drivers::openarcade::driver::DEVICE_NAME,
};

use super::{
    aggregator::Aggregator, discovery::Discovery, keycode::KeycodeTable, manager::SessionManager,
    mapping::MappingCache, target::keyboard::KeyboardDevice,
};

type StageResult = Result<(), Box<dyn Error + Send + Sync>>;

/// Tunables of a running pipeline
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub config_path: PathBuf,
    pub hid_device: PathBuf,
    pub device_name: String,
    pub scan_duration: Duration,
    pub scan_delay: Duration,
    pub scan_error_delay: Duration,
    pub link_check_interval: Duration,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            config_path: get_registry_path(),
            hid_device: PathBuf::from(DEFAULT_HID_DEVICE),
            device_name: DEVICE_NAME.to_string(),
            scan_duration: SCAN_DURATION,
            scan_delay: SCAN_DELAY,
            scan_error_delay: SCAN_ERROR_DELAY,
            link_check_interval: LINK_CHECK_INTERVAL,
        }
    }
}

/// Handle to the running stages
pub struct Pipeline {
    shutdown: watch::Sender<bool>,
    stages: Vec<(String, JoinHandle<()>)>,
}

impl Pipeline {
    /// Load the registry and start every stage. Each stage that talks to the
    /// Bluetooth stack opens its own transport with `open_transport`.
    pub fn start<T, F, Fut>(options: PipelineOptions, open_transport: F) -> io::Result<Self>
    where
        T: Transport,
        F: Fn() -> Fut + Send + Clone + 'static,
        Fut: Future<Output = Result<T, BluetoothError>>,
    {
        let store = Arc::new(ConfigStore::new(options.config_path.clone()));
        let document = store.load();
        log::info!(
            "Loaded {} device(s) from {:?}",
            document.devices.len(),
            store.path()
        );
        let keycodes = Arc::new(KeycodeTable::new());

        let (shutdown, shutdown_rx) = watch::channel(false);
        let (address_tx, address_rx) = mpsc::unbounded_channel();
        let (report_tx, report_rx) = mpsc::unbounded_channel();
        let mut pipeline = Self {
            shutdown,
            stages: Vec::new(),
        };

        // Output
        let hid_device = options.hid_device.clone();
        let output_keycodes = keycodes.clone();
        let output_shutdown = shutdown_rx.clone();
        pipeline.spawn("output", move || async move {
            let mut device = KeyboardDevice::open(hid_device, output_keycodes);
            device.run(report_rx, output_shutdown).await
        })?;

        // Session manager
        let manager_transport = open_transport.clone();
        let manager_shutdown = shutdown_rx.clone();
        let link_check_interval = options.link_check_interval;
        pipeline.spawn("session-manager", move || async move {
            let transport = manager_transport().await?;
            let mappings = MappingCache::new(store.clone(), keycodes);
            let aggregator = Aggregator::new(mappings, report_tx);
            let mut manager = SessionManager::new(transport, store, aggregator)
                .with_link_check_interval(link_check_interval);
            manager.run(address_rx, manager_shutdown).await
        })?;

        // Discovery
        pipeline.spawn("discovery", move || async move {
            let transport = open_transport().await?;
            let discovery = Discovery::new(transport, &options.device_name).with_timing(
                options.scan_duration,
                options.scan_delay,
                options.scan_error_delay,
            );
            discovery.run(address_tx, shutdown_rx).await
        })?;

        Ok(pipeline)
    }

    fn spawn<S, Fut>(&mut self, name: &str, stage: S) -> io::Result<()>
    where
        S: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = StageResult>,
    {
        let stage_name = name.to_string();
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let runtime = match Builder::new_current_thread().enable_all().build() {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        log::error!("Unable to create runtime for {stage_name}: {e}");
                        return;
                    }
                };
                match runtime.block_on(stage()) {
                    Ok(()) => log::debug!("Stage {stage_name} exited"),
                    Err(e) => log::error!("Stage {stage_name} failed: {e}"),
                }
            })?;
        log::debug!("Started stage {name}");
        self.stages.push((name.to_string(), handle));

        Ok(())
    }

    /// Returns true while any stage is still running
    pub fn is_running(&self) -> bool {
        self.stages.iter().any(|(_, handle)| !handle.is_finished())
    }

    /// Signal shutdown and wait for every stage to exit
    pub fn stop(self) {
        log::info!("Stopping pipeline");
        // Stages that already exited have dropped their receivers
        let _ = self.shutdown.send(true);
        for (name, handle) in self.stages {
            if handle.join().is_err() {
                log::error!("Stage {name} panicked");
            }
        }
        log::info!("Pipeline stopped");
    }
}
