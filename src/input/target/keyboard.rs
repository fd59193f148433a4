use std::{
    error::Error,
    fs::{File, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
    sync::Arc,
};

use packed_struct::{PackedStruct, PackingError};
use thiserror::Error;
use tokio::sync::{mpsc::UnboundedReceiver, watch};

use crate::{
    constants::{OUTPUT_ERROR_DELAY, OUTPUT_RECV_TIMEOUT},
    drivers::hid_keyboard::hid_report::KeyboardReport,
    input::keycode::KeycodeTable,
    sync::{ReceiveTimeoutError, TimeoutReceiver},
};

/// Possible errors writing a keyboard report
#[derive(Error, Debug)]
pub enum OutputError {
    #[error("failed to write report: {0}")]
    Io(#[from] io::Error),
    #[error("failed to pack report: {0}")]
    Packing(#[from] PackingError),
}

/// Render a report the way the console mock shows it
pub fn render_report(
    report: &KeyboardReport,
    keycodes: &KeycodeTable,
) -> Result<String, PackingError> {
    let bytes = report.pack()?;
    let hex: Vec<String> = bytes.iter().map(|b| format!("{b:02x}")).collect();
    let keys: Vec<String> = report
        .pressed_keys()
        .map(|code| match keycodes.name_of(code) {
            Some(name) => name.trim_start_matches("HID_KEY_").to_string(),
            None => format!("0x{code:02x}"),
        })
        .collect();
    Ok(format!(
        "[HID REPORT] Bytes: {} | Keys: [{}]",
        hex.join(" "),
        keys.join(", ")
    ))
}

/// Keyboard output through the USB HID gadget. Falls back to printing
/// reports on the console when the gadget device cannot be opened.
#[derive(Debug)]
pub struct KeyboardDevice {
    path: PathBuf,
    file: Option<File>,
    keycodes: Arc<KeycodeTable>,
}

impl KeyboardDevice {
    /// Open the HID gadget at the given path
    pub fn open<P: AsRef<Path>>(path: P, keycodes: Arc<KeycodeTable>) -> Self {
        let path = path.as_ref().to_path_buf();
        let file = match OpenOptions::new().write(true).open(&path) {
            Ok(file) => {
                log::info!("Writing keyboard reports to {path:?}");
                Some(file)
            }
            Err(e) => {
                log::warn!("Unable to open HID device {path:?}: {e}. Using console output.");
                None
            }
        };
        Self {
            path,
            file,
            keycodes,
        }
    }

    /// Create a device that only prints reports on the console
    pub fn mock(keycodes: Arc<KeycodeTable>) -> Self {
        Self {
            path: PathBuf::new(),
            file: None,
            keycodes,
        }
    }

    /// Returns true if reports are printed instead of written to a device
    pub fn is_mock(&self) -> bool {
        self.file.is_none()
    }

    pub fn write_report(&mut self, report: &KeyboardReport) -> Result<(), OutputError> {
        let Some(file) = self.file.as_mut() else {
            let line = render_report(report, &self.keycodes)?;
            let mut stdout = io::stdout().lock();
            write!(stdout, "\r{line}    ")?;
            stdout.flush()?;
            return Ok(());
        };
        let bytes = report.pack()?;
        file.write_all(&bytes)?;
        file.flush()?;
        Ok(())
    }

    /// Write reports from the aggregator until shutdown is signaled or the
    /// channel closes. Waiting is bounded so shutdown is noticed promptly.
    pub async fn run(
        &mut self,
        mut rx: UnboundedReceiver<KeyboardReport>,
        shutdown: watch::Receiver<bool>,
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        log::debug!("Starting keyboard output");
        while !*shutdown.borrow() {
            let report = match rx.recv_timeout(OUTPUT_RECV_TIMEOUT).await {
                Ok(report) => report,
                Err(ReceiveTimeoutError::Timeout) => continue,
                Err(ReceiveTimeoutError::Closed) => break,
            };
            if let Err(e) = self.write_report(&report) {
                log::error!("Unable to write report to {:?}: {e}", self.path);
                tokio::time::sleep(OUTPUT_ERROR_DELAY).await;
            }
        }

        if self.file.take().is_some() {
            log::debug!("Closed {:?}", self.path);
        } else {
            println!();
        }
        log::debug!("Keyboard output stopped");

        Ok(())
    }
}
