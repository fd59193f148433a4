use std::time::Duration;

/// How long each discovery scan listens for advertisements
pub const SCAN_DURATION: Duration = Duration::from_secs(2);
/// Pause between discovery scans
pub const SCAN_DELAY: Duration = Duration::from_secs(10);
/// Extra pause after a failed scan
pub const SCAN_ERROR_DELAY: Duration = Duration::from_secs(5);

/// Upper bound for establishing a connection to a controller
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// How often an idle session checks that its link is still up
pub const LINK_CHECK_INTERVAL: Duration = Duration::from_secs(1);
/// How often the session manager looks for registry changes
pub const MAPPING_REFRESH_INTERVAL: Duration = Duration::from_millis(500);

/// Longest the output sink waits for a report before checking for shutdown
pub const OUTPUT_RECV_TIMEOUT: Duration = Duration::from_secs(1);
/// Pause after a failed report write
pub const OUTPUT_ERROR_DELAY: Duration = Duration::from_secs(1);
/// Pause between press and release reports when typing text
pub const TYPING_DELAY: Duration = Duration::from_millis(10);

/// USB HID gadget keyboard device
pub const DEFAULT_HID_DEVICE: &str = "/dev/hidg0";
/// USB serial gadget used by the configuration daemon
pub const DEFAULT_SERIAL_DEVICE: &str = "/dev/ttyGS0";
