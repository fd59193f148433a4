//! Channel helpers shared by the pipeline stages.
pub mod mpsc;

use std::{future::Future, time::Duration};

use thiserror::Error;
use tokio::sync::watch;

/// Reasons a bounded wait on a channel returned without a value
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ReceiveTimeoutError {
    #[error("timed out waiting for message")]
    Timeout,
    #[error("channel closed")]
    Closed,
}

/// Channel receivers that give up after a timeout, so stage loops can check
/// for shutdown between messages.
pub trait TimeoutReceiver<T> {
    fn recv_timeout(
        &mut self,
        timeout: Duration,
    ) -> impl Future<Output = Result<T, ReceiveTimeoutError>> + Send;
}

/// Sleep for the given duration. Returns true if shutdown was signaled
/// in the meantime.
pub async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>, duration: Duration) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(duration) => *shutdown.borrow(),
        // A dropped sender also means shutdown
        _ = async { let _ = shutdown.wait_for(|stop| *stop).await; } => true,
    }
}
