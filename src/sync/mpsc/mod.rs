use std::time::Duration;

use tokio::{sync::mpsc::UnboundedReceiver, time::timeout};

use super::{ReceiveTimeoutError, TimeoutReceiver};

#[cfg(test)]
mod mpsc_test;

impl<T> TimeoutReceiver<T> for UnboundedReceiver<T>
where
    T: Send,
{
    async fn recv_timeout(&mut self, duration: Duration) -> Result<T, ReceiveTimeoutError> {
        match timeout(duration, self.recv()).await {
            Ok(Some(value)) => Ok(value),
            Ok(None) => Err(ReceiveTimeoutError::Closed),
            Err(_) => Err(ReceiveTimeoutError::Timeout),
        }
    }
}
