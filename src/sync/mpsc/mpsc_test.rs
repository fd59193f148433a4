use std::{error::Error, time::Duration};

use tokio::sync::mpsc;

use crate::sync::{ReceiveTimeoutError, TimeoutReceiver};

#[tokio::test]
async fn test_recv_timeout() -> Result<(), Box<dyn Error>> {
    let (tx, mut rx) = mpsc::unbounded_channel::<u32>();

    let result = rx.recv_timeout(Duration::from_millis(10)).await;
    assert!(matches!(result, Err(ReceiveTimeoutError::Timeout)));

    tx.send(7)?;
    let value = rx
        .recv_timeout(Duration::from_millis(10))
        .await
        .expect("should receive value");
    assert_eq!(value, 7);

    drop(tx);
    let result = rx.recv_timeout(Duration::from_millis(10)).await;
    assert!(matches!(result, Err(ReceiveTimeoutError::Closed)));

    Ok(())
}
