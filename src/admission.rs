//! Admission gate
//!
//! Bounds how many extraction jobs may be in flight process-wide,
//! independent of pool size. Waiters queue in FIFO order (the semaphore's
//! fairness guarantee); a waiter whose own deadline passes before a slot
//! opens fails with a queue-timeout error, distinct from the pool's
//! per-job timeout so operators can tell overload from slow processing.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::extract::ExtractError;

#[derive(Clone)]
pub struct AdmissionGate {
    semaphore: Arc<Semaphore>,
    wait_timeout: Duration,
}

impl AdmissionGate {
    pub fn new(limit: usize, wait_timeout: Duration) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(limit.max(1))),
            wait_timeout,
        }
    }

    /// Wait for an in-flight slot. The returned permit releases the slot
    /// when dropped.
    pub async fn admit(&self) -> Result<OwnedSemaphorePermit, ExtractError> {
        let wait_ms = self.wait_timeout.as_millis() as u64;
        match tokio::time::timeout(
            self.wait_timeout,
            self.semaphore.clone().acquire_owned(),
        )
        .await
        {
            Ok(Ok(permit)) => Ok(permit),
            Ok(Err(_)) => Err(ExtractError::PoolClosed),
            Err(_) => Err(ExtractError::QueueTimeout(wait_ms)),
        }
    }

    /// Slots currently free.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_admits_up_to_limit() {
        let gate = AdmissionGate::new(2, Duration::from_millis(50));
        let a = gate.admit().await.unwrap();
        let _b = gate.admit().await.unwrap();
        assert_eq!(gate.available(), 0);

        // Third waiter times out while the slots are held.
        let err = gate.admit().await.unwrap_err();
        assert!(matches!(err, ExtractError::QueueTimeout(_)));

        // Releasing a slot lets the next waiter through.
        drop(a);
        let _c = gate.admit().await.unwrap();
    }

    #[tokio::test]
    async fn test_waiters_are_fifo() {
        let gate = AdmissionGate::new(1, Duration::from_secs(1));
        let held = gate.admit().await.unwrap();
        let (order_tx, mut order_rx) = tokio::sync::mpsc::unbounded_channel();

        for tag in [1u8, 2u8] {
            let gate = gate.clone();
            let order_tx = order_tx.clone();
            tokio::spawn(async move {
                let permit = gate.admit().await.unwrap();
                order_tx.send(tag).unwrap();
                tokio::time::sleep(Duration::from_millis(30)).await;
                drop(permit);
            });
            // Let this waiter enqueue before spawning the next.
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        drop(held);
        assert_eq!(order_rx.recv().await, Some(1));
        assert_eq!(order_rx.recv().await, Some(2));
    }
}
