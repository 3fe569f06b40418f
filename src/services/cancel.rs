//! Abort signal for the polling loop.

use std::time::Duration;

use tokio::sync::watch;

use crate::errors::SwampError;

/// Sending half, held by whoever may abort the build.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        // No receivers left means nobody is waiting; nothing to do.
        let _ = self.tx.send(true);
    }
}

/// Receiving half, checked each tick and raced against the poll interval.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

impl CancelSignal {
    pub fn new() -> (CancelHandle, CancelSignal) {
        let (tx, rx) = watch::channel(false);
        (CancelHandle { tx }, CancelSignal { rx })
    }

    /// A signal that never fires.
    pub fn never() -> CancelSignal {
        Self::new().1
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Sleep for `interval`, returning early with [`SwampError::Cancelled`]
    /// when the signal fires.
    pub async fn sleep(&mut self, interval: Duration) -> Result<(), SwampError> {
        if self.is_cancelled() {
            return Err(SwampError::Cancelled);
        }
        tokio::select! {
            _ = tokio::time::sleep(interval) => Ok(()),
            _ = wait_for_cancel(&mut self.rx) => Err(SwampError::Cancelled),
        }
    }
}

async fn wait_for_cancel(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            // Handle dropped without cancelling: this signal can no longer fire.
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn sleep_completes_without_cancel() {
        let mut signal = CancelSignal::never();
        let start = tokio::time::Instant::now();
        tokio_test::assert_ok!(signal.sleep(Duration::from_secs(30)).await);
        assert!(start.elapsed() >= Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_interrupts_sleep() {
        let (handle, mut signal) = CancelSignal::new();
        let waiter = tokio::spawn(async move { signal.sleep(Duration::from_secs(3600)).await });
        tokio::time::sleep(Duration::from_secs(1)).await;
        handle.cancel();
        let result = waiter.await.unwrap();
        assert!(matches!(result, Err(SwampError::Cancelled)));
    }

    #[tokio::test]
    async fn already_cancelled_fails_immediately() {
        let (handle, mut signal) = CancelSignal::new();
        handle.cancel();
        assert!(signal.is_cancelled());
        tokio_test::assert_err!(signal.sleep(Duration::from_secs(3600)).await);
    }
}
