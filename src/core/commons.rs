// src/core/commons.rs

use crate::{CancellationToken, error::Error};
use std::sync::atomic::Ordering;
use std::time::Duration;

/// How often a running step re-checks the cancellation flag.
const CANCELLATION_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Fails with [`Error::Cancelled`] if cancellation has been requested.
pub fn check_for_cancellation(token: &CancellationToken) -> Result<(), Error> {
    if token.load(Ordering::SeqCst) {
        Err(Error::Cancelled)
    } else {
        Ok(())
    }
}

/// Completes once cancellation has been requested.
pub async fn wait_for_cancellation(token: &CancellationToken) {
    let mut ticker = tokio::time::interval(CANCELLATION_POLL_INTERVAL);
    loop {
        ticker.tick().await;
        if token.load(Ordering::SeqCst) {
            return;
        }
    }
}
