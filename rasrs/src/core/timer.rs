//! One-shot timeout timer for asynchronous dials.
//!
//! Runtime-agnostic: the delay is a `futures_timer::Delay` raced against a
//! cancellation channel on a small named thread, so a dial can time out
//! whether or not the caller runs an async executor.

use futures::channel::oneshot;
use futures::{FutureExt, select};
use futures_timer::Delay;
use log::debug;
use std::pin::pin;
use std::thread;
use std::time::Duration;

use crate::api::models::RasError;
use crate::Result;

/// A one-shot timer that runs a closure on expiry unless disarmed first.
///
/// Dropping the timer disarms it.
pub(crate) struct DialTimer {
    cancel: Option<oneshot::Sender<()>>,
}

impl DialTimer {
    /// Arms the timer.
    pub(crate) fn start<F>(timeout: Duration, on_expiry: F) -> Result<Self>
    where
        F: FnOnce() + Send + 'static,
    {
        let (cancel_tx, cancel_rx) = oneshot::channel::<()>();

        thread::Builder::new()
            .name("rasrs-dial-timeout".into())
            .spawn(move || {
                let expired = futures::executor::block_on(async move {
                    let mut delay = pin!(Delay::new(timeout).fuse());
                    let mut cancelled = cancel_rx.fuse();
                    select! {
                        _ = delay => true,
                        _ = cancelled => false,
                    }
                });

                if expired {
                    debug!("Dial timer expired after {timeout:?}");
                    on_expiry();
                }
            })
            .map_err(|e| RasError::Runtime(format!("failed to spawn timer thread: {e}")))?;

        Ok(Self {
            cancel: Some(cancel_tx),
        })
    }

    /// Disarms the timer. Has no effect once it has fired.
    pub(crate) fn disarm(&mut self) {
        // Dropping the sender resolves the receiver and ends the race.
        self.cancel.take();
    }
}

impl Drop for DialTimer {
    fn drop(&mut self) {
        self.disarm();
    }
}
