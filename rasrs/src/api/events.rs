//! Event payloads raised by the dialer and the connection watcher.

use log::error;
use std::sync::{Arc, Mutex};

use crate::api::models::{
    ConnectionHandle, ConnectionSnapshotEntry, DialError, DialState, RasError,
};
use crate::util::utils::{lock, panic_message};

/// Raised once per native state transition of an asynchronous dial.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateChangedEvent {
    /// Caller-defined value from the dialer configuration.
    pub callback_id: u64,
    /// One-based sub-entry the transition applies to.
    pub sub_entry_index: u32,
    /// Handle of the connection being dialed.
    pub handle: ConnectionHandle,
    /// State being entered.
    pub state: DialState,
    /// Nonzero if the transition failed.
    pub error_code: u32,
    /// Message for `error_code`, when nonzero.
    pub error_message: Option<String>,
    /// Extended error information.
    pub extended_error_code: u32,
}

/// Raised exactly once per asynchronous dial attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialCompletedEvent {
    /// Handle of the attempt, if the native layer returned one.
    pub handle: Option<ConnectionHandle>,
    /// Why the attempt failed; `None` on success and on cancellation.
    pub error: Option<DialError>,
    /// The attempt was cancelled by the caller.
    pub cancelled: bool,
    /// The attempt ran out of time.
    pub timed_out: bool,
    /// The connection was established.
    pub connected: bool,
}

impl DialCompletedEvent {
    pub(crate) fn connected(handle: Option<ConnectionHandle>) -> Self {
        Self {
            handle,
            error: None,
            cancelled: false,
            timed_out: false,
            connected: true,
        }
    }

    pub(crate) fn failed(handle: Option<ConnectionHandle>, error: DialError) -> Self {
        let timed_out = matches!(error, DialError::TimedOut(_));
        Self {
            handle,
            error: Some(error),
            cancelled: false,
            timed_out,
            connected: false,
        }
    }

    pub(crate) fn cancelled(handle: Option<ConnectionHandle>) -> Self {
        Self {
            handle,
            error: None,
            cancelled: true,
            timed_out: false,
            connected: false,
        }
    }
}

/// Raised by the watcher when a connection appears or goes away.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionEvent {
    pub connection: ConnectionSnapshotEntry,
}

/// Raised by the watcher when a link is added to or removed from the
/// watched multilink connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BandwidthEvent {
    /// The watched handle.
    pub handle: ConnectionHandle,
    /// The watched connection, if it was still listed as active.
    pub connection: Option<ConnectionSnapshotEntry>,
}

type Handler<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// A list of event handlers.
///
/// Handlers run on whatever thread raises the event. Panics are caught
/// per handler so one misbehaving handler never stops the others or
/// unwinds into the raiser.
pub(crate) struct Handlers<T: ?Sized> {
    handlers: Mutex<Vec<Handler<T>>>,
}

impl<T: ?Sized> Default for Handlers<T> {
    fn default() -> Self {
        Self {
            handlers: Mutex::new(Vec::new()),
        }
    }
}

impl<T: ?Sized> Handlers<T> {
    pub(crate) fn add(&self, handler: Handler<T>) {
        lock(&self.handlers).push(handler);
    }

    /// Invokes every handler. Returns the first contained panic, if any.
    pub(crate) fn emit(&self, arg: &T) -> std::result::Result<(), RasError> {
        // Snapshot so handlers may register more handlers.
        let handlers: Vec<Handler<T>> = lock(&self.handlers).clone();
        let mut first_panic = None;

        for handler in handlers {
            let outcome =
                std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| handler(arg)));
            if let Err(payload) = outcome {
                let msg = panic_message(payload.as_ref());
                first_panic.get_or_insert(RasError::CallbackPanicked(msg));
            }
        }

        match first_panic {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl Handlers<RasError> {
    /// Raises an error event. A panic in an error handler is only logged.
    pub(crate) fn raise(&self, err: &RasError) {
        if let Err(panicked) = self.emit(err) {
            error!("Error handler panicked while handling '{err}': {panicked}");
        }
    }
}
