//! Small helpers shared by the dialer and the watcher.

use std::any::Any;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::native::RasApi;

/// Locks a mutex, recovering the guard if a previous holder panicked.
///
/// Callback threads contain panics instead of unwinding, so a poisoned
/// lock only means a handler misbehaved; the guarded state is still
/// consistent because every mutation completes before handlers run.
pub(crate) fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Extracts a readable message from a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Looks up the message for a native error code, with a generic fallback.
pub(crate) fn error_message(api: &dyn RasApi, code: u32) -> String {
    api.error_string(code)
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| format!("unknown error {code}"))
}

/// Macro to convert Result to Option with error logging.
/// Usage: `try_log!(result, "context message")?`
#[macro_export]
macro_rules! try_log {
    ($result:expr, $context:expr) => {
        match $result {
            Ok(value) => value,
            Err(e) => {
                log::warn!("{}: {:?}", $context, e);
                return None;
            }
        }
    };
}
