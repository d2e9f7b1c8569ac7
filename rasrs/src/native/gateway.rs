//! The native call surface.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::api::models::{ChangeCategory, ConnectionHandle, ConnectionSnapshotEntry, DialState};
use crate::native::params::{DialExtensions, DialParams, NativeBuffer};
use crate::native::wait_handle::WaitHandle;

/// Error returned by a native call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NativeError {
    /// The call returned a nonzero result code.
    #[error("native error {code} (extended {extended_code})")]
    Code { code: u32, extended_code: u32 },

    /// The platform does not export the requested entry point.
    #[error("entry point not found: {0}")]
    EntryPointNotFound(String),
}

impl NativeError {
    /// Shorthand for a result code without extended information.
    pub fn code(code: u32) -> Self {
        Self::Code {
            code,
            extended_code: 0,
        }
    }
}

/// One state transition reported by the native layer during an
/// asynchronous dial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DialNotification {
    /// Caller-defined value from [`DialParams::callback_id`].
    pub callback_id: u64,
    /// One-based sub-entry the transition applies to.
    pub sub_entry_index: u32,
    /// Native handle of the connection.
    pub handle: u64,
    /// Native message identifier.
    pub message: u32,
    /// State being entered.
    pub state: DialState,
    /// Nonzero if the transition failed.
    pub error_code: u32,
    /// Extended error information for `error_code`.
    pub extended_error_code: u32,
}

/// Receiver of per-event dial notifications.
///
/// The native layer calls [`on_notification`](DialCallback::on_notification)
/// once per state transition, on a thread of its own choosing. Returning
/// `false` asks the native layer to stop calling back for this attempt.
pub trait DialCallback: Send + Sync {
    fn on_notification(&self, notification: &DialNotification) -> bool;
}

/// The native remote-access API.
///
/// Implementations wrap the platform calls one-to-one. They must be
/// callable from any thread.
pub trait RasApi: Send + Sync {
    /// Starts a connection.
    ///
    /// With `callback == None` the call blocks until the connection is
    /// established or has failed. With a callback it returns as soon as the
    /// attempt is under way and reports progress through the callback; in
    /// that mode the callback must not be invoked on the calling thread
    /// before this method returns.
    ///
    /// On failure the implementation is responsible for releasing any
    /// partially created connection.
    fn begin_connect(
        &self,
        params: &DialParams,
        extensions: &DialExtensions,
        callback: Option<Arc<dyn DialCallback>>,
    ) -> Result<ConnectionHandle, NativeError>;

    /// Requests teardown of a connection, polling every `poll_interval`
    /// for the port to close.
    fn hang_up(
        &self,
        handle: ConnectionHandle,
        poll_interval: Duration,
        close_all_references: bool,
    ) -> Result<(), NativeError>;

    /// Lists the connections active right now.
    fn list_active_connections(&self) -> Result<Vec<ConnectionSnapshotEntry>, NativeError>;

    /// Asks the native layer to signal `wait` whenever a change of
    /// `category` happens, on `handle` or on any connection when `None`.
    ///
    /// The registration lives until `wait` is closed.
    fn register_change_notification(
        &self,
        handle: Option<ConnectionHandle>,
        wait: WaitHandle,
        category: ChangeCategory,
    ) -> Result<(), NativeError>;

    /// Returns the human-readable message for an error code.
    fn error_string(&self, code: u32) -> Option<String>;

    /// Copies `data` into natively addressable memory.
    fn alloc_buffer(&self, data: &[u8]) -> Result<NativeBuffer, NativeError>;

    /// Frees memory returned by [`alloc_buffer`](RasApi::alloc_buffer).
    fn free_buffer(&self, buffer: NativeBuffer);
}
