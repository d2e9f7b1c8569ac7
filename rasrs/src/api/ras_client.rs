use log::{debug, info};
use std::sync::Arc;

use crate::api::config::DialerConfig;
use crate::api::models::{ConnectionHandle, ConnectionSnapshotEntry, RasError};
use crate::core::Dialer;
use crate::monitoring::ConnectionWatcher;
use crate::native::{CredentialStore, RasApi};
use crate::types::constants::timeouts;
use crate::util::utils;
use crate::Result;

/// High-level entry point to the native remote-access layer.
///
/// Holds the injected native collaborators and hands them to the dialers
/// and watchers it creates.
///
/// # Example
///
/// ```ignore
/// use rasrs::{DialerConfig, RasClient};
///
/// let client = RasClient::new(native_api).with_credential_store(store);
///
/// for conn in client.active_connections()? {
///     println!("{} on {}", conn.entry_name, conn.device.name);
/// }
///
/// let dialer = client.dialer(DialerConfig::new().with_entry("Office VPN", pbk_path));
/// let handle = dialer.dial()?;
/// client.hang_up(handle)?;
/// ```
#[derive(Clone)]
pub struct RasClient {
    api: Arc<dyn RasApi>,
    store: Option<Arc<dyn CredentialStore>>,
}

impl RasClient {
    /// Creates a client over the given native layer.
    pub fn new(api: Arc<dyn RasApi>) -> Self {
        Self { api, store: None }
    }

    /// Attaches a credential store used by dialers created afterwards.
    #[must_use]
    pub fn with_credential_store(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Creates a dialer with the given configuration.
    pub fn dialer(&self, config: DialerConfig) -> Dialer {
        Dialer::build(Arc::clone(&self.api), self.store.clone(), config)
    }

    /// Creates a disabled, unscoped connection watcher.
    pub fn watcher(&self) -> ConnectionWatcher {
        ConnectionWatcher::new(Arc::clone(&self.api))
    }

    /// Lists the currently active connections.
    pub fn active_connections(&self) -> Result<Vec<ConnectionSnapshotEntry>> {
        Ok(self.api.list_active_connections()?)
    }

    /// Returns the first active connection of the named entry.
    pub fn find_connection(&self, entry_name: &str) -> Result<Option<ConnectionSnapshotEntry>> {
        Ok(self
            .active_connections()?
            .into_iter()
            .find(|c| c.entry_name == entry_name))
    }

    /// Returns the active connection with the given handle, if any.
    ///
    /// Enumeration failures are logged and reported as "not found".
    pub fn connection_for_handle(
        &self,
        handle: ConnectionHandle,
    ) -> Option<ConnectionSnapshotEntry> {
        let connections = crate::try_log!(
            self.api.list_active_connections(),
            "Failed to list active connections"
        );
        connections.into_iter().find(|c| c.handle == handle)
    }

    /// Hangs up a connection and waits for its port to close.
    ///
    /// # Errors
    ///
    /// `RasError::InvalidConfig` for the null handle; `RasError::Native`
    /// if the native layer refuses.
    pub fn hang_up(&self, handle: ConnectionHandle) -> Result<()> {
        if !handle.is_valid() {
            return Err(RasError::InvalidConfig(
                "cannot hang up the null handle".into(),
            ));
        }
        self.api
            .hang_up(handle, timeouts::hang_up_poll_interval(), true)?;
        info!("Hung up connection {handle}");
        Ok(())
    }

    /// Hangs up every active connection of the named entry.
    ///
    /// Succeeds without doing anything if the entry is not connected.
    pub fn hang_up_entry(&self, entry_name: &str) -> Result<()> {
        let targets: Vec<_> = self
            .active_connections()?
            .into_iter()
            .filter(|c| c.entry_name == entry_name)
            .collect();

        if targets.is_empty() {
            debug!("'{entry_name}' is not connected; nothing to hang up");
            return Ok(());
        }

        for conn in targets {
            self.hang_up(conn.handle)?;
        }
        Ok(())
    }

    /// Returns the message for a native error code.
    pub fn error_message(&self, code: u32) -> String {
        utils::error_message(self.api.as_ref(), code)
    }
}

impl std::fmt::Debug for RasClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RasClient")
            .field("credential_store", &self.store.is_some())
            .finish()
    }
}
