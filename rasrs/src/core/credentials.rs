//! Credential and EAP blob resolution for a dial attempt.
//!
//! Explicit values from the configuration always win. Stored values are
//! only consulted for entry targets, since the store is keyed by phone book
//! and entry name.

use log::{debug, info};
use std::path::PathBuf;

use crate::api::config::{AutoUpdateCredentials, DialerConfig};
use crate::api::models::NetworkCredential;
use crate::native::CredentialStore;
use crate::Result;

/// Where and how to write credentials back after a successful dial.
#[derive(Debug, Clone)]
pub(crate) struct PersistContext {
    phone_book: PathBuf,
    entry: String,
    credentials: NetworkCredential,
    all_users: bool,
}

impl PersistContext {
    /// Builds the context if the configuration asks for write-back and
    /// has something to write.
    pub(crate) fn from_config(config: &DialerConfig) -> Option<Self> {
        let all_users = match config.auto_update_credentials {
            AutoUpdateCredentials::None => return None,
            AutoUpdateCredentials::User => false,
            AutoUpdateCredentials::AllUsers => true,
        };
        let (phone_book, entry) = config.target.as_ref()?.entry()?;
        let credentials = config.credentials.clone()?;

        Some(Self {
            phone_book: phone_book.clone(),
            entry: entry.to_string(),
            credentials,
            all_users,
        })
    }

    pub(crate) fn persist(&self, store: &dyn CredentialStore) -> Result<()> {
        store.set_credentials(
            &self.phone_book,
            &self.entry,
            &self.credentials,
            self.all_users,
        )?;
        info!(
            "Saved credentials for '{}' ({})",
            self.entry,
            if self.all_users { "all users" } else { "current user" }
        );
        Ok(())
    }
}

/// Returns the credentials to dial with.
pub(crate) fn resolve_credentials(
    config: &DialerConfig,
    store: Option<&dyn CredentialStore>,
) -> Result<Option<NetworkCredential>> {
    if let Some(creds) = &config.credentials {
        return Ok(Some(creds.clone()));
    }
    if !config.allow_stored_credentials {
        return Ok(None);
    }

    match (store, config.target.as_ref().and_then(|t| t.entry())) {
        (Some(store), Some((phone_book, entry))) => {
            let stored = store.credentials(phone_book, entry)?;
            debug!(
                "Stored credentials for '{entry}': {}",
                if stored.is_some() { "found" } else { "none" }
            );
            Ok(stored)
        }
        _ => Ok(None),
    }
}

/// Returns the EAP identity blob to dial with.
pub(crate) fn resolve_eap_user_data(
    config: &DialerConfig,
    store: Option<&dyn CredentialStore>,
) -> Result<Option<Vec<u8>>> {
    if let Some(data) = &config.eap_user_data {
        return Ok(Some(data.clone()));
    }

    match (store, config.target.as_ref().and_then(|t| t.entry())) {
        (Some(store), Some((phone_book, entry))) => {
            Ok(store.eap_user_data(phone_book, entry)?.filter(|d| !d.is_empty()))
        }
        _ => Ok(None),
    }
}
