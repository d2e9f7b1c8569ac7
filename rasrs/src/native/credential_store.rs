use std::path::Path;

use crate::api::models::NetworkCredential;
use crate::Result;

/// Credential storage keyed by phone book and entry name.
///
/// Implementations report their own failures as
/// [`RasError::CredentialStore`](crate::RasError::CredentialStore).
pub trait CredentialStore: Send + Sync {
    /// Returns the credentials saved for an entry, if any.
    fn credentials(&self, phone_book: &Path, entry: &str) -> Result<Option<NetworkCredential>>;

    /// Saves credentials for an entry, for the current user or for every user.
    fn set_credentials(
        &self,
        phone_book: &Path,
        entry: &str,
        credentials: &NetworkCredential,
        all_users: bool,
    ) -> Result<()>;

    /// Returns the EAP identity blob saved for an entry, if any.
    fn eap_user_data(&self, phone_book: &Path, entry: &str) -> Result<Option<Vec<u8>>>;
}
