//! Dialer configuration.
//!
//! Everything a dial needs is carried by one flat [`DialerConfig`]. Option
//! bags ([`DialOptions`], [`EapOptions`]) are plain `bool` sets that map
//! one-to-one onto the native flag words.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::api::models::{NetworkCredential, RasError};
use crate::native::{DialExtensionFlags, EapFlags};
use crate::types::constants::timeouts;
use crate::Result;

/// What to dial.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DialTarget {
    /// Dial a bare phone number (or VPN host) without a phone-book entry.
    PhoneNumber(String),
    /// Dial a phone-book entry.
    Entry {
        /// Name of the entry.
        name: String,
        /// Path of the phone book holding the entry.
        phone_book: PathBuf,
    },
}

impl DialTarget {
    /// Returns the `(phone book, entry name)` pair for entry targets.
    pub fn entry(&self) -> Option<(&PathBuf, &str)> {
        match self {
            Self::Entry { name, phone_book } => Some((phone_book, name.as_str())),
            Self::PhoneNumber(_) => None,
        }
    }
}

/// Whether credentials used by a successful dial are written back to the
/// credential store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AutoUpdateCredentials {
    /// Never write credentials back.
    #[default]
    None,
    /// Store them for the current user.
    User,
    /// Store them for every user of the machine.
    AllUsers,
}

/// Dial behavior options.
///
/// Each field maps onto exactly one bit of [`DialExtensionFlags`].
///
/// # Example
///
/// ```rust
/// use rasrs::DialOptions;
/// use rasrs::native::DialExtensionFlags;
///
/// let opts = DialOptions {
///     disable_reconnect: true,
///     ..Default::default()
/// };
///
/// assert_eq!(opts.to_flags(), DialExtensionFlags::DISABLE_RECONNECT);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DialOptions {
    /// Apply the entry's dialing prefix and suffix.
    pub use_prefix_suffix: bool,
    /// Accept paused states instead of failing on them.
    pub paused_states: bool,
    /// Turn the modem speaker on.
    pub set_modem_speaker: bool,
    /// Turn software compression on.
    pub set_software_compression: bool,
    /// Suppress the "connected" notification UI.
    pub disable_connected_ui: bool,
    /// Suppress the reconnect UI.
    pub disable_reconnect_ui: bool,
    /// Do not redial on link failure.
    pub disable_reconnect: bool,
    /// No user is logged on; never prompt.
    pub no_user: bool,
    /// Dial in router mode.
    pub router: bool,
    /// Use the entry's custom dialer.
    pub custom_dial: bool,
    /// Run custom scripting once connected.
    pub use_custom_scripting: bool,
}

impl DialOptions {
    /// Builds the native flag word for these options.
    pub fn to_flags(&self) -> DialExtensionFlags {
        let mut flags = DialExtensionFlags::empty();
        flags.set(DialExtensionFlags::USE_PREFIX_SUFFIX, self.use_prefix_suffix);
        flags.set(DialExtensionFlags::PAUSED_STATES, self.paused_states);
        flags.set(DialExtensionFlags::SET_MODEM_SPEAKER, self.set_modem_speaker);
        flags.set(
            DialExtensionFlags::SET_SOFTWARE_COMPRESSION,
            self.set_software_compression,
        );
        flags.set(
            DialExtensionFlags::DISABLE_CONNECTED_UI,
            self.disable_connected_ui,
        );
        flags.set(
            DialExtensionFlags::DISABLE_RECONNECT_UI,
            self.disable_reconnect_ui,
        );
        flags.set(DialExtensionFlags::DISABLE_RECONNECT, self.disable_reconnect);
        flags.set(DialExtensionFlags::NO_USER, self.no_user);
        flags.set(DialExtensionFlags::ROUTER, self.router);
        flags.set(DialExtensionFlags::CUSTOM_DIAL, self.custom_dial);
        flags.set(
            DialExtensionFlags::USE_CUSTOM_SCRIPTING,
            self.use_custom_scripting,
        );
        flags
    }
}

/// EAP behavior options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EapOptions {
    /// Never show EAP user interface.
    pub non_interactive: bool,
    /// Use the logon context of the current user.
    pub logon: bool,
    /// Prompt for identity before dialing.
    pub preview: bool,
}

impl EapOptions {
    /// Builds the native EAP flag word for these options.
    pub fn to_flags(&self) -> EapFlags {
        let mut flags = EapFlags::empty();
        flags.set(EapFlags::NON_INTERACTIVE, self.non_interactive);
        flags.set(EapFlags::LOGON, self.logon);
        flags.set(EapFlags::PREVIEW, self.preview);
        flags
    }
}

/// Configuration for a [`Dialer`](crate::Dialer).
///
/// # Example
///
/// ```rust
/// use rasrs::{AutoUpdateCredentials, DialerConfig, NetworkCredential};
/// use std::time::Duration;
///
/// let config = DialerConfig::new()
///     .with_entry("Office VPN", "/etc/ppp/rasphone.pbk")
///     .with_credentials(NetworkCredential::new("alice", "secret"))
///     .with_auto_update_credentials(AutoUpdateCredentials::User)
///     .with_timeout(Duration::from_secs(60));
///
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct DialerConfig {
    /// What to dial. Required.
    pub target: Option<DialTarget>,
    /// One-based sub-entry to dial; `0` dials every sub-entry.
    pub sub_entry_index: u32,
    /// Caller-defined value echoed back in every state notification.
    pub callback_id: u64,
    /// Explicit credentials.
    pub credentials: Option<NetworkCredential>,
    /// Dial behavior options.
    pub options: DialOptions,
    /// EAP behavior options.
    pub eap_options: EapOptions,
    /// EAP identity blob; overrides the one stored for the entry.
    pub eap_user_data: Option<Vec<u8>>,
    /// Abort asynchronous attempts that have not completed in time.
    pub timeout: Option<Duration>,
    /// Fall back to the credential store when no credentials are given.
    pub allow_stored_credentials: bool,
    /// Write credentials back after a successful dial.
    pub auto_update_credentials: AutoUpdateCredentials,
    /// Polling interval used when hanging up an aborted attempt.
    pub hang_up_poll_interval: Duration,
}

impl Default for DialerConfig {
    /// Returns the default configuration.
    ///
    /// Defaults:
    /// - no target
    /// - all sub-entries, callback id `0`
    /// - no timeout
    /// - stored credentials allowed, never written back
    /// - 50 ms hang-up polling
    fn default() -> Self {
        Self {
            target: None,
            sub_entry_index: 0,
            callback_id: 0,
            credentials: None,
            options: DialOptions::default(),
            eap_options: EapOptions::default(),
            eap_user_data: None,
            timeout: None,
            allow_stored_credentials: true,
            auto_update_credentials: AutoUpdateCredentials::None,
            hang_up_poll_interval: timeouts::hang_up_poll_interval(),
        }
    }
}

impl DialerConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Dials a phone-book entry.
    #[must_use]
    pub fn with_entry(mut self, name: impl Into<String>, phone_book: impl Into<PathBuf>) -> Self {
        self.target = Some(DialTarget::Entry {
            name: name.into(),
            phone_book: phone_book.into(),
        });
        self
    }

    /// Dials a bare phone number.
    #[must_use]
    pub fn with_phone_number(mut self, number: impl Into<String>) -> Self {
        self.target = Some(DialTarget::PhoneNumber(number.into()));
        self
    }

    /// Sets the one-based sub-entry to dial.
    #[must_use]
    pub fn with_sub_entry_index(mut self, index: u32) -> Self {
        self.sub_entry_index = index;
        self
    }

    /// Sets the value echoed back in state notifications.
    #[must_use]
    pub fn with_callback_id(mut self, id: u64) -> Self {
        self.callback_id = id;
        self
    }

    /// Sets explicit credentials.
    #[must_use]
    pub fn with_credentials(mut self, credentials: NetworkCredential) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Sets dial behavior options.
    #[must_use]
    pub fn with_options(mut self, options: DialOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets EAP behavior options.
    #[must_use]
    pub fn with_eap_options(mut self, options: EapOptions) -> Self {
        self.eap_options = options;
        self
    }

    /// Sets the EAP identity blob.
    #[must_use]
    pub fn with_eap_user_data(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.eap_user_data = Some(data.into());
        self
    }

    /// Sets the timeout for asynchronous attempts.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Allows or forbids falling back to stored credentials.
    #[must_use]
    pub fn with_stored_credentials(mut self, allow: bool) -> Self {
        self.allow_stored_credentials = allow;
        self
    }

    /// Sets whether credentials are written back after a successful dial.
    #[must_use]
    pub fn with_auto_update_credentials(mut self, mode: AutoUpdateCredentials) -> Self {
        self.auto_update_credentials = mode;
        self
    }

    /// Sets the hang-up polling interval.
    #[must_use]
    pub fn with_hang_up_poll_interval(mut self, interval: Duration) -> Self {
        self.hang_up_poll_interval = interval;
        self
    }

    /// Checks that the configuration identifies something to dial.
    ///
    /// # Errors
    ///
    /// Returns `RasError::NoDialTarget` if no target is set, or
    /// `RasError::InvalidConfig` for empty target strings or a zero timeout.
    pub fn validate(&self) -> Result<()> {
        match &self.target {
            None => return Err(RasError::NoDialTarget),
            Some(DialTarget::PhoneNumber(number)) if number.trim().is_empty() => {
                return Err(RasError::InvalidConfig("phone number is empty".into()));
            }
            Some(DialTarget::Entry { name, phone_book }) => {
                if name.trim().is_empty() {
                    return Err(RasError::InvalidConfig("entry name is empty".into()));
                }
                if phone_book.as_os_str().is_empty() {
                    return Err(RasError::InvalidConfig("phone book path is empty".into()));
                }
            }
            Some(DialTarget::PhoneNumber(_)) => {}
        }

        if self.timeout.is_some_and(|t| t.is_zero()) {
            return Err(RasError::InvalidConfig("timeout must be non-zero".into()));
        }

        Ok(())
    }
}
