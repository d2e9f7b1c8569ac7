use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::hash::{Hash, Hasher};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::native::NativeError;
use crate::types::constants::{change_category, dial_state};

/// Opaque reference to one native connection.
///
/// A handle never owns the connection it points at. Dropping it does
/// nothing; the connection is torn down only by an explicit hang-up
/// (see [`RasClient::hang_up`](crate::RasClient::hang_up)).
///
/// Two handles are equal when their underlying values are equal, whatever
/// their multilink flag says.
///
/// # Example
///
/// ```rust
/// use rasrs::ConnectionHandle;
///
/// let bundle = ConnectionHandle::new(0x1f4);
/// let link = ConnectionHandle::multilink(0x1f4);
///
/// assert_eq!(bundle, link);
/// assert!(link.is_multilink());
/// assert!(!ConnectionHandle::INVALID.is_valid());
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ConnectionHandle {
    value: u64,
    multilink: bool,
}

impl ConnectionHandle {
    /// The null handle.
    pub const INVALID: ConnectionHandle = ConnectionHandle {
        value: 0,
        multilink: false,
    };

    /// Wraps a native handle value.
    pub const fn new(value: u64) -> Self {
        Self {
            value,
            multilink: false,
        }
    }

    /// Wraps a native handle value denoting one link of a multilink bundle.
    pub const fn multilink(value: u64) -> Self {
        Self {
            value,
            multilink: true,
        }
    }

    /// Returns the underlying native value.
    pub fn value(&self) -> u64 {
        self.value
    }

    /// Returns `true` if this handle denotes one link of a multilink bundle.
    pub fn is_multilink(&self) -> bool {
        self.multilink
    }

    /// Returns `true` unless this is the null handle.
    pub fn is_valid(&self) -> bool {
        self.value != 0
    }
}

impl PartialEq for ConnectionHandle {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl Eq for ConnectionHandle {}

impl Hash for ConnectionHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

impl Display for ConnectionHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#x}", self.value)
    }
}

/// Connection state reported by the native layer during a dial.
///
/// A dial moves roughly linearly from [`OpenPort`](DialState::OpenPort)
/// to [`Connected`](DialState::Connected), with branch points for
/// authentication retries, callbacks and paused (interactive) states. Any
/// state may instead end in [`Disconnected`](DialState::Disconnected)
/// when accompanied by a nonzero error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DialState {
    /// The communication port is about to be opened.
    OpenPort,
    /// The communication port has been opened.
    PortOpened,
    /// A device is about to be connected.
    ConnectDevice,
    /// A device has connected.
    DeviceConnected,
    /// All devices in the device chain have connected.
    AllDevicesConnected,
    /// Authentication is starting.
    Authenticate,
    /// An authentication event has occurred.
    AuthNotify,
    /// The client requested another authentication attempt.
    AuthRetry,
    /// The server requested a callback number.
    AuthCallback,
    /// The client requested a password change.
    AuthChangePassword,
    /// Projection phase is starting.
    AuthProject,
    /// Link-speed calculation is starting.
    AuthLinkSpeed,
    /// Authentication request is being acknowledged.
    AuthAck,
    /// Re-authentication after callback is starting.
    ReAuthenticate,
    /// The client has authenticated.
    Authenticated,
    /// The line is about to disconnect in preparation for a callback.
    PrepareForCallback,
    /// The client is delaying to let the modem reset.
    WaitForModemReset,
    /// The client is waiting for an incoming callback.
    WaitForCallback,
    /// Projection result information is available.
    Projected,
    /// User authentication is being started or retried.
    StartAuthentication,
    /// The client has been called back.
    CallbackComplete,
    /// The client is logging on to the network.
    LogonNetwork,
    /// One sub-entry of a multilink entry has connected.
    SubEntryConnected,
    /// One sub-entry of a multilink entry has disconnected.
    SubEntryDisconnected,
    /// Connection settings are being applied.
    ApplySettings,
    /// Paused so the caller can provide interactive input.
    Interactive,
    /// Paused for new credentials after an authentication failure.
    RetryAuthentication,
    /// Paused for a caller-supplied callback number.
    CallbackSetByCaller,
    /// Paused because the password expired.
    PasswordExpired,
    /// Paused so the caller can display the EAP user interface.
    InvokeEapUi,
    /// The connection succeeded.
    Connected,
    /// The connection failed or was disconnected.
    Disconnected,
    /// State code not mapped to a specific variant.
    Other(u32),
}

impl DialState {
    /// Returns the native code for this state.
    pub fn to_code(&self) -> u32 {
        match self {
            Self::OpenPort => dial_state::OPEN_PORT,
            Self::PortOpened => dial_state::PORT_OPENED,
            Self::ConnectDevice => dial_state::CONNECT_DEVICE,
            Self::DeviceConnected => dial_state::DEVICE_CONNECTED,
            Self::AllDevicesConnected => dial_state::ALL_DEVICES_CONNECTED,
            Self::Authenticate => dial_state::AUTHENTICATE,
            Self::AuthNotify => dial_state::AUTH_NOTIFY,
            Self::AuthRetry => dial_state::AUTH_RETRY,
            Self::AuthCallback => dial_state::AUTH_CALLBACK,
            Self::AuthChangePassword => dial_state::AUTH_CHANGE_PASSWORD,
            Self::AuthProject => dial_state::AUTH_PROJECT,
            Self::AuthLinkSpeed => dial_state::AUTH_LINK_SPEED,
            Self::AuthAck => dial_state::AUTH_ACK,
            Self::ReAuthenticate => dial_state::RE_AUTHENTICATE,
            Self::Authenticated => dial_state::AUTHENTICATED,
            Self::PrepareForCallback => dial_state::PREPARE_FOR_CALLBACK,
            Self::WaitForModemReset => dial_state::WAIT_FOR_MODEM_RESET,
            Self::WaitForCallback => dial_state::WAIT_FOR_CALLBACK,
            Self::Projected => dial_state::PROJECTED,
            Self::StartAuthentication => dial_state::START_AUTHENTICATION,
            Self::CallbackComplete => dial_state::CALLBACK_COMPLETE,
            Self::LogonNetwork => dial_state::LOGON_NETWORK,
            Self::SubEntryConnected => dial_state::SUB_ENTRY_CONNECTED,
            Self::SubEntryDisconnected => dial_state::SUB_ENTRY_DISCONNECTED,
            Self::ApplySettings => dial_state::APPLY_SETTINGS,
            Self::Interactive => dial_state::INTERACTIVE,
            Self::RetryAuthentication => dial_state::RETRY_AUTHENTICATION,
            Self::CallbackSetByCaller => dial_state::CALLBACK_SET_BY_CALLER,
            Self::PasswordExpired => dial_state::PASSWORD_EXPIRED,
            Self::InvokeEapUi => dial_state::INVOKE_EAP_UI,
            Self::Connected => dial_state::CONNECTED,
            Self::Disconnected => dial_state::DISCONNECTED,
            Self::Other(v) => *v,
        }
    }

    /// Returns `true` for [`Connected`](DialState::Connected) and
    /// [`Disconnected`](DialState::Disconnected).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Connected | Self::Disconnected)
    }

    /// Returns `true` for states in which the dial waits on the caller.
    pub fn is_paused(&self) -> bool {
        matches!(
            self,
            Self::Interactive
                | Self::RetryAuthentication
                | Self::CallbackSetByCaller
                | Self::PasswordExpired
                | Self::InvokeEapUi
        )
    }
}

impl From<u32> for DialState {
    fn from(code: u32) -> Self {
        match code {
            dial_state::OPEN_PORT => Self::OpenPort,
            dial_state::PORT_OPENED => Self::PortOpened,
            dial_state::CONNECT_DEVICE => Self::ConnectDevice,
            dial_state::DEVICE_CONNECTED => Self::DeviceConnected,
            dial_state::ALL_DEVICES_CONNECTED => Self::AllDevicesConnected,
            dial_state::AUTHENTICATE => Self::Authenticate,
            dial_state::AUTH_NOTIFY => Self::AuthNotify,
            dial_state::AUTH_RETRY => Self::AuthRetry,
            dial_state::AUTH_CALLBACK => Self::AuthCallback,
            dial_state::AUTH_CHANGE_PASSWORD => Self::AuthChangePassword,
            dial_state::AUTH_PROJECT => Self::AuthProject,
            dial_state::AUTH_LINK_SPEED => Self::AuthLinkSpeed,
            dial_state::AUTH_ACK => Self::AuthAck,
            dial_state::RE_AUTHENTICATE => Self::ReAuthenticate,
            dial_state::AUTHENTICATED => Self::Authenticated,
            dial_state::PREPARE_FOR_CALLBACK => Self::PrepareForCallback,
            dial_state::WAIT_FOR_MODEM_RESET => Self::WaitForModemReset,
            dial_state::WAIT_FOR_CALLBACK => Self::WaitForCallback,
            dial_state::PROJECTED => Self::Projected,
            dial_state::START_AUTHENTICATION => Self::StartAuthentication,
            dial_state::CALLBACK_COMPLETE => Self::CallbackComplete,
            dial_state::LOGON_NETWORK => Self::LogonNetwork,
            dial_state::SUB_ENTRY_CONNECTED => Self::SubEntryConnected,
            dial_state::SUB_ENTRY_DISCONNECTED => Self::SubEntryDisconnected,
            dial_state::APPLY_SETTINGS => Self::ApplySettings,
            dial_state::INTERACTIVE => Self::Interactive,
            dial_state::RETRY_AUTHENTICATION => Self::RetryAuthentication,
            dial_state::CALLBACK_SET_BY_CALLER => Self::CallbackSetByCaller,
            dial_state::PASSWORD_EXPIRED => Self::PasswordExpired,
            dial_state::INVOKE_EAP_UI => Self::InvokeEapUi,
            dial_state::CONNECTED => Self::Connected,
            dial_state::DISCONNECTED => Self::Disconnected,
            v => Self::Other(v),
        }
    }
}

impl Display for DialState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OpenPort => write!(f, "opening port"),
            Self::PortOpened => write!(f, "port opened"),
            Self::ConnectDevice => write!(f, "connecting device"),
            Self::DeviceConnected => write!(f, "device connected"),
            Self::AllDevicesConnected => write!(f, "all devices connected"),
            Self::Authenticate => write!(f, "authenticating"),
            Self::AuthNotify => write!(f, "authentication event"),
            Self::AuthRetry => write!(f, "retrying authentication"),
            Self::AuthCallback => write!(f, "callback requested"),
            Self::AuthChangePassword => write!(f, "changing password"),
            Self::AuthProject => write!(f, "projecting"),
            Self::AuthLinkSpeed => write!(f, "calculating link speed"),
            Self::AuthAck => write!(f, "acknowledging authentication"),
            Self::ReAuthenticate => write!(f, "re-authenticating"),
            Self::Authenticated => write!(f, "authenticated"),
            Self::PrepareForCallback => write!(f, "preparing for callback"),
            Self::WaitForModemReset => write!(f, "waiting for modem reset"),
            Self::WaitForCallback => write!(f, "waiting for callback"),
            Self::Projected => write!(f, "projected"),
            Self::StartAuthentication => write!(f, "starting authentication"),
            Self::CallbackComplete => write!(f, "callback complete"),
            Self::LogonNetwork => write!(f, "logging on to network"),
            Self::SubEntryConnected => write!(f, "sub-entry connected"),
            Self::SubEntryDisconnected => write!(f, "sub-entry disconnected"),
            Self::ApplySettings => write!(f, "applying settings"),
            Self::Interactive => write!(f, "paused for interactive input"),
            Self::RetryAuthentication => write!(f, "paused for credentials"),
            Self::CallbackSetByCaller => write!(f, "paused for callback number"),
            Self::PasswordExpired => write!(f, "paused: password expired"),
            Self::InvokeEapUi => write!(f, "paused for EAP input"),
            Self::Connected => write!(f, "connected"),
            Self::Disconnected => write!(f, "disconnected"),
            Self::Other(v) => write!(f, "unknown state ({v})"),
        }
    }
}

/// Category of connection change the native layer can signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeCategory {
    /// A connection was established.
    Connection,
    /// A connection was terminated.
    Disconnection,
    /// A link was added to a multilink connection.
    BandwidthAdded,
    /// A link was removed from a multilink connection.
    BandwidthRemoved,
}

impl ChangeCategory {
    /// Returns the native code for this category.
    pub fn to_code(&self) -> u32 {
        match self {
            Self::Connection => change_category::CONNECTION,
            Self::Disconnection => change_category::DISCONNECTION,
            Self::BandwidthAdded => change_category::BANDWIDTH_ADDED,
            Self::BandwidthRemoved => change_category::BANDWIDTH_REMOVED,
        }
    }

    /// Returns `true` for categories that only apply to one specific handle.
    pub fn requires_handle(&self) -> bool {
        matches!(self, Self::BandwidthAdded | Self::BandwidthRemoved)
    }
}

impl Display for ChangeCategory {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connection => write!(f, "connection"),
            Self::Disconnection => write!(f, "disconnection"),
            Self::BandwidthAdded => write!(f, "bandwidth added"),
            Self::BandwidthRemoved => write!(f, "bandwidth removed"),
        }
    }
}

/// The device an active connection runs over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    /// Device name (e.g. `WAN Miniport (IKEv2)`).
    pub name: String,
    /// Device type (e.g. `vpn`, `modem`, `isdn`).
    pub device_type: String,
}

/// Point-in-time description of one active connection.
///
/// A fresh snapshot is produced on every enumeration. Entries are never
/// updated in place; two snapshots are compared by [`entry_id`].
///
/// [`entry_id`]: ConnectionSnapshotEntry::entry_id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionSnapshotEntry {
    /// Handle of the connection.
    pub handle: ConnectionHandle,
    /// Name of the phone-book entry that was dialed.
    pub entry_name: String,
    /// Path of the phone book holding the entry.
    pub phone_book_path: PathBuf,
    /// Device the connection runs over.
    pub device: DeviceDescriptor,
    /// One-based index of the sub-entry (link) of a multilink entry.
    pub sub_entry_index: u32,
    /// Stable identifier of the entry.
    pub entry_id: Uuid,
    /// Logon session that owns the connection, where the platform reports it.
    pub session_id: Option<u64>,
    /// Correlation identifier of the connection, where the platform reports it.
    pub correlation_id: Option<Uuid>,
    /// Raw connection option flags, where the platform reports them.
    pub connection_options: Option<u32>,
}

/// User credentials for a dial.
///
/// The password is never printed by the `Debug` implementation.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct NetworkCredential {
    /// User name.
    pub username: String,
    /// Password.
    pub password: String,
    /// Domain, empty when not applicable.
    pub domain: String,
}

impl NetworkCredential {
    /// Creates credentials without a domain.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            domain: String::new(),
        }
    }

    /// Sets the domain.
    #[must_use]
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }
}

impl std::fmt::Debug for NetworkCredential {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkCredential")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("domain", &self.domain)
            .finish()
    }
}

/// Failure of a single dial attempt.
///
/// Carried by [`DialCompletedEvent`](crate::DialCompletedEvent) and by
/// [`RasError::Dial`], which is why it is `Clone`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DialError {
    /// The native layer reported a nonzero error code.
    #[error("dial failed with error {code} (extended {extended_code}): {message}")]
    Failed {
        code: u32,
        extended_code: u32,
        message: String,
    },

    /// The attempt did not complete before the configured timeout.
    #[error("dial timed out after {0:?}")]
    TimedOut(Duration),
}

impl DialError {
    /// Returns the native error code, if this failure carries one.
    pub fn code(&self) -> Option<u32> {
        match self {
            Self::Failed { code, .. } => Some(*code),
            Self::TimedOut(_) => None,
        }
    }

    /// Returns the extended native error code, if this failure carries one.
    pub fn extended_code(&self) -> Option<u32> {
        match self {
            Self::Failed { extended_code, .. } => Some(*extended_code),
            Self::TimedOut(_) => None,
        }
    }
}

/// Errors that can occur while dialing or watching connections.
#[derive(Debug, Error)]
pub enum RasError {
    /// Neither a phone number nor an entry with its phone book was given.
    #[error("no dial target: set a phone number or an entry name with its phone book")]
    NoDialTarget,

    /// The dialer configuration is unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The dialer already has an attempt in flight.
    #[error("a dial is already in progress")]
    DialInProgress(Option<ConnectionHandle>),

    /// The dial attempt failed.
    #[error(transparent)]
    Dial(#[from] DialError),

    /// The dial attempt was cancelled before it completed.
    #[error("dial was cancelled")]
    Cancelled,

    /// A native call failed.
    #[error("native call failed with error {code} (extended {extended_code})")]
    Native { code: u32, extended_code: u32 },

    /// The native layer does not provide the requested feature.
    #[error("not supported on this platform: {0}")]
    NotSupported(String),

    /// The credential store failed.
    #[error("credential store failed: {0}")]
    CredentialStore(String),

    /// No async runtime was available to drive notifications.
    #[error("no async runtime available: {0}")]
    Runtime(String),

    /// A callback panicked and the panic was contained.
    #[error("callback panicked: {0}")]
    CallbackPanicked(String),
}

impl From<NativeError> for RasError {
    fn from(err: NativeError) -> Self {
        match err {
            NativeError::Code {
                code,
                extended_code,
            } => RasError::Native {
                code,
                extended_code,
            },
            NativeError::EntryPointNotFound(name) => RasError::NotSupported(name),
        }
    }
}
