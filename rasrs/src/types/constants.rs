//! Constants for the native RAS interface values.
//!
//! These constants correspond to the numeric codes the native layer uses
//! for connection states, dial extension options, EAP flags and change
//! notification categories.

/// Native connection state codes reported through the dial callback.
pub mod dial_state {
    pub const OPEN_PORT: u32 = 0;
    pub const PORT_OPENED: u32 = 1;
    pub const CONNECT_DEVICE: u32 = 2;
    pub const DEVICE_CONNECTED: u32 = 3;
    pub const ALL_DEVICES_CONNECTED: u32 = 4;
    pub const AUTHENTICATE: u32 = 5;
    pub const AUTH_NOTIFY: u32 = 6;
    pub const AUTH_RETRY: u32 = 7;
    pub const AUTH_CALLBACK: u32 = 8;
    pub const AUTH_CHANGE_PASSWORD: u32 = 9;
    pub const AUTH_PROJECT: u32 = 10;
    pub const AUTH_LINK_SPEED: u32 = 11;
    pub const AUTH_ACK: u32 = 12;
    pub const RE_AUTHENTICATE: u32 = 13;
    pub const AUTHENTICATED: u32 = 14;
    pub const PREPARE_FOR_CALLBACK: u32 = 15;
    pub const WAIT_FOR_MODEM_RESET: u32 = 16;
    pub const WAIT_FOR_CALLBACK: u32 = 17;
    pub const PROJECTED: u32 = 18;
    pub const START_AUTHENTICATION: u32 = 19;
    pub const CALLBACK_COMPLETE: u32 = 20;
    pub const LOGON_NETWORK: u32 = 21;
    pub const SUB_ENTRY_CONNECTED: u32 = 22;
    pub const SUB_ENTRY_DISCONNECTED: u32 = 23;
    pub const APPLY_SETTINGS: u32 = 24;

    /// Base of the paused (interactive) states.
    pub const PAUSED: u32 = 0x1000;
    pub const INTERACTIVE: u32 = PAUSED;
    pub const RETRY_AUTHENTICATION: u32 = PAUSED + 1;
    pub const CALLBACK_SET_BY_CALLER: u32 = PAUSED + 2;
    pub const PASSWORD_EXPIRED: u32 = PAUSED + 3;
    pub const INVOKE_EAP_UI: u32 = PAUSED + 4;

    /// Base of the terminal states.
    pub const DONE: u32 = 0x2000;
    pub const CONNECTED: u32 = DONE;
    pub const DISCONNECTED: u32 = DONE + 1;
}

/// Dial extension option bits.
pub mod dial_options {
    pub const USE_PREFIX_SUFFIX: u32 = 0x0000_0001;
    pub const PAUSED_STATES: u32 = 0x0000_0002;
    pub const IGNORE_MODEM_SPEAKER: u32 = 0x0000_0004;
    pub const SET_MODEM_SPEAKER: u32 = 0x0000_0008;
    pub const IGNORE_SOFTWARE_COMPRESSION: u32 = 0x0000_0010;
    pub const SET_SOFTWARE_COMPRESSION: u32 = 0x0000_0020;
    pub const DISABLE_CONNECTED_UI: u32 = 0x0000_0040;
    pub const DISABLE_RECONNECT_UI: u32 = 0x0000_0080;
    pub const DISABLE_RECONNECT: u32 = 0x0000_0100;
    pub const NO_USER: u32 = 0x0000_0200;
    pub const PAUSE_ON_SCRIPT: u32 = 0x0000_0400;
    pub const ROUTER: u32 = 0x0000_0800;
    pub const CUSTOM_DIAL: u32 = 0x0000_1000;
    pub const USE_CUSTOM_SCRIPTING: u32 = 0x0000_2000;
}

/// EAP behavior bits passed alongside the dial extensions.
pub mod eap_flags {
    pub const NON_INTERACTIVE: u32 = 0x0000_0002;
    pub const LOGON: u32 = 0x0000_0004;
    pub const PREVIEW: u32 = 0x0000_0008;
}

/// Change notification categories.
pub mod change_category {
    pub const CONNECTION: u32 = 0x0000_0001;
    pub const DISCONNECTION: u32 = 0x0000_0002;
    pub const BANDWIDTH_ADDED: u32 = 0x0000_0004;
    pub const BANDWIDTH_REMOVED: u32 = 0x0000_0008;
}

/// Native error codes the crate inspects.
pub mod error_code {
    pub const SUCCESS: u32 = 0;
    /// Returned by hang-up when the handle no longer exists.
    pub const INVALID_HANDLE: u32 = 6;
}

/// Timing defaults for hang-up and dialing.
pub mod timeouts {
    use std::time::Duration;

    /// Interval at which hang-up polls for the port to close (50 milliseconds).
    const HANG_UP_POLL_INTERVAL_MS: u64 = 50;

    /// Returns the default hang-up polling interval.
    pub fn hang_up_poll_interval() -> Duration {
        Duration::from_millis(HANG_UP_POLL_INTERVAL_MS)
    }
}
