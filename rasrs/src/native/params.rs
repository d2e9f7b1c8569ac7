//! Parameter blocks passed to [`RasApi::begin_connect`](super::RasApi::begin_connect).

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::types::constants::{dial_options, eap_flags};

bitflags! {
    /// Dial extension option word.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct DialExtensionFlags: u32 {
        const USE_PREFIX_SUFFIX = dial_options::USE_PREFIX_SUFFIX;
        const PAUSED_STATES = dial_options::PAUSED_STATES;
        const IGNORE_MODEM_SPEAKER = dial_options::IGNORE_MODEM_SPEAKER;
        const SET_MODEM_SPEAKER = dial_options::SET_MODEM_SPEAKER;
        const IGNORE_SOFTWARE_COMPRESSION = dial_options::IGNORE_SOFTWARE_COMPRESSION;
        const SET_SOFTWARE_COMPRESSION = dial_options::SET_SOFTWARE_COMPRESSION;
        const DISABLE_CONNECTED_UI = dial_options::DISABLE_CONNECTED_UI;
        const DISABLE_RECONNECT_UI = dial_options::DISABLE_RECONNECT_UI;
        const DISABLE_RECONNECT = dial_options::DISABLE_RECONNECT;
        const NO_USER = dial_options::NO_USER;
        const PAUSE_ON_SCRIPT = dial_options::PAUSE_ON_SCRIPT;
        const ROUTER = dial_options::ROUTER;
        const CUSTOM_DIAL = dial_options::CUSTOM_DIAL;
        const USE_CUSTOM_SCRIPTING = dial_options::USE_CUSTOM_SCRIPTING;
    }
}

bitflags! {
    /// EAP behavior word.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct EapFlags: u32 {
        const NON_INTERACTIVE = eap_flags::NON_INTERACTIVE;
        const LOGON = eap_flags::LOGON;
        const PREVIEW = eap_flags::PREVIEW;
    }
}

/// A block of natively addressable memory owned by the native layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativeBuffer {
    /// Address (or allocator-defined token) of the block.
    pub address: usize,
    /// Length of the block in bytes.
    pub len: usize,
}

/// Dial parameters.
///
/// Exactly one of `phone_number` and `entry_name` identifies the target;
/// `phone_book_path` accompanies `entry_name`.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct DialParams {
    pub callback_id: u64,
    pub sub_entry_index: u32,
    pub phone_number: Option<String>,
    pub entry_name: Option<String>,
    pub phone_book_path: Option<PathBuf>,
    pub username: String,
    pub password: String,
    pub domain: String,
}

impl std::fmt::Debug for DialParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DialParams")
            .field("callback_id", &self.callback_id)
            .field("sub_entry_index", &self.sub_entry_index)
            .field("phone_number", &self.phone_number)
            .field("entry_name", &self.entry_name)
            .field("phone_book_path", &self.phone_book_path)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("domain", &self.domain)
            .finish()
    }
}

/// Dial extensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DialExtensions {
    pub options: DialExtensionFlags,
    pub eap_flags: EapFlags,
    /// EAP identity blob, valid until the attempt completes.
    pub eap_user_data: Option<NativeBuffer>,
}
