//! Boundary to the native remote-access layer.
//!
//! The crate never talks to the operating system directly. Everything it
//! needs from the native layer is expressed by the [`RasApi`] and
//! [`CredentialStore`] traits, which callers implement (or fake, in tests)
//! and inject into [`RasClient`](crate::RasClient).

mod credential_store;
mod gateway;
mod params;
mod wait_handle;

pub use credential_store::CredentialStore;
pub use gateway::{DialCallback, DialNotification, NativeError, RasApi};
pub use params::{DialExtensionFlags, DialExtensions, DialParams, EapFlags, NativeBuffer};
pub use wait_handle::WaitHandle;
