//! A Rust library for dialing and watching remote-access connections.
//!
//! This crate provides a high-level API over a platform's remote-access
//! (dial-up and VPN) service:
//!
//! - Dialing phone-book entries or phone numbers, blocking or asynchronously
//! - Cancelling and timing out asynchronous dials
//! - Resolving and saving credentials through a credential store
//! - Watching for connections being established or terminated
//! - Listing and hanging up active connections
//!
//! The native service itself is reached through the traits in [`native`],
//! which the embedding application implements.
//!
//! # Example
//!
//! ```ignore
//! use rasrs::{DialerConfig, RasClient};
//! use std::time::Duration;
//!
//! # async fn example(native: std::sync::Arc<dyn rasrs::native::RasApi>) -> rasrs::Result<()> {
//! let client = RasClient::new(native);
//!
//! let dialer = client.dialer(
//!     DialerConfig::new()
//!         .with_entry("Office VPN", "/etc/ras/rasphone.pbk")
//!         .with_timeout(Duration::from_secs(60)),
//! );
//! dialer.on_state_changed(|e| println!("{}", e.state));
//!
//! let handle = dialer.dial_async()?.connected().await?;
//!
//! let watcher = client.watcher();
//! watcher.set_handle(Some(handle))?;
//! watcher.on_disconnected(|e| println!("{} dropped", e.connection.entry_name));
//! watcher.set_enable_raising_events(true)?;
//! # Ok(())
//! # }
//! ```
//!
//! # Error Handling
//!
//! Calls made by the application return `Result<T, RasError>`. Errors that
//! happen on native callback threads, including panics in event handlers,
//! are contained and reported through the component's `on_error` event.
//!
//! # Logging
//!
//! This crate uses the [`log`](https://docs.rs/log) facade for logging. To see
//! log output, add a logging implementation like `env_logger`.

// Internal implementation modules
mod core;
mod monitoring;
mod types;
mod util;

// Public API modules
pub mod api;
pub mod native;

// Re-exported public API
pub use api::config::{AutoUpdateCredentials, DialOptions, DialTarget, DialerConfig, EapOptions};
pub use api::events::{BandwidthEvent, ConnectionEvent, DialCompletedEvent, StateChangedEvent};
pub use api::models::{
    ChangeCategory, ConnectionHandle, ConnectionSnapshotEntry, DeviceDescriptor, DialError,
    DialState, NetworkCredential, RasError,
};
pub use api::ras_client::RasClient;
pub use self::core::{AsyncDial, Dialer};
pub use monitoring::ConnectionWatcher;

/// A specialized `Result` type for remote-access operations.
pub type Result<T> = std::result::Result<T, RasError>;
