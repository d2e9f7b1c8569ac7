//! Real-time monitoring of connection changes.
//!
//! Provides [`ConnectionWatcher`], which turns native change notifications
//! into connected, disconnected and bandwidth events.

pub(crate) mod registrar;
pub(crate) mod snapshot;
pub(crate) mod watcher;

pub use watcher::ConnectionWatcher;
