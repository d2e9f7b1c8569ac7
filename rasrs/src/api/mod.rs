//! Public API module.
//!
//! Configuration, data types, events and the [`RasClient`] facade.

pub mod config;
pub mod events;
pub mod models;
pub mod ras_client;
