//! Core internal logic for dialing.
//!
//! The public [`Dialer`] lives here together with the pieces it owns for
//! the duration of one attempt: the timeout timer, the native EAP buffer
//! and the credential write-back context.

pub(crate) mod attempt;
pub(crate) mod credentials;
pub(crate) mod dialer;
pub(crate) mod eap;
pub(crate) mod timer;

pub use dialer::{AsyncDial, Dialer};
