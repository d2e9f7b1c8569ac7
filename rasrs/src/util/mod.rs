//! Internal utilities.

pub(crate) mod utils;
