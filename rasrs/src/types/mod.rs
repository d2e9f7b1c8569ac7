//! Type definitions and constants.
//!
//! Native codes and default timings.

pub(crate) mod constants;
