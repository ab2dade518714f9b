//! Snowflake-style 64-bit identifiers backed by leased worker identities.
//!
//! Each process leases a worker id from a shared [`LeaseStore`], keeps the
//! lease alive in the background, and composes identifiers from a timestamp,
//! that worker id, and a per-millisecond sequence:
//!
//! ```text
//!  Bit Index:  63           63 62            22 21             12 11             0
//!              +--------------+----------------+-----------------+---------------+
//!  Field:      | reserved (1) | timestamp (41) |   worker (10)   | sequence (12) |
//!              +--------------+----------------+-----------------+---------------+
//! ```
//!
//! The widths above are the default [`Layout::TWITTER`]; any split summing to
//! 63 bits can be configured.
mod config;
mod error;
mod generator;
mod id;
mod lease;
mod sequence;
#[cfg(feature = "serde")]
mod serde;
mod service;
mod time;
mod typed;

pub use crate::config::*;
pub use crate::error::*;
pub use crate::generator::*;
pub use crate::id::*;
pub use crate::lease::*;
pub use crate::sequence::*;
#[cfg(feature = "serde")]
pub use crate::serde::*;
pub use crate::service::*;
pub use crate::time::*;

#[doc(hidden)]
pub mod __private {
    #[cfg(feature = "serde")]
    pub use serde;
}
