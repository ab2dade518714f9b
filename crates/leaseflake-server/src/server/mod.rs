//! Building blocks of the `leaseflake-server` binary.
//!
//! - [`config`] - CLI and environment configuration.
//! - [`handler`] - HTTP routes over a shared [`leaseflake::IdService`].
//! - [`telemetry`] - `tracing-subscriber` initialization.

pub mod config;
pub mod handler;
pub mod telemetry;
