//! Infrastructure layer for Cadence.
//!
//! Contains implementations of the port traits defined in `cadence-core`:
//! the JSON state file store, the HTTP session backend, and the TOML
//! configuration loader.

pub mod config;
pub mod session;
pub mod state;
