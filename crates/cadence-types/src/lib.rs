//! Shared domain types for Cadence.
//!
//! This crate contains the data shapes used across the workspace: workflow
//! definitions, the run's template scope, session backend wire types, tool
//! descriptions and configuration.
//!
//! Zero infrastructure dependencies -- only serde, serde_json, thiserror.

pub mod config;
pub mod scope;
pub mod session;
pub mod tool;
pub mod workflow;
