//! Business logic and port trait definitions for Cadence.
//!
//! This crate defines the "ports" (session backend, tool registry, state
//! store) that the infrastructure layer implements, plus the workflow engine
//! and both prompt executors built on top of them. It depends only on
//! `cadence-types` -- never on `cadence-infra` or any network/filesystem crate.

pub mod executor;
pub mod repository;
pub mod session;
pub mod tool;
pub mod workflow;
