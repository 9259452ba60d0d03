//! Filesystem-backed run state.

pub mod json_file;

pub use json_file::JsonFileStateStore;
