//! Session backend adapters.

pub mod http;

pub use http::HttpSessionBackend;
