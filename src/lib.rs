//! Large object middleware for a Swift-compatible object storage proxy.
//!
//! Transparently composes many stored segments into one logical object on
//! reads, and decomposes a client upload into a persisted manifest of
//! segment references on writes. Static large objects (SLO) are
//! client-authored, validated, and persisted manifests; dynamic large
//! objects (DLO) are resolved from a container listing at read time.

pub mod config;
pub mod delete;
pub mod error;
pub mod headers;
pub mod info;
pub mod logging;
pub mod manifest;
pub mod middleware;
pub mod path;
pub mod pipeline;
pub mod range;
pub mod read;
pub mod segment;
pub mod sink;
pub mod write;

pub use error::{ProxyError, Result};
