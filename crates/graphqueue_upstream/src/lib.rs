//! Typed HTTP client for the upstream graph-runner service.

pub mod client;
pub mod error;

pub use client::UpstreamClient;
pub use error::UpstreamError;
