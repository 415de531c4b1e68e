//! Provider specific [`ClientWrapper`](crate::client_wrapper::ClientWrapper) implementations.

pub mod common;
pub mod gemini;
pub mod http_pool;
