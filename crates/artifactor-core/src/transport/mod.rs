//! HTTP transport with bounded retries and exponential backoff

mod client;
mod retry;

pub use client::*;
pub use retry::*;
