//! HTTP client and transport

mod client;
mod transport;

pub use client::{HttpClient, HttpClientBuilder};
pub use transport::HttpTransport;
