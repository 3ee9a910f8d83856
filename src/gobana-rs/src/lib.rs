//! Gobana Client Library
//!
//! HTTP client for talking to an Elasticsearch-compatible REST API.

mod client;

pub use client::{to_json, Connection};
pub use gobana_core::ConnectionConfig;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid proxy '{proxy}': {source}")]
    InvalidProxy {
        proxy: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Invalid response from server: body is not a JSON object")]
    InvalidResponse,
}

pub type Result<T> = std::result::Result<T, ClientError>;
