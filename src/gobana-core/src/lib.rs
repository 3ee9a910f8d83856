//! Gobana Core Library
//!
//! This crate provides the query pipeline behind gobana, including:
//! - Query building from a literal or a file, with template rendering
//! - Decoding of Elasticsearch search responses
//! - Single value and aggregation extraction
//! - Writing results back to JSON

pub mod config;
pub mod error;
pub mod extract;
pub mod handler;
pub mod query;
pub mod result;
pub mod template;
pub mod transport;

// Re-export commonly used types
pub use config::{Config, ConnectionConfig};
pub use error::{ErrorClass, GobanaError, Result};
pub use extract::{format_value, OutputOptions};
pub use handler::{Gobana, HandlerOptions, DEFAULT_ENDPOINT};
pub use query::{build_query, QuerySource};
pub use result::{decode_result, write_result, AggregationResult, ElasticsearchResult, Hit};
pub use transport::Transport;
