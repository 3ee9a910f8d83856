//! gobana - query Elasticsearch from the command line
//!
//! This crate holds the two binaries and the glue they share:
//!
//! - `gobana` runs one query and prints values from the result
//! - `elastui` serves a static front end and proxies `/api/*` to Elasticsearch
//!
//! # Usage
//!
//! ```bash
//! gobana -H es.local -q '{"size":1}' -S name -V
//! elastui --listen 127.0.0.1:8080
//! ```

pub use gobana_core;
pub use gobana_rs;

pub mod api;
pub mod cli;
pub mod telemetry;
pub mod tls;
