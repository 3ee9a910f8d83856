//! Offline Extraction Example
//!
//! Runs the gobana pipeline against a canned response instead of a live
//! Elasticsearch: template rendering, decoding, single values and an
//! aggregation.
//!
//! Run with: cargo run -p gobana-core --example offline_extract

use gobana_core::*;
use std::sync::Arc;

const RESPONSE: &str = r#"{
  "took": 3,
  "timed_out": false,
  "_shards": {"total": 1, "successful": 1, "skipped": 0, "failed": 0},
  "hits": {
    "total": {"value": 2, "relation": "eq"},
    "max_score": 1.0,
    "hits": [
      {"_index": "users", "_type": "_doc", "_id": "1", "_score": 1.0, "_source": {"name": "alice", "age": 31}},
      {"_index": "users", "_type": "_doc", "_id": "2", "_score": 0.5, "_source": {"age": 27}}
    ]
  },
  "aggregations": {"status_terms": {"active": 10, "inactive": 3}}
}"#;

/// Answers every query with `RESPONSE`
struct CannedTransport;

#[async_trait::async_trait]
impl Transport for CannedTransport {
    async fn post(&self, path: &str, body: &[u8]) -> anyhow::Result<Vec<u8>> {
        println!("-> POST {} {}", path, String::from_utf8_lossy(body));
        Ok(RESPONSE.as_bytes().to_vec())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    println!("gobana offline example\n");

    let source = QuerySource {
        query: Some(r#"{"query":{"range":{"age":{"gte":{{.min_age}}}}}}"#.to_string()),
        use_template: true,
        template_data: vec!["min_age=18".to_string()],
        ..Default::default()
    };
    let gobana = Gobana::new(
        Arc::new(CannedTransport),
        &source,
        "users/_search",
        HandlerOptions::default(),
    )?;

    let result = gobana.execute().await?;
    println!("took {}ms, {} total hits\n", result.took, result.hits.total);

    let mut stdout = std::io::stdout();

    println!("Single value 'name':");
    let found = result.single_value("name", OutputOptions::default(), &mut stdout)?;
    println!("({} of {} hits had it)\n", found, result.hits.hits.len());

    println!("Aggregation 'status_terms', values only:");
    result.get_aggregation(
        "status_terms",
        OutputOptions { value_only: true },
        &mut stdout,
    )?;

    Ok(())
}
