use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;

use crate::error::{GobanaError, Result};

/// One aggregation as returned by the engine, e.g. `{"active": 10}`
pub type AggregationResult = Map<String, Value>;

/// ElasticsearchResult represents a decoded search response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ElasticsearchResult {
    #[serde(default, deserialize_with = "null_as_default")]
    pub took: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub timed_out: bool,
    #[serde(rename = "_shards", default, deserialize_with = "null_as_default")]
    pub shards: ShardStats,
    #[serde(default, deserialize_with = "null_as_default")]
    pub hits: HitsResult,
    /// Engine-reported failure; decoding never fails because of it
    #[serde(
        default,
        deserialize_with = "engine_error",
        skip_serializing_if = "Option::is_none"
    )]
    pub error: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: i64,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "HashMap::is_empty"
    )]
    pub aggregations: HashMap<String, AggregationResult>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShardStats {
    #[serde(default, deserialize_with = "null_as_default")]
    pub total: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub successful: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub skipped: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub failed: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HitsResult {
    /// Total matches; may exceed `hits.len()`
    #[serde(default, deserialize_with = "hit_total")]
    pub total: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub max_score: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub hits: Vec<Hit>,
}

/// Hit is one returned document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Hit {
    #[serde(rename = "_index", default, deserialize_with = "null_as_default")]
    pub index: String,
    #[serde(rename = "_type", default, deserialize_with = "null_as_default")]
    pub doc_type: String,
    #[serde(rename = "_id", default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(rename = "_score", default, deserialize_with = "null_as_default")]
    pub score: f64,
    #[serde(rename = "_source", default, deserialize_with = "null_as_default")]
    pub source: Map<String, Value>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// `hits.total` is a plain count before ES 7 and `{"value": n, "relation": ..}` after
fn hit_total<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Total {
        Count(u64),
        Object {
            #[serde(default)]
            value: u64,
        },
    }

    Ok(match Option::<Total>::deserialize(deserializer)? {
        Some(Total::Count(n)) => n,
        Some(Total::Object { value }) => value,
        None => 0,
    })
}

/// Older engines report `error` as a string, newer ones as an object
fn engine_error<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        None => None,
        Some(Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

/// Decode a raw response body
pub fn decode_result(raw: &[u8]) -> Result<ElasticsearchResult> {
    match raw.iter().find(|b| !b.is_ascii_whitespace()) {
        Some(b'{') => {}
        _ => {
            return Err(GobanaError::InvalidResponseBody(
                <serde_json::Error as serde::de::Error>::custom(
                    "response body is not a JSON object",
                ),
            ))
        }
    }

    serde_json::from_slice(raw).map_err(GobanaError::InvalidResponseBody)
}

/// Serialize `result` as JSON into `path`, creating or truncating it
pub fn write_result(result: &ElasticsearchResult, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let write_error = |source: std::io::Error| {
        tracing::error!(path = %path.display(), error = %source, "Failed to write result");
        GobanaError::ResultWrite {
            path: path.to_path_buf(),
            source,
        }
    };

    let output = serde_json::to_vec(result)
        .map_err(|e| write_error(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;

    let mut options = std::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path).map_err(write_error)?;
    // `mode` only applies on creation; an existing file keeps its bits otherwise
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(std::fs::Permissions::from_mode(0o600))
            .map_err(write_error)?;
    }
    file.write_all(&output).map_err(write_error)?;
    file.flush().map_err(write_error)?;

    tracing::info!(path = %path.display(), bytes = output.len(), "Wrote result");
    Ok(())
}

impl ElasticsearchResult {
    pub fn write_file(&self, path: impl AsRef<Path>) -> Result<()> {
        write_result(self, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENARIO: &str = r#"{"took":5,"timed_out":false,"_shards":{"total":1,"successful":1,"skipped":0,"failed":0},"hits":{"total":2,"max_score":1.0,"hits":[{"_index":"i","_type":"t","_id":"1","_score":1.0,"_source":{"name":"alice"}},{"_index":"i","_type":"t","_id":"2","_score":0.5,"_source":{}}]}}"#;

    #[test]
    fn test_decode_scenario() {
        let result = decode_result(SCENARIO.as_bytes()).unwrap();
        assert_eq!(result.took, 5);
        assert!(!result.timed_out);
        assert_eq!(result.shards.total, 1);
        assert_eq!(result.shards.successful, 1);
        assert_eq!(result.hits.total, 2);
        assert_eq!(result.hits.max_score, 1.0);
        assert_eq!(result.hits.hits.len(), 2);
        assert_eq!(result.hits.hits[0].index, "i");
        assert_eq!(result.hits.hits[0].doc_type, "t");
        assert_eq!(result.hits.hits[0].id, "1");
        assert_eq!(result.hits.hits[1].score, 0.5);
        assert_eq!(result.hits.hits[0].source["name"], "alice");
        assert!(result.error.is_none());
        assert_eq!(result.status, 0);
        assert!(result.aggregations.is_empty());
    }

    #[test]
    fn test_decode_missing_and_unknown_fields() {
        let result = decode_result(br#"{"unknown":{"a":1},"hits":{"hits":[{"_id":"x"}]}}"#).unwrap();
        assert_eq!(result.took, 0);
        assert_eq!(result.hits.total, 0);
        assert_eq!(result.hits.hits[0].id, "x");
        assert!(result.hits.hits[0].source.is_empty());
    }

    #[test]
    fn test_decode_nulls_and_modern_total() {
        let raw = br#"{"took":3,"hits":{"total":{"value":42,"relation":"gte"},"max_score":null,"hits":[{"_id":"a","_score":null,"_source":{"n":1}}]}}"#;
        let result = decode_result(raw).unwrap();
        assert_eq!(result.hits.total, 42);
        assert_eq!(result.hits.max_score, 0.0);
        assert_eq!(result.hits.hits[0].score, 0.0);
    }

    #[test]
    fn test_decode_engine_error_is_not_a_failure() {
        let result = decode_result(br#"{"error":"index_not_found_exception","status":404}"#).unwrap();
        assert_eq!(result.error.as_deref(), Some("index_not_found_exception"));
        assert_eq!(result.status, 404);

        let result = decode_result(
            br#"{"error":{"type":"parsing_exception","reason":"bad"},"status":400}"#,
        )
        .unwrap();
        let error: Value = serde_json::from_str(result.error.as_deref().unwrap()).unwrap();
        assert_eq!(error["type"], "parsing_exception");
        assert_eq!(result.status, 400);
    }

    #[test]
    fn test_decode_aggregations() {
        let raw = br#"{"aggregations":{"status_terms":{"active":10,"inactive":3}}}"#;
        let result = decode_result(raw).unwrap();
        let agg = &result.aggregations["status_terms"];
        assert_eq!(agg["active"], 10);
        assert_eq!(agg["inactive"], 3);
    }

    #[test]
    fn test_decode_rejects_invalid_bodies() {
        for raw in [
            &b"not json"[..],
            &b"[1,2,3]"[..],
            &b"42"[..],
            &b""[..],
            &b"{\"took\":"[..],
            &b"<html>502 Bad Gateway</html>"[..],
        ] {
            let err = decode_result(raw).unwrap_err();
            assert!(matches!(err, GobanaError::InvalidResponseBody(_)));
            assert_eq!(err.class(), crate::ErrorClass::Decode);
        }
    }

    #[test]
    fn test_write_and_read_back() {
        let raw = br#"{"took":7,"timed_out":true,"_shards":{"total":2,"successful":1,"skipped":0,"failed":1},"hits":{"total":{"value":9,"relation":"eq"},"max_score":2.25,"hits":[{"_index":"logs","_type":"_doc","_id":"a1","_score":2.25,"_source":{"msg":"hi","tags":["x","y"],"n":1.5}}]},"error":"partial","status":200,"aggregations":{"by_host":{"buckets":[{"key":"web1","doc_count":3}]},"avg":{"value":null}}}"#;
        let original = decode_result(raw).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("result.json");
        write_result(&original, &path).unwrap();

        let written = std::fs::read(&path).unwrap();
        let reread = decode_result(&written).unwrap();
        assert_eq!(reread, original);

        let json: Value = serde_json::from_slice(&written).unwrap();
        assert!(json.get("_shards").is_some());
        assert_eq!(json["hits"]["total"], 9);
        assert_eq!(json["hits"]["hits"][0]["_id"], "a1");
    }

    #[cfg(unix)]
    #[test]
    fn test_write_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        ElasticsearchResult::default().write_file(&path).unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[cfg(unix)]
    #[test]
    fn test_write_tightens_existing_file() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        std::fs::write(&path, "old contents that are longer than the result").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();

        ElasticsearchResult::default().write_file(&path).unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        let reread = decode_result(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(reread, ElasticsearchResult::default());
    }

    #[test]
    fn test_write_failure_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("no_such_dir").join("out.json");
        let err = write_result(&ElasticsearchResult::default(), &path).unwrap_err();
        assert!(matches!(err, GobanaError::ResultWrite { .. }));
        assert_eq!(err.class(), crate::ErrorClass::Io);
    }
}
