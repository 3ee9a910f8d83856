//! Derived views of a decoded result: one field per hit, or one aggregation
//!
//! Both extractors write lines to a caller-supplied sink so the CLI can hand
//! them stdout while tests collect into a buffer.

use serde_json::Value;
use std::io::Write;

use crate::error::Result;
use crate::result::ElasticsearchResult;

/// Output formatting shared by the extractors
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutputOptions {
    /// Print only values, without the hit id / aggregation key prefix
    pub value_only: bool,
}

impl ElasticsearchResult {
    /// Print `field` from the source of every hit that has it.
    ///
    /// Hits are visited in response order. Returns how many hits had the field.
    pub fn single_value<W: Write>(
        &self,
        field: &str,
        options: OutputOptions,
        out: &mut W,
    ) -> Result<u64> {
        tracing::info!(field = %field, "Collecting single values");
        let mut found = 0u64;

        for hit in &self.hits.hits {
            let value = hit.source.get(field);
            if let Some(value) = value {
                let rendered = format_value(value);
                if options.value_only {
                    writeln!(out, "{}", rendered)?;
                } else {
                    writeln!(out, "{}:{}", hit.id, rendered)?;
                }
                found += 1;
            }
            tracing::debug!(
                id = %hit.id,
                index = %hit.index,
                doc_type = %hit.doc_type,
                has_field = value.is_some(),
                "Processed hit"
            );
        }

        tracing::info!(found, "Finished collecting single values");
        Ok(found)
    }

    /// Print every key/value pair of the aggregation called `name`.
    ///
    /// A missing aggregation is logged and yields no lines. Returns the
    /// number of lines written.
    pub fn get_aggregation<W: Write>(
        &self,
        name: &str,
        options: OutputOptions,
        out: &mut W,
    ) -> Result<usize> {
        tracing::info!(aggregation = %name, "Collecting aggregation");

        let Some(aggregation) = self.aggregations.get(name) else {
            tracing::warn!(aggregation = %name, "Aggregation not found");
            return Ok(0);
        };

        for (key, value) in aggregation {
            let rendered = format_value(value);
            if options.value_only {
                writeln!(out, "{}", rendered)?;
            } else {
                writeln!(out, "{}:{}", key, rendered)?;
            }
            tracing::debug!(aggregation = %name, key = %key, value = %rendered, "Processed aggregation entry");
        }

        Ok(aggregation.len())
    }
}

/// Render a JSON value for line output.
///
/// Strings print raw, numbers without trailing zeros, `null` as `<nil>`,
/// arrays as `[a b]` and objects as `map[k:v]` with sorted keys.
pub fn format_value(value: &Value) -> String {
    match value {
        Value::Null => "<nil>".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i.to_string()
            } else if let Some(u) = n.as_u64() {
                u.to_string()
            } else {
                n.as_f64().map(format_float).unwrap_or_else(|| n.to_string())
            }
        }
        Value::String(s) => s.clone(),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().map(format_value).collect();
            format!("[{}]", parts.join(" "))
        }
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let parts: Vec<String> = entries
                .into_iter()
                .map(|(k, v)| format!("{}:{}", k, format_value(v)))
                .collect();
            format!("map[{}]", parts.join(" "))
        }
    }
}

/// Shortest decimal form; exponent form (`1e+21`, `1.5e-07`) outside [1e-4, 1e21)
fn format_float(f: f64) -> String {
    let abs = f.abs();
    if abs == 0.0 || (1e-4..1e21).contains(&abs) {
        return f.to_string();
    }
    let sci = format!("{:e}", f);
    match sci.split_once('e') {
        Some((mantissa, exp)) => {
            let (sign, digits) = match exp.strip_prefix('-') {
                Some(digits) => ('-', digits),
                None => ('+', exp),
            };
            format!("{}e{}{:0>2}", mantissa, sign, digits)
        }
        None => sci,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::decode_result;
    use serde_json::json;

    const SCENARIO: &str = r#"{"took":5,"timed_out":false,"_shards":{"total":1,"successful":1,"skipped":0,"failed":0},"hits":{"total":2,"max_score":1.0,"hits":[{"_index":"i","_type":"t","_id":"1","_score":1.0,"_source":{"name":"alice"}},{"_index":"i","_type":"t","_id":"2","_score":0.5,"_source":{}}]}}"#;

    fn lines(buf: &[u8]) -> Vec<String> {
        String::from_utf8(buf.to_vec())
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_single_value_scenario() {
        let result = decode_result(SCENARIO.as_bytes()).unwrap();
        let mut out = Vec::new();
        let count = result
            .single_value("name", OutputOptions::default(), &mut out)
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(lines(&out), vec!["1:alice"]);
    }

    #[test]
    fn test_single_value_only_mode_keeps_hit_order() {
        let result = decode_result(
            br#"{"hits":{"hits":[
                {"_id":"b","_source":{"n":2}},
                {"_id":"a","_source":{"m":0}},
                {"_id":"c","_source":{"n":1.5}},
                {"_id":"d","_source":{"n":2}}
            ]}}"#,
        )
        .unwrap();
        let mut out = Vec::new();
        let count = result
            .single_value("n", OutputOptions { value_only: true }, &mut out)
            .unwrap();
        assert_eq!(count, 3);
        assert_eq!(lines(&out), vec!["2", "1.5", "2"]);
    }

    #[test]
    fn test_single_value_no_hits() {
        let result = ElasticsearchResult::default();
        let mut out = Vec::new();
        let count = result
            .single_value("name", OutputOptions::default(), &mut out)
            .unwrap();
        assert_eq!(count, 0);
        assert!(out.is_empty());
    }

    #[test]
    fn test_aggregation_scenario() {
        let result =
            decode_result(br#"{"aggregations":{"status_terms":{"active":10,"inactive":3}}}"#)
                .unwrap();

        let mut out = Vec::new();
        let count = result
            .get_aggregation("status_terms", OutputOptions::default(), &mut out)
            .unwrap();
        assert_eq!(count, 2);
        let mut got = lines(&out);
        got.sort();
        assert_eq!(got, vec!["active:10", "inactive:3"]);

        let mut out = Vec::new();
        let count = result
            .get_aggregation("missing", OutputOptions::default(), &mut out)
            .unwrap();
        assert_eq!(count, 0);
        assert!(out.is_empty());
    }

    #[test]
    fn test_aggregation_value_only() {
        let result =
            decode_result(br#"{"aggregations":{"avg_price":{"value":12.5}}}"#).unwrap();
        let mut out = Vec::new();
        result
            .get_aggregation("avg_price", OutputOptions { value_only: true }, &mut out)
            .unwrap();
        assert_eq!(lines(&out), vec!["12.5"]);
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(&json!(null)), "<nil>");
        assert_eq!(format_value(&json!(true)), "true");
        assert_eq!(format_value(&json!(10)), "10");
        assert_eq!(format_value(&json!(10.0)), "10");
        assert_eq!(format_value(&json!(0.25)), "0.25");
        assert_eq!(format_value(&json!(-3)), "-3");
        assert_eq!(format_value(&json!(1e300)), "1e+300");
        assert_eq!(format_value(&json!(-2.5e21)), "-2.5e+21");
        assert_eq!(format_value(&json!(1.5e-7)), "1.5e-07");
        assert_eq!(format_value(&json!(0.0001)), "0.0001");
        assert_eq!(format_value(&json!(123456789.5)), "123456789.5");
        assert_eq!(format_value(&json!("plain")), "plain");
        assert_eq!(format_value(&json!(["a", 1, null])), "[a 1 <nil>]");
        assert_eq!(
            format_value(&json!({"doc_count": 3, "key": "web1"})),
            "map[doc_count:3 key:web1]"
        );
        assert_eq!(
            format_value(&json!({"buckets": [{"key": "a", "doc_count": 1}]})),
            "map[buckets:[map[doc_count:1 key:a]]]"
        );
    }

    struct BrokenSink;

    impl Write for BrokenSink {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_sink_failure_propagates() {
        let result = decode_result(SCENARIO.as_bytes()).unwrap();
        let err = result
            .single_value("name", OutputOptions::default(), &mut BrokenSink)
            .unwrap_err();
        assert_eq!(err.class(), crate::ErrorClass::Io);
    }
}
