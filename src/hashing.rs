//! Digests for artifacts and batch reports.
//!
//! Reports are hashed over a sorted-key rendering of their JSON so the
//! digest does not depend on field order.

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::report::BatchReport;

/// Lowercase hex SHA-256 of `data`.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Digest of `report` with its own `reportHash` left blank.
pub fn report_digest(report: &BatchReport) -> Result<String, serde_json::Error> {
    let mut body = serde_json::to_value(report)?;
    if let Value::Object(fields) = &mut body {
        fields.insert("reportHash".to_string(), Value::String(String::new()));
    }
    let rendered = serde_json::to_string(&SortedKeys(&body))?;
    Ok(sha256_hex(rendered.as_bytes()))
}

/// Serializes a JSON value with object keys in byte order at every depth.
struct SortedKeys<'a>(&'a Value);

impl Serialize for SortedKeys<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0 {
            Value::Object(fields) => {
                let mut keys: Vec<&String> = fields.keys().collect();
                keys.sort();
                let mut map = serializer.serialize_map(Some(keys.len()))?;
                for key in keys {
                    map.serialize_entry(key, &SortedKeys(&fields[key.as_str()]))?;
                }
                map.end()
            }
            Value::Array(values) => serializer.collect_seq(values.iter().map(SortedKeys)),
            scalar => scalar.serialize(serializer),
        }
    }
}
