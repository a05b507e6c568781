//! Content hashing for canonical rows
//!
//! The hash covers every `raw_staging` column except lineage and the hash
//! itself. Content fields are encoded as compact JSON with keys sorted at every
//! level, then digested with SHA-256. Two rows with equal content hash equal
//! regardless of vendor file position or run.

use elig_common::db::table_schemas::LINEAGE_COLUMNS;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

use crate::models::{CanonicalRow, FieldValue};

/// Columns of `columns` that participate in the hash
pub fn content_columns(columns: &[String]) -> Vec<&str> {
    columns
        .iter()
        .map(String::as_str)
        .filter(|c| !LINEAGE_COLUMNS.contains(c))
        .collect()
}

/// Lowercase hex SHA-256 of the row's content fields
///
/// `columns` is the content universe (normally the `raw_staging` column list);
/// fields the row does not carry are encoded as `null`.
pub fn content_hash(row: &CanonicalRow, columns: &[String]) -> String {
    let mut content = Map::new();
    for column in content_columns(columns) {
        let value = row.get(column).map(FieldValue::to_json).unwrap_or(Value::Null);
        content.insert(column.to_string(), value);
    }

    let encoded = canonical_json(&Value::Object(content));
    let digest = Sha256::digest(encoded.as_bytes());
    format!("{:x}", digest)
}

/// Compact JSON with object keys sorted recursively
pub fn canonical_json(value: &Value) -> String {
    sort_keys(value).to_string()
}

fn sort_keys(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<&String, Value> =
                map.iter().map(|(k, v)| (k, sort_keys(v))).collect();
            let mut out = Map::with_capacity(sorted.len());
            for (k, v) in sorted {
                out.insert(k.clone(), v);
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(sort_keys).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn columns() -> Vec<String> {
        [
            "load_run_id",
            "source_vendor",
            "source_file",
            "source_row",
            "ingested_at",
            "member_id",
            "first_name_raw",
            "dob_raw",
            "record_hash_raw",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    fn row(member: &str, first: &str, run: &str, source_row: i64) -> CanonicalRow {
        let mut row = CanonicalRow::new();
        row.set("member_id", member.into());
        row.set("first_name_raw", first.into());
        row.set("load_run_id", run.into());
        row.set("source_row", source_row.into());
        row.set("ingested_at", "2025-01-01T00:00:00Z".into());
        row
    }

    #[test]
    fn test_canonical_json_sorts_nested_keys() {
        let value = json!({"b": 1, "a": {"z": null, "c": [{"y": 2, "x": 1}]}});
        assert_eq!(
            canonical_json(&value),
            r#"{"a":{"c":[{"x":1,"y":2}],"z":null},"b":1}"#
        );
    }

    #[test]
    fn test_known_digest() {
        // sha256 of {"dob_raw":null,"first_name_raw":"ana","member_id":"1"}
        let r = row("1", "ana", "r1", 1);
        let expected = {
            let digest = Sha256::digest(br#"{"dob_raw":null,"first_name_raw":"ana","member_id":"1"}"#);
            format!("{:x}", digest)
        };
        assert_eq!(content_hash(&r, &columns()), expected);
        assert_eq!(expected.len(), 64);
    }

    #[test]
    fn test_lineage_does_not_affect_hash() {
        let a = row("1", "ana", "run-a", 1);
        let mut b = row("1", "ana", "run-b", 99);
        b.set("ingested_at", "2030-06-01T12:00:00Z".into());
        b.set("record_hash_raw", "stale".into());
        assert_eq!(content_hash(&a, &columns()), content_hash(&b, &columns()));
    }

    #[test]
    fn test_every_content_field_changes_hash() {
        let base = row("1", "ana", "r", 1);
        let h = content_hash(&base, &columns());
        assert_eq!(h, content_hash(&base, &columns()));

        let mut changed = base.clone();
        changed.set("first_name_raw", "anna".into());
        assert_ne!(h, content_hash(&changed, &columns()));

        let mut changed = base.clone();
        changed.set("dob_raw", "1990-01-01".into());
        assert_ne!(h, content_hash(&changed, &columns()));

        let mut changed = base;
        changed.set("member_id", FieldValue::Null);
        assert_ne!(h, content_hash(&changed, &columns()));
    }

    #[test]
    fn test_fields_outside_universe_are_ignored() {
        let base = row("1", "ana", "r", 1);
        let mut extra = base.clone();
        extra.set("not_a_column", "x".into());
        assert_eq!(content_hash(&base, &columns()), content_hash(&extra, &columns()));
    }
}
