//! Canonicalization: applies a vendor's compiled mapping rules to a raw record
//!
//! Rule precedence is fixed by compilation order: constants, mapped paths,
//! forced nulls, derivations, extra payload. A later rule overwrites an earlier
//! one that wrote the same field. Missing source paths resolve to null and are
//! never an error.

use serde_json::{Map, Value};

use crate::config::{Derivation, MappingRule, VendorConfig, EXTRA_PAYLOAD_FIELD};
use crate::models::{CanonicalRow, FieldValue, RawRecord};

/// Build the canonical content fields for one raw record
///
/// Lineage and the content hash are stamped afterwards by the ingestor.
pub fn canonicalize(config: &VendorConfig, raw: &RawRecord) -> CanonicalRow {
    let mut row = CanonicalRow::new();
    for rule in config.rules() {
        apply_rule(rule, raw, &mut row);
    }
    row
}

fn apply_rule(rule: &MappingRule, raw: &RawRecord, row: &mut CanonicalRow) {
    match rule {
        MappingRule::Constant { field, value } => row.set(field.as_str(), value.clone()),
        MappingRule::Path { field, path } => row.set(field.as_str(), resolve(raw, path)),
        MappingRule::ForceNull { field } => row.set(field.as_str(), FieldValue::Null),
        MappingRule::Derive { field, derivation } => {
            row.set(field.as_str(), derive(derivation, raw))
        }
        MappingRule::ExtraPayload { paths } => {
            row.set(EXTRA_PAYLOAD_FIELD, extra_payload(raw, paths))
        }
    }
}

/// Value at a dotted path, `Null` when any segment is missing
pub fn resolve(raw: &RawRecord, path: &str) -> FieldValue {
    raw.get_path(path).cloned().unwrap_or(FieldValue::Null)
}

fn derive(derivation: &Derivation, raw: &RawRecord) -> FieldValue {
    match derivation {
        Derivation::JoinYmd { year, month, day } => join_ymd(
            &resolve(raw, year),
            &resolve(raw, month),
            &resolve(raw, day),
        ),
    }
}

/// Join year, month and day into a zero-padded `YYYY-MM-DD` string
///
/// Pure string assembly: `1990/2/30` becomes `"1990-02-30"`. Any null part
/// gives `Null`.
pub fn join_ymd(year: &FieldValue, month: &FieldValue, day: &FieldValue) -> FieldValue {
    match (
        year.to_column_text(),
        month.to_column_text(),
        day.to_column_text(),
    ) {
        (Some(y), Some(m), Some(d)) => FieldValue::Text(format!(
            "{}-{}-{}",
            zero_pad(&y, 4),
            zero_pad(&m, 2),
            zero_pad(&d, 2)
        )),
        _ => FieldValue::Null,
    }
}

/// Left-pad with zeros to `width`, keeping a leading sign in front
fn zero_pad(s: &str, width: usize) -> String {
    let len = s.chars().count();
    if len >= width {
        return s.to_string();
    }
    let zeros = "0".repeat(width - len);
    match s.chars().next() {
        Some(sign @ ('-' | '+')) => format!("{}{}{}", sign, zeros, &s[1..]),
        _ => format!("{}{}", zeros, s),
    }
}

/// Selected raw fields as one JSON object string, keys in configured order
fn extra_payload(raw: &RawRecord, paths: &[String]) -> FieldValue {
    let mut object = Map::with_capacity(paths.len());
    for path in paths {
        object.insert(path.clone(), resolve(raw, path).to_json());
    }
    FieldValue::Text(Value::Object(object).to_string())
}
