//! Line-delimited JSON feeds
//!
//! Each non-blank line must be one JSON object. The first line that is not
//! fails the whole read; nothing is skipped.

use serde_json::Value;
use std::fs::File;
use std::io::{BufRead, BufReader, ErrorKind};
use std::path::Path;

use super::RecordIter;
use crate::error::{IngestError, IngestResult};
use crate::models::RawRecord;

pub fn read_jsonl(path: &Path) -> IngestResult<RecordIter> {
    let reader = BufReader::new(File::open(path)?);
    let file = path.display().to_string();

    let records = reader
        .lines()
        .enumerate()
        .filter_map(move |(idx, line)| {
            let line_no = idx + 1;
            let line = match line {
                Ok(line) => line,
                Err(e) if e.kind() == ErrorKind::InvalidData => {
                    return Some(Err(IngestError::ParseFailure {
                        file: file.clone(),
                        line: line_no,
                        reason: "line is not valid UTF-8".to_string(),
                    }))
                }
                Err(e) => return Some(Err(IngestError::Io(e))),
            };
            let trimmed = line.trim();
            if trimmed.is_empty() {
                return None;
            }
            Some(parse_line(&file, line_no, trimmed))
        });

    Ok(Box::new(records))
}

fn parse_line(file: &str, line: usize, text: &str) -> IngestResult<RawRecord> {
    let failure = |reason: String| IngestError::ParseFailure {
        file: file.to_string(),
        line,
        reason,
    };

    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Ok(RawRecord::from_json_object(map)),
        Ok(other) => Err(failure(format!(
            "expected a JSON object, found {}",
            json_kind(&other)
        ))),
        Err(e) => Err(failure(e.to_string())),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Non-blank lines in the file
pub fn count_jsonl(path: &Path) -> IngestResult<u64> {
    let reader = BufReader::new(File::open(path)?);
    let mut count = 0;
    for line in reader.lines() {
        if !line?.trim().is_empty() {
            count += 1;
        }
    }
    Ok(count)
}
