//! Delimited text feeds (comma, pipe or any single-byte delimiter)

use std::fs::File;
use std::path::Path;

use super::RecordIter;
use crate::error::{IngestError, IngestResult};
use crate::models::{FieldValue, RawRecord};

/// Field name holding values past the last header column
pub const OVERFLOW_FIELD: &str = "_overflow";

fn reader_for(path: &Path, delimiter: u8) -> IngestResult<csv::Reader<File>> {
    let file = File::open(path)?;
    Ok(csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(file))
}

fn parse_failure(path: &Path, err: &csv::Error) -> IngestError {
    IngestError::ParseFailure {
        file: path.display().to_string(),
        line: err.position().map(|p| p.line() as usize).unwrap_or(0),
        reason: err.to_string(),
    }
}

/// Stream records keyed by the header row
///
/// Empty values become `Null`; short rows are padded with `Null`; values past
/// the header width are kept as a list under [`OVERFLOW_FIELD`].
pub fn read_delimited(path: &Path, delimiter: u8) -> IngestResult<RecordIter> {
    let mut reader = reader_for(path, delimiter)?;

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| parse_failure(path, &e))?
        .iter()
        .enumerate()
        .map(|(i, h)| {
            if i == 0 {
                h.trim_start_matches('\u{feff}').to_string()
            } else {
                h.to_string()
            }
        })
        .collect();

    let path = path.to_path_buf();
    let records = reader.into_records().map(move |result| {
        let row = result.map_err(|e| parse_failure(&path, &e))?;

        let mut record = RawRecord::new();
        for (i, name) in headers.iter().enumerate() {
            let value = row
                .get(i)
                .map(FieldValue::text_or_null)
                .unwrap_or(FieldValue::Null);
            record.insert(name.as_str(), value);
        }
        if row.len() > headers.len() {
            let overflow = row
                .iter()
                .skip(headers.len())
                .map(FieldValue::text_or_null)
                .collect();
            record.insert(OVERFLOW_FIELD, FieldValue::List(overflow));
        }
        Ok(record)
    });

    Ok(Box::new(records))
}

/// Data records in the file, header excluded, blank lines ignored
pub fn count_delimited(path: &Path, delimiter: u8) -> IngestResult<u64> {
    let mut reader = reader_for(path, delimiter)?;
    let mut count = 0;
    for result in reader.records() {
        result.map_err(|e| parse_failure(path, &e))?;
        count += 1;
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_temp(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    fn read_all(path: &Path, delimiter: u8) -> Vec<RawRecord> {
        read_delimited(path, delimiter)
            .unwrap()
            .collect::<IngestResult<Vec<_>>>()
            .unwrap()
    }

    #[test]
    fn test_pipe_delimited_with_bom_and_empties() {
        let file = write_temp("\u{feff}ID|FNAME|DOB\n1|Ana|01/02/1990\n2||\n");
        let records = read_all(file.path(), b'|');

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].get("ID"), Some(&FieldValue::text("1")));
        assert_eq!(records[1].get("FNAME"), Some(&FieldValue::Null));
        assert_eq!(records[1].get("DOB"), Some(&FieldValue::Null));
    }

    #[test]
    fn test_blank_lines_skipped_and_short_rows_padded() {
        let file = write_temp("a,b,c\n1,2,3\n\n4\n");
        let records = read_all(file.path(), b',');

        assert_eq!(records.len(), 2);
        assert_eq!(records[1].get("a"), Some(&FieldValue::text("4")));
        assert_eq!(records[1].get("c"), Some(&FieldValue::Null));
        assert_eq!(count_delimited(file.path(), b',').unwrap(), 2);
    }

    #[test]
    fn test_no_type_coercion_and_overflow_kept() {
        let file = write_temp("zip,amount\n00501,1.50,extra\n");
        let records = read_all(file.path(), b',');

        assert_eq!(records[0].get("zip"), Some(&FieldValue::text("00501")));
        assert_eq!(
            records[0].get(OVERFLOW_FIELD),
            Some(&FieldValue::List(vec![FieldValue::text("extra")]))
        );
    }

    #[test]
    fn test_header_only_file_is_empty() {
        let file = write_temp("a,b\n");
        assert!(read_all(file.path(), b',').is_empty());
        assert_eq!(count_delimited(file.path(), b',').unwrap(), 0);
    }
}
