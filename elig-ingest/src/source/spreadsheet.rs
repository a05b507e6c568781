//! Spreadsheet feeds (xlsx, plus anything else calamine can open)
//!
//! The first row of the sheet's used range is the header. Every cell is
//! rendered as text; a data row is kept only if at least one cell is non-blank.

use calamine::{open_workbook_auto, Data, Range, Reader};
use std::path::Path;
use tracing::debug;

use super::RecordIter;
use crate::error::{IngestError, IngestResult};
use crate::models::{FieldValue, RawRecord};

fn load_range(path: &Path, sheet: Option<&str>) -> IngestResult<(String, Range<Data>)> {
    let mut workbook = open_workbook_auto(path).map_err(|e| IngestError::ParseFailure {
        file: path.display().to_string(),
        line: 0,
        reason: e.to_string(),
    })?;

    let names = workbook.sheet_names();
    let sheet_name = match sheet {
        Some(wanted) => names
            .iter()
            .find(|n| n.as_str() == wanted)
            .cloned()
            .ok_or_else(|| {
                IngestError::SourceNotFound(format!(
                    "sheet '{}' not found in {} (sheets: {})",
                    wanted,
                    path.display(),
                    names.join(", ")
                ))
            })?,
        None => names.first().cloned().ok_or_else(|| {
            IngestError::SourceNotFound(format!("{} contains no sheets", path.display()))
        })?,
    };

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| IngestError::ParseFailure {
            file: path.display().to_string(),
            line: 0,
            reason: format!("sheet '{}': {}", sheet_name, e),
        })?;

    Ok((sheet_name, range))
}

/// Text rendering of one cell; `None` for blank and error cells
pub fn cell_text(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty | Data::Error(_) => None,
        Data::String(s) if s.is_empty() => None,
        Data::String(s) => Some(s.clone()),
        Data::Int(i) => Some(i.to_string()),
        Data::Float(f) => Some(render_float(*f)),
        Data::Bool(b) => Some(if *b { "TRUE" } else { "FALSE" }.to_string()),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(ndt) => Some(ndt.format("%Y-%m-%d %H:%M:%S").to_string()),
            None => Some(render_float(dt.as_f64())),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => Some(s.clone()),
    }
}

/// Whole floats lose their fractional part so numeric ids read back as typed
fn render_float(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 {
        format!("{}", f as i64)
    } else {
        f.to_string()
    }
}

fn is_blank(cell: &Data) -> bool {
    cell_text(cell)
        .map(|s| s.trim().is_empty())
        .unwrap_or(true)
}

fn header_names(row: &[Data]) -> Vec<String> {
    row.iter()
        .enumerate()
        .map(|(i, cell)| cell_text(cell).unwrap_or_else(|| format!("Unnamed: {}", i)))
        .collect()
}

/// Read the configured sheet, or the first sheet when none is configured
pub fn read_spreadsheet(path: &Path, sheet: Option<&str>) -> IngestResult<RecordIter> {
    let (sheet_name, range) = load_range(path, sheet)?;

    let mut rows = range.rows();
    let headers = match rows.next() {
        Some(row) => header_names(row),
        None => return Ok(Box::new(std::iter::empty())),
    };

    let records: Vec<IngestResult<RawRecord>> = rows
        .filter(|row| !row.iter().all(is_blank))
        .map(|row| {
            let mut record = RawRecord::new();
            for (i, name) in headers.iter().enumerate() {
                let value = row
                    .get(i)
                    .and_then(cell_text)
                    .map(FieldValue::Text)
                    .unwrap_or(FieldValue::Null);
                record.insert(name.as_str(), value);
            }
            Ok(record)
        })
        .collect();

    debug!(
        sheet = %sheet_name,
        rows = records.len(),
        "Read spreadsheet {}",
        path.display()
    );
    Ok(Box::new(records.into_iter()))
}

/// Non-blank data rows, header excluded
pub fn count_spreadsheet(path: &Path, sheet: Option<&str>) -> IngestResult<u64> {
    let (_, range) = load_range(path, sheet)?;
    Ok(range
        .rows()
        .skip(1)
        .filter(|row| !row.iter().all(is_blank))
        .count() as u64)
}
