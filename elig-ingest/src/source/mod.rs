//! Source readers
//!
//! Every format yields a lazy, finite, non-restartable iterator of raw records
//! in file order. Row numbers are assigned by the consumer from position.

pub mod delimited;
pub mod jsonl;
pub mod spreadsheet;

use std::path::Path;

use crate::config::{FileFormat, VendorConfig};
use crate::error::{IngestError, IngestResult};
use crate::models::RawRecord;

/// Boxed record stream returned by every reader
pub type RecordIter = Box<dyn Iterator<Item = IngestResult<RawRecord>> + Send>;

fn ensure_exists(path: &Path) -> IngestResult<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(IngestError::SourceNotFound(path.display().to_string()))
    }
}

fn delimiter_of(config: &VendorConfig) -> u8 {
    config
        .delimiter
        .or_else(|| config.format.default_delimiter())
        .unwrap_or(b',')
}

/// Open the vendor's feed at `path` with the reader for its format
pub fn open_source(config: &VendorConfig, path: &Path) -> IngestResult<RecordIter> {
    ensure_exists(path)?;
    match config.format {
        FileFormat::Csv | FileFormat::PipeDelimited => {
            delimited::read_delimited(path, delimiter_of(config))
        }
        FileFormat::Xlsx => spreadsheet::read_spreadsheet(path, config.sheet.as_deref()),
        FileFormat::Jsonl => jsonl::read_jsonl(path),
    }
}

/// Count data records without materializing them
///
/// JSON lines are counted, not parsed, so a malformed feed still gets a count.
pub fn count_records(config: &VendorConfig, path: &Path) -> IngestResult<u64> {
    ensure_exists(path)?;
    match config.format {
        FileFormat::Csv | FileFormat::PipeDelimited => {
            delimited::count_delimited(path, delimiter_of(config))
        }
        FileFormat::Xlsx => spreadsheet::count_spreadsheet(path, config.sheet.as_deref()),
        FileFormat::Jsonl => jsonl::count_jsonl(path),
    }
}
