//! I/O utilities for reading uploads and constructing CSV readers.
//!
//! All byte-level input flows through this module:
//!
//! - **Format resolution**: the filename extension picks the parser branch
//!   (`.csv` vs. spreadsheet). Content is never sniffed.
//! - **Size limits**: uploads larger than the configured cap are refused
//!   before any parsing starts.
//! - **Encoding**: UTF-8 (with or without BOM) by default, falling back to
//!   Windows-1252 when the bytes are not valid UTF-8.
//! - **Reader construction**: CSV readers are flexible about field counts and
//!   trim surrounding whitespace.

use std::{
    fs::{self, File},
    io::Read,
    path::Path,
};

use anyhow::{Context, Result};
use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};
use encoding_rs_io::{DecodeReaderBytes, DecodeReaderBytesBuilder};
use log::warn;

use crate::error::AnalysisError;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];
const SPREADSHEET_EXTENSIONS: &[&str] = &["xlsx", "xls", "xlsm", "xlsb", "ods"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Csv,
    Spreadsheet,
}

pub fn extension_of(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default()
}

pub fn resolve_format(filename: &str) -> Result<FileFormat, AnalysisError> {
    let extension = extension_of(filename);
    if extension == "csv" {
        Ok(FileFormat::Csv)
    } else if SPREADSHEET_EXTENSIONS.contains(&extension.as_str()) {
        Ok(FileFormat::Spreadsheet)
    } else {
        Err(AnalysisError::UnsupportedFormat {
            extension: if extension.is_empty() {
                filename.to_string()
            } else {
                format!(".{extension}")
            },
        })
    }
}

pub fn ensure_within_limit(size: u64, limit: u64) -> Result<(), AnalysisError> {
    if size > limit {
        Err(AnalysisError::FileTooLarge { size, limit })
    } else {
        Ok(())
    }
}

/// Reads a whole upload into memory, refusing files above `max_bytes`.
pub fn read_input(path: &Path, max_bytes: u64) -> Result<Vec<u8>> {
    let size = fs::metadata(path)
        .with_context(|| format!("Reading metadata for {path:?}"))?
        .len();
    ensure_within_limit(size, max_bytes).with_context(|| format!("Loading {path:?}"))?;
    let mut buffer = Vec::with_capacity(size as usize);
    File::open(path)
        .with_context(|| format!("Opening input file {path:?}"))?
        .read_to_end(&mut buffer)
        .with_context(|| format!("Reading input file {path:?}"))?;
    Ok(buffer)
}

pub fn resolve_encoding(bytes: &[u8]) -> &'static Encoding {
    let body = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    if std::str::from_utf8(body).is_ok() {
        UTF_8
    } else {
        warn!("Input is not valid UTF-8; decoding as {}", WINDOWS_1252.name());
        WINDOWS_1252
    }
}

pub fn decoding_reader(bytes: &[u8]) -> DecodeReaderBytes<&[u8], Vec<u8>> {
    let encoding = resolve_encoding(bytes);
    DecodeReaderBytesBuilder::new()
        .encoding(Some(encoding))
        .strip_bom(true)
        .build(bytes)
}

pub fn open_csv_reader<R>(reader: R) -> csv::Reader<R>
where
    R: Read,
{
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(true)
        .delimiter(b',')
        .double_quote(true)
        .trim(csv::Trim::All)
        .flexible(true);
    builder.from_reader(reader)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_format_is_case_insensitive() {
        assert_eq!(resolve_format("sales.CSV").unwrap(), FileFormat::Csv);
        assert_eq!(
            resolve_format("book.Xlsx").unwrap(),
            FileFormat::Spreadsheet
        );
        assert_eq!(resolve_format("legacy.xls").unwrap(), FileFormat::Spreadsheet);
    }

    #[test]
    fn resolve_format_rejects_unknown_extensions() {
        match resolve_format("notes.txt") {
            Err(AnalysisError::UnsupportedFormat { extension }) => assert_eq!(extension, ".txt"),
            other => panic!("unexpected result {other:?}"),
        }
        assert!(matches!(
            resolve_format("README"),
            Err(AnalysisError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn latin1_bytes_fall_back_to_windows_1252() {
        assert_eq!(resolve_encoding(b"caf\xe9"), WINDOWS_1252);
        assert_eq!(resolve_encoding("café".as_bytes()), UTF_8);
        assert_eq!(resolve_encoding(b"\xEF\xBB\xBFa,b"), UTF_8);
    }

    #[test]
    fn size_limit_is_inclusive() {
        assert!(ensure_within_limit(10, 10).is_ok());
        assert!(matches!(
            ensure_within_limit(11, 10),
            Err(AnalysisError::FileTooLarge { size: 11, limit: 10 })
        ));
    }
}
