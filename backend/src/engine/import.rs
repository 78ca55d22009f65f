//! Two-stage CSV import.
//!
//! `check_import` stages the upload and previews how many rows would be
//! inserted or updated without touching the dataset. `execute_import` claims
//! the staged file, maps its header again from scratch and writes every row
//! through the record writer. Execution reports partial success: rows that
//! fail validation or storage are logged and left out of the count, the rest
//! are committed.

use crate::engine::error::{ImportError, Result};
use crate::engine::staging::StagingArea;
use crate::engine::writer;
use common::model::import::{ImportStats, RowAction};
use common::model::schema::DatasetSchema;
use common::model::value::{is_identifier, Record, Scalar};
use csv::{ByteRecord, Reader, ReaderBuilder};
use log::{debug, info, warn};
use rusqlite::Connection;
use std::borrow::Cow;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tempfile::NamedTempFile;

const BOM: char = '\u{feff}';
const DELIMITERS: [u8; 4] = [b',', b';', b'\t', b'|'];

/// Result of the check stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportCheck {
    pub stats: ImportStats,
    pub handle: String,
}

/// CSV column index to schema field, in column order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderMap {
    columns: Vec<(usize, String)>,
}

impl HeaderMap {
    /// Matches header cells to schema fields, ignoring case, surrounding
    /// whitespace and a leading byte-order mark. When two columns name the
    /// same field the first one is kept.
    pub fn build(schema: &DatasetSchema, headers: &ByteRecord) -> std::result::Result<Self, ImportError> {
        let mut columns: Vec<(usize, String)> = Vec::new();
        for (idx, raw) in headers.iter().enumerate() {
            let raw = decode_cell(raw);
            let cell = (if idx == 0 { raw.trim_start_matches(BOM) } else { &*raw }).trim();
            let Some(field) = schema
                .fields
                .iter()
                .find(|f| f.name.eq_ignore_ascii_case(cell))
            else {
                debug!("Ignoring import column '{}'", cell);
                continue;
            };
            if columns.iter().any(|(_, name)| name == &field.name) {
                continue;
            }
            columns.push((idx, field.name.clone()));
        }
        if columns.is_empty() {
            return Err(ImportError::NoMatchingColumns);
        }
        Ok(HeaderMap { columns })
    }

    pub fn index_of(&self, field: &str) -> Option<usize> {
        self.columns
            .iter()
            .find(|(_, name)| name == field)
            .map(|(idx, _)| *idx)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(_, name)| name.as_str())
    }

    /// Classifies a row by the content of its primary-key cell.
    pub fn row_action(&self, row: &ByteRecord, primary_key: &str) -> RowAction {
        match self.index_of(primary_key).and_then(|idx| row.get(idx)) {
            Some(cell) if is_identifier(&decode_cell(cell)) => RowAction::Update,
            _ => RowAction::Insert,
        }
    }

    /// Splits a row into the record id (if it names one) and the trimmed
    /// values of every other mapped column.
    pub fn split_row(&self, row: &ByteRecord, primary_key: &str) -> (Option<Scalar>, Record) {
        let mut id = None;
        let mut data = Record::new();
        for (idx, field) in &self.columns {
            let value = decode_cell(row.get(*idx).unwrap_or_default());
            let value = value.trim();
            if field == primary_key {
                if is_identifier(value) {
                    id = Some(Scalar::Text(value.to_string()));
                }
            } else {
                data.insert(field.clone(), Scalar::Text(value.to_string()));
            }
        }
        (id, data)
    }
}

/// Text of one CSV cell. Bytes that are not valid UTF-8 are read as
/// Latin-1, the encoding of legacy spreadsheet exports.
fn decode_cell(bytes: &[u8]) -> Cow<'_, str> {
    match std::str::from_utf8(bytes) {
        Ok(text) => Cow::Borrowed(text),
        Err(_) => Cow::Owned(bytes.iter().map(|&b| char::from(b)).collect()),
    }
}

/// Picks the delimiter that occurs most often in the first line, preferring
/// the comma on ties.
fn sniff_delimiter(path: &Path) -> std::result::Result<u8, ImportError> {
    let mut first_line = Vec::new();
    BufReader::new(File::open(path)?).read_until(b'\n', &mut first_line)?;
    let mut best = (b',', 0usize);
    for delimiter in DELIMITERS {
        let count = first_line.iter().filter(|&&b| b == delimiter).count();
        if count > best.1 {
            best = (delimiter, count);
        }
    }
    Ok(best.0)
}

fn open_reader(path: &Path) -> std::result::Result<Reader<File>, ImportError> {
    let delimiter = sniff_delimiter(path)?;
    Ok(ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_path(path)?)
}

fn read_header_map(
    reader: &mut Reader<File>,
    schema: &DatasetSchema,
) -> std::result::Result<HeaderMap, ImportError> {
    let headers = reader.byte_headers()?.clone();
    let blank = headers
        .iter()
        .all(|h| decode_cell(h).trim_start_matches(BOM).trim().is_empty());
    if blank {
        return Err(ImportError::NoHeader);
    }
    HeaderMap::build(schema, &headers)
}

/// Reads a staged file once and counts inserts and updates.
pub fn preview(path: &Path, schema: &DatasetSchema) -> std::result::Result<ImportStats, ImportError> {
    let mut reader = open_reader(path)?;
    let map = read_header_map(&mut reader, schema)?;
    let mut stats = ImportStats::default();
    for result in reader.byte_records() {
        stats.record(map.row_action(&result?, &schema.primary_key));
    }
    Ok(stats)
}

/// Stage one: persist the upload, then preview it. A file that cannot be
/// previewed is removed again.
pub fn check_import(
    staging: &StagingArea,
    schema: &DatasetSchema,
    upload: NamedTempFile,
) -> Result<ImportCheck> {
    staging.sweep_expired();
    let staged = staging.persist(upload)?;
    match preview(&staged.path, schema) {
        Ok(stats) => {
            info!(
                "Import {} for module {}: {} insert(s), {} update(s)",
                staged.handle, schema.module, stats.adds, stats.updates
            );
            Ok(ImportCheck {
                stats,
                handle: staged.handle,
            })
        }
        Err(e) => {
            staging.discard(&staged.handle);
            Err(e.into())
        }
    }
}

/// Stage two: claim the staged file and write its rows. Returns the number
/// of rows written.
pub fn execute_import(
    conn: &mut Connection,
    staging: &StagingArea,
    schema: &DatasetSchema,
    handle: &str,
) -> Result<u64> {
    let claim = staging.claim(handle)?;
    let mut reader = open_reader(claim.path())?;
    let map = read_header_map(&mut reader, schema)?;

    let tx = conn.transaction()?;
    let mut written = 0u64;
    for (idx, result) in reader.byte_records().enumerate() {
        let line = idx + 2;
        let row = match result {
            Ok(row) => row,
            Err(e) => {
                warn!("Import {} line {}: unreadable row: {}", handle, line, e);
                continue;
            }
        };
        let (id, data) = map.split_row(&row, &schema.primary_key);
        if data.is_empty() {
            continue;
        }
        match writer::save(&tx, schema, id.as_ref(), &data) {
            Ok(outcome) if outcome.wrote_row() => written += 1,
            Ok(_) => debug!("Import {} line {}: no record matched {:?}", handle, line, id),
            Err(e) => warn!("Import {} line {}: {}", handle, line, e),
        }
    }
    tx.commit()?;

    info!(
        "Import {} committed {} row(s) into module {}",
        claim.handle(),
        written,
        schema.module
    );
    Ok(written)
}
