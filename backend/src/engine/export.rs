//! CSV export of a filtered dataset, with values resolved the way a grid
//! displays them.

use crate::engine::error::{GridError, Result};
use crate::engine::options;
use crate::engine::predicate::Predicate;
use crate::engine::query::{self, ListParams};
use crate::engine::registry::SchemaRegistry;
use common::model::option::OptionItem;
use common::model::schema::{DatasetSchema, FieldSchema, FieldType};
use common::model::value::{Record, Scalar};
use csv::Writer;
use rusqlite::Connection;
use std::collections::BTreeMap;

const BOM: &[u8] = "\u{feff}".as_bytes();

/// Lookup sources needed to display the exported columns.
pub fn option_sources(schema: &DatasetSchema) -> Vec<&str> {
    let mut sources: Vec<&str> = schema
        .fields
        .iter()
        .filter(|f| f.exportable && f.field_type.is_option_backed() && f.options.is_none())
        .filter_map(|f| f.source.as_deref())
        .collect();
    sources.sort_unstable();
    sources.dedup();
    sources
}

/// Display form of a stored value.
pub fn display_value(
    field: &FieldSchema,
    value: Option<&Scalar>,
    lookups: &BTreeMap<String, Vec<OptionItem>>,
) -> String {
    let Some(value) = value.filter(|v| !matches!(v, Scalar::Null)) else {
        return String::new();
    };
    let raw = value.to_text();
    match field.field_type {
        FieldType::Checkbox => {
            let checked = match value {
                Scalar::Bool(b) => *b,
                Scalar::Integer(i) => *i != 0,
                Scalar::Real(f) => *f != 0.0,
                _ => raw.trim() == "1",
            };
            (if checked { "Yes" } else { "No" }).to_string()
        }
        FieldType::Select | FieldType::Autocomplete => {
            if let Some(label) = field.options.as_ref().and_then(|o| o.get(&*raw)) {
                return label.clone();
            }
            field
                .source
                .as_ref()
                .and_then(|source| lookups.get(source))
                .and_then(|items| items.iter().find(|item| item.id.to_text() == raw))
                .map(|item| item.label.clone())
                .unwrap_or_else(|| raw.into_owned())
        }
        FieldType::Text
        | FieldType::Textarea
        | FieldType::Numeric
        | FieldType::HiddenNumeric
        | FieldType::Hidden
        | FieldType::Date
        | FieldType::Datetime => raw.into_owned(),
    }
}

/// Renders rows as CSV: a caption header, exportable fields only, UTF-8 BOM first.
pub fn render_csv(
    schema: &DatasetSchema,
    rows: &[Record],
    lookups: &BTreeMap<String, Vec<OptionItem>>,
) -> Result<Vec<u8>> {
    let fields: Vec<&FieldSchema> = schema.fields.iter().filter(|f| f.exportable).collect();
    let mut writer = Writer::from_writer(BOM.to_vec());
    writer
        .write_record(fields.iter().map(|f| f.label()))
        .map_err(|e| GridError::Export(e.to_string()))?;
    for row in rows {
        writer
            .write_record(
                fields
                    .iter()
                    .map(|f| display_value(f, row.get(&f.name), lookups)),
            )
            .map_err(|e| GridError::Export(e.to_string()))?;
    }
    writer
        .into_inner()
        .map_err(|e| GridError::Export(e.to_string()))
}

pub fn file_name(schema: &DatasetSchema) -> String {
    format!("export_{}.csv", schema.table_name)
}

/// Lists every matching row (no pagination) and renders it as CSV.
pub fn export(
    conn: &Connection,
    registry: &SchemaRegistry,
    schema: &DatasetSchema,
    predicate: &Predicate,
    params: &ListParams,
) -> Result<Vec<u8>> {
    let params = ListParams {
        page: None,
        ..params.clone()
    };
    let rows = query::list(conn, schema, predicate, &params)?.into_rows();
    let lookups = options::resolve_all(conn, registry, option_sources(schema));
    render_csv(schema, &rows, &lookups)
}
