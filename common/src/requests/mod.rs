//! Request payloads accepted by the grid endpoints.

use crate::model::filter::FilterValue;
use crate::model::value::{Record, Scalar};
use serde::Deserialize;
use std::collections::BTreeMap;

/// Payload for `POST /api/grid/list`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListRequest {
    pub module: String,
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default)]
    pub sort: Option<String>,
    #[serde(default)]
    pub dir: Option<String>,
    #[serde(default)]
    pub filters: BTreeMap<String, FilterValue>,
    #[serde(default)]
    pub page: Option<u64>,
    #[serde(default)]
    pub limit: Option<u64>,
    /// Export requests always receive the full, unpaginated result.
    #[serde(default)]
    pub export: bool,
}

/// Payload for `POST /api/grid/export`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExportRequest {
    pub module: String,
    #[serde(default)]
    pub sort: Option<String>,
    #[serde(default)]
    pub dir: Option<String>,
    #[serde(default)]
    pub filters: BTreeMap<String, FilterValue>,
}

/// Payload for `POST /api/grid/save`. A missing, blank or `0` id inserts.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveRequest {
    pub module: String,
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default)]
    pub id: Option<Scalar>,
    #[serde(default)]
    pub data: Record,
    /// Accepted for compatibility; the dataset's own primary key is authoritative.
    #[serde(default)]
    pub primary_key: Option<String>,
}

/// Payload for `POST /api/grid/delete`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeleteRequest {
    pub module: String,
    #[serde(default)]
    pub id: Option<Scalar>,
}

/// Payload for `POST /api/grid/import/execute`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteImportRequest {
    pub module: String,
    pub temp_file: String,
}

/// Query string of `GET /api/grid/options`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OptionsQuery {
    #[serde(default)]
    pub sources: String,
}

impl OptionsQuery {
    /// Requested source keys, trimmed, empty entries skipped.
    pub fn source_keys(&self) -> impl Iterator<Item = &str> {
        self.sources.split(',').map(str::trim).filter(|s| !s.is_empty())
    }
}
