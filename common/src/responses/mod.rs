//! Response bodies produced by the grid endpoints.

use crate::model::import::ImportStats;
use crate::model::schema::DatasetSchema;
use crate::model::value::Record;
use serde::{Deserialize, Serialize};

/// Generic `{success, message?}` envelope used by writes and failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Outcome {
    pub fn ok() -> Self {
        Outcome {
            success: true,
            message: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Outcome {
            success: false,
            message: Some(message.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigResponse {
    pub success: bool,
    pub config: DatasetSchema,
}

/// A list result is either a page with its total or a flat array of rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ListResponse {
    Page {
        pagination: bool,
        data: Vec<Record>,
        total: u64,
    },
    Flat(Vec<Record>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckImportResponse {
    pub success: bool,
    pub stats: ImportStats,
    pub temp_file: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteImportResponse {
    pub success: bool,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResponse {
    pub success: bool,
    pub token: String,
}
