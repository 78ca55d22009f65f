use crate::model::value::Scalar;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// The closed set of field types a grid definition may declare.
///
/// Every behaviour that depends on the type (how a scalar filter matches,
/// whether a value must parse as a number, how a value is displayed) is
/// answered here so callers match exhaustively instead of comparing strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FieldType {
    #[default]
    Text,
    Numeric,
    Date,
    Datetime,
    Checkbox,
    Select,
    Autocomplete,
    Hidden,
    HiddenNumeric,
    Textarea,
}

/// How a single-value filter compares against a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarMatch {
    Exact,
    Contains,
}

impl FieldType {
    pub fn scalar_match(self) -> ScalarMatch {
        match self {
            FieldType::Hidden
            | FieldType::HiddenNumeric
            | FieldType::Numeric
            | FieldType::Select
            | FieldType::Checkbox
            | FieldType::Date
            | FieldType::Datetime => ScalarMatch::Exact,
            FieldType::Text | FieldType::Textarea | FieldType::Autocomplete => {
                ScalarMatch::Contains
            }
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, FieldType::Numeric | FieldType::HiddenNumeric)
    }

    /// Types whose stored value is an id that resolves to a label.
    pub fn is_option_backed(self) -> bool {
        matches!(self, FieldType::Select | FieldType::Autocomplete)
    }
}

fn default_true() -> bool {
    true
}

/// One column of a grid definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSchema {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(rename = "type", default)]
    pub field_type: FieldType,
    #[serde(default)]
    pub grid: bool,
    #[serde(default)]
    pub filter: bool,
    #[serde(default = "default_true")]
    pub editable: bool,
    #[serde(default)]
    pub mandatory: bool,
    #[serde(default)]
    pub multiple_filter: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<BTreeMap<String, String>>,
    #[serde(default = "default_true", alias = "export")]
    pub exportable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Scalar>,
    /// Presentation settings (width, css class, ...) echoed to clients as-is.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FieldSchema {
    /// Caption shown to users, falling back to the field name.
    pub fn label(&self) -> &str {
        self.caption.as_deref().unwrap_or(&self.name)
    }
}

fn default_primary_key() -> String {
    "id".to_string()
}

/// The full declaration of one grid: where it reads, where it writes and
/// which fields it exposes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetSchema {
    /// Registry key of this dataset. Filled in by the registry, echoed to callers.
    #[serde(default)]
    pub module: String,
    pub table_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edit_table_name: Option<String>,
    #[serde(default = "default_primary_key")]
    pub primary_key: String,
    pub fields: Vec<FieldSchema>,
    /// Grid-level presentation settings the engine does not interpret
    /// (`allowAdd`, `pagination`, `pageSize`, `customButtons`, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DatasetSchema {
    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Table targeted by inserts, updates and soft deletes.
    pub fn write_table(&self) -> &str {
        self.edit_table_name.as_deref().unwrap_or(&self.table_name)
    }

    /// Whether `table` is one of the tables this dataset is allowed to touch.
    pub fn declares_table(&self, table: &str) -> bool {
        self.table_name == table || self.edit_table_name.as_deref() == Some(table)
    }
}

/// A named lookup table that feeds select-type fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupSource {
    pub table: String,
    pub id_column: String,
    pub label_column: String,
    /// Extra SQL condition, trusted because it only comes from static configuration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
}

/// The on-disk grid definition document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GridDefinitions {
    #[serde(default)]
    pub modules: BTreeMap<String, DatasetSchema>,
    #[serde(default)]
    pub lookups: BTreeMap<String, LookupSource>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_defaults_follow_definition_conventions() {
        let field: FieldSchema =
            serde_json::from_str(r#"{"name": "qty", "type": "numeric", "export": false}"#)
                .unwrap();
        assert_eq!(field.field_type, FieldType::Numeric);
        assert!(field.editable);
        assert!(!field.exportable);
        assert!(!field.mandatory);
        assert_eq!(field.label(), "qty");

        let hidden: FieldSchema =
            serde_json::from_str(r#"{"name": "invoice_id", "type": "hidden-numeric"}"#).unwrap();
        assert_eq!(hidden.field_type, FieldType::HiddenNumeric);
        assert!(hidden.field_type.is_numeric());
    }

    #[test]
    fn dataset_write_table_prefers_edit_table() {
        let schema: DatasetSchema = serde_json::from_str(
            r#"{"tableName": "v_items", "editTableName": "items", "fields": []}"#,
        )
        .unwrap();
        assert_eq!(schema.primary_key, "id");
        assert_eq!(schema.write_table(), "items");
        assert!(schema.declares_table("v_items"));
        assert!(schema.declares_table("items"));
        assert!(!schema.declares_table("users"));
    }

    #[test]
    fn presentation_settings_survive_a_round_trip() {
        let schema: DatasetSchema = serde_json::from_str(
            r#"{"tableName": "t", "pagination": true, "pageSize": 25, "export": true,
                "customButtons": [{"label": "Print"}],
                "fields": [{"name": "a", "export": false, "width": 120}]}"#,
        )
        .unwrap();
        assert_eq!(schema.extra.get("pageSize"), Some(&Value::from(25)));
        assert!(!schema.fields[0].exportable);
        assert_eq!(schema.fields[0].extra.get("width"), Some(&Value::from(120)));
        assert!(!schema.fields[0].extra.contains_key("export"));

        let echoed = serde_json::to_value(&schema).unwrap();
        assert_eq!(echoed["pagination"], true);
        assert_eq!(echoed["export"], true);
        assert_eq!(echoed["customButtons"][0]["label"], "Print");
        assert_eq!(echoed["fields"][0]["width"], 120);
        assert_eq!(echoed["fields"][0]["exportable"], false);
    }

    #[test]
    fn scalar_match_is_exact_only_for_closed_types() {
        assert_eq!(FieldType::Checkbox.scalar_match(), ScalarMatch::Exact);
        assert_eq!(FieldType::Date.scalar_match(), ScalarMatch::Exact);
        assert_eq!(FieldType::Text.scalar_match(), ScalarMatch::Contains);
        assert_eq!(FieldType::Textarea.scalar_match(), ScalarMatch::Contains);
    }
}
