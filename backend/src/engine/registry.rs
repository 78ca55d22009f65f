//! Read-only catalog of grid definitions, built once at start-up.

use crate::engine::db::is_valid_identifier;
use crate::engine::error::{GridError, Result};
use common::model::schema::{DatasetSchema, GridDefinitions, LookupSource};
use log::{info, warn};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Arc;

/// Definitions used when no definitions file is configured.
const DEMO_DEFINITIONS: &str = include_str!("../../grids/demo.json");

#[derive(Debug, Default)]
pub struct SchemaRegistry {
    datasets: BTreeMap<String, Arc<DatasetSchema>>,
    lookups: BTreeMap<String, LookupSource>,
}

impl SchemaRegistry {
    /// Loads definitions from `path`, or the embedded demo definitions.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let registry = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|e| {
                    GridError::Configuration(format!(
                        "Cannot read grid definitions {}: {}",
                        path.display(),
                        e
                    ))
                })?;
                Self::from_json(&text)?
            }
            None => Self::from_json(DEMO_DEFINITIONS)?,
        };
        info!(
            "Loaded {} grid module(s) and {} lookup source(s)",
            registry.datasets.len(),
            registry.lookups.len()
        );
        Ok(registry)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let definitions: GridDefinitions = serde_json::from_str(text)
            .map_err(|e| GridError::Configuration(format!("Invalid grid definitions: {}", e)))?;
        Self::from_definitions(definitions)
    }

    pub fn from_definitions(definitions: GridDefinitions) -> Result<Self> {
        for (key, lookup) in &definitions.lookups {
            for ident in [&lookup.table, &lookup.id_column, &lookup.label_column] {
                ensure_identifier(ident, &format!("lookup '{}'", key))?;
            }
        }

        let mut datasets = BTreeMap::new();
        for (key, mut schema) in definitions.modules {
            validate_dataset(&key, &schema, &definitions.lookups)?;
            schema.module = key.clone();
            datasets.insert(key, Arc::new(schema));
        }

        Ok(SchemaRegistry {
            datasets,
            lookups: definitions.lookups,
        })
    }

    /// Resolves a module key, failing before any storage access.
    pub fn dataset(&self, module: &str) -> Result<Arc<DatasetSchema>> {
        self.datasets
            .get(module)
            .cloned()
            .ok_or_else(|| GridError::unknown_module(module))
    }

    pub fn lookup(&self, key: &str) -> Option<&LookupSource> {
        self.lookups.get(key)
    }
}

fn ensure_identifier(name: &str, context: &str) -> Result<()> {
    if is_valid_identifier(name) {
        Ok(())
    } else {
        Err(GridError::Configuration(format!(
            "{}: '{}' is not a valid identifier",
            context, name
        )))
    }
}

fn validate_dataset(
    key: &str,
    schema: &DatasetSchema,
    lookups: &BTreeMap<String, LookupSource>,
) -> Result<()> {
    if key.trim().is_empty() {
        return Err(GridError::Configuration("Module key must not be empty".into()));
    }
    let context = format!("module '{}'", key);
    ensure_identifier(&schema.table_name, &context)?;
    if let Some(edit) = &schema.edit_table_name {
        ensure_identifier(edit, &context)?;
    }
    ensure_identifier(&schema.primary_key, &context)?;

    let mut seen = HashSet::new();
    for field in &schema.fields {
        ensure_identifier(&field.name, &context)?;
        if !seen.insert(field.name.as_str()) {
            return Err(GridError::Configuration(format!(
                "{}: duplicate field '{}'",
                context, field.name
            )));
        }
        if field.source.is_some() && field.options.is_some() {
            warn!(
                "{}: field '{}' declares both source and options, options take precedence",
                context, field.name
            );
        }
        if let Some(source) = &field.source {
            if !lookups.contains_key(source) {
                warn!(
                    "{}: field '{}' references unknown lookup '{}'",
                    context, field.name, source
                );
            }
        }
    }
    if schema.field(&schema.primary_key).is_none() {
        warn!(
            "{}: primary key '{}' is not declared as a field",
            context, schema.primary_key
        );
    }
    Ok(())
}
