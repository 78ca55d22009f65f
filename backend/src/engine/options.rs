use crate::engine::db::{not_deleted, quote_ident, scalar_from_sql};
use crate::engine::error::Result;
use crate::engine::registry::SchemaRegistry;
use common::model::option::OptionItem;
use common::model::schema::LookupSource;
use log::{debug, error};
use rusqlite::Connection;
use std::collections::BTreeMap;

/// Reads the choices of one lookup source, ordered by label.
pub fn fetch(conn: &Connection, lookup: &LookupSource) -> Result<Vec<OptionItem>> {
    let label = quote_ident(&lookup.label_column);
    let mut sql = format!(
        "SELECT {} AS id, {} AS label FROM {} WHERE {}",
        quote_ident(&lookup.id_column),
        label,
        quote_ident(&lookup.table),
        not_deleted()
    );
    if let Some(filter) = lookup.filter.as_deref().filter(|f| !f.trim().is_empty()) {
        sql.push_str(&format!(" AND ({})", filter));
    }
    sql.push_str(&format!(" ORDER BY {} ASC", label));

    let mut stmt = conn.prepare(&sql)?;
    let items = stmt.query_map([], |row| {
        Ok(OptionItem {
            id: scalar_from_sql(row.get_ref(0)?),
            label: scalar_from_sql(row.get_ref(1)?).to_text().into_owned(),
        })
    })?;
    Ok(items.collect::<std::result::Result<Vec<_>, _>>()?)
}

/// Resolves a source key; unknown keys and storage failures yield no choices.
pub fn resolve(conn: &Connection, registry: &SchemaRegistry, key: &str) -> Vec<OptionItem> {
    let Some(lookup) = registry.lookup(key) else {
        debug!("Unknown option source '{}'", key);
        return Vec::new();
    };
    fetch(conn, lookup).unwrap_or_else(|e| {
        error!("Could not load option source '{}': {}", key, e);
        Vec::new()
    })
}

/// Resolves every requested key; each one appears in the result.
pub fn resolve_all<'a>(
    conn: &Connection,
    registry: &SchemaRegistry,
    keys: impl IntoIterator<Item = &'a str>,
) -> BTreeMap<String, Vec<OptionItem>> {
    keys.into_iter()
        .map(|key| (key.to_string(), resolve(conn, registry, key)))
        .collect()
}
