//! Schema-driven dataset engine: definitions, filtering, listing, writing,
//! export and two-stage CSV import on top of SQLite.

pub mod db;
pub mod error;
pub mod export;
pub mod import;
pub mod options;
pub mod predicate;
pub mod query;
pub mod registry;
pub mod staging;
pub mod writer;

#[cfg(test)]
pub mod testing;

use crate::config::ServerConfig;
use crate::engine::db::Database;
use crate::engine::error::{GridError, Result};
use crate::engine::registry::SchemaRegistry;
use crate::engine::staging::StagingArea;
use log::info;
use std::sync::Arc;

/// Shared, read-only handles every request works with.
#[derive(Debug, Clone)]
pub struct Engine {
    pub registry: Arc<SchemaRegistry>,
    pub db: Database,
    pub staging: Arc<StagingArea>,
}

impl Engine {
    pub fn from_config(config: &ServerConfig) -> Result<Self> {
        let registry = SchemaRegistry::load(config.definitions_path.as_deref())?;
        let db = Database::new(&config.database_path, config.busy_timeout);
        if let Some(script) = &config.bootstrap_sql {
            db.bootstrap(script).map_err(|e| {
                GridError::Configuration(format!(
                    "Bootstrap script {} failed: {}",
                    script.display(),
                    e
                ))
            })?;
        }
        let staging = StagingArea::open(&config.staging_dir, config.staging_ttl).map_err(|e| {
            GridError::Configuration(format!(
                "Cannot open staging directory {}: {}",
                config.staging_dir.display(),
                e
            ))
        })?;
        info!(
            "Grid engine ready: database {}, staging {}",
            config.database_path.display(),
            config.staging_dir.display()
        );
        Ok(Engine {
            registry: Arc::new(registry),
            db,
            staging: Arc::new(staging),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_from_config_bootstraps_demo_tables() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServerConfig {
            database_path: dir.path().join("grid.sqlite"),
            staging_dir: dir.path().join("staging"),
            bootstrap_sql: Some(concat!(env!("CARGO_MANIFEST_DIR"), "/grids/demo.sql").into()),
            ..ServerConfig::default()
        };
        let engine = Engine::from_config(&config).unwrap();
        assert!(engine.staging.dir().is_dir());
        let conn = engine.db.connect().unwrap();
        let currencies: i64 = conn
            .query_row("SELECT COUNT(*) FROM demo_currencies", [], |r| r.get(0))
            .unwrap();
        assert_eq!(currencies, 3);
        assert!(engine.registry.dataset("invoice_items").is_ok());
    }
}
