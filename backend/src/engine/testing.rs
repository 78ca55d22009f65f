//! Fixtures shared by the engine and service tests.

use crate::engine::db::{register_functions, Database};
use crate::engine::registry::SchemaRegistry;
use crate::engine::staging::StagingArea;
use crate::engine::Engine;
use common::model::schema::GridDefinitions;
use rusqlite::Connection;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

const DEMO_DEFINITIONS: &str = include_str!("../../grids/demo.json");
const DEMO_SQL: &str = include_str!("../../grids/demo.sql");

const PEOPLE_MODULE: &str = r#"{
    "tableName": "people",
    "fields": [
        { "name": "id", "type": "hidden" },
        { "name": "name", "caption": "Name", "type": "text", "mandatory": true },
        { "name": "age", "caption": "Age", "type": "numeric" }
    ]
}"#;

const PEOPLE_SQL: &str = "CREATE TABLE IF NOT EXISTS people (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT,
    age REAL,
    del INTEGER NOT NULL DEFAULT 0
);";

/// Demo definitions plus a small `people` dataset.
pub fn registry() -> SchemaRegistry {
    let mut definitions: GridDefinitions = serde_json::from_str(DEMO_DEFINITIONS).unwrap();
    definitions
        .modules
        .insert("people".into(), serde_json::from_str(PEOPLE_MODULE).unwrap());
    SchemaRegistry::from_definitions(definitions).unwrap()
}

pub fn create_tables(conn: &Connection) {
    conn.execute_batch(DEMO_SQL).unwrap();
    conn.execute_batch(PEOPLE_SQL).unwrap();
}

pub fn demo_connection() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    register_functions(&conn).unwrap();
    create_tables(&conn);
    conn
}

/// An engine backed by files under `dir`.
pub fn engine(dir: &Path) -> Engine {
    let db = Database::new(dir.join("grid.sqlite"), Duration::from_secs(2));
    create_tables(&db.connect().unwrap());
    Engine {
        registry: Arc::new(registry()),
        db,
        staging: Arc::new(
            StagingArea::open(dir.join("staging"), Duration::from_secs(3600)).unwrap(),
        ),
    }
}
