//! HTTP surface of the grid engine.
//!
//! Routes under `/api/grid`:
//! - `GET /session`: anti-forgery token for the caller's session.
//! - `GET /config/{module}`: the dataset schema of a module.
//! - `GET /options?sources=a,b`: choices of the named lookup sources.
//! - `POST /list`: filtered, sorted and optionally paginated rows.
//! - `POST /export`: the filtered rows as a CSV attachment.
//! - `POST /save`, `POST /delete`: record writes.
//! - `POST /import/check`, `POST /import/execute`: two-stage CSV import.
//!
//! Writes and imports require the `X-CSRF-Token` header. Storage work runs on
//! the blocking thread pool with one connection per request.

use crate::engine::error::{GridError, Result};
use crate::engine::Engine;
use actix_web::web::{self, get, post, scope};
use actix_web::Scope;
use rusqlite::Connection;

mod delete;
mod export;
mod get_config;
mod import_check;
mod import_execute;
mod list;
mod options;
mod save;
mod session;

const API_PATH: &str = "/api/grid";

pub fn configure_routes() -> Scope {
    scope(API_PATH)
        .route("/session", get().to(session::process))
        .route("/config/{module}", get().to(get_config::process))
        .route("/options", get().to(options::process))
        .route("/list", post().to(list::process))
        .route("/export", post().to(export::process))
        .route("/save", post().to(save::process))
        .route("/delete", post().to(delete::process))
        .route("/import/check", post().to(import_check::process))
        .route("/import/execute", post().to(import_execute::process))
}

/// Runs blocking engine work off the async workers.
pub(crate) async fn run_blocking<T, F>(job: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    web::block(job)
        .await
        .map_err(|e| GridError::Unavailable(e.to_string()))?
}

/// Opens a connection on the blocking pool and hands it to `job`.
pub(crate) async fn with_connection<T, F>(engine: &Engine, job: F) -> Result<T>
where
    F: FnOnce(&mut Connection, &Engine) -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    let engine = engine.clone();
    run_blocking(move || {
        let mut conn = engine.db.connect()?;
        job(&mut conn, &engine)
    })
    .await
}
