use crate::engine::error::Result;
use crate::engine::import;
use crate::engine::Engine;
use crate::services::grid::with_connection;
use crate::session::SessionStore;
use actix_web::{web, HttpRequest, HttpResponse, Responder, ResponseError};
use common::requests::ExecuteImportRequest;
use common::responses::ExecuteImportResponse;
use log::warn;

/// Stage two of an import: commits the rows of a previously checked file.
pub async fn process(
    req: HttpRequest,
    body: web::Json<ExecuteImportRequest>,
    engine: web::Data<Engine>,
    sessions: web::Data<SessionStore>,
) -> impl Responder {
    match execute(&req, body.into_inner(), &engine, &sessions).await {
        Ok(count) => HttpResponse::Ok().json(ExecuteImportResponse {
            success: true,
            count,
        }),
        Err(e) => {
            warn!("Import execution failed: {}", e);
            e.error_response()
        }
    }
}

async fn execute(
    req: &HttpRequest,
    request: ExecuteImportRequest,
    engine: &Engine,
    sessions: &SessionStore,
) -> Result<u64> {
    sessions.verify(req).await?;
    let schema = engine.registry.dataset(&request.module)?;
    let handle = request.temp_file;
    with_connection(engine, move |conn, engine| {
        import::execute_import(conn, &engine.staging, &schema, &handle)
    })
    .await
}
