use crate::engine::error::Result;
use crate::engine::writer;
use crate::engine::Engine;
use crate::services::grid::with_connection;
use crate::session::SessionStore;
use actix_web::{web, HttpRequest, HttpResponse, Responder, ResponseError};
use common::requests::DeleteRequest;
use common::responses::Outcome;
use log::{info, warn};

pub async fn process(
    req: HttpRequest,
    body: web::Json<DeleteRequest>,
    engine: web::Data<Engine>,
    sessions: web::Data<SessionStore>,
) -> impl Responder {
    match delete_record(&req, body.into_inner(), &engine, &sessions).await {
        Ok(()) => HttpResponse::Ok().json(Outcome::ok()),
        Err(e) => {
            warn!("Delete rejected: {}", e);
            e.error_response()
        }
    }
}

async fn delete_record(
    req: &HttpRequest,
    request: DeleteRequest,
    engine: &Engine,
    sessions: &SessionStore,
) -> Result<()> {
    sessions.verify(req).await?;
    let schema = engine.registry.dataset(&request.module)?;
    let id = request.id;
    let rows = with_connection(engine, move |conn, _| writer::delete(conn, &schema, id.as_ref())).await?;
    info!("Soft-deleted {} row(s) in module {}", rows, request.module);
    Ok(())
}
