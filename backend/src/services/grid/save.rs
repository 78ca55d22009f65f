use crate::engine::error::Result;
use crate::engine::query;
use crate::engine::writer::{self, SaveOutcome};
use crate::engine::Engine;
use crate::services::grid::with_connection;
use crate::session::SessionStore;
use actix_web::{web, HttpRequest, HttpResponse, Responder, ResponseError};
use common::requests::SaveRequest;
use common::responses::Outcome;
use log::{info, warn};

pub async fn process(
    req: HttpRequest,
    body: web::Json<SaveRequest>,
    engine: web::Data<Engine>,
    sessions: web::Data<SessionStore>,
) -> impl Responder {
    match save_record(&req, body.into_inner(), &engine, &sessions).await {
        Ok(_) => HttpResponse::Ok().json(Outcome::ok()),
        Err(e) => {
            warn!("Save rejected: {}", e);
            e.error_response()
        }
    }
}

async fn save_record(
    req: &HttpRequest,
    request: SaveRequest,
    engine: &Engine,
    sessions: &SessionStore,
) -> Result<SaveOutcome> {
    sessions.verify(req).await?;
    let schema = engine.registry.dataset(&request.module)?;
    query::resolve_table(&schema, request.table.as_deref())?;
    let module = request.module.clone();
    let outcome = with_connection(engine, move |conn, _| {
        writer::save(conn, &schema, request.id.as_ref(), &request.data)
    })
    .await?;
    info!("Saved record in module {}: {:?}", module, outcome);
    Ok(outcome)
}
