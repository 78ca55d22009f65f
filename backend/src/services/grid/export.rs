use crate::engine::error::Result;
use crate::engine::export;
use crate::engine::predicate::Predicate;
use crate::engine::query::{ListParams, SortDir};
use crate::engine::Engine;
use crate::services::grid::with_connection;
use actix_web::http::header::CONTENT_DISPOSITION;
use actix_web::{web, HttpResponse, Responder, ResponseError};
use common::requests::ExportRequest;
use log::{error, info};

pub async fn process(body: web::Json<ExportRequest>, engine: web::Data<Engine>) -> impl Responder {
    match export_csv(body.into_inner(), &engine).await {
        Ok((file_name, bytes)) => HttpResponse::Ok()
            .content_type("text/csv; charset=utf-8")
            .insert_header((
                CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file_name),
            ))
            .body(bytes),
        Err(e) => {
            error!("Export failed: {}", e);
            e.error_response()
        }
    }
}

async fn export_csv(request: ExportRequest, engine: &Engine) -> Result<(String, Vec<u8>)> {
    let schema = engine.registry.dataset(&request.module)?;
    let predicate = Predicate::build(&schema, &request.filters);
    let params = ListParams {
        table: schema.table_name.clone(),
        sort: request.sort,
        dir: SortDir::parse(request.dir.as_deref()),
        page: None,
    };
    let file_name = export::file_name(&schema);
    let bytes = with_connection(engine, move |conn, engine| {
        export::export(conn, &engine.registry, &schema, &predicate, &params)
    })
    .await?;
    info!("Exported {} ({} bytes)", file_name, bytes.len());
    Ok((file_name, bytes))
}
