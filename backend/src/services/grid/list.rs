use crate::engine::error::Result;
use crate::engine::predicate::Predicate;
use crate::engine::query::{self, ListParams, ListResult, Page, SortDir};
use crate::engine::Engine;
use crate::services::grid::with_connection;
use actix_web::{web, HttpResponse, Responder, ResponseError};
use common::requests::ListRequest;
use common::responses::ListResponse;
use log::error;

/// Lists a dataset. Storage failures answer with an empty result of the
/// requested shape.
pub async fn process(body: web::Json<ListRequest>, engine: web::Data<Engine>) -> impl Responder {
    let request = body.into_inner();
    let paginated = Page::from_request(request.page, request.limit, request.export).is_some();
    let module = request.module.clone();

    match list_records(request, &engine).await {
        Ok(result) => HttpResponse::Ok().json(ListResponse::from(result)),
        Err(e) if e.status_code().is_client_error() => e.error_response(),
        Err(e) => {
            error!("Listing module {} failed: {}", module, e);
            HttpResponse::build(e.status_code()).json(ListResponse::from(ListResult::empty(paginated)))
        }
    }
}

async fn list_records(request: ListRequest, engine: &Engine) -> Result<ListResult> {
    let schema = engine.registry.dataset(&request.module)?;
    let table = query::resolve_table(&schema, request.table.as_deref())?.to_string();
    let predicate = Predicate::build(&schema, &request.filters);
    let params = ListParams {
        table,
        sort: request.sort,
        dir: SortDir::parse(request.dir.as_deref()),
        page: Page::from_request(request.page, request.limit, request.export),
    };
    with_connection(engine, move |conn, _| query::list(conn, &schema, &predicate, &params)).await
}
