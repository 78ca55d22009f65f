use crate::engine::Engine;
use actix_web::{web, HttpResponse, Responder, ResponseError};
use common::responses::ConfigResponse;
use log::debug;

pub async fn process(module: web::Path<String>, engine: web::Data<Engine>) -> impl Responder {
    match engine.registry.dataset(&module) {
        Ok(schema) => HttpResponse::Ok().json(ConfigResponse {
            success: true,
            config: schema.as_ref().clone(),
        }),
        Err(e) => {
            debug!("Config request failed: {}", e);
            e.error_response()
        }
    }
}
