use crate::engine::options;
use crate::engine::Engine;
use crate::services::grid::with_connection;
use actix_web::{web, HttpResponse, Responder};
use common::model::option::OptionItem;
use common::requests::OptionsQuery;
use log::error;
use std::collections::BTreeMap;

/// Every requested source key is answered; unknown or unreadable sources map
/// to an empty list.
pub async fn process(query: web::Query<OptionsQuery>, engine: web::Data<Engine>) -> impl Responder {
    let keys: Vec<String> = query.source_keys().map(str::to_string).collect();
    let requested = keys.clone();
    let result = with_connection(&engine, move |conn, engine| {
        Ok(options::resolve_all(
            conn,
            &engine.registry,
            requested.iter().map(String::as_str),
        ))
    })
    .await;

    match result {
        Ok(all) => HttpResponse::Ok().json(all),
        Err(e) => {
            error!("Option sources {:?} unavailable: {}", keys, e);
            let empty: BTreeMap<String, Vec<OptionItem>> =
                keys.into_iter().map(|k| (k, Vec::new())).collect();
            HttpResponse::Ok().json(empty)
        }
    }
}
