//! `/api/v1/publics` endpoints

use std::collections::HashMap;

use actix_web::{HttpResponse, web};

use super::AppState;
use super::response;

pub async fn index() -> HttpResponse {
    response::success_empty()
}

pub async fn info(state: web::Data<AppState>) -> HttpResponse {
    let backend = state.store.backend_config();
    let id_length = state.store.id_length().to_string();
    response::success(HashMap::from([
        ("version", env!("CARGO_PKG_VERSION").to_string()),
        ("backend", backend.storage_type),
        ("id_length", id_length),
    ]))
}

pub async fn health() -> HttpResponse {
    response::success(HashMap::from([("status", "ok")]))
}
