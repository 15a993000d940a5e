//! HTTP layer over the entry store

use std::sync::Arc;

use actix_web::http::StatusCode;
use actix_web::{error, web};

use crate::config::AppConfig;
use crate::store::EntryStore;

pub mod public;
pub mod redirect;
pub mod response;
pub mod urls;

pub const URLS_PREFIX: &str = "/api/v1/urls";
pub const PUBLICS_PREFIX: &str = "/api/v1/publics";

/// Shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<EntryStore>,
    pub config: Arc<AppConfig>,
}

/// JSON body errors use the API envelope instead of actix's plain text
fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        let resp = response::failure(
            StatusCode::BAD_REQUEST,
            response::ErrorCode::Parameter,
            Some(err.to_string()),
        );
        error::InternalError::from_response(err, resp).into()
    })
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .service(
            web::scope(URLS_PREFIX)
                .route("", web::get().to(urls::list))
                .route("", web::post().to(urls::create))
                .route("/{id}/lookup", web::get().to(urls::lookup))
                .route("/{id}/visitors", web::get().to(urls::visitors))
                .route("/{id}/{tag}", web::delete().to(urls::delete)),
        )
        .service(
            web::scope(PUBLICS_PREFIX)
                .route("", web::get().to(public::index))
                .route("/", web::get().to(public::index))
                .route("/info", web::get().to(public::info))
                .route("/health", web::get().to(public::health)),
        )
        .route("/{id}", web::get().to(redirect::redirect))
        .route("/{id}", web::post().to(redirect::redirect));
}
