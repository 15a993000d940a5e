//! `/api/v1/urls` management endpoints

use std::collections::HashMap;

use actix_web::http::StatusCode;
use actix_web::{HttpRequest, HttpResponse, web};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::trace;

use super::response::{self, ErrorCode};
use super::{AppState, URLS_PREFIX};
use crate::storage::models::datetime_format;
use crate::storage::{Entry, EntryPublicData};
use crate::utils::ip::extract_client_ip;

#[derive(Debug, Deserialize)]
pub struct CreatePayload {
    #[serde(default)]
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub password: String,
    #[serde(default, with = "datetime_format")]
    pub expiration: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct CreateResult {
    pub id: String,
    pub url: String,
    pub deletion_url: String,
    #[serde(with = "datetime_format")]
    pub expiration: Option<DateTime<Utc>>,
}

/// Entry as shown by the API; the password hash never leaves the server
#[derive(Debug, Serialize)]
pub struct EntryView {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub remote_addr: String,
    pub password_protected: bool,
    pub public: EntryPublicData,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deletion_url: Option<String>,
}

impl EntryView {
    fn new(entry: Entry, deletion_url: Option<String>) -> Self {
        Self {
            password_protected: entry.requires_password(),
            remote_addr: entry.remote_addr,
            public: entry.public,
            deletion_url,
        }
    }
}

/// `scheme://host`, honouring `X-Forwarded-Proto`/`Forwarded`
fn origin(req: &HttpRequest) -> String {
    let info = req.connection_info();
    format!("{}://{}", info.scheme(), info.host())
}

/// Public base for short links: origin plus the configured location
fn short_url_base(req: &HttpRequest, location: &str) -> String {
    let location = location.trim_matches('/');
    if location.is_empty() {
        origin(req)
    } else {
        format!("{}/{}", origin(req), location)
    }
}

fn deletion_url(req: &HttpRequest, id: &str, tag: &[u8]) -> String {
    format!(
        "{}{}/{}/{}",
        origin(req),
        URLS_PREFIX,
        id,
        URL_SAFE_NO_PAD.encode(tag)
    )
}

pub async fn create(
    req: HttpRequest,
    payload: web::Json<CreatePayload>,
    state: web::Data<AppState>,
) -> HttpResponse {
    let payload = payload.into_inner();
    let mut entry = Entry::new(payload.url);
    entry.public.expiration = payload.expiration;
    if let Some(ip) = extract_client_ip(&req) {
        entry.remote_addr = ip;
    }

    match state
        .store
        .create_entry(entry, &payload.id, &payload.password)
        .await
    {
        Ok((id, tag)) => {
            response::success(CreateResult {
                url: format!(
                    "{}/{}",
                    short_url_base(&req, &state.config.server.location),
                    id
                ),
                deletion_url: deletion_url(&req, &id, &tag),
                expiration: payload.expiration,
                id,
            })
        }
        Err(e) => response::from_error(&e),
    }
}

pub async fn list(req: HttpRequest, state: web::Data<AppState>) -> HttpResponse {
    let result = state.store.get_entries().await.map(|entries| {
        entries
            .into_iter()
            .map(|(id, entry)| {
                let url = deletion_url(&req, &id, &state.store.deletion_tag(&id));
                (id, EntryView::new(entry, Some(url)))
            })
            .collect::<HashMap<_, _>>()
    });
    response::api_result(result)
}

pub async fn lookup(path: web::Path<String>, state: web::Data<AppState>) -> HttpResponse {
    let id = path.into_inner();
    trace!("Lookup {}", id);
    response::api_result(
        state
            .store
            .get_entry_by_id(&id)
            .await
            .map(|entry| EntryView::new(entry, None)),
    )
}

pub async fn visitors(path: web::Path<String>, state: web::Data<AppState>) -> HttpResponse {
    let id = path.into_inner();
    response::api_result(state.store.get_visitors(&id).await)
}

pub async fn delete(path: web::Path<(String, String)>, state: web::Data<AppState>) -> HttpResponse {
    let (id, encoded_tag) = path.into_inner();
    let tag = match URL_SAFE_NO_PAD.decode(encoded_tag.as_bytes()) {
        Ok(tag) => tag,
        Err(e) => {
            return response::failure(
                StatusCode::BAD_REQUEST,
                ErrorCode::Parameter,
                Some(format!("deletion tag is not valid base64url: {}", e)),
            );
        }
    };

    match state.store.delete_entry(&id, &tag).await {
        Ok(()) => response::success_empty(),
        Err(e) => response::from_error(&e),
    }
}
