//! `/{id}` redirect

use actix_web::http::StatusCode;
use actix_web::http::header::{self, HeaderMap};
use actix_web::{HttpRequest, HttpResponse, web};
use serde::Deserialize;
use tracing::{debug, error};

use super::AppState;
use super::response::{self, ErrorCode};
use crate::errors::ShortenerError;
use crate::storage::Visitor;
use crate::utils::ip::extract_client_ip;

#[derive(Debug, Default, Deserialize)]
pub struct RedirectQuery {
    pub password: Option<String>,
    pub utm_source: Option<String>,
    pub utm_medium: Option<String>,
    pub utm_campaign: Option<String>,
    pub utm_content: Option<String>,
    pub utm_term: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PasswordPayload {
    pub password: String,
}

fn header_str(headers: &HeaderMap, name: header::HeaderName) -> String {
    headers
        .get(name)
        .and_then(|h| h.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

fn visitor_from_request(req: &HttpRequest, query: RedirectQuery) -> Visitor {
    let mut visitor = Visitor::new(extract_client_ip(req).unwrap_or_else(|| "unknown".into()));
    visitor.referer = header_str(req.headers(), header::REFERER);
    visitor.user_agent = header_str(req.headers(), header::USER_AGENT);
    visitor.utm_source = query.utm_source.unwrap_or_default();
    visitor.utm_medium = query.utm_medium.unwrap_or_default();
    visitor.utm_campaign = query.utm_campaign.unwrap_or_default();
    visitor.utm_content = query.utm_content.unwrap_or_default();
    visitor.utm_term = query.utm_term.unwrap_or_default();
    visitor
}

fn not_found(err: &ShortenerError) -> HttpResponse {
    response::failure(
        StatusCode::NOT_FOUND,
        ErrorCode::ResourceNotExists,
        Some(err.message().to_string()),
    )
}

pub async fn redirect(
    req: HttpRequest,
    path: web::Path<String>,
    query: web::Query<RedirectQuery>,
    body: Option<web::Json<PasswordPayload>>,
    state: web::Data<AppState>,
) -> HttpResponse {
    let id = path.into_inner();
    let mut query = query.into_inner();

    let entry = match state.store.get_entry_and_increase(&id).await {
        Ok(entry) => entry,
        // 不存在与已过期对外统一为 404
        Err(e @ (ShortenerError::NoEntryFound(_) | ShortenerError::EntryExpired(_))) => {
            debug!("Redirect {} refused: {}", id, e);
            return not_found(&e);
        }
        Err(e) => {
            error!("Redirect lookup for {} failed: {}", id, e);
            return response::from_error(&e);
        }
    };

    if entry.requires_password() {
        let given = body
            .map(|b| b.into_inner().password)
            .or_else(|| query.password.take());
        let Some(given) = given else {
            return response::failure(
                StatusCode::BAD_REQUEST,
                ErrorCode::Parameter,
                Some("this link requires a password".into()),
            );
        };

        match state.store.verify_password(&entry, &given) {
            Ok(true) => {}
            Ok(false) => {
                return response::failure(
                    StatusCode::BAD_REQUEST,
                    ErrorCode::PasswordInvalid,
                    None,
                );
            }
            Err(e) => {
                error!("Password check for {} failed: {}", id, e);
                return response::from_error(&e);
            }
        }
    }

    state
        .store
        .register_visit(&id, visitor_from_request(&req, query));

    HttpResponse::TemporaryRedirect()
        .insert_header((header::LOCATION, entry.public.url))
        .finish()
}
