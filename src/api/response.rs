//! 统一 API 响应格式与错误码

use actix_web::HttpResponse;
use actix_web::http::StatusCode;
use serde::Serialize;

use crate::errors::ShortenerError;

/// API 错误码
///
/// - 1001-1099: 通用错误
/// - 1101-1199: 资源/参数错误
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ErrorCode {
    System = 1001,
    ServiceUnavailable = 1002,
    NotFound = 1003,
    HttpMethod = 1004,

    Parameter = 1101,
    ResourceNotExists = 1102,
    ResourceAlreadyExists = 1103,
    PasswordInvalid = 1104,
    Unauthorized = 1105,
    ResourceExpired = 1106,
}

impl ErrorCode {
    pub fn message(self) -> &'static str {
        match self {
            ErrorCode::System => "System Error",
            ErrorCode::ServiceUnavailable => "Service unavailable",
            ErrorCode::NotFound => "Resource not found",
            ErrorCode::HttpMethod => "HTTP method is not supported for this request",
            ErrorCode::Parameter => "Parameter error",
            ErrorCode::ResourceNotExists => "Resource does not exist",
            ErrorCode::ResourceAlreadyExists => "Resource already exists",
            ErrorCode::PasswordInvalid => "Password invalid",
            ErrorCode::Unauthorized => "Unauthorized",
            ErrorCode::ResourceExpired => "Resource expired",
        }
    }
}

impl From<&ShortenerError> for ErrorCode {
    fn from(err: &ShortenerError) -> Self {
        match err {
            ShortenerError::InvalidUrl(_) | ShortenerError::InvalidId(_) => ErrorCode::Parameter,
            ShortenerError::EntryAlreadyExists(_) => ErrorCode::ResourceAlreadyExists,
            ShortenerError::NoEntryFound(_) => ErrorCode::ResourceNotExists,
            ShortenerError::EntryExpired(_) => ErrorCode::ResourceExpired,
            ShortenerError::AuthorizationFailed(_) => ErrorCode::Unauthorized,
            ShortenerError::IdGenerationExhausted(_) => ErrorCode::ServiceUnavailable,
            ShortenerError::PasswordHash(_)
            | ShortenerError::Backend(_)
            | ShortenerError::Config(_)
            | ShortenerError::FileOperation(_) => ErrorCode::System,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: i32,
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// `{success, result?, error?}`
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
}

/// 构建成功响应
pub fn success<T: Serialize>(result: T) -> HttpResponse {
    HttpResponse::Ok().json(ApiResponse {
        success: true,
        result: Some(result),
        error: None,
    })
}

/// 无返回数据的成功响应
pub fn success_empty() -> HttpResponse {
    success("request success")
}

/// 构建错误响应
pub fn failure(status: StatusCode, code: ErrorCode, details: Option<String>) -> HttpResponse {
    HttpResponse::build(status).json(ApiResponse::<()> {
        success: false,
        result: None,
        error: Some(ApiError {
            code: code as i32,
            msg: code.message().to_string(),
            details,
        }),
    })
}

/// 从 ShortenerError 构建错误响应（自动映射 HTTP 状态码和错误码）
pub fn from_error(err: &ShortenerError) -> HttpResponse {
    failure(
        err.http_status(),
        ErrorCode::from(err),
        Some(err.message().to_string()),
    )
}

/// 统一 Result → HttpResponse 转换
pub fn api_result<T: Serialize>(result: Result<T, ShortenerError>) -> HttpResponse {
    match result {
        Ok(data) => success(data),
        Err(e) => from_error(&e),
    }
}
