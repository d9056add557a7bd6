use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::{DbErr, SqlErr};
use serde::Serialize;

/// RPC-style status codes carried by every error response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidArgument,
    Unauthenticated,
    PermissionDenied,
    NotFound,
    FailedPrecondition,
    Canceled,
    DeadlineExceeded,
    Unavailable,
    Internal,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidArgument => "invalid_argument",
            Self::Unauthenticated => "unauthenticated",
            Self::PermissionDenied => "permission_denied",
            Self::NotFound => "not_found",
            Self::FailedPrecondition => "failed_precondition",
            Self::Canceled => "canceled",
            Self::DeadlineExceeded => "deadline_exceeded",
            Self::Unavailable => "unavailable",
            Self::Internal => "internal",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidArgument => StatusCode::BAD_REQUEST,
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::PermissionDenied => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::FailedPrecondition => StatusCode::PRECONDITION_FAILED,
            // nginx's "client closed request"
            Self::Canceled => StatusCode::from_u16(499).unwrap_or(StatusCode::BAD_REQUEST),
            Self::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
            Self::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Application error type that can be returned from handlers
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Authentication errors
    #[error("Unauthenticated")]
    Unauthenticated,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired")]
    TokenExpired,

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    // Resource errors
    #[error("{0} not found")]
    NotFound(String),

    #[error("Failed precondition: {0}")]
    FailedPrecondition(String),

    // Validation errors
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // Outbound errors
    #[error("Deadline exceeded: {0}")]
    DeadlineExceeded(String),

    #[error("Unavailable: {0}")]
    Unavailable(String),

    #[error("Canceled")]
    Canceled,

    // Database errors
    #[error("Database error: {0}")]
    Database(String),

    // Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Unauthenticated | AppError::InvalidToken | AppError::TokenExpired => {
                ErrorCode::Unauthenticated
            }
            AppError::PermissionDenied(_) => ErrorCode::PermissionDenied,
            AppError::NotFound(_) => ErrorCode::NotFound,
            AppError::FailedPrecondition(_) => ErrorCode::FailedPrecondition,
            AppError::InvalidArgument(_) => ErrorCode::InvalidArgument,
            AppError::DeadlineExceeded(_) => ErrorCode::DeadlineExceeded,
            AppError::Unavailable(_) => ErrorCode::Unavailable,
            AppError::Canceled => ErrorCode::Canceled,
            AppError::Database(_) | AppError::Internal(_) => ErrorCode::Internal,
        }
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    code: &'static str,
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let code = self.code();
        let (error_message, details) = match &self {
            AppError::Unauthenticated => ("Unauthenticated", None),
            AppError::InvalidToken => ("Invalid token", None),
            AppError::TokenExpired => ("Token expired", None),
            AppError::PermissionDenied(msg) => ("Permission denied", Some(msg.clone())),
            AppError::NotFound(resource) => ("Not found", Some(resource.clone())),
            AppError::FailedPrecondition(msg) => ("Failed precondition", Some(msg.clone())),
            AppError::InvalidArgument(msg) => ("Invalid argument", Some(msg.clone())),
            AppError::DeadlineExceeded(msg) => ("Deadline exceeded", Some(msg.clone())),
            AppError::Unavailable(msg) => ("Unavailable", Some(msg.clone())),
            AppError::Canceled => ("Canceled", None),
            AppError::Database(msg) => {
                tracing::error!("Database error: {}", msg);
                ("Database error", None)
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                ("Internal server error", None)
            }
        };

        let body = Json(ErrorResponse {
            code: code.as_str(),
            error: error_message.to_string(),
            details,
        });

        (code.status(), body).into_response()
    }
}

// Convenient conversions from common error types

impl From<DbErr> for AppError {
    fn from(err: DbErr) -> Self {
        match err.sql_err() {
            Some(SqlErr::ForeignKeyConstraintViolation(msg)) => {
                return AppError::FailedPrecondition(format!("foreign key violation: {}", msg));
            }
            Some(SqlErr::UniqueConstraintViolation(msg)) => {
                return AppError::FailedPrecondition(format!("record already exists: {}", msg));
            }
            _ => {}
        }

        // Drivers that report constraint failures without a structured code
        let message = err.to_string();
        if message.contains("FOREIGN KEY constraint failed") {
            return AppError::FailedPrecondition(format!("foreign key violation: {}", message));
        }
        if message.contains("UNIQUE constraint failed") {
            return AppError::FailedPrecondition(format!("record already exists: {}", message));
        }

        match err {
            DbErr::RecordNotFound(_) => AppError::NotFound("Resource".to_string()),
            DbErr::RecordNotInserted => {
                AppError::FailedPrecondition("record already exists".to_string())
            }
            DbErr::RecordNotUpdated => AppError::NotFound("Resource".to_string()),
            _ => AppError::Database(err.to_string()),
        }
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AppError::TokenExpired,
            _ => AppError::InvalidToken,
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::InvalidArgument(rejection.body_text())
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;
