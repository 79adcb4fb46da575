use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CustomError {
    #[error("Validation Error: {0}")]
    ValidationError(String),

    #[error("Invalid ID: {0}")]
    InvalidIdError(String),

    #[error("Not Found: comment not found")]
    CommentNotFoundError,

    #[error("Not Found: user not found")]
    UserNotFoundError,

    #[error("Unauthorized: {0}")]
    UnauthorizedError(String),

    #[error("Unauthenticated: {0}")]
    UnauthenticatedError(String),

    #[error("Event Not Supported: {0}")]
    EventNotSupportedError(String),

    #[error("Token Error: token is malformed")]
    TokenMalformedError,

    #[error("Token Error: token is expired")]
    TokenExpiredError,

    #[error("Token Error: claim `{0}` is missing or invalid")]
    ClaimMissingError(String),

    #[error("Token Error: unsupported signing method {0}")]
    UnsupportedSigningMethodError(String),

    #[error("Internal Server Error: {0}")]
    InternalServerError(String),
}

impl CustomError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            CustomError::CommentNotFoundError | CustomError::UserNotFoundError
        )
    }

    /// Collapses unclassified failures before they leave the process.
    /// The full detail is logged here and only a generic message survives.
    pub fn sanitized(self) -> CustomError {
        match self {
            CustomError::InternalServerError(detail) => {
                log::error!("internal error: {}", detail);
                CustomError::InternalServerError("internal error".to_string())
            }
            other => other,
        }
    }

    fn error_type(&self) -> &'static str {
        match *self {
            CustomError::ValidationError(..) => "VALIDATION_ERROR",
            CustomError::InvalidIdError(..) => "INVALID_ID_ERROR",
            CustomError::CommentNotFoundError | CustomError::UserNotFoundError => {
                "NOT_FOUND_ERROR"
            }
            CustomError::UnauthorizedError(..) => "UNAUTHORIZED_ERROR",
            CustomError::UnauthenticatedError(..) => "UNAUTHENTICATED_ERROR",
            CustomError::EventNotSupportedError(..) => "EVENT_NOT_SUPPORTED_ERROR",
            CustomError::TokenMalformedError
            | CustomError::TokenExpiredError
            | CustomError::ClaimMissingError(..)
            | CustomError::UnsupportedSigningMethodError(..) => "TOKEN_ERROR",
            CustomError::InternalServerError(..) => "INTERNAL_SERVER_ERROR",
        }
    }
}

impl ResponseError for CustomError {
    fn status_code(&self) -> StatusCode {
        match *self {
            CustomError::ValidationError(..) => StatusCode::BAD_REQUEST,
            CustomError::InvalidIdError(..) => StatusCode::BAD_REQUEST,
            CustomError::CommentNotFoundError => StatusCode::NOT_FOUND,
            CustomError::UserNotFoundError => StatusCode::NOT_FOUND,
            CustomError::UnauthorizedError(..) => StatusCode::FORBIDDEN,
            CustomError::UnauthenticatedError(..) => StatusCode::UNAUTHORIZED,
            CustomError::EventNotSupportedError(..) => StatusCode::BAD_REQUEST,
            CustomError::TokenMalformedError
            | CustomError::TokenExpiredError
            | CustomError::ClaimMissingError(..)
            | CustomError::UnsupportedSigningMethodError(..) => StatusCode::UNAUTHORIZED,
            CustomError::InternalServerError(..) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let public = self.clone().sanitized();
        let error_message = json!({
            "success": false,
            "message": public.to_string(),
            "httpStatusCode": public.status_code().as_u16(),
            "error": public.error_type(),
            "service": std::env::var("SERVICE_NAME").unwrap_or_else(|_| "Unknown".to_string()),
        });

        HttpResponse::build(public.status_code()).json(error_message)
    }
}

/// Stable wire classification of a refused hub command.
#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RejectionCode {
    PermissionDenied,
    BadRequest,
    MethodNotFound,
    Unauthorized,
    NotFound,
    TokenExpired,
    Unauthenticated,
    Internal,
}

impl RejectionCode {
    pub fn is_retryable(self) -> bool {
        matches!(self, RejectionCode::Internal)
    }
}

/// What a client observes when the hub refuses a command.
#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    pub code: RejectionCode,
    pub message: String,
}

impl Rejection {
    pub fn permission_denied(message: impl Into<String>) -> Self {
        Rejection {
            code: RejectionCode::PermissionDenied,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Rejection {
            code: RejectionCode::BadRequest,
            message: message.into(),
        }
    }

    pub fn method_not_found(method: &str) -> Self {
        Rejection {
            code: RejectionCode::MethodNotFound,
            message: format!("unknown method {method:?}"),
        }
    }
}

impl From<CustomError> for Rejection {
    fn from(err: CustomError) -> Self {
        let err = err.sanitized();
        let code = match err {
            CustomError::ValidationError(..) | CustomError::InvalidIdError(..) => {
                RejectionCode::BadRequest
            }
            CustomError::CommentNotFoundError | CustomError::UserNotFoundError => {
                RejectionCode::NotFound
            }
            CustomError::UnauthorizedError(..) => RejectionCode::Unauthorized,
            CustomError::UnauthenticatedError(..) => RejectionCode::Unauthenticated,
            CustomError::EventNotSupportedError(..) => RejectionCode::MethodNotFound,
            CustomError::TokenExpiredError => RejectionCode::TokenExpired,
            CustomError::TokenMalformedError
            | CustomError::ClaimMissingError(..)
            | CustomError::UnsupportedSigningMethodError(..) => RejectionCode::Unauthenticated,
            CustomError::InternalServerError(..) => RejectionCode::Internal,
        };

        Rejection {
            code,
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_detail_never_reaches_the_client() {
        let rejection =
            Rejection::from(CustomError::InternalServerError("mongo: socket closed".into()));

        assert_eq!(rejection.code, RejectionCode::Internal);
        assert!(!rejection.message.contains("mongo"));
        assert!(rejection.code.is_retryable());
    }

    #[test]
    fn domain_errors_keep_their_classification() {
        let cases = [
            (CustomError::CommentNotFoundError, RejectionCode::NotFound),
            (
                CustomError::UnauthorizedError("not the author".into()),
                RejectionCode::Unauthorized,
            ),
            (
                CustomError::EventNotSupportedError("like_comment".into()),
                RejectionCode::MethodNotFound,
            ),
            (
                CustomError::ValidationError("body is required".into()),
                RejectionCode::BadRequest,
            ),
            (CustomError::TokenExpiredError, RejectionCode::TokenExpired),
        ];

        for (err, code) in cases {
            let rejection = Rejection::from(err.clone());
            assert_eq!(rejection.code, code, "{err}");
            assert_eq!(rejection.message, err.to_string());
            assert!(!code.is_retryable());
        }
    }

    #[test]
    fn not_found_is_distinct_from_unauthorized() {
        assert_ne!(
            CustomError::CommentNotFoundError.status_code(),
            CustomError::UnauthorizedError("x".into()).status_code()
        );
    }
}
