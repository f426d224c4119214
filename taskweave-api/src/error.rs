/// Error handling for the API server
///
/// All handlers return `Result<T, ApiError>`, which converts to an HTTP
/// response with a JSON body:
///
/// ```json
/// { "error": "field_restricted", "message": "...", "details": [{ "field": "title", "message": "..." }] }
/// ```
///
/// Every error from the shared crate has a `From` conversion, so handlers can
/// use `?` on session, access, store and password results directly.
///
/// | Source                              | Status |
/// |-------------------------------------|--------|
/// | `SessionError::Unauthenticated`     | 401    |
/// | `AccessError::NotFound`             | 404    |
/// | `AccessError::Forbidden`            | 403    |
/// | `AccessError::FieldRestricted`      | 403    |
/// | `AccessError::InvalidReference`     | 400    |
/// | `StoreError::Conflict`              | 409    |
/// | request validation                  | 422    |
/// | store / token / hashing failures    | 500    |

use std::fmt;

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use taskweave_shared::auth::authorization::AccessError;
use taskweave_shared::auth::jwt::TokenError;
use taskweave_shared::auth::password::PasswordError;
use taskweave_shared::auth::session::SessionError;
use taskweave_shared::store::StoreError;

/// API result type alias
pub type ApiResult<T> = Result<T, ApiError>;

/// Unified API error type
#[derive(Debug)]
pub enum ApiError {
    /// Bad request (400)
    BadRequest(String),

    /// Unauthorized (401)
    Unauthorized(String),

    /// Forbidden (403)
    Forbidden(String),

    /// Forbidden (403) because the listed fields may not be written
    FieldRestricted(Vec<String>),

    /// Not found (404)
    NotFound(String),

    /// Conflict (409) - e.g., duplicate email
    Conflict(String),

    /// Unprocessable entity (422) - validation errors
    ValidationError(Vec<ValidationErrorDetail>),

    /// Internal server error (500)
    InternalError(String),
}

/// Per-field error detail
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationErrorDetail {
    /// Field that failed validation
    pub field: String,

    /// Error message
    pub message: String,
}

impl ValidationErrorDetail {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code (e.g., "bad_request", "unauthorized")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// Optional per-field details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<ValidationErrorDetail>>,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ApiError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            ApiError::FieldRestricted(fields) => {
                write!(f, "Forbidden fields: {}", fields.join(", "))
            }
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ApiError::ValidationError(errors) => {
                write!(f, "Validation failed: {} errors", errors.len())
            }
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message, details) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg, None),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg, None),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg, None),
            ApiError::FieldRestricted(fields) => {
                let details = fields
                    .into_iter()
                    .map(|field| ValidationErrorDetail::new(field, "Field may not be modified"))
                    .collect();
                (
                    StatusCode::FORBIDDEN,
                    "field_restricted",
                    "Request contains fields you may not modify".to_string(),
                    Some(details),
                )
            }
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg, None),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg, None),
            ApiError::ValidationError(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "validation_error",
                "Request validation failed".to_string(),
                Some(errors),
            ),
            ApiError::InternalError(msg) => {
                // Log internal errors but don't expose details to clients
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
        };

        let body = Json(ErrorResponse {
            error: error_code.to_string(),
            message,
            details,
        });

        (status, body).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(constraint) => {
                if constraint.contains("email") {
                    ApiError::Conflict("Email already registered".to_string())
                } else {
                    ApiError::Conflict(format!("Constraint violation: {}", constraint))
                }
            }
            StoreError::Corrupt(msg) => ApiError::InternalError(format!("Corrupt record: {}", msg)),
            StoreError::Database(err) => ApiError::InternalError(format!("Database error: {}", err)),
        }
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Unauthenticated => {
                ApiError::Unauthorized("Authentication required".to_string())
            }
            SessionError::Token(err) => err.into(),
            SessionError::Store(err) => err.into(),
        }
    }
}

impl From<AccessError> for ApiError {
    fn from(err: AccessError) -> Self {
        match err {
            AccessError::NotFound => ApiError::NotFound("Resource not found".to_string()),
            AccessError::Forbidden(reason) => ApiError::Forbidden(reason),
            AccessError::FieldRestricted(fields) => ApiError::FieldRestricted(fields),
            AccessError::InvalidReference(err) => ApiError::BadRequest(err.to_string()),
            AccessError::Store(err) => err.into(),
        }
    }
}

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        ApiError::InternalError(format!("Token issuance failed: {}", err))
    }
}

impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        ApiError::InternalError(format!("Password operation failed: {}", err))
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let details = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |error| {
                    ValidationErrorDetail::new(
                        field.to_string(),
                        error
                            .message
                            .as_ref()
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| "Validation failed".to_string()),
                    )
                })
            })
            .collect();
        ApiError::ValidationError(details)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection {
            // Well-formed JSON of the wrong shape, including unknown fields
            JsonRejection::JsonDataError(err) => {
                ApiError::ValidationError(vec![ValidationErrorDetail::new("body", err.body_text())])
            }
            other => ApiError::BadRequest(other.body_text()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskweave_shared::models::InvalidParentRef;

    #[test]
    fn test_error_display() {
        let err = ApiError::BadRequest("Invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: Invalid input");

        let err = ApiError::FieldRestricted(vec!["title".to_string(), "priority".to_string()]);
        assert_eq!(err.to_string(), "Forbidden fields: title, priority");
    }

    #[test]
    fn test_access_error_mapping() {
        let status = |err: AccessError| ApiError::from(err).into_response().status();

        assert_eq!(status(AccessError::NotFound), StatusCode::NOT_FOUND);
        assert_eq!(status(AccessError::Forbidden("no".into())), StatusCode::FORBIDDEN);
        assert_eq!(
            status(AccessError::FieldRestricted(vec!["title".into()])),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status(AccessError::InvalidReference(InvalidParentRef)),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_session_and_store_mapping() {
        let unauthenticated = ApiError::from(SessionError::Unauthenticated).into_response();
        assert_eq!(unauthenticated.status(), StatusCode::UNAUTHORIZED);

        let conflict = ApiError::from(StoreError::Conflict("accounts_email_key".into()));
        assert!(matches!(conflict, ApiError::Conflict(ref msg) if msg == "Email already registered"));
    }
}
