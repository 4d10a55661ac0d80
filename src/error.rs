use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Error response structure sent to clients
///
/// Example JSON response:
/// ```text
/// {
///   "status": "fail",
///   "message": "You can only edit your own content"
/// }
/// ```
///
/// `HttpError` is what handlers return; this is only its wire shape, so
/// internal details (database messages, hashes) never leave the process.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: String,
    pub message: String,
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(s) => write!(f, "{}", s),
            Err(_) => Err(fmt::Error),
        }
    }
}

/// Fixed user-facing messages
///
/// PartialEq allows comparing variants in tests.
#[derive(Debug, PartialEq)]
pub enum ErrorMessage {
    // Password validation errors
    EmptyPassword,
    ExceededMaxPasswordLength(usize),
    InvalidHashFormat,
    HashingError,

    // Authentication errors
    InvalidToken,
    TokenNotProvided,
    UserNotAuthenticated,
    InvalidCredentials,
    InvalidReporterCode,
    ReporterDeactivated,
    TooManyAttempts,

    // Authorization errors
    PermissionDenied,

    // Principal management errors
    UserNoLongerExist,

    //Else
    ServerError,
}

impl fmt::Display for ErrorMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            ErrorMessage::UserNoLongerExist => {
                "Account belonging to this token no longer exists".to_string()
            }
            ErrorMessage::EmptyPassword => "Password cannot be empty".to_string(),
            ErrorMessage::HashingError => "Error while hashing password".to_string(),
            ErrorMessage::InvalidHashFormat => "Invalid password hash format".to_string(),
            ErrorMessage::ExceededMaxPasswordLength(max_length) => {
                format!("Password must not be more than {} characters", max_length)
            }
            ErrorMessage::InvalidToken => "Token is invalid or expired".to_string(),
            ErrorMessage::TokenNotProvided => {
                "You are not logged in, please provide a token".to_string()
            }
            ErrorMessage::PermissionDenied => {
                "Access denied. Insufficient permissions.".to_string()
            }
            ErrorMessage::UserNotAuthenticated => "Unauthorized. Please login.".to_string(),
            ErrorMessage::InvalidCredentials => "Invalid credentials".to_string(),
            ErrorMessage::InvalidReporterCode => {
                "Invalid Reporter ID format. Use format: {PlaceName}PN{Number} (e.g., HydPN101)"
                    .to_string()
            }
            ErrorMessage::ReporterDeactivated => {
                "Your account has been deactivated. Please contact administrator.".to_string()
            }
            ErrorMessage::TooManyAttempts => {
                "Too many login attempts. Please try again later.".to_string()
            }
            ErrorMessage::ServerError => "Server Error. Please try again later".to_string(),
        };
        write!(f, "{}", message)
    }
}

/// Typed failures of the moderation core (workflow, access policy, audit query)
///
/// Every variant except `Store` is the caller's fault and is surfaced as-is;
/// none of them is retried by the core.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("{0}")]
    Validation(String),

    #[error("Authentication required. Please log in.")]
    Authentication,

    #[error("{0}")]
    Authorization(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Video file is required")]
    MediaRequired,

    #[error("Cannot edit approved content")]
    ImmutableState,

    #[error("Store error: {0}")]
    Store(#[from] sqlx::Error),
}

/// Internal HTTP error type used throughout the application
///
/// Handlers return `Result<T, HttpError>`; axum turns the error into a
/// response through `IntoResponse`.
#[derive(Debug, Clone)]
pub struct HttpError {
    pub message: String,
    pub status: StatusCode,
}

impl HttpError {
    pub fn new(message: impl Into<String>, status: StatusCode) -> Self {
        HttpError {
            message: message.into(),
            status,
        }
    }

    /// 500 Internal Server Error
    pub fn server_error(message: impl Into<String>) -> Self {
        HttpError {
            message: message.into(),
            status: StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// 400 Bad Request
    pub fn bad_request(message: impl Into<String>) -> Self {
        HttpError {
            message: message.into(),
            status: StatusCode::BAD_REQUEST,
        }
    }

    /// 409 Conflict, for unique email / reporter code violations
    pub fn unique_constraint_violation(message: impl Into<String>) -> Self {
        HttpError {
            message: message.into(),
            status: StatusCode::CONFLICT,
        }
    }

    /// 401 Unauthorized
    ///
    /// Note: despite the name, 401 means "unauthenticated", not "unauthorized"
    pub fn unauthorized(message: impl Into<String>) -> Self {
        HttpError {
            message: message.into(),
            status: StatusCode::UNAUTHORIZED,
        }
    }

    /// 403 Forbidden
    pub fn forbidden(message: impl Into<String>) -> Self {
        HttpError {
            message: message.into(),
            status: StatusCode::FORBIDDEN,
        }
    }

    /// 404 Not Found
    pub fn not_found(message: impl Into<String>) -> Self {
        HttpError {
            message: message.into(),
            status: StatusCode::NOT_FOUND,
        }
    }

    /// 429 Too Many Requests
    pub fn too_many_requests(message: impl Into<String>) -> Self {
        HttpError {
            message: message.into(),
            status: StatusCode::TOO_MANY_REQUESTS,
        }
    }

    pub fn into_http_response(self) -> Response {
        let json_response = Json(ErrorResponse {
            status: "fail".to_string(),
            message: self.message.clone(),
        });

        (self.status, json_response).into_response()
    }
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "HttpError: message: {}, status: {}",
            self.message, self.status
        )
    }
}

impl std::error::Error for HttpError {}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        self.into_http_response()
    }
}

impl From<WorkflowError> for HttpError {
    fn from(err: WorkflowError) -> Self {
        match err {
            WorkflowError::Validation(message) => HttpError::bad_request(message),
            WorkflowError::MediaRequired => HttpError::bad_request(err.to_string()),
            WorkflowError::Authentication => {
                HttpError::unauthorized(ErrorMessage::UserNotAuthenticated.to_string())
            }
            WorkflowError::Authorization(message) => HttpError::forbidden(message),
            WorkflowError::ImmutableState => HttpError::forbidden(err.to_string()),
            WorkflowError::NotFound(message) => HttpError::not_found(message),
            WorkflowError::Store(e) => {
                tracing::error!("DB error in moderation workflow: {}", e);
                HttpError::server_error(ErrorMessage::ServerError.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workflow_errors_map_to_expected_status_codes() {
        let cases = [
            (WorkflowError::Validation("Title is required".into()), StatusCode::BAD_REQUEST),
            (WorkflowError::MediaRequired, StatusCode::BAD_REQUEST),
            (WorkflowError::Authentication, StatusCode::UNAUTHORIZED),
            (WorkflowError::Authorization("no".into()), StatusCode::FORBIDDEN),
            (WorkflowError::ImmutableState, StatusCode::FORBIDDEN),
            (WorkflowError::NotFound("News not found".into()), StatusCode::NOT_FOUND),
            (WorkflowError::Store(sqlx::Error::PoolClosed), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, status) in cases {
            assert_eq!(HttpError::from(err).status, status);
        }
    }

    #[test]
    fn store_errors_do_not_leak_details() {
        let err = HttpError::from(WorkflowError::Store(sqlx::Error::PoolTimedOut));
        assert_eq!(err.message, ErrorMessage::ServerError.to_string());
    }
}
