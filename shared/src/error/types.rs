//! Error type and its JSON response body

use super::codes::ErrorCode;
use http::StatusCode;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

/// Application error with structured error code and details
///
/// This is the primary error type surfaced to API callers, providing:
/// - Standardized error codes via [`ErrorCode`]
/// - Human-readable messages (never stack traces)
/// - Optional structured details (field names, manual fallback text)
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct AppError {
    /// The error code identifying the type of error
    pub code: ErrorCode,
    /// Human-readable error message
    pub message: String,
    /// Optional additional details (field-level errors, context, etc.)
    pub details: Option<HashMap<String, Value>>,
}

impl AppError {
    /// Create a new error with the default message for the error code
    pub fn new(code: ErrorCode) -> Self {
        Self {
            message: code.message().to_string(),
            code,
            details: None,
        }
    }

    /// Create a new error with a custom message
    pub fn with_message(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    /// Add a detail entry to this error
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value.into());
        self
    }

    /// Get the HTTP status code for this error
    pub fn http_status(&self) -> StatusCode {
        self.code.http_status()
    }

    // ==================== Convenience constructors ====================

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::with_message(ErrorCode::ValidationFailed, msg)
    }

    /// Create a required-field error naming the field
    pub fn required(field: &str) -> Self {
        Self::with_message(ErrorCode::RequiredField, format!("{field} is required"))
            .with_detail("field", field)
    }

    /// Create a not authenticated error
    pub fn not_authenticated() -> Self {
        Self::new(ErrorCode::NotAuthenticated)
    }

    /// Create a permission denied error
    pub fn permission_denied(msg: impl Into<String>) -> Self {
        Self::with_message(ErrorCode::PermissionDenied, msg)
    }

    /// Create a database error
    pub fn database(msg: impl Into<String>) -> Self {
        Self::with_message(ErrorCode::DatabaseError, msg)
    }

    /// Create a rate-limited error
    pub fn too_many_requests() -> Self {
        Self::new(ErrorCode::TooManyRequests)
    }
}

/// JSON body of every error response
#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    code: u16,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<&'a HashMap<String, Value>>,
}

impl<'a> From<&'a AppError> for ErrorBody<'a> {
    fn from(err: &'a AppError) -> Self {
        Self {
            code: err.code.code(),
            message: &err.message,
            details: err.details.as_ref(),
        }
    }
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        if matches!(self.code.category(), super::category::ErrorCategory::System) {
            tracing::error!(
                code = %self.code,
                message = %self.message,
                "System error occurred"
            );
        }

        (self.http_status(), axum::Json(ErrorBody::from(&self))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_error_new() {
        let err = AppError::new(ErrorCode::OrderNotFound);
        assert_eq!(err.code, ErrorCode::OrderNotFound);
        assert_eq!(err.message, "Order not found");
        assert!(err.details.is_none());
    }

    #[test]
    fn test_app_error_with_detail() {
        let err = AppError::validation("Missing required fields")
            .with_detail("field", "reason")
            .with_detail("manual_fallback", "Order ORD123 needs attention");

        assert_eq!(err.code, ErrorCode::ValidationFailed);
        let details = err.details.unwrap();
        assert_eq!(details.get("field").unwrap(), "reason");
        assert_eq!(
            details.get("manual_fallback").unwrap(),
            "Order ORD123 needs attention"
        );
    }

    #[test]
    fn test_required_names_field() {
        let err = AppError::required("supplier_email");
        assert_eq!(err.code, ErrorCode::RequiredField);
        assert_eq!(err.message, "supplier_email is required");
        assert_eq!(
            err.details.unwrap().get("field").unwrap(),
            "supplier_email"
        );
    }

    #[test]
    fn test_app_error_http_status() {
        assert_eq!(
            AppError::new(ErrorCode::OrderNotFound).http_status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::not_authenticated().http_status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::too_many_requests().http_status(),
            StatusCode::TOO_MANY_REQUESTS
        );
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::with_message(ErrorCode::NotFound, "Order not found");
        assert_eq!(format!("{}", err), "Order not found");
    }

    #[test]
    fn test_error_body_serialization() {
        let err = AppError::new(ErrorCode::DeliveryFailed).with_detail("strategy", "minimal");
        let json = serde_json::to_value(ErrorBody::from(&err)).unwrap();
        assert_eq!(json["code"], 5001);
        assert_eq!(json["message"], "Email could not be delivered");
        assert_eq!(json["details"]["strategy"], "minimal");

        let json = serde_json::to_value(ErrorBody::from(&AppError::too_many_requests())).unwrap();
        assert!(json.get("details").is_none());
    }

    #[test]
    fn test_into_response_uses_code_status() {
        use axum::response::IntoResponse;
        let response = AppError::new(ErrorCode::OrderNotFound).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
