//! HTTP status code mapping for error codes

use super::codes::ErrorCode;
use http::StatusCode;

impl ErrorCode {
    /// Get the appropriate HTTP status code for this error code
    pub fn http_status(&self) -> StatusCode {
        match self {
            // Success
            Self::Success => StatusCode::OK,

            // 404 Not Found
            Self::NotFound
            | Self::OrderNotFound
            | Self::ServiceOrderNotFound
            | Self::SupplierNotFound
            | Self::VerificationNotIssued => StatusCode::NOT_FOUND,

            // 409 Conflict
            Self::AlreadyExists | Self::StorageConflict | Self::ChangeRequestNotAllowed => {
                StatusCode::CONFLICT
            }

            // 401 Unauthorized
            Self::NotAuthenticated
            | Self::TokenExpired
            | Self::TokenInvalid
            | Self::VerificationCodeMismatch => StatusCode::UNAUTHORIZED,

            // 403 Forbidden
            Self::PermissionDenied | Self::AdminRequired | Self::StoragePermissionDenied => {
                StatusCode::FORBIDDEN
            }

            // 410 Gone
            Self::VerificationCodeExpired => StatusCode::GONE,

            // 429 Too Many Requests
            Self::TooManyRequests | Self::TooManyAttempts | Self::VerificationResendTooSoon => {
                StatusCode::TOO_MANY_REQUESTS
            }

            // 502 Bad Gateway (upstream email provider refused)
            Self::DeliveryFailed
            | Self::DeliveryProviderPolicy
            | Self::DeliveryPreconditionRejected => StatusCode::BAD_GATEWAY,

            // 503 Service Unavailable (transient errors, client can retry)
            Self::NetworkError | Self::TimeoutError | Self::DeliveryNetwork => {
                StatusCode::SERVICE_UNAVAILABLE
            }

            // 500 Internal Server Error
            Self::InternalError
            | Self::DatabaseError
            | Self::ConfigError
            | Self::StorageMissingSchema
            | Self::ChangeRequestFailed => StatusCode::INTERNAL_SERVER_ERROR,

            // 400 Bad Request (default for validation/business errors)
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_status() {
        assert_eq!(ErrorCode::NotFound.http_status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ErrorCode::OrderNotFound.http_status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ErrorCode::VerificationNotIssued.http_status(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_verification_statuses() {
        assert_eq!(
            ErrorCode::VerificationCodeInvalidFormat.http_status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ErrorCode::VerificationCodeMismatch.http_status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ErrorCode::VerificationCodeExpired.http_status(),
            StatusCode::GONE
        );
        assert_eq!(
            ErrorCode::VerificationResendTooSoon.http_status(),
            StatusCode::TOO_MANY_REQUESTS
        );
    }

    #[test]
    fn test_delivery_statuses() {
        assert_eq!(
            ErrorCode::DeliveryFailed.http_status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            ErrorCode::DeliveryNetwork.http_status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_bad_request_default() {
        assert_eq!(
            ErrorCode::ValidationFailed.http_status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ErrorCode::DealAmountInvalid.http_status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ErrorCode::ChangeReasonRequired.http_status(),
            StatusCode::BAD_REQUEST
        );
    }
}
