//! Unified error codes for Regravity
//!
//! Error codes are organized by category:
//! - 0xxx: General errors
//! - 1xxx: Authentication errors
//! - 2xxx: Permission errors
//! - 3xxx: Verification errors
//! - 4xxx: Order errors
//! - 5xxx: Delivery (email) errors
//! - 6xxx: Storage errors
//! - 9xxx: System errors

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error code enum
///
/// All error codes are represented as u16 values for efficient serialization
/// and cross-language compatibility with the web frontend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 0xxx: General ====================
    /// Operation completed successfully
    Success = 0,
    /// Unknown error
    Unknown = 1,
    /// Validation failed
    ValidationFailed = 2,
    /// Resource not found
    NotFound = 3,
    /// Resource already exists
    AlreadyExists = 4,
    /// Invalid request
    InvalidRequest = 5,
    /// Invalid format
    InvalidFormat = 6,
    /// Required field missing
    RequiredField = 7,
    /// Value out of range
    ValueOutOfRange = 8,
    /// Too many requests from this client
    TooManyRequests = 9,

    // ==================== 1xxx: Auth ====================
    /// User is not authenticated
    NotAuthenticated = 1001,
    /// Token has expired
    TokenExpired = 1003,
    /// Token is invalid
    TokenInvalid = 1004,

    // ==================== 2xxx: Permission ====================
    /// Permission denied
    PermissionDenied = 2001,
    /// Admin role required
    AdminRequired = 2003,

    // ==================== 3xxx: Verification ====================
    /// Entered code is not exactly six digits
    VerificationCodeInvalidFormat = 3001,
    /// No challenge was issued, or it was already consumed
    VerificationNotIssued = 3002,
    /// Code does not match the active challenge
    VerificationCodeMismatch = 3003,
    /// Challenge TTL elapsed
    VerificationCodeExpired = 3004,
    /// Resend requested before the throttle window elapsed
    VerificationResendTooSoon = 3005,
    /// Too many mismatches for one challenge
    TooManyAttempts = 3006,

    // ==================== 4xxx: Order ====================
    /// Order not found
    OrderNotFound = 4001,
    /// Neither or both supplier options were provided
    SupplierSelectionInvalid = 4002,
    /// Referenced supplier does not exist
    SupplierNotFound = 4003,
    /// Deal amount below the minimum
    DealAmountInvalid = 4004,
    /// Order status does not allow edit/cancel requests
    ChangeRequestNotAllowed = 4005,
    /// Change request reason missing
    ChangeReasonRequired = 4006,
    /// Service details missing a required key
    ServiceDetailsIncomplete = 4007,
    /// Service order not found
    ServiceOrderNotFound = 4008,
    /// Change request could not be stored or delivered
    ChangeRequestFailed = 4009,

    // ==================== 5xxx: Delivery ====================
    /// Every delivery strategy failed
    DeliveryFailed = 5001,
    /// Provider rejected the message by policy
    DeliveryProviderPolicy = 5002,
    /// Provider rejected a precondition (rate, template, parameters)
    DeliveryPreconditionRejected = 5003,
    /// Provider could not be reached
    DeliveryNetwork = 5004,

    // ==================== 6xxx: Storage ====================
    /// Store rejected the operation for the current identity
    StoragePermissionDenied = 6001,
    /// Table or relation is missing
    StorageMissingSchema = 6002,
    /// Uniqueness constraint violated
    StorageConflict = 6003,

    // ==================== 9xxx: System ====================
    /// Internal server error
    InternalError = 9001,
    /// Database error
    DatabaseError = 9002,
    /// Network error
    NetworkError = 9003,
    /// Operation timeout
    TimeoutError = 9004,
    /// Configuration error
    ConfigError = 9005,
}

impl ErrorCode {
    /// Get the numeric code value
    #[inline]
    pub const fn code(&self) -> u16 {
        *self as u16
    }

    /// Check if this is a success code
    #[inline]
    pub const fn is_success(&self) -> bool {
        matches!(self, ErrorCode::Success)
    }

    /// Get the developer-facing English message for this error code
    pub const fn message(&self) -> &'static str {
        match self {
            // General
            ErrorCode::Success => "Operation completed successfully",
            ErrorCode::Unknown => "An unknown error occurred",
            ErrorCode::ValidationFailed => "Validation failed",
            ErrorCode::NotFound => "Resource not found",
            ErrorCode::AlreadyExists => "Resource already exists",
            ErrorCode::InvalidRequest => "Invalid request",
            ErrorCode::InvalidFormat => "Invalid format",
            ErrorCode::RequiredField => "Required field is missing",
            ErrorCode::ValueOutOfRange => "Value is out of range",
            ErrorCode::TooManyRequests => "Too many requests, try again later",

            // Auth
            ErrorCode::NotAuthenticated => "User is not authenticated",
            ErrorCode::TokenExpired => "Authentication token has expired",
            ErrorCode::TokenInvalid => "Authentication token is invalid",

            // Permission
            ErrorCode::PermissionDenied => "Permission denied",
            ErrorCode::AdminRequired => "Administrator role is required",

            // Verification
            ErrorCode::VerificationCodeInvalidFormat => {
                "Verification code must be exactly 6 digits"
            }
            ErrorCode::VerificationNotIssued => "No verification code was issued for this email",
            ErrorCode::VerificationCodeMismatch => "Invalid verification code",
            ErrorCode::VerificationCodeExpired => "Verification code has expired",
            ErrorCode::VerificationResendTooSoon => {
                "Please wait before requesting another verification code"
            }
            ErrorCode::TooManyAttempts => "Too many attempts, request a new code",

            // Order
            ErrorCode::OrderNotFound => "Order not found",
            ErrorCode::SupplierSelectionInvalid => {
                "Provide either an existing supplier or a new supplier name and email"
            }
            ErrorCode::SupplierNotFound => "Supplier not found",
            ErrorCode::DealAmountInvalid => "Deal amount must be at least 1",
            ErrorCode::ChangeRequestNotAllowed => {
                "Changes can no longer be requested for this order"
            }
            ErrorCode::ChangeReasonRequired => "A reason is required",
            ErrorCode::ServiceDetailsIncomplete => "Service details are incomplete",
            ErrorCode::ServiceOrderNotFound => "Service order not found",
            ErrorCode::ChangeRequestFailed => "Change request could not be submitted",

            // Delivery
            ErrorCode::DeliveryFailed => "Email could not be delivered",
            ErrorCode::DeliveryProviderPolicy => "Email provider rejected the message",
            ErrorCode::DeliveryPreconditionRejected => {
                "Email provider is not accepting requests right now"
            }
            ErrorCode::DeliveryNetwork => "Email provider could not be reached",

            // Storage
            ErrorCode::StoragePermissionDenied => "Storage permission denied",
            ErrorCode::StorageMissingSchema => "Storage is not provisioned",
            ErrorCode::StorageConflict => "Storage conflict",

            // System
            ErrorCode::InternalError => "Internal server error",
            ErrorCode::DatabaseError => "Database error",
            ErrorCode::NetworkError => "Network error",
            ErrorCode::TimeoutError => "Operation timed out",
            ErrorCode::ConfigError => "Configuration error",
        }
    }
}

impl From<ErrorCode> for u16 {
    #[inline]
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

/// Error when converting from an invalid u16 to ErrorCode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidErrorCode(pub u16);

impl fmt::Display for InvalidErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid error code: {}", self.0)
    }
}

impl std::error::Error for InvalidErrorCode {}

impl TryFrom<u16> for ErrorCode {
    type Error = InvalidErrorCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            // General
            0 => Ok(ErrorCode::Success),
            1 => Ok(ErrorCode::Unknown),
            2 => Ok(ErrorCode::ValidationFailed),
            3 => Ok(ErrorCode::NotFound),
            4 => Ok(ErrorCode::AlreadyExists),
            5 => Ok(ErrorCode::InvalidRequest),
            6 => Ok(ErrorCode::InvalidFormat),
            7 => Ok(ErrorCode::RequiredField),
            8 => Ok(ErrorCode::ValueOutOfRange),
            9 => Ok(ErrorCode::TooManyRequests),

            // Auth
            1001 => Ok(ErrorCode::NotAuthenticated),
            1003 => Ok(ErrorCode::TokenExpired),
            1004 => Ok(ErrorCode::TokenInvalid),

            // Permission
            2001 => Ok(ErrorCode::PermissionDenied),
            2003 => Ok(ErrorCode::AdminRequired),

            // Verification
            3001 => Ok(ErrorCode::VerificationCodeInvalidFormat),
            3002 => Ok(ErrorCode::VerificationNotIssued),
            3003 => Ok(ErrorCode::VerificationCodeMismatch),
            3004 => Ok(ErrorCode::VerificationCodeExpired),
            3005 => Ok(ErrorCode::VerificationResendTooSoon),
            3006 => Ok(ErrorCode::TooManyAttempts),

            // Order
            4001 => Ok(ErrorCode::OrderNotFound),
            4002 => Ok(ErrorCode::SupplierSelectionInvalid),
            4003 => Ok(ErrorCode::SupplierNotFound),
            4004 => Ok(ErrorCode::DealAmountInvalid),
            4005 => Ok(ErrorCode::ChangeRequestNotAllowed),
            4006 => Ok(ErrorCode::ChangeReasonRequired),
            4007 => Ok(ErrorCode::ServiceDetailsIncomplete),
            4008 => Ok(ErrorCode::ServiceOrderNotFound),
            4009 => Ok(ErrorCode::ChangeRequestFailed),

            // Delivery
            5001 => Ok(ErrorCode::DeliveryFailed),
            5002 => Ok(ErrorCode::DeliveryProviderPolicy),
            5003 => Ok(ErrorCode::DeliveryPreconditionRejected),
            5004 => Ok(ErrorCode::DeliveryNetwork),

            // Storage
            6001 => Ok(ErrorCode::StoragePermissionDenied),
            6002 => Ok(ErrorCode::StorageMissingSchema),
            6003 => Ok(ErrorCode::StorageConflict),

            // System
            9001 => Ok(ErrorCode::InternalError),
            9002 => Ok(ErrorCode::DatabaseError),
            9003 => Ok(ErrorCode::NetworkError),
            9004 => Ok(ErrorCode::TimeoutError),
            9005 => Ok(ErrorCode::ConfigError),

            _ => Err(InvalidErrorCode(value)),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
