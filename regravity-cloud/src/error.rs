//! Unified service-layer error type for regravity-cloud
//!
//! `ServiceError` bridges repository and delivery failures to the API-layer
//! error (`AppError`) so services can use `?` on either.

use axum::response::IntoResponse;
use shared::error::{AppError, ErrorCode};

use crate::db::{RepoError, RepoErrorKind};
use crate::email::DispatchFailure;

#[derive(Debug)]
pub enum ServiceError {
    /// Repository rejected a read or write (auto-logged, classified)
    Repo(RepoError),
    /// Every strategy of a blocking notification failed
    Delivery(DispatchFailure),
    /// Business-rule error (already an AppError with the correct ErrorCode)
    App(AppError),
}

impl From<RepoError> for ServiceError {
    fn from(e: RepoError) -> Self {
        ServiceError::Repo(e)
    }
}

impl From<DispatchFailure> for ServiceError {
    fn from(e: DispatchFailure) -> Self {
        ServiceError::Delivery(e)
    }
}

impl From<AppError> for ServiceError {
    fn from(e: AppError) -> Self {
        ServiceError::App(e)
    }
}

/// User-facing classification of a repository failure
pub fn repo_error_code(kind: RepoErrorKind) -> ErrorCode {
    match kind {
        RepoErrorKind::PermissionDenied => ErrorCode::StoragePermissionDenied,
        RepoErrorKind::MissingSchema => ErrorCode::StorageMissingSchema,
        RepoErrorKind::Conflict => ErrorCode::StorageConflict,
        RepoErrorKind::Generic => ErrorCode::DatabaseError,
    }
}

impl From<ServiceError> for AppError {
    fn from(e: ServiceError) -> Self {
        match e {
            ServiceError::App(app_err) => app_err,
            ServiceError::Delivery(failure) => failure.into(),
            ServiceError::Repo(repo_err) => {
                tracing::error!(kind = %repo_err.kind, error = %repo_err.message, "Repository error");
                AppError::new(repo_error_code(repo_err.kind))
                    .with_detail("storage_error", repo_err.kind.as_str())
            }
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> axum::response::Response {
        let app_error: AppError = self.into();
        app_error.into_response()
    }
}

/// Convenience type alias for service-layer results
pub type ServiceResult<T> = Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repo_errors_are_classified() {
        let err: AppError =
            ServiceError::from(RepoError::new(RepoErrorKind::PermissionDenied, "rls")).into();
        assert_eq!(err.code, ErrorCode::StoragePermissionDenied);
        // Raw driver text stays in the logs
        assert!(!err.message.contains("rls"));

        let err: AppError =
            ServiceError::from(RepoError::new(RepoErrorKind::Generic, "boom")).into();
        assert_eq!(err.code, ErrorCode::DatabaseError);
    }

    #[test]
    fn test_app_error_passes_through() {
        let err: AppError = ServiceError::from(AppError::new(ErrorCode::OrderNotFound)).into();
        assert_eq!(err.code, ErrorCode::OrderNotFound);
    }
}
