use crate::application::LendingError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use super::types::ErrorResponse;

/// API層のエラー型
///
/// アプリケーション層のエラーをラップし、HTTPレスポンスへのマッピングを提供する。
#[derive(Debug)]
pub enum ApiError {
    Lending(LendingError),
    BadRequest(String),
}

impl From<LendingError> for ApiError {
    fn from(err: LendingError) -> Self {
        ApiError::Lending(err)
    }
}

/// アプリケーションエラーをステータスコードとエラー種別に対応付ける
fn classify(err: &LendingError) -> (StatusCode, &'static str) {
    use LendingError::*;

    match err {
        // 404 Not Found - リクエストされたリソースが存在しない
        BookNotFound(_) => (StatusCode::NOT_FOUND, "BOOK_NOT_FOUND"),
        MemberNotFound(_) => (StatusCode::NOT_FOUND, "MEMBER_NOT_FOUND"),
        LoanNotFound(_) => (StatusCode::NOT_FOUND, "LOAN_NOT_FOUND"),
        ShelfNotFound(_) => (StatusCode::NOT_FOUND, "SHELF_NOT_FOUND"),

        // 409 Conflict - 現在の状態と衝突する
        NotAvailable => (StatusCode::CONFLICT, "NOT_AVAILABLE"),
        AlreadyReturned => (StatusCode::CONFLICT, "ALREADY_RETURNED"),
        AlreadyTerminal => (StatusCode::CONFLICT, "ALREADY_TERMINAL"),
        InvalidLoanState(_) => (StatusCode::CONFLICT, "INVALID_LOAN_STATE"),
        InconsistentState(_) => (StatusCode::CONFLICT, "INCONSISTENT_STATE"),
        ConcurrentModification { .. } => (StatusCode::CONFLICT, "CONCURRENT_MODIFICATION"),

        // 422 Unprocessable Entity - ビジネスルール違反・入力不正
        MemberDisabled => (StatusCode::UNPROCESSABLE_ENTITY, "MEMBER_DISABLED"),
        BorrowLimitExceeded { .. } => (StatusCode::UNPROCESSABLE_ENTITY, "BORROW_LIMIT_EXCEEDED"),
        NotRenewable(_) => (StatusCode::UNPROCESSABLE_ENTITY, "NOT_RENEWABLE"),
        InvalidGenre(_) => (StatusCode::UNPROCESSABLE_ENTITY, "INVALID_GENRE"),
        InvalidCsvRow { .. } => (StatusCode::UNPROCESSABLE_ENTITY, "INVALID_CSV_ROW"),
        InvalidInput(_) => (StatusCode::UNPROCESSABLE_ENTITY, "INVALID_INPUT"),

        // 500 Internal Server Error - システム障害
        PartialShelfAssignment { .. } => {
            (StatusCode::INTERNAL_SERVER_ERROR, "PARTIAL_SHELF_ASSIGNMENT")
        }
        CorruptHistory(_) => (StatusCode::INTERNAL_SERVER_ERROR, "CORRUPT_HISTORY"),
        EventStoreError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "EVENT_STORE_ERROR"),
        ReadModelError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "READ_MODEL_ERROR"),
        CatalogError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "CATALOG_ERROR"),
        MemberRegistryError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "MEMBER_REGISTRY_ERROR"),
        ShelfRegistryError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "SHELF_REGISTRY_ERROR"),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::BadRequest(message) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse::new("BAD_REQUEST", message, false),
            ),
            ApiError::Lending(err) => {
                let (status, error_type) = classify(&err);
                let retryable = err.is_retryable();

                // 内部エラーの詳細はログに記録し、クライアントには一般的なメッセージのみを返す
                let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
                    tracing::error!(error = ?err, "{}", err);
                    "An internal error occurred".to_string()
                } else {
                    err.to_string()
                };

                (status, ErrorResponse::new(error_type, message, retryable))
            }
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::LoanId;

    #[test]
    fn test_business_errors_map_to_client_statuses() {
        assert_eq!(
            classify(&LendingError::LoanNotFound(LoanId::new())).0,
            StatusCode::NOT_FOUND
        );
        assert_eq!(classify(&LendingError::AlreadyReturned).0, StatusCode::CONFLICT);
        assert_eq!(
            classify(&LendingError::BorrowLimitExceeded { limit: 5 }).0,
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn test_concurrent_modification_is_retryable_conflict() {
        let err = LendingError::ConcurrentModification {
            loan_id: LoanId::new(),
        };
        assert_eq!(classify(&err), (StatusCode::CONFLICT, "CONCURRENT_MODIFICATION"));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_storage_errors_are_internal() {
        let err = LendingError::EventStoreError("connection reset".into());
        assert_eq!(classify(&err).0, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.is_retryable());
    }
}
