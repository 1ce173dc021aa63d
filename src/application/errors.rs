use thiserror::Error;

use crate::domain::{BookId, LoanId, MemberId, TransitionError};
use crate::ports::VersionConflict;

/// 貸出管理アプリケーション層のエラー
///
/// ビジネスルール違反（終端エラー）と、ストレージ障害（再試行可能）を区別する。
#[derive(Debug, Error)]
pub enum LendingError {
    /// 書籍が存在しない
    #[error("Book not found: {}", .0.value())]
    BookNotFound(BookId),

    /// 会員が存在しない
    #[error("Member not found: {}", .0.value())]
    MemberNotFound(MemberId),

    /// 貸出が見つからない
    #[error("Loan not found: {}", .0.value())]
    LoanNotFound(LoanId),

    /// 書架が見つからない
    #[error("Shelf not found: {0}")]
    ShelfNotFound(String),

    /// 貸出可能な冊がない
    #[error("No copies available for loan")]
    NotAvailable,

    /// 会員が無効化されている
    #[error("Member is disabled")]
    MemberDisabled,

    /// 貸出上限を超えている
    #[error("Borrowing limit exceeded (max {limit} books)")]
    BorrowLimitExceeded { limit: u32 },

    /// 既に返却済み、または紛失済み
    #[error("Loan has already been returned")]
    AlreadyReturned,

    /// 既に終端状態（返却済み・紛失済み）
    #[error("Loan is already returned or lost")]
    AlreadyTerminal,

    /// 延長できない
    #[error("Loan cannot be renewed: {0}")]
    NotRenewable(String),

    /// 貸出が開始されていない、または申請ではない
    #[error("Invalid loan state: {0}")]
    InvalidLoanState(String),

    /// 許可リストにないジャンル
    #[error("{0}")]
    InvalidGenre(String),

    /// CSVの行が不正
    #[error("Invalid CSV row at line {line}: {reason}")]
    InvalidCsvRow { line: usize, reason: String },

    /// 入力値が不正
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// 帳簿の不整合（total を超える返却、書架と書籍の不一致など）
    #[error("Inconsistent state: {0}")]
    InconsistentState(String),

    /// 書架への登録後、書籍側の更新に失敗した
    #[error("Shelf {shelf_no} now lists the book but its shelf location was not updated")]
    PartialShelfAssignment {
        shelf_no: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// 読み込み後に別の書き込みが同じ貸出を更新した（読み直して再試行できる）
    #[error("Loan {} was modified concurrently; reload and retry", .loan_id.value())]
    ConcurrentModification { loan_id: LoanId },

    /// 永続化されたイベント列が状態遷移表に反する
    #[error("Corrupt event history")]
    CorruptHistory(#[source] TransitionError),

    /// EventStoreのエラー
    #[error("Event store error")]
    EventStoreError(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// ReadModelのエラー
    #[error("Read model error")]
    ReadModelError(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// BookCatalogのエラー
    #[error("Book catalog error")]
    CatalogError(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// MemberRegistryのエラー
    #[error("Member registry error")]
    MemberRegistryError(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// ShelfRegistryのエラー
    #[error("Shelf registry error")]
    ShelfRegistryError(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl LendingError {
    /// EventStoreのエラーを変換する。バージョン不一致は `ConcurrentModification` になる
    pub fn from_event_store(err: Box<dyn std::error::Error + Send + Sync>) -> Self {
        match err.downcast::<VersionConflict>() {
            Ok(conflict) => LendingError::ConcurrentModification {
                loan_id: conflict.aggregate_id,
            },
            Err(other) => LendingError::EventStoreError(other),
        }
    }

    /// 呼び出し側が再試行してよいエラーか（ストレージ・通信の障害、同時更新）
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LendingError::EventStoreError(_)
                | LendingError::ConcurrentModification { .. }
                | LendingError::ReadModelError(_)
                | LendingError::CatalogError(_)
                | LendingError::MemberRegistryError(_)
                | LendingError::ShelfRegistryError(_)
                | LendingError::PartialShelfAssignment { .. }
        )
    }
}

/// アプリケーション層の Result型
pub type Result<T> = std::result::Result<T, LendingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_business_errors_are_terminal() {
        assert!(!LendingError::NotAvailable.is_retryable());
        assert!(!LendingError::MemberDisabled.is_retryable());
        assert!(!LendingError::BorrowLimitExceeded { limit: 5 }.is_retryable());
        assert!(
            !LendingError::InconsistentState("release beyond total".to_string()).is_retryable()
        );
    }

    #[test]
    fn test_storage_errors_are_retryable() {
        let err = LendingError::CatalogError("connection reset".into());
        assert!(err.is_retryable());
        let err = LendingError::EventStoreError("timeout".into());
        assert!(err.is_retryable());
    }

    #[test]
    fn test_version_conflict_becomes_concurrent_modification() {
        let loan_id = LoanId::new();
        let conflict: Box<dyn std::error::Error + Send + Sync> = Box::new(VersionConflict {
            aggregate_id: loan_id,
            expected_version: 3,
        });

        let err = LendingError::from_event_store(conflict);
        assert!(matches!(
            err,
            LendingError::ConcurrentModification { loan_id: id } if id == loan_id
        ));
        assert!(err.is_retryable());

        let err = LendingError::from_event_store("disk full".into());
        assert!(matches!(err, LendingError::EventStoreError(_)));
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            LendingError::BorrowLimitExceeded { limit: 3 }.to_string(),
            "Borrowing limit exceeded (max 3 books)"
        );
        assert_eq!(
            LendingError::InvalidCsvRow {
                line: 4,
                reason: "expected 6 columns, found 5".to_string()
            }
            .to_string(),
            "Invalid CSV row at line 4: expected 6 columns, found 5"
        );
    }
}
