#![allow(dead_code)]

use super::LoanId;

/// 蔵書台帳のエラー
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    /// 貸出可能な冊数がない
    NotAvailable,
    /// 返却で available が total を超える（帳簿の不整合）
    ReleaseBeyondTotal { total: u32 },
    /// 除却対象となる貸出中の冊がない
    NoCopyOnLoan,
}

/// 予約承認のエラー
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApproveRequestError {
    /// Pending以外の貸出は承認できない
    NotPending,
}

/// 予約取消のエラー
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelRequestError {
    NotPending,
}

/// 返却のエラー
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReturnBookError {
    /// 既に返却済み、または紛失処理済み
    AlreadyReturned,
    /// 貸出が開始されていない（Pending / Cancelled）
    NotIssued,
}

/// 紛失報告のエラー
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportLostError {
    /// 既に返却済み、または紛失処理済み
    AlreadyTerminal,
    NotIssued,
}

/// 延長できない理由
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotRenewableReason {
    Returned,
    Lost,
    NotIssued,
    ReservedByAnotherMember,
}

impl NotRenewableReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotRenewableReason::Returned => "loan has been returned",
            NotRenewableReason::Lost => "loan has been reported lost",
            NotRenewableReason::NotIssued => "loan has not been issued",
            NotRenewableReason::ReservedByAnotherMember => {
                "book is requested by another member"
            }
        }
    }
}

/// 延長のエラー
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenewLoanError {
    NotRenewable(NotRenewableReason),
}

/// 罰金支払いのエラー
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayFineError {
    /// 未払いの罰金がない（罰金0、または支払済み）
    NothingDue,
    /// 罰金が確定していない（返却も紛失もされていない）
    FineNotFinalized,
}

/// イベント適用時の不正な状態遷移
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionError {
    pub loan_id: LoanId,
    pub event_type: &'static str,
    pub from_state: &'static str,
}

impl std::fmt::Display for TransitionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} cannot apply to loan {} in state {}",
            self.event_type,
            self.loan_id.value(),
            self.from_state
        )
    }
}

impl std::error::Error for TransitionError {}

/// ポリシー設定の検証エラー
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyError {
    BorrowingLimitZero,
    ReturnPeriodZero,
    ReissuePeriodZero,
}

impl std::fmt::Display for PolicyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PolicyError::BorrowingLimitZero => f.write_str("borrowing_limit must be at least 1"),
            PolicyError::ReturnPeriodZero => f.write_str("return_period_days must be at least 1"),
            PolicyError::ReissuePeriodZero => {
                f.write_str("reissue_period_days must be at least 1")
            }
        }
    }
}

impl std::error::Error for PolicyError {}
