use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{BookId, LoanId, MemberId, StaffId};

/// コマンド：書籍を貸し出す（窓口での即時貸出）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueBook {
    pub book_id: BookId,
    pub member_id: MemberId,
    pub issued_at: DateTime<Utc>,
    pub staff_id: StaffId,
}

/// コマンド：貸出を申請する
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestLoan {
    pub book_id: BookId,
    pub member_id: MemberId,
    pub requested_at: DateTime<Utc>,
}

/// コマンド：申請を承認する
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApproveRequest {
    pub loan_id: LoanId,
    pub approved_at: DateTime<Utc>,
    pub staff_id: StaffId,
}

/// コマンド：申請を取り消す
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelRequest {
    pub loan_id: LoanId,
    pub cancelled_at: DateTime<Utc>,
}

/// コマンド：貸出を延長する
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenewLoan {
    pub loan_id: LoanId,
    pub renewed_at: DateTime<Utc>,
}

/// コマンド：書籍を返却する
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnBook {
    pub loan_id: LoanId,
    pub returned_at: DateTime<Utc>,
}

/// コマンド：紛失を報告する
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportLost {
    pub loan_id: LoanId,
    pub reported_at: DateTime<Utc>,
}

/// コマンド：会員の未払い罰金をすべて徴収する
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectFines {
    pub member_id: MemberId,
    pub collected_at: DateTime<Utc>,
}
