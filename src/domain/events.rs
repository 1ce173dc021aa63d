use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{BookId, LoanId, MemberId, Money, StaffId};

/// イベント：会員が貸出を申請した（在庫は確保しない）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanRequested {
    pub loan_id: LoanId,
    pub book_id: BookId,
    pub member_id: MemberId,
    pub requested_at: DateTime<Utc>,
}

/// イベント：貸出申請が取り消された
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestCancelled {
    pub loan_id: LoanId,
    pub cancelled_at: DateTime<Utc>,
}

/// イベント：書籍が貸し出された
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookIssued {
    pub loan_id: LoanId,
    pub book_id: BookId,
    pub member_id: MemberId,
    pub issued_at: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub issued_by: StaffId,
}

/// イベント：貸出が延長された
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanRenewed {
    pub loan_id: LoanId,
    pub old_due_date: DateTime<Utc>,
    pub new_due_date: DateTime<Utc>,
    pub renewed_at: DateTime<Utc>,
    pub renewal_count: u32,
}

/// イベント：貸出が延滞した
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanBecameOverdue {
    pub loan_id: LoanId,
    pub book_id: BookId,
    pub member_id: MemberId,
    pub due_date: DateTime<Utc>,
    pub detected_at: DateTime<Utc>,
}

/// イベント：書籍が返却された（延滞料はこの時点で確定）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookReturned {
    pub loan_id: LoanId,
    pub book_id: BookId,
    pub member_id: MemberId,
    pub returned_at: DateTime<Utc>,
    pub days_late: u64,
    pub fine: Money,
}

/// イベント：書籍の紛失が報告された
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookReportedLost {
    pub loan_id: LoanId,
    pub book_id: BookId,
    pub member_id: MemberId,
    pub reported_at: DateTime<Utc>,
    pub was_overdue: bool,
    pub fine: Money,
    /// 蔵書数から除籍するか（ポリシーが WriteOff のとき）
    #[serde(default)]
    pub writes_off_copy: bool,
}

/// イベント：罰金が支払われた
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinePaid {
    pub loan_id: LoanId,
    pub member_id: MemberId,
    pub amount: Money,
    pub paid_at: DateTime<Utc>,
}

/// イベント：返却・紛失に伴うカタログの在庫処理が完了した
///
/// 返却なら在庫の解放、除籍ありの紛失なら蔵書数の減算。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventorySettled {
    pub loan_id: LoanId,
    pub book_id: BookId,
    pub settled_at: DateTime<Utc>,
}

/// ドメインイベント統合型
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DomainEvent {
    LoanRequested(LoanRequested),
    RequestCancelled(RequestCancelled),
    BookIssued(BookIssued),
    LoanRenewed(LoanRenewed),
    LoanBecameOverdue(LoanBecameOverdue),
    BookReturned(BookReturned),
    BookReportedLost(BookReportedLost),
    FinePaid(FinePaid),
    InventorySettled(InventorySettled),
}

impl DomainEvent {
    pub fn loan_id(&self) -> LoanId {
        match self {
            DomainEvent::LoanRequested(e) => e.loan_id,
            DomainEvent::RequestCancelled(e) => e.loan_id,
            DomainEvent::BookIssued(e) => e.loan_id,
            DomainEvent::LoanRenewed(e) => e.loan_id,
            DomainEvent::LoanBecameOverdue(e) => e.loan_id,
            DomainEvent::BookReturned(e) => e.loan_id,
            DomainEvent::BookReportedLost(e) => e.loan_id,
            DomainEvent::FinePaid(e) => e.loan_id,
            DomainEvent::InventorySettled(e) => e.loan_id,
        }
    }

    /// 永続化用のイベント種別
    pub fn event_type(&self) -> &'static str {
        match self {
            DomainEvent::LoanRequested(_) => "LoanRequested",
            DomainEvent::RequestCancelled(_) => "RequestCancelled",
            DomainEvent::BookIssued(_) => "BookIssued",
            DomainEvent::LoanRenewed(_) => "LoanRenewed",
            DomainEvent::LoanBecameOverdue(_) => "LoanBecameOverdue",
            DomainEvent::BookReturned(_) => "BookReturned",
            DomainEvent::BookReportedLost(_) => "BookReportedLost",
            DomainEvent::FinePaid(_) => "FinePaid",
            DomainEvent::InventorySettled(_) => "InventorySettled",
        }
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            DomainEvent::LoanRequested(e) => e.requested_at,
            DomainEvent::RequestCancelled(e) => e.cancelled_at,
            DomainEvent::BookIssued(e) => e.issued_at,
            DomainEvent::LoanRenewed(e) => e.renewed_at,
            DomainEvent::LoanBecameOverdue(e) => e.detected_at,
            DomainEvent::BookReturned(e) => e.returned_at,
            DomainEvent::BookReportedLost(e) => e.reported_at,
            DomainEvent::FinePaid(e) => e.paid_at,
            DomainEvent::InventorySettled(e) => e.settled_at,
        }
    }
}
