use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::policy::{assess_return_fine, days_late, lost_fine};
use super::{
    ApproveRequestError, BookId, BookIssued, BookReportedLost, BookReturned, CancelRequestError,
    DomainEvent, FinePaid, InventorySettled, LoanBecameOverdue, LoanId, LoanRenewed, LoanRequested, MemberId,
    LostCopyHandling, Money, NotRenewableReason, PayFineError, Policy, RenewLoanError, ReportLostError,
    RequestCancelled, ReturnBookError, StaffId, TransitionError,
};

/// 貸出ステータス（永続化・外部公開用）
///
/// 紛失は直交するフラグ（`is_lost`）で表し、ステータスは紛失時点の値を保持する。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanStatus {
    /// 申請中（在庫未確保）
    Pending,
    /// 貸出中
    Issued,
    /// 延滞中
    Overdue,
    /// 返却済み
    Returned,
    /// 申請取消
    Cancelled,
}

impl LoanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanStatus::Pending => "pending",
            LoanStatus::Issued => "issued",
            LoanStatus::Overdue => "overdue",
            LoanStatus::Returned => "returned",
            LoanStatus::Cancelled => "cancelled",
        }
    }
}

impl std::str::FromStr for LoanStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(LoanStatus::Pending),
            "issued" => Ok(LoanStatus::Issued),
            "overdue" => Ok(LoanStatus::Overdue),
            "returned" => Ok(LoanStatus::Returned),
            "cancelled" => Ok(LoanStatus::Cancelled),
            _ => Err(format!("Invalid loan status: {}", s)),
        }
    }
}

// ============================================================================
// 型安全な状態パターン
// ============================================================================

/// 貸出開始後の共通フィールド
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanCore {
    // 識別子
    pub loan_id: LoanId,

    // 他の集約への参照（IDのみ）
    pub book_id: BookId,
    pub member_id: MemberId,

    // 貸出管理の責務
    pub issue_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub renewal_count: u32,

    // 監査情報
    pub issued_by: StaffId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 罰金の確定値と支払状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FineState {
    pub amount: Money,
    pub paid_at: Option<DateTime<Utc>>,
}

impl FineState {
    pub fn unpaid(amount: Money) -> Self {
        Self {
            amount,
            paid_at: None,
        }
    }

    pub fn is_paid(&self) -> bool {
        self.paid_at.is_some()
    }

    /// 未払いの罰金があるか
    pub fn is_due(&self) -> bool {
        !self.amount.is_zero() && !self.is_paid()
    }
}

/// 申請中状態
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingLoan {
    pub loan_id: LoanId,
    pub book_id: BookId,
    pub member_id: MemberId,
    pub requested_at: DateTime<Utc>,
}

/// 貸出中状態
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedLoan {
    #[serde(flatten)]
    pub core: LoanCore,
}

impl std::ops::Deref for IssuedLoan {
    type Target = LoanCore;

    fn deref(&self) -> &Self::Target {
        &self.core
    }
}

/// 延滞中状態（延滞検出バッチが記録したもの）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverdueLoan {
    #[serde(flatten)]
    pub core: LoanCore,
}

impl std::ops::Deref for OverdueLoan {
    type Target = LoanCore;

    fn deref(&self) -> &Self::Target {
        &self.core
    }
}

/// 返却済み状態
///
/// ビジネスルール：
/// - returned_atが必須（型で保証）
/// - 罰金は返却時点で確定
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnedLoan {
    #[serde(flatten)]
    pub core: LoanCore,
    pub returned_at: DateTime<Utc>,
    pub days_late: u64,
    pub fine: FineState,
    /// 在庫の解放が記録済みか
    pub inventory_settled: bool,
}

impl std::ops::Deref for ReturnedLoan {
    type Target = LoanCore;

    fn deref(&self) -> &Self::Target {
        &self.core
    }
}

/// 紛失状態（終端）
///
/// 紛失罰金は延滞料を置き換える（加算しない）。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LostLoan {
    #[serde(flatten)]
    pub core: LoanCore,
    pub lost_at: DateTime<Utc>,
    pub was_overdue: bool,
    pub fine: FineState,
    /// 除籍が不要か、除籍が記録済みか
    pub inventory_settled: bool,
}

impl std::ops::Deref for LostLoan {
    type Target = LoanCore;

    fn deref(&self) -> &Self::Target {
        &self.core
    }
}

/// 申請取消状態（終端）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelledLoan {
    pub request: PendingLoan,
    pub cancelled_at: DateTime<Utc>,
}

/// Loan集約 - 1回の貸出（延長しても再利用しない記録は1件）
///
/// 型安全な状態パターン：
/// - 返却済みかつ紛失、のような不正な組み合わせを型で排除
/// - 状態遷移は下記の純粋関数と `apply_event` のみで行う
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state")]
pub enum Loan {
    Pending(PendingLoan),
    Issued(IssuedLoan),
    Overdue(OverdueLoan),
    Returned(ReturnedLoan),
    Lost(LostLoan),
    Cancelled(CancelledLoan),
}

impl Loan {
    pub fn loan_id(&self) -> LoanId {
        match self {
            Loan::Pending(p) => p.loan_id,
            Loan::Issued(l) => l.loan_id,
            Loan::Overdue(l) => l.loan_id,
            Loan::Returned(l) => l.loan_id,
            Loan::Lost(l) => l.loan_id,
            Loan::Cancelled(c) => c.request.loan_id,
        }
    }

    pub fn book_id(&self) -> BookId {
        match self {
            Loan::Pending(p) => p.book_id,
            Loan::Issued(l) => l.book_id,
            Loan::Overdue(l) => l.book_id,
            Loan::Returned(l) => l.book_id,
            Loan::Lost(l) => l.book_id,
            Loan::Cancelled(c) => c.request.book_id,
        }
    }

    pub fn member_id(&self) -> MemberId {
        match self {
            Loan::Pending(p) => p.member_id,
            Loan::Issued(l) => l.member_id,
            Loan::Overdue(l) => l.member_id,
            Loan::Returned(l) => l.member_id,
            Loan::Lost(l) => l.member_id,
            Loan::Cancelled(c) => c.request.member_id,
        }
    }

    pub fn core(&self) -> Option<&LoanCore> {
        match self {
            Loan::Issued(l) => Some(&l.core),
            Loan::Overdue(l) => Some(&l.core),
            Loan::Returned(l) => Some(&l.core),
            Loan::Lost(l) => Some(&l.core),
            Loan::Pending(_) | Loan::Cancelled(_) => None,
        }
    }

    pub fn state_name(&self) -> &'static str {
        match self {
            Loan::Pending(_) => "Pending",
            Loan::Issued(_) => "Issued",
            Loan::Overdue(_) => "Overdue",
            Loan::Returned(_) => "Returned",
            Loan::Lost(_) => "Lost",
            Loan::Cancelled(_) => "Cancelled",
        }
    }

    /// 記録されているステータス（遅延評価前）
    pub fn status(&self) -> LoanStatus {
        match self {
            Loan::Pending(_) => LoanStatus::Pending,
            Loan::Issued(_) => LoanStatus::Issued,
            Loan::Overdue(_) => LoanStatus::Overdue,
            Loan::Returned(_) => LoanStatus::Returned,
            Loan::Lost(l) if l.was_overdue => LoanStatus::Overdue,
            Loan::Lost(_) => LoanStatus::Issued,
            Loan::Cancelled(_) => LoanStatus::Cancelled,
        }
    }

    /// 貸出中（返却も紛失もされていない）
    pub fn is_open(&self) -> bool {
        matches!(self, Loan::Issued(_) | Loan::Overdue(_))
    }

    pub fn is_lost(&self) -> bool {
        matches!(self, Loan::Lost(_))
    }

    pub fn fine_state(&self) -> Option<&FineState> {
        match self {
            Loan::Returned(l) => Some(&l.fine),
            Loan::Lost(l) => Some(&l.fine),
            _ => None,
        }
    }

    pub fn fine(&self) -> Money {
        self.fine_state().map(|f| f.amount).unwrap_or(Money::ZERO)
    }

    pub fn is_paid(&self) -> bool {
        self.fine_state().is_some_and(FineState::is_paid)
    }

    /// 未払いの確定罰金
    pub fn outstanding_fine(&self) -> Money {
        match self.fine_state() {
            Some(fine) if fine.is_due() => fine.amount,
            _ => Money::ZERO,
        }
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        match self {
            Loan::Pending(p) => p.requested_at,
            Loan::Issued(l) => l.updated_at,
            Loan::Overdue(l) => l.updated_at,
            Loan::Returned(l) => l.updated_at,
            Loan::Lost(l) => l.updated_at,
            Loan::Cancelled(c) => c.cancelled_at,
        }
    }
}

fn days_from(at: DateTime<Utc>, days: u32) -> DateTime<Utc> {
    at + Duration::days(i64::from(days))
}

/// 純粋関数：貸出を申請する（在庫は確保しない）
pub fn request_loan(
    book_id: BookId,
    member_id: MemberId,
    requested_at: DateTime<Utc>,
) -> (PendingLoan, LoanRequested) {
    let loan_id = LoanId::new();

    let pending = PendingLoan {
        loan_id,
        book_id,
        member_id,
        requested_at,
    };

    let event = LoanRequested {
        loan_id,
        book_id,
        member_id,
        requested_at,
    };

    (pending, event)
}

fn start_loan(
    loan_id: LoanId,
    book_id: BookId,
    member_id: MemberId,
    issued_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    staff_id: StaffId,
    policy: &Policy,
) -> (IssuedLoan, BookIssued) {
    let due_date = days_from(issued_at, policy.return_period_days);

    let loan = IssuedLoan {
        core: LoanCore {
            loan_id,
            book_id,
            member_id,
            issue_date: issued_at,
            due_date,
            renewal_count: 0,
            issued_by: staff_id,
            created_at,
            updated_at: issued_at,
        },
    };

    let event = BookIssued {
        loan_id,
        book_id,
        member_id,
        issued_at,
        due_date,
        issued_by: staff_id,
    };

    (loan, event)
}

/// 純粋関数：書籍を貸し出す
///
/// ビジネスルール：
/// - 返却期限 = 貸出日 + ポリシーの貸出期間
/// - 罰金0、未払い、紛失なし
///
/// 副作用なし。在庫の確保はアプリケーション層が先に行う。
pub fn issue_loan(
    book_id: BookId,
    member_id: MemberId,
    issued_at: DateTime<Utc>,
    staff_id: StaffId,
    policy: &Policy,
) -> (IssuedLoan, BookIssued) {
    start_loan(
        LoanId::new(),
        book_id,
        member_id,
        issued_at,
        issued_at,
        staff_id,
        policy,
    )
}

/// 純粋関数：申請を承認して貸出を開始する（Pending → Issued）
///
/// 期限は承認日から起算する。
pub fn approve_request(
    loan: &Loan,
    approved_at: DateTime<Utc>,
    staff_id: StaffId,
    policy: &Policy,
) -> Result<(IssuedLoan, BookIssued), ApproveRequestError> {
    let Loan::Pending(pending) = loan else {
        return Err(ApproveRequestError::NotPending);
    };

    Ok(start_loan(
        pending.loan_id,
        pending.book_id,
        pending.member_id,
        approved_at,
        pending.requested_at,
        staff_id,
        policy,
    ))
}

/// 純粋関数：申請を取り消す
pub fn cancel_request(
    loan: &Loan,
    cancelled_at: DateTime<Utc>,
) -> Result<(CancelledLoan, RequestCancelled), CancelRequestError> {
    let Loan::Pending(pending) = loan else {
        return Err(CancelRequestError::NotPending);
    };

    let event = RequestCancelled {
        loan_id: pending.loan_id,
        cancelled_at,
    };

    Ok((
        CancelledLoan {
            request: pending.clone(),
            cancelled_at,
        },
        event,
    ))
}

/// 純粋関数：現在のステータスを求める（読み取り時の遅延評価）
///
/// Issued かつ期限を過ぎていれば Overdue。それ以外は記録どおり。
pub fn compute_status(loan: &Loan, now: DateTime<Utc>) -> LoanStatus {
    match loan {
        Loan::Issued(issued) if now > issued.due_date => LoanStatus::Overdue,
        other => other.status(),
    }
}

/// 純粋関数：延滞を記録する（Issued → Overdue）
///
/// 期限前、または既に延滞・終端の貸出には None を返す。
pub fn mark_overdue(loan: &Loan, now: DateTime<Utc>) -> Option<(OverdueLoan, LoanBecameOverdue)> {
    let Loan::Issued(issued) = loan else {
        return None;
    };
    if now <= issued.due_date {
        return None;
    }

    let event = LoanBecameOverdue {
        loan_id: issued.loan_id,
        book_id: issued.book_id,
        member_id: issued.member_id,
        due_date: issued.due_date,
        detected_at: now,
    };

    let overdue = OverdueLoan {
        core: LoanCore {
            updated_at: now,
            ..issued.core.clone()
        },
    };

    Some((overdue, event))
}

/// 純粋関数：書籍を返却する
///
/// ビジネスルール：
/// - 期限超過なら 延滞料 = 日額 × 延滞日数（切り上げ）
/// - 期限内なら罰金0
pub fn return_book(
    loan: &Loan,
    returned_at: DateTime<Utc>,
    policy: &Policy,
) -> Result<(ReturnedLoan, BookReturned), ReturnBookError> {
    let core = match loan {
        Loan::Issued(l) => &l.core,
        Loan::Overdue(l) => &l.core,
        Loan::Returned(_) | Loan::Lost(_) => return Err(ReturnBookError::AlreadyReturned),
        Loan::Pending(_) | Loan::Cancelled(_) => return Err(ReturnBookError::NotIssued),
    };

    let days_late = days_late(core.due_date, returned_at);
    let fine = assess_return_fine(policy, core.due_date, returned_at);

    let returned = ReturnedLoan {
        core: LoanCore {
            updated_at: returned_at,
            ..core.clone()
        },
        returned_at,
        days_late,
        fine: FineState::unpaid(fine),
        inventory_settled: false,
    };

    let event = BookReturned {
        loan_id: core.loan_id,
        book_id: core.book_id,
        member_id: core.member_id,
        returned_at,
        days_late,
        fine,
    };

    Ok((returned, event))
}

/// 純粋関数：紛失を報告する
///
/// 紛失罰金で既存の延滞料を置き換える。
pub fn report_lost(
    loan: &Loan,
    reported_at: DateTime<Utc>,
    policy: &Policy,
) -> Result<(LostLoan, BookReportedLost), ReportLostError> {
    let (core, recorded_overdue) = match loan {
        Loan::Issued(l) => (&l.core, false),
        Loan::Overdue(l) => (&l.core, true),
        Loan::Returned(_) | Loan::Lost(_) => return Err(ReportLostError::AlreadyTerminal),
        Loan::Pending(_) | Loan::Cancelled(_) => return Err(ReportLostError::NotIssued),
    };

    let was_overdue = recorded_overdue || reported_at > core.due_date;
    let fine = lost_fine(policy);
    let writes_off_copy = policy.lost_copy_handling == LostCopyHandling::WriteOff;

    let lost = LostLoan {
        core: LoanCore {
            updated_at: reported_at,
            ..core.clone()
        },
        lost_at: reported_at,
        was_overdue,
        fine: FineState::unpaid(fine),
        inventory_settled: !writes_off_copy,
    };

    let event = BookReportedLost {
        loan_id: core.loan_id,
        book_id: core.book_id,
        member_id: core.member_id,
        reported_at,
        was_overdue,
        fine,
        writes_off_copy,
    };

    Ok((lost, event))
}

/// 純粋関数：貸出を延長する
///
/// ビジネスルール：
/// - 新しい期限 = 延長日 + ポリシーの延長期間（元の期限からではない）
/// - 延滞中でも延長可能。延長後は Issued に戻る
/// - 他会員の申請があるかはアプリケーション層で確認する
pub fn renew_loan(
    loan: &Loan,
    renewed_at: DateTime<Utc>,
    policy: &Policy,
) -> Result<(IssuedLoan, LoanRenewed), RenewLoanError> {
    let core = match loan {
        Loan::Issued(l) => &l.core,
        Loan::Overdue(l) => &l.core,
        Loan::Returned(_) => {
            return Err(RenewLoanError::NotRenewable(NotRenewableReason::Returned));
        }
        Loan::Lost(_) => return Err(RenewLoanError::NotRenewable(NotRenewableReason::Lost)),
        Loan::Pending(_) | Loan::Cancelled(_) => {
            return Err(RenewLoanError::NotRenewable(NotRenewableReason::NotIssued));
        }
    };

    let new_due_date = days_from(renewed_at, policy.reissue_period_days);
    let renewal_count = core.renewal_count.saturating_add(1);

    let renewed = IssuedLoan {
        core: LoanCore {
            due_date: new_due_date,
            renewal_count,
            updated_at: renewed_at,
            ..core.clone()
        },
    };

    let event = LoanRenewed {
        loan_id: core.loan_id,
        old_due_date: core.due_date,
        new_due_date,
        renewed_at,
        renewal_count,
    };

    Ok((renewed, event))
}

/// 純粋関数：確定済みの罰金を支払い済みにする
pub fn pay_fine(loan: &Loan, paid_at: DateTime<Utc>) -> Result<(Loan, FinePaid), PayFineError> {
    let (paid, amount) = match loan {
        Loan::Returned(returned) if returned.fine.is_due() => (
            Loan::Returned(ReturnedLoan {
                core: LoanCore {
                    updated_at: paid_at,
                    ..returned.core.clone()
                },
                fine: FineState {
                    paid_at: Some(paid_at),
                    ..returned.fine
                },
                ..returned.clone()
            }),
            returned.fine.amount,
        ),
        Loan::Lost(lost) if lost.fine.is_due() => (
            Loan::Lost(LostLoan {
                core: LoanCore {
                    updated_at: paid_at,
                    ..lost.core.clone()
                },
                fine: FineState {
                    paid_at: Some(paid_at),
                    ..lost.fine
                },
                ..lost.clone()
            }),
            lost.fine.amount,
        ),
        Loan::Issued(_) | Loan::Overdue(_) => return Err(PayFineError::FineNotFinalized),
        _ => return Err(PayFineError::NothingDue),
    };

    let event = FinePaid {
        loan_id: loan.loan_id(),
        member_id: loan.member_id(),
        amount,
        paid_at,
    };

    Ok((paid, event))
}

/// 返却・紛失の後に残っているカタログ操作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InventoryFollowUp {
    /// 在庫を1冊戻す
    ReleaseCopy,
    /// 蔵書数を1冊減らす
    WriteOffCopy,
}

/// 在庫処理が未完了なら、その内容を返す
pub fn pending_inventory_follow_up(loan: &Loan) -> Option<InventoryFollowUp> {
    match loan {
        Loan::Returned(returned) if !returned.inventory_settled => {
            Some(InventoryFollowUp::ReleaseCopy)
        }
        Loan::Lost(lost) if !lost.inventory_settled => Some(InventoryFollowUp::WriteOffCopy),
        _ => None,
    }
}

/// 純粋関数：在庫処理の完了を記録する
///
/// 未完了の処理がなければ `None`。
pub fn settle_inventory(
    loan: &Loan,
    settled_at: DateTime<Utc>,
) -> Option<(Loan, InventorySettled)> {
    let settled = match loan {
        Loan::Returned(returned) if !returned.inventory_settled => Loan::Returned(ReturnedLoan {
            inventory_settled: true,
            ..returned.clone()
        }),
        Loan::Lost(lost) if !lost.inventory_settled => Loan::Lost(LostLoan {
            inventory_settled: true,
            ..lost.clone()
        }),
        _ => return None,
    };

    let event = InventorySettled {
        loan_id: loan.loan_id(),
        book_id: loan.book_id(),
        settled_at,
    };

    Some((settled, event))
}

/// 純粋関数：今返却した場合の罰金見込み（表示用、未払い合計には含めない）
pub fn accrued_fine(loan: &Loan, now: DateTime<Utc>, policy: &Policy) -> Money {
    match loan {
        Loan::Issued(l) => assess_return_fine(policy, l.due_date, now),
        Loan::Overdue(l) => assess_return_fine(policy, l.due_date, now),
        Loan::Returned(_) | Loan::Lost(_) => loan.fine(),
        Loan::Pending(_) | Loan::Cancelled(_) => Money::ZERO,
    }
}

fn reject(loan: Option<&Loan>, event: &DomainEvent) -> TransitionError {
    TransitionError {
        loan_id: event.loan_id(),
        event_type: event.event_type(),
        from_state: loan.map(Loan::state_name).unwrap_or("None"),
    }
}

/// イベントを適用して新しい状態を生成する純粋関数
///
/// イベントソーシングのfoldパターンで使用される。
/// 状態遷移表にない組み合わせ（例: Returned からの延長）は `TransitionError` を返す。
pub fn apply_event(loan: Option<Loan>, event: &DomainEvent) -> Result<Loan, TransitionError> {
    if let Some(current) = &loan {
        if current.loan_id() != event.loan_id() {
            return Err(reject(Some(current), event));
        }
    }

    match (loan, event) {
        (None, DomainEvent::LoanRequested(e)) => Ok(Loan::Pending(PendingLoan {
            loan_id: e.loan_id,
            book_id: e.book_id,
            member_id: e.member_id,
            requested_at: e.requested_at,
        })),

        (None, DomainEvent::BookIssued(e)) => Ok(Loan::Issued(IssuedLoan {
            core: LoanCore {
                loan_id: e.loan_id,
                book_id: e.book_id,
                member_id: e.member_id,
                issue_date: e.issued_at,
                due_date: e.due_date,
                renewal_count: 0,
                issued_by: e.issued_by,
                created_at: e.issued_at,
                updated_at: e.issued_at,
            },
        })),

        (Some(Loan::Pending(pending)), DomainEvent::BookIssued(e)) => {
            Ok(Loan::Issued(IssuedLoan {
                core: LoanCore {
                    loan_id: pending.loan_id,
                    book_id: pending.book_id,
                    member_id: pending.member_id,
                    issue_date: e.issued_at,
                    due_date: e.due_date,
                    renewal_count: 0,
                    issued_by: e.issued_by,
                    created_at: pending.requested_at,
                    updated_at: e.issued_at,
                },
            }))
        }

        (Some(Loan::Pending(pending)), DomainEvent::RequestCancelled(e)) => {
            Ok(Loan::Cancelled(CancelledLoan {
                request: pending,
                cancelled_at: e.cancelled_at,
            }))
        }

        (Some(Loan::Issued(IssuedLoan { core })), DomainEvent::LoanRenewed(e))
        | (Some(Loan::Overdue(OverdueLoan { core })), DomainEvent::LoanRenewed(e)) => {
            Ok(Loan::Issued(IssuedLoan {
                core: LoanCore {
                    due_date: e.new_due_date,
                    renewal_count: e.renewal_count,
                    updated_at: e.renewed_at,
                    ..core
                },
            }))
        }

        (Some(Loan::Issued(IssuedLoan { core })), DomainEvent::LoanBecameOverdue(e)) => {
            Ok(Loan::Overdue(OverdueLoan {
                core: LoanCore {
                    updated_at: e.detected_at,
                    ..core
                },
            }))
        }

        (Some(Loan::Issued(IssuedLoan { core })), DomainEvent::BookReturned(e))
        | (Some(Loan::Overdue(OverdueLoan { core })), DomainEvent::BookReturned(e)) => {
            Ok(Loan::Returned(ReturnedLoan {
                core: LoanCore {
                    updated_at: e.returned_at,
                    ..core
                },
                returned_at: e.returned_at,
                days_late: e.days_late,
                fine: FineState::unpaid(e.fine),
                inventory_settled: false,
            }))
        }

        (Some(Loan::Issued(IssuedLoan { core })), DomainEvent::BookReportedLost(e))
        | (Some(Loan::Overdue(OverdueLoan { core })), DomainEvent::BookReportedLost(e)) => {
            Ok(Loan::Lost(LostLoan {
                core: LoanCore {
                    updated_at: e.reported_at,
                    ..core
                },
                lost_at: e.reported_at,
                was_overdue: e.was_overdue,
                fine: FineState::unpaid(e.fine),
                inventory_settled: !e.writes_off_copy,
            }))
        }

        (Some(loan @ (Loan::Returned(_) | Loan::Lost(_))), DomainEvent::InventorySettled(e)) => {
            settle_inventory(&loan, e.settled_at)
                .map(|(settled, _)| settled)
                .ok_or_else(|| reject(Some(&loan), event))
        }

        (Some(loan @ (Loan::Returned(_) | Loan::Lost(_))), DomainEvent::FinePaid(e)) => {
            pay_fine(&loan, e.paid_at)
                .map(|(paid, _)| paid)
                .map_err(|_| reject(Some(&loan), event))
        }

        (loan, event) => Err(reject(loan.as_ref(), event)),
    }
}

/// イベント列から現在の状態を復元する純粋関数
///
/// # 戻り値
/// * イベントが空の場合は`Ok(None)`
/// * 不正な遷移を含む場合は最初の `TransitionError`
pub fn replay_events(events: &[DomainEvent]) -> Result<Option<Loan>, TransitionError> {
    events
        .iter()
        .try_fold(None, |loan, event| apply_event(loan, event).map(Some))
}
