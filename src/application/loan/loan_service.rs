use chrono::{DateTime, Utc};

use crate::domain::commands::*;
use crate::domain::loan::InventoryFollowUp;
use crate::domain::{
    self, ApproveRequestError, CancelRequestError, DomainEvent, Loan, LoanId, Member, MemberId,
    NotRenewableReason, RenewLoanError, ReportLostError, ReturnBookError,
};
use crate::ports::LoanView;

use super::super::catalog::{
    get_book, reinstate_copy, release_copy, reserve_copy, write_off_copy,
};
use super::super::member::{get_member, refresh_member_fine};
use super::super::{LendingError, Result, ServiceDependencies};

/// イベントストアから貸出集約を復元するヘルパー関数
///
/// 復元に使ったイベント数（次の追加の期待バージョン）も返す。
///
/// # エラー
/// - EventStoreError: イベント読み込み失敗
/// - LoanNotFound: イベントが存在しない
/// - CorruptHistory: イベント列が状態遷移表に反する
pub(super) async fn load_loan(
    deps: &ServiceDependencies,
    loan_id: LoanId,
) -> Result<(Loan, u64)> {
    let events = deps
        .event_store
        .load(loan_id)
        .await
        .map_err(LendingError::EventStoreError)?;
    let version = events.len() as u64;

    let loan = domain::loan::replay_events(&events)
        .map_err(LendingError::CorruptHistory)?
        .ok_or(LendingError::LoanNotFound(loan_id))?;
    Ok((loan, version))
}

/// 読み込んだバージョンを期待してイベントを保存し、Read Modelを集約の完全な状態で更新する
///
/// 読み込み後に別の書き込みがあれば `ConcurrentModification` で失敗し、何も保存しない。
async fn persist(
    deps: &ServiceDependencies,
    version: u64,
    loan: &Loan,
    event: DomainEvent,
) -> Result<LoanView> {
    deps.event_store
        .append(loan.loan_id(), version, vec![event])
        .await
        .map_err(LendingError::from_event_store)?;

    save_view(deps, loan, version + 1).await
}

async fn save_view(deps: &ServiceDependencies, loan: &Loan, version: u64) -> Result<LoanView> {
    let loan_view = LoanView::from_loan(loan, version);
    deps.loan_read_model
        .save(loan_view.clone())
        .await
        .map_err(LendingError::ReadModelError)?;
    Ok(loan_view)
}

/// 会員が借りられる状態かを確認する
///
/// - 会員が存在すること
/// - 無効化されていないこと
/// - 貸出中の冊数がポリシーの上限未満であること
async fn ensure_member_can_borrow(
    deps: &ServiceDependencies,
    member_id: MemberId,
) -> Result<Member> {
    let member = get_member(deps, member_id).await?;

    if !member.is_active() {
        return Err(LendingError::MemberDisabled);
    }

    let open_loans = deps
        .loan_read_model
        .count_open_loans_for_member(member_id)
        .await
        .map_err(LendingError::ReadModelError)?;

    if open_loans >= deps.policy.borrowing_limit as usize {
        return Err(LendingError::BorrowLimitExceeded {
            limit: deps.policy.borrowing_limit,
        });
    }

    Ok(member)
}

/// 確保済みの冊を保存に失敗した貸出から戻す
async fn compensate_reservation(deps: &ServiceDependencies, loan: &Loan) {
    if let Err(e) = release_copy(deps, loan.book_id()).await {
        tracing::warn!(
            loan_id = %loan.loan_id().value(),
            book_id = %loan.book_id().value(),
            error = %e,
            "Failed to release reserved copy after aborted issue"
        );
    }
}

/// 確保済みの冊に対して貸出開始イベントを保存する
///
/// イベント保存に失敗した場合は確保を取り消してからエラーを返す。
async fn persist_issue(
    deps: &ServiceDependencies,
    version: u64,
    loan: &Loan,
    event: DomainEvent,
) -> Result<LoanView> {
    if let Err(e) = deps
        .event_store
        .append(loan.loan_id(), version, vec![event])
        .await
    {
        compensate_reservation(deps, loan).await;
        return Err(LendingError::from_event_store(e));
    }
    save_view(deps, loan, version + 1).await
}

/// 記録に失敗した在庫処理を取り消す
async fn undo_follow_up(deps: &ServiceDependencies, loan: &Loan, follow_up: InventoryFollowUp) {
    let undone = match follow_up {
        InventoryFollowUp::ReleaseCopy => reserve_copy(deps, loan.book_id()).await,
        InventoryFollowUp::WriteOffCopy => reinstate_copy(deps, loan.book_id()).await,
    };
    if let Err(e) = undone {
        tracing::warn!(
            loan_id = %loan.loan_id().value(),
            book_id = %loan.book_id().value(),
            follow_up = ?follow_up,
            error = %e,
            "Failed to undo inventory update after aborted settlement"
        );
    }
}

/// 返却・紛失に伴うカタログの在庫処理を行い、完了をイベントとして記録する
///
/// 在庫処理が不要か記録済みなら何もしない。カタログ側の失敗では何も記録しないため、
/// 同じ操作を再実行すると続きから処理される。記録に失敗した場合はカタログ側を元に戻す。
async fn settle_inventory(
    deps: &ServiceDependencies,
    loan: Loan,
    version: u64,
    settled_at: DateTime<Utc>,
) -> Result<(Loan, u64)> {
    let Some(follow_up) = domain::loan::pending_inventory_follow_up(&loan) else {
        return Ok((loan, version));
    };
    let Some((settled, event)) = domain::loan::settle_inventory(&loan, settled_at) else {
        return Ok((loan, version));
    };

    match follow_up {
        InventoryFollowUp::ReleaseCopy => release_copy(deps, loan.book_id()).await?,
        InventoryFollowUp::WriteOffCopy => write_off_copy(deps, loan.book_id()).await?,
    }

    if let Err(e) = deps
        .event_store
        .append(loan.loan_id(), version, vec![DomainEvent::InventorySettled(event)])
        .await
    {
        undo_follow_up(deps, &loan, follow_up).await;
        return Err(LendingError::from_event_store(e));
    }

    Ok((settled, version + 1))
}

/// 書籍を貸し出す（純粋な関数）
///
/// ビジネスルール：
/// 1. 会員が無効化されていれば MemberDisabled
/// 2. 貸出中の冊数が上限以上なら BorrowLimitExceeded
/// 3. 在庫の確保に失敗すれば NotAvailable
/// 4. Issued の貸出を作成（期限 = 貸出日 + 貸出期間）
///
/// すべての依存が引数として明示的に渡される（関数型の原則）。
/// 同じ会員の貸出開始は上限の確認から保存まで1件ずつ行う。
pub async fn issue_book(deps: &ServiceDependencies, cmd: IssueBook) -> Result<LoanView> {
    let _guard = deps.borrow_locks.lock(cmd.member_id).await;
    ensure_member_can_borrow(deps, cmd.member_id).await?;
    reserve_copy(deps, cmd.book_id).await?;

    let (issued, event) = domain::loan::issue_loan(
        cmd.book_id,
        cmd.member_id,
        cmd.issued_at,
        cmd.staff_id,
        &deps.policy,
    );
    let loan = Loan::Issued(issued);

    let view = persist_issue(deps, 0, &loan, DomainEvent::BookIssued(event)).await?;

    tracing::info!(
        loan_id = %view.loan_id.value(),
        book_id = %cmd.book_id.value(),
        member_id = %cmd.member_id.value(),
        "Book issued"
    );
    Ok(view)
}

/// 貸出を申請する（在庫は確保しない）
pub async fn request_loan(deps: &ServiceDependencies, cmd: RequestLoan) -> Result<LoanView> {
    ensure_member_can_borrow(deps, cmd.member_id).await?;
    get_book(deps, cmd.book_id).await?;

    let (pending, event) =
        domain::loan::request_loan(cmd.book_id, cmd.member_id, cmd.requested_at);
    let loan = Loan::Pending(pending);

    let view = persist(deps, 0, &loan, DomainEvent::LoanRequested(event)).await?;

    tracing::info!(loan_id = %view.loan_id.value(), "Loan requested");
    Ok(view)
}

/// 申請を承認して貸出を開始する
///
/// 承認時点で `issue_book` と同じ確認と在庫確保を行う。
pub async fn approve_request(deps: &ServiceDependencies, cmd: ApproveRequest) -> Result<LoanView> {
    let (loan, version) = load_loan(deps, cmd.loan_id).await?;

    if !matches!(loan, Loan::Pending(_)) {
        return Err(LendingError::InvalidLoanState(format!(
            "Cannot approve {} loan",
            loan.state_name()
        )));
    }

    let _guard = deps.borrow_locks.lock(loan.member_id()).await;
    ensure_member_can_borrow(deps, loan.member_id()).await?;
    reserve_copy(deps, loan.book_id()).await?;

    let (issued, event) =
        domain::loan::approve_request(&loan, cmd.approved_at, cmd.staff_id, &deps.policy)
            .map_err(|ApproveRequestError::NotPending| {
                LendingError::InvalidLoanState("Loan is not pending".to_string())
            })?;
    let loan = Loan::Issued(issued);

    let view = persist_issue(deps, version, &loan, DomainEvent::BookIssued(event)).await?;

    tracing::info!(loan_id = %view.loan_id.value(), "Loan request approved");
    Ok(view)
}

/// 申請を取り消す
pub async fn cancel_request(deps: &ServiceDependencies, cmd: CancelRequest) -> Result<LoanView> {
    let (loan, version) = load_loan(deps, cmd.loan_id).await?;

    let (cancelled, event) = domain::loan::cancel_request(&loan, cmd.cancelled_at).map_err(
        |CancelRequestError::NotPending| {
            LendingError::InvalidLoanState(format!("Cannot cancel {} loan", loan.state_name()))
        },
    )?;

    let view = persist(
        deps,
        version,
        &Loan::Cancelled(cancelled),
        DomainEvent::RequestCancelled(event),
    )
    .await?;

    tracing::info!(loan_id = %view.loan_id.value(), "Loan request cancelled");
    Ok(view)
}

/// 書籍を返却する（純粋な関数）
///
/// ビジネスルール：
/// - 返却済み・紛失済みなら AlreadyReturned（2回目の呼び出しは何も変更しない）
/// - 期限超過なら延滞料を確定する
/// - 返却日を記録し、在庫に1冊戻す
///
/// 在庫の解放に失敗した返却は、もう一度呼び出すと解放から再開する。
pub async fn return_book(deps: &ServiceDependencies, cmd: ReturnBook) -> Result<LoanView> {
    let (loan, version) = load_loan(deps, cmd.loan_id).await?;

    let (loan, version) = match domain::loan::return_book(&loan, cmd.returned_at, &deps.policy) {
        Ok((returned, event)) => {
            let returned = Loan::Returned(returned);
            persist(deps, version, &returned, DomainEvent::BookReturned(event)).await?;
            (returned, version + 1)
        }
        Err(ReturnBookError::AlreadyReturned)
            if domain::loan::pending_inventory_follow_up(&loan)
                == Some(InventoryFollowUp::ReleaseCopy) =>
        {
            (loan, version)
        }
        Err(ReturnBookError::AlreadyReturned) => return Err(LendingError::AlreadyReturned),
        Err(ReturnBookError::NotIssued) => {
            return Err(LendingError::InvalidLoanState(format!(
                "Cannot return {} loan",
                loan.state_name()
            )));
        }
    };

    let (loan, version) = settle_inventory(deps, loan, version, cmd.returned_at).await?;
    let view = save_view(deps, &loan, version).await?;

    if !view.fine.is_zero() {
        refresh_member_fine(deps, view.member_id).await?;
    }

    tracing::info!(
        loan_id = %view.loan_id.value(),
        fine = %view.fine,
        "Book returned"
    );
    Ok(view)
}

/// 貸出を延長する
///
/// ビジネスルール：
/// - 返却済み・紛失済み・未開始は延長不可
/// - 他会員の申請（Pending）がある書籍は延長不可
/// - 新しい期限は延長日から起算
pub async fn renew_loan(deps: &ServiceDependencies, cmd: RenewLoan) -> Result<LoanView> {
    let (loan, version) = load_loan(deps, cmd.loan_id).await?;

    let (renewed, event) = domain::loan::renew_loan(&loan, cmd.renewed_at, &deps.policy)
        .map_err(|RenewLoanError::NotRenewable(reason)| {
            LendingError::NotRenewable(reason.as_str().to_string())
        })?;

    let requested_by_others = deps
        .loan_read_model
        .find_pending_for_book(loan.book_id())
        .await
        .map_err(LendingError::ReadModelError)?
        .iter()
        .any(|pending| pending.member_id != loan.member_id());

    if requested_by_others {
        return Err(LendingError::NotRenewable(
            NotRenewableReason::ReservedByAnotherMember.as_str().to_string(),
        ));
    }

    let view = persist(
        deps,
        version,
        &Loan::Issued(renewed),
        DomainEvent::LoanRenewed(event),
    )
    .await?;

    tracing::info!(
        loan_id = %view.loan_id.value(),
        renewal_count = view.renewal_count,
        "Loan renewed"
    );
    Ok(view)
}

/// 紛失を報告する
///
/// ビジネスルール：
/// - 返却済み・紛失済みなら AlreadyTerminal
/// - 罰金を紛失罰金で置き換え、未払いにする
/// - 在庫（available）は戻さない
/// - ポリシーが WriteOff なら蔵書数から1冊除却する
///
/// 除却に失敗した報告は、もう一度呼び出すと除却から再開する。
pub async fn report_lost(deps: &ServiceDependencies, cmd: ReportLost) -> Result<LoanView> {
    let (loan, version) = load_loan(deps, cmd.loan_id).await?;

    let (loan, version) = match domain::loan::report_lost(&loan, cmd.reported_at, &deps.policy) {
        Ok((lost, event)) => {
            let lost = Loan::Lost(lost);
            persist(deps, version, &lost, DomainEvent::BookReportedLost(event)).await?;
            (lost, version + 1)
        }
        Err(ReportLostError::AlreadyTerminal)
            if domain::loan::pending_inventory_follow_up(&loan)
                == Some(InventoryFollowUp::WriteOffCopy) =>
        {
            (loan, version)
        }
        Err(ReportLostError::AlreadyTerminal) => return Err(LendingError::AlreadyTerminal),
        Err(ReportLostError::NotIssued) => {
            return Err(LendingError::InvalidLoanState(format!(
                "Cannot report {} loan as lost",
                loan.state_name()
            )));
        }
    };

    let (loan, version) = settle_inventory(deps, loan, version, cmd.reported_at).await?;
    let view = save_view(deps, &loan, version).await?;

    refresh_member_fine(deps, view.member_id).await?;

    let message = format!(
        "A lost-book fine of {} has been charged to your account.",
        view.fine
    );
    if let Err(e) = deps
        .notification_service
        .notify(view.member_id, &message)
        .await
    {
        tracing::warn!(member_id = %view.member_id.value(), error = %e, "Notification failed");
    }

    tracing::info!(loan_id = %view.loan_id.value(), fine = %view.fine, "Book reported lost");
    Ok(view)
}

/// 貸出を取得する
pub async fn get_loan(deps: &ServiceDependencies, loan_id: LoanId) -> Result<LoanView> {
    deps.loan_read_model
        .get_by_id(loan_id)
        .await
        .map_err(LendingError::ReadModelError)?
        .ok_or(LendingError::LoanNotFound(loan_id))
}

/// 会員の全貸出を取得する
pub async fn list_member_loans(
    deps: &ServiceDependencies,
    member_id: MemberId,
) -> Result<Vec<LoanView>> {
    deps.loan_read_model
        .find_by_member_id(member_id)
        .await
        .map_err(LendingError::ReadModelError)
}
