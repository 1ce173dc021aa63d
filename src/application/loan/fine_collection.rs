use crate::domain::commands::CollectFines;
use crate::domain::{self, DomainEvent, Money, PayFineError};
use crate::ports::{LoanView, StreamAppend};

use super::super::member::{get_member, refresh_member_fine};
use super::super::{LendingError, Result, ServiceDependencies};
use super::loan_service::load_loan;

/// 罰金徴収の結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FineCollection {
    pub loans_paid: usize,
    pub amount: Money,
}

/// 会員の未払い罰金をすべて徴収する
///
/// ビジネスルール：
/// - 確定済み（返却・紛失）で未払いの罰金をすべて支払い済みにする
/// - 会員の罰金合計を0にする
/// - 未払いがなければ何もせず成功（2回目の呼び出しで二重計上しない）
///
/// # 一貫性保証
///
/// 支払イベントは `append_batch` で1トランザクションとして保存する
/// （全件支払い済み、または全件未処理）。その後 Read Model と会員の罰金キャッシュを
/// 貸出から再計算して更新するため、途中で失敗しても再実行すれば収束する。
/// 読み込み後にどれかの貸出が更新されていれば `ConcurrentModification` で全体が失敗し、
/// 何も支払い済みにならない。
pub async fn collect_all_fines(
    deps: &ServiceDependencies,
    cmd: CollectFines,
) -> Result<FineCollection> {
    get_member(deps, cmd.member_id).await?;

    let unpaid = deps
        .loan_read_model
        .find_unpaid_for_member(cmd.member_id)
        .await
        .map_err(LendingError::ReadModelError)?;

    let mut batches = Vec::with_capacity(unpaid.len());
    let mut views = Vec::with_capacity(unpaid.len());
    let mut amount = Money::ZERO;

    for unpaid_view in unpaid {
        let (loan, version) = load_loan(deps, unpaid_view.loan_id).await?;

        match domain::loan::pay_fine(&loan, cmd.collected_at) {
            Ok((paid, event)) => {
                amount = amount + event.amount;
                batches.push(StreamAppend {
                    aggregate_id: paid.loan_id(),
                    expected_version: version,
                    events: vec![DomainEvent::FinePaid(event)],
                });
                views.push(LoanView::from_loan(&paid, version + 1));
            }
            // 前回の実行でイベントは保存済みだが Read Model が古い
            Err(PayFineError::NothingDue) => views.push(LoanView::from_loan(&loan, version)),
            Err(PayFineError::FineNotFinalized) => {
                return Err(LendingError::InconsistentState(format!(
                    "loan {} is listed as unpaid but its fine is not finalized",
                    loan.loan_id().value()
                )));
            }
        }
    }

    let loans_paid = batches.len();

    if !batches.is_empty() {
        deps.event_store
            .append_batch(batches)
            .await
            .map_err(LendingError::from_event_store)?;
    }
    if !views.is_empty() {
        deps.loan_read_model
            .save_all(views)
            .await
            .map_err(LendingError::ReadModelError)?;
    }

    refresh_member_fine(deps, cmd.member_id).await?;

    tracing::info!(
        member_id = %cmd.member_id.value(),
        loans_paid,
        amount = %amount,
        "Fines collected"
    );
    Ok(FineCollection { loans_paid, amount })
}
