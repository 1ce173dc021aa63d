use futures::TryStreamExt;
use std::collections::HashMap;

use crate::domain::{self, DomainEvent, LoanId};
use crate::ports::LoanView;

use super::super::{LendingError, Result, ServiceDependencies};

/// イベントログ全体から Read Model を再構築する
///
/// イベントが真実の情報源であり、Read Model はそこから導出される。
/// Read Model の更新が保存後に失敗した場合の修復に使う。
///
/// # 戻り値
/// 再投影した貸出の件数
pub async fn rebuild_loan_views(deps: &ServiceDependencies) -> Result<usize> {
    let events: Vec<DomainEvent> = deps
        .event_store
        .stream_all()
        .try_collect()
        .await
        .map_err(LendingError::EventStoreError)?;

    // 集約ごとに挿入順を保ったまま分ける
    let mut order: Vec<LoanId> = Vec::new();
    let mut by_loan: HashMap<LoanId, Vec<DomainEvent>> = HashMap::new();
    for event in events {
        let loan_id = event.loan_id();
        by_loan
            .entry(loan_id)
            .or_insert_with(|| {
                order.push(loan_id);
                Vec::new()
            })
            .push(event);
    }

    let mut views = Vec::with_capacity(order.len());
    for loan_id in order {
        let loan_events = by_loan.remove(&loan_id).unwrap_or_default();
        let version = loan_events.len() as u64;
        if let Some(loan) =
            domain::loan::replay_events(&loan_events).map_err(LendingError::CorruptHistory)?
        {
            views.push(LoanView::from_loan(&loan, version));
        }
    }

    let count = views.len();
    deps.loan_read_model
        .save_all(views)
        .await
        .map_err(LendingError::ReadModelError)?;

    tracing::info!(count, "Loan read model rebuilt");
    Ok(count)
}
