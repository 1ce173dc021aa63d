use chrono::{DateTime, Utc};

use crate::domain::{self, DomainEvent};
use crate::ports::LoanView;

use super::super::{LendingError, Result, ServiceDependencies};
use super::loan_service::load_loan;

/// 延滞検出バッチ（純粋な関数）
///
/// ステータスは読み取り時に遅延評価されるため（`LoanView::current_status`）、
/// このバッチは延滞の事実をイベントとして記録し、会員に通知するためのもの。
/// 罰金の計算には影響しない。
///
/// ビジネスルール：
/// - 返却期限（due_date）を過ぎた Issued 状態の貸出を延滞とする
/// - 既に Overdue 状態の貸出は処理しない（重複イベント防止）
/// - 返却済み・紛失済みの貸出は処理しない
/// - 通知の失敗はログに残し、バッチは継続する
/// - 読み込み後に返却などで更新された貸出は記録せずに飛ばす
///
/// # 戻り値
/// 延滞として記録した貸出の件数
pub async fn detect_overdue_loans(deps: &ServiceDependencies, now: DateTime<Utc>) -> Result<usize> {
    let mut detected_count = 0;

    // 1. Read Modelから延滞候補を取得
    let candidates = deps
        .loan_read_model
        .find_overdue_candidates(now)
        .await
        .map_err(LendingError::ReadModelError)?;

    for candidate in candidates {
        // 2. イベントから現在の状態を復元し、Issued かつ期限超過の場合のみ処理
        let (loan, version) = load_loan(deps, candidate.loan_id).await?;
        let Some((overdue, event)) = domain::loan::mark_overdue(&loan, now) else {
            continue;
        };
        let overdue = domain::Loan::Overdue(overdue);

        let appended = deps
            .event_store
            .append(
                overdue.loan_id(),
                version,
                vec![DomainEvent::LoanBecameOverdue(event.clone())],
            )
            .await
            .map_err(LendingError::from_event_store);
        match appended {
            Ok(()) => {}
            Err(LendingError::ConcurrentModification { loan_id }) => {
                tracing::debug!(
                    loan_id = %loan_id.value(),
                    "Loan changed during overdue detection; skipped"
                );
                continue;
            }
            Err(e) => return Err(e),
        }

        deps.loan_read_model
            .save(LoanView::from_loan(&overdue, version + 1))
            .await
            .map_err(LendingError::ReadModelError)?;

        detected_count += 1;

        // 3. 会員への通知（ベストエフォート）
        let title = match deps.book_catalog.get_by_id(event.book_id).await {
            Ok(Some(book)) => book.title,
            _ => "a borrowed book".to_string(),
        };
        let message = format!(
            "\"{}\" was due on {}. Please return it as soon as possible.",
            title,
            event.due_date.format("%Y-%m-%d")
        );
        if let Err(e) = deps.notification_service.notify(event.member_id, &message).await {
            tracing::warn!(
                member_id = %event.member_id.value(),
                loan_id = %event.loan_id.value(),
                error = %e,
                "Overdue notification failed"
            );
        }
    }

    tracing::info!(detected_count, "Overdue detection finished");
    Ok(detected_count)
}
