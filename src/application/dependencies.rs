use crate::domain::Policy;
use crate::ports::*;
use std::sync::Arc;

use super::member::BorrowLocks;

/// サービスの依存関係
///
/// 関数型DDDの原則に従い、データ構造として定義。
/// 振る舞い（メソッド）は持たず、純粋な関数に依存関係を渡す。
/// グローバルなシングルトンは使わず、すべてのポートをここから注入する。
#[derive(Clone)]
pub struct ServiceDependencies {
    pub event_store: Arc<dyn EventStore>,
    pub loan_read_model: Arc<dyn LoanReadModel>,
    pub book_catalog: Arc<dyn BookCatalog>,
    pub member_registry: Arc<dyn MemberRegistry>,
    pub shelf_registry: Arc<dyn ShelfRegistry>,
    pub notification_service: Arc<dyn NotificationService>,
    pub policy: Policy,
    /// 会員ごとの貸出開始の直列化（プロセス内）
    pub borrow_locks: Arc<BorrowLocks>,
}
