use crate::domain::loan::Loan;
use crate::domain::value_objects::{BookId, LoanId, MemberId, Money};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub use crate::domain::loan::LoanStatus;

pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// 貸出ビュー（Read Model）
///
/// クエリに最適化された非正規化ビュー（CQRSパターン）。
/// 外部に公開する貸出記録のフィールドをそのまま持つ。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoanView {
    pub loan_id: LoanId,
    pub book_id: BookId,
    pub member_id: MemberId,
    /// Pending の間は未設定
    pub issue_date: Option<DateTime<Utc>>,
    pub due_date: Option<DateTime<Utc>>,
    pub return_date: Option<DateTime<Utc>>,
    pub fine: Money,
    pub status: LoanStatus,
    pub is_lost: bool,
    pub is_paid: bool,
    pub renewal_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// ビューの元になったイベント数（古い状態での上書きを防ぐ）
    pub version: u64,
}

impl LoanView {
    /// 貸出集約からビューを構築する
    ///
    /// `version` は集約を復元したイベント数。
    pub fn from_loan(loan: &Loan, version: u64) -> Self {
        let (issue_date, due_date, renewal_count, created_at) = match (loan, loan.core()) {
            (_, Some(core)) => (
                Some(core.issue_date),
                Some(core.due_date),
                core.renewal_count,
                core.created_at,
            ),
            (Loan::Cancelled(cancelled), None) => {
                (None, None, 0, cancelled.request.requested_at)
            }
            (_, None) => (None, None, 0, loan.updated_at()),
        };

        let return_date = match loan {
            Loan::Returned(returned) => Some(returned.returned_at),
            _ => None,
        };

        Self {
            loan_id: loan.loan_id(),
            book_id: loan.book_id(),
            member_id: loan.member_id(),
            issue_date,
            due_date,
            return_date,
            fine: loan.fine(),
            status: loan.status(),
            is_lost: loan.is_lost(),
            is_paid: loan.is_paid(),
            renewal_count,
            created_at,
            updated_at: loan.updated_at(),
            version,
        }
    }

    /// 返却も紛失もされていない貸出
    pub fn is_open(&self) -> bool {
        !self.is_lost && matches!(self.status, LoanStatus::Issued | LoanStatus::Overdue)
    }

    /// 読み取り時点のステータス（期限超過の Issued は Overdue として扱う）
    pub fn current_status(&self, now: DateTime<Utc>) -> LoanStatus {
        match (self.status, self.due_date) {
            (LoanStatus::Issued, Some(due)) if !self.is_lost && now > due => LoanStatus::Overdue,
            (status, _) => status,
        }
    }

    /// 未払いの確定罰金
    pub fn outstanding_fine(&self) -> Money {
        if self.is_paid { Money::ZERO } else { self.fine }
    }
}

/// 貸出Read Modelポート
#[async_trait]
pub trait LoanReadModel: Send + Sync {
    /// 貸出の現在状態を保存する（upsert）
    ///
    /// Read Modelは常にイベントから復元した集約の完全な状態を反映し、
    /// 部分更新は行わない。保存済みより小さい `version` のビューは無視する。
    async fn save(&self, loan_view: LoanView) -> Result<()>;

    /// 複数のビューを1トランザクションで保存する
    async fn save_all(&self, loan_views: Vec<LoanView>) -> Result<()>;

    /// IDで貸出を取得する
    async fn get_by_id(&self, loan_id: LoanId) -> Result<Option<LoanView>>;

    /// 会員の全貸出を検索する（貸出履歴）
    async fn find_by_member_id(&self, member_id: MemberId) -> Result<Vec<LoanView>>;

    /// 会員の貸出中（Issued / Overdue、紛失を除く）の件数
    ///
    /// 貸出上限の確認に使用される。
    async fn count_open_loans_for_member(&self, member_id: MemberId) -> Result<usize>;

    /// 会員の未払い罰金（fine > 0 かつ is_paid = false）のある貸出
    async fn find_unpaid_for_member(&self, member_id: MemberId) -> Result<Vec<LoanView>>;

    /// 延滞候補の貸出を検索する
    ///
    /// due_date < cutoff_date かつ status が "issued"（紛失を除く）の貸出を返す。
    async fn find_overdue_candidates(&self, cutoff_date: DateTime<Utc>) -> Result<Vec<LoanView>>;

    /// 書籍に対する申請中（Pending）の貸出
    async fn find_pending_for_book(&self, book_id: BookId) -> Result<Vec<LoanView>>;
}
