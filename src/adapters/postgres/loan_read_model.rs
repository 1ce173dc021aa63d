use crate::domain::value_objects::{BookId, LoanId, MemberId};
use crate::ports::loan_read_model::{
    LoanReadModel as LoanReadModelTrait, LoanStatus, LoanView, Result,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Row, postgres::PgRow};
use std::str::FromStr;

use super::{
    count_from_db, count_to_db, invalid_data, money_from_db, money_to_db, version_from_db,
    version_to_db,
};

const LOAN_VIEW_COLUMNS: &str = r#"
    loan_id,
    book_id,
    member_id,
    issue_date,
    due_date,
    return_date,
    fine,
    status,
    is_lost,
    is_paid,
    renewal_count,
    created_at,
    updated_at,
    version
"#;

/// PostgreSQLの行データをLoanViewに変換する
///
/// 金額・回数の符号付き整数からの変換とLoanStatusの文字列からの変換で
/// エラーハンドリングを行う。
fn map_row_to_loan_view(row: &PgRow) -> Result<LoanView> {
    let status_str: &str = row.get("status");
    let status = LoanStatus::from_str(status_str).map_err(invalid_data)?;

    Ok(LoanView {
        loan_id: LoanId::from_uuid(row.get("loan_id")),
        book_id: BookId::from_uuid(row.get("book_id")),
        member_id: MemberId::from_uuid(row.get("member_id")),
        issue_date: row.get("issue_date"),
        due_date: row.get("due_date"),
        return_date: row.get("return_date"),
        fine: money_from_db("fine", row.get("fine"))?,
        status,
        is_lost: row.get("is_lost"),
        is_paid: row.get("is_paid"),
        renewal_count: count_from_db("renewal_count", row.get("renewal_count"))?,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        version: version_from_db(row.get("version"))?,
    })
}

/// LoanReadModelのPostgreSQL実装
///
/// CQRSパターンの読み取り側として、クエリに最適化された
/// 非正規化ビューを提供する。
pub struct LoanReadModel {
    pool: PgPool,
}

impl LoanReadModel {
    /// PostgreSQLコネクションプールから新しいLoanReadModelを作成
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn upsert<'e, E>(executor: E, loan_view: &LoanView) -> Result<()>
    where
        E: sqlx::Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            r#"
            INSERT INTO loans_view (
                loan_id,
                book_id,
                member_id,
                issue_date,
                due_date,
                return_date,
                fine,
                status,
                is_lost,
                is_paid,
                renewal_count,
                created_at,
                updated_at,
                version
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            ON CONFLICT (loan_id)
            DO UPDATE SET
                book_id = EXCLUDED.book_id,
                member_id = EXCLUDED.member_id,
                issue_date = EXCLUDED.issue_date,
                due_date = EXCLUDED.due_date,
                return_date = EXCLUDED.return_date,
                fine = EXCLUDED.fine,
                status = EXCLUDED.status,
                is_lost = EXCLUDED.is_lost,
                is_paid = EXCLUDED.is_paid,
                renewal_count = EXCLUDED.renewal_count,
                updated_at = EXCLUDED.updated_at,
                version = EXCLUDED.version
            WHERE loans_view.version <= EXCLUDED.version
            "#,
        )
        .bind(loan_view.loan_id.value())
        .bind(loan_view.book_id.value())
        .bind(loan_view.member_id.value())
        .bind(loan_view.issue_date)
        .bind(loan_view.due_date)
        .bind(loan_view.return_date)
        .bind(money_to_db(loan_view.fine)?)
        .bind(loan_view.status.as_str())
        .bind(loan_view.is_lost)
        .bind(loan_view.is_paid)
        .bind(count_to_db("renewal_count", loan_view.renewal_count)?)
        .bind(loan_view.created_at)
        .bind(loan_view.updated_at)
        .bind(version_to_db(loan_view.version)?)
        .execute(executor)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl LoanReadModelTrait for LoanReadModel {
    /// 貸出ビューをRead Modelに保存（upsert）
    ///
    /// INSERT ... ON CONFLICT UPDATEを使用して冪等性を保証する。
    /// 保存済みの方がバージョンが新しければ更新しない。
    async fn save(&self, loan_view: LoanView) -> Result<()> {
        Self::upsert(&self.pool, &loan_view).await
    }

    async fn save_all(&self, loan_views: Vec<LoanView>) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for loan_view in &loan_views {
            Self::upsert(&mut *tx, loan_view).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// IDで貸出を取得
    async fn get_by_id(&self, loan_id: LoanId) -> Result<Option<LoanView>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM loans_view WHERE loan_id = $1",
            LOAN_VIEW_COLUMNS
        ))
        .bind(loan_id.value())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_row_to_loan_view).transpose()
    }

    /// 会員の全貸出を検索（貸出履歴）
    async fn find_by_member_id(&self, member_id: MemberId) -> Result<Vec<LoanView>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM loans_view WHERE member_id = $1 ORDER BY created_at ASC",
            LOAN_VIEW_COLUMNS
        ))
        .bind(member_id.value())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_row_to_loan_view).collect()
    }

    /// (member_id, status)のインデックスを使用する
    async fn count_open_loans_for_member(&self, member_id: MemberId) -> Result<usize> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM loans_view
            WHERE member_id = $1
              AND status IN ('issued', 'overdue')
              AND is_lost = FALSE
            "#,
        )
        .bind(member_id.value())
        .fetch_one(&self.pool)
        .await?;

        usize::try_from(count).map_err(|_| invalid_data(format!("count out of range: {}", count)))
    }

    async fn find_unpaid_for_member(&self, member_id: MemberId) -> Result<Vec<LoanView>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM loans_view \
             WHERE member_id = $1 AND fine > 0 AND is_paid = FALSE \
             ORDER BY created_at ASC",
            LOAN_VIEW_COLUMNS
        ))
        .bind(member_id.value())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_row_to_loan_view).collect()
    }

    /// 延滞候補を検索（バッチ延滞検知用）
    ///
    /// (status, due_date)の部分インデックスを使用する。
    async fn find_overdue_candidates(&self, cutoff_date: DateTime<Utc>) -> Result<Vec<LoanView>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM loans_view \
             WHERE status = 'issued' AND is_lost = FALSE AND due_date < $1 \
             ORDER BY due_date ASC",
            LOAN_VIEW_COLUMNS
        ))
        .bind(cutoff_date)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_row_to_loan_view).collect()
    }

    async fn find_pending_for_book(&self, book_id: BookId) -> Result<Vec<LoanView>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM loans_view WHERE book_id = $1 AND status = 'pending' \
             ORDER BY created_at ASC",
            LOAN_VIEW_COLUMNS
        ))
        .bind(book_id.value())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_row_to_loan_view).collect()
    }
}
