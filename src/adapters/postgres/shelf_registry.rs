use crate::domain::shelf::ShelfLocation;
use crate::domain::value_objects::{BookId, ShelfId};
use crate::ports::shelf_registry::{Result, ShelfRegistry as ShelfRegistryTrait};
use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

/// 書架と所属書籍IDを1行に集約するクエリ
const SHELF_SELECT: &str = r#"
    SELECT
        s.id,
        s.shelf_no,
        COALESCE(
            array_agg(sb.book_id ORDER BY sb.position) FILTER (WHERE sb.book_id IS NOT NULL),
            '{}'::uuid[]
        ) AS book_ids
    FROM shelves s
    LEFT JOIN shelf_books sb ON sb.shelf_id = s.id
"#;

fn map_row_to_shelf(row: &PgRow) -> ShelfLocation {
    let book_ids: Vec<Uuid> = row.get("book_ids");
    ShelfLocation {
        id: ShelfId::from_uuid(row.get("id")),
        shelf_no: row.get("shelf_no"),
        book_ids: book_ids.into_iter().map(BookId::from_uuid).collect(),
    }
}

/// ShelfRegistryのPostgreSQL実装
///
/// shelves と shelf_books の2表で多対多の対応を保持する。
pub struct ShelfRegistry {
    pool: PgPool,
}

impl ShelfRegistry {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_shelf(&self, shelf_no: &str) -> Result<Option<ShelfLocation>> {
        let row = sqlx::query(&format!(
            "{} WHERE s.shelf_no = $1 GROUP BY s.id, s.shelf_no",
            SHELF_SELECT
        ))
        .bind(shelf_no)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(map_row_to_shelf))
    }
}

#[async_trait]
impl ShelfRegistryTrait for ShelfRegistry {
    /// 書架がなければ作成し、書籍を追加する（既にあれば何もしない）
    async fn add_book(&self, shelf_no: &str, book_id: BookId) -> Result<ShelfLocation> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO shelves (id, shelf_no)
            VALUES ($1, $2)
            ON CONFLICT (shelf_no) DO NOTHING
            "#,
        )
        .bind(ShelfId::new().value())
        .bind(shelf_no)
        .execute(&mut *tx)
        .await?;

        let shelf_id: Uuid = sqlx::query_scalar("SELECT id FROM shelves WHERE shelf_no = $1")
            .bind(shelf_no)
            .fetch_one(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO shelf_books (shelf_id, book_id)
            VALUES ($1, $2)
            ON CONFLICT (shelf_id, book_id) DO NOTHING
            "#,
        )
        .bind(shelf_id)
        .bind(book_id.value())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        self.fetch_shelf(shelf_no)
            .await?
            .ok_or_else(|| format!("shelf {} vanished after insert", shelf_no).into())
    }

    async fn remove_book(&self, shelf_no: &str, book_id: BookId) -> Result<Option<ShelfLocation>> {
        sqlx::query(
            r#"
            DELETE FROM shelf_books
            USING shelves
            WHERE shelf_books.shelf_id = shelves.id
              AND shelves.shelf_no = $1
              AND shelf_books.book_id = $2
            "#,
        )
        .bind(shelf_no)
        .bind(book_id.value())
        .execute(&self.pool)
        .await?;

        self.fetch_shelf(shelf_no).await
    }

    async fn get_by_shelf_no(&self, shelf_no: &str) -> Result<Option<ShelfLocation>> {
        self.fetch_shelf(shelf_no).await
    }

    async fn list_all(&self) -> Result<Vec<ShelfLocation>> {
        let rows = sqlx::query(&format!(
            "{} GROUP BY s.id, s.shelf_no ORDER BY s.shelf_no ASC",
            SHELF_SELECT
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(map_row_to_shelf).collect())
    }
}
