use crate::domain::book::{Book, BookMatchKey, Genre};
use crate::domain::value_objects::BookId;
use crate::ports::book_catalog::{BookCatalog as BookCatalogTrait, CopyUpdate, Result};
use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow};
use std::str::FromStr;

use super::{count_from_db, count_to_db, invalid_data};

const BOOK_COLUMNS: &str = r#"
    id,
    title,
    authors,
    genre,
    isbn,
    publication_year,
    total_copies,
    available_copies,
    shelf_location
"#;

fn map_row_to_book(row: &PgRow) -> Result<Book> {
    let genre_str: &str = row.get("genre");
    let genre = Genre::from_str(genre_str).map_err(invalid_data)?;

    Ok(Book {
        id: BookId::from_uuid(row.get("id")),
        title: row.get("title"),
        authors: row.get("authors"),
        genre,
        isbn: row.get("isbn"),
        publication_year: row.get("publication_year"),
        total_copies: count_from_db("total_copies", row.get("total_copies"))?,
        available_copies: count_from_db("available_copies", row.get("available_copies"))?,
        shelf_location: row.get("shelf_location"),
    })
}

/// BookCatalogのPostgreSQL実装
///
/// 冊数の増減は条件付きUPDATEで行い、影響行数で成否を判定する。
/// 同じ書籍への同時確保でも available_copies が負になることはない。
pub struct BookCatalog {
    pool: PgPool,
}

impl BookCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 条件付きUPDATEを実行し、0行なら書籍の存在有無で結果を分ける
    async fn conditional_update(&self, sql: &str, book_id: BookId) -> Result<CopyUpdate> {
        let result = sqlx::query(sql)
            .bind(book_id.value())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() > 0 {
            return Ok(CopyUpdate::Applied);
        }

        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM books WHERE id = $1)")
            .bind(book_id.value())
            .fetch_one(&self.pool)
            .await?;

        Ok(if exists {
            CopyUpdate::Rejected
        } else {
            CopyUpdate::NotFound
        })
    }
}

#[async_trait]
impl BookCatalogTrait for BookCatalog {
    async fn insert(&self, book: Book) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO books (
                id,
                title,
                authors,
                genre,
                isbn,
                publication_year,
                total_copies,
                available_copies,
                shelf_location
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(book.id.value())
        .bind(&book.title)
        .bind(&book.authors)
        .bind(book.genre.as_str())
        .bind(&book.isbn)
        .bind(book.publication_year)
        .bind(count_to_db("total_copies", book.total_copies)?)
        .bind(count_to_db("available_copies", book.available_copies)?)
        .bind(&book.shelf_location)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_by_id(&self, book_id: BookId) -> Result<Option<Book>> {
        let row = sqlx::query(&format!("SELECT {} FROM books WHERE id = $1", BOOK_COLUMNS))
            .bind(book_id.value())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(map_row_to_book).transpose()
    }

    async fn find_by_match_key(&self, key: &BookMatchKey) -> Result<Option<Book>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM books \
             WHERE title = $1 AND authors = $2 AND genre = $3 AND isbn = $4 AND publication_year = $5 \
             LIMIT 1",
            BOOK_COLUMNS
        ))
        .bind(&key.title)
        .bind(&key.authors)
        .bind(key.genre.as_str())
        .bind(&key.isbn)
        .bind(key.publication_year)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_row_to_book).transpose()
    }

    async fn list_all(&self) -> Result<Vec<Book>> {
        let rows = sqlx::query(&format!("SELECT {} FROM books ORDER BY title ASC", BOOK_COLUMNS))
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(map_row_to_book).collect()
    }

    async fn add_copies(&self, book_id: BookId, copies: u32) -> Result<Option<Book>> {
        let row = sqlx::query(&format!(
            "UPDATE books \
             SET total_copies = total_copies + $2, available_copies = available_copies + $2 \
             WHERE id = $1 \
             RETURNING {}",
            BOOK_COLUMNS
        ))
        .bind(book_id.value())
        .bind(count_to_db("copies", copies)?)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_row_to_book).transpose()
    }

    async fn try_reserve_copy(&self, book_id: BookId) -> Result<CopyUpdate> {
        self.conditional_update(
            "UPDATE books SET available_copies = available_copies - 1 \
             WHERE id = $1 AND available_copies > 0",
            book_id,
        )
        .await
    }

    async fn release_copy(&self, book_id: BookId) -> Result<CopyUpdate> {
        self.conditional_update(
            "UPDATE books SET available_copies = available_copies + 1 \
             WHERE id = $1 AND available_copies < total_copies",
            book_id,
        )
        .await
    }

    async fn write_off_copy(&self, book_id: BookId) -> Result<CopyUpdate> {
        self.conditional_update(
            "UPDATE books SET total_copies = total_copies - 1 \
             WHERE id = $1 AND total_copies > available_copies",
            book_id,
        )
        .await
    }

    async fn reinstate_copy(&self, book_id: BookId) -> Result<CopyUpdate> {
        self.conditional_update(
            "UPDATE books SET total_copies = total_copies + 1 WHERE id = $1",
            book_id,
        )
        .await
    }

    async fn set_shelf_location(
        &self,
        book_id: BookId,
        shelf_no: Option<String>,
    ) -> Result<bool> {
        let result = sqlx::query("UPDATE books SET shelf_location = $2 WHERE id = $1")
            .bind(book_id.value())
            .bind(shelf_no)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
