use crate::domain::book::{self, Book, BookMatchKey};
use crate::domain::value_objects::BookId;
use crate::ports::book_catalog::{BookCatalog as BookCatalogTrait, CopyUpdate, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use super::{BoxError, lock};

/// BookCatalogのインメモリ実装
///
/// 冊数の確認と更新を同じロックの中で行い、条件付きUPDATEと同じ保証を与える。
/// テスト用に、書架ラベル更新・在庫の解放・除却を個別に失敗させることができる。
pub struct BookCatalog {
    books: Mutex<HashMap<BookId, Book>>,
    fail_shelf_updates: AtomicBool,
    fail_releases: AtomicBool,
    fail_write_offs: AtomicBool,
}

impl BookCatalog {
    pub fn new() -> Self {
        Self {
            books: Mutex::new(HashMap::new()),
            fail_shelf_updates: AtomicBool::new(false),
            fail_releases: AtomicBool::new(false),
            fail_write_offs: AtomicBool::new(false),
        }
    }

    /// 以降の書架ラベル更新をストレージエラーで失敗させる
    pub fn fail_shelf_updates(&self, fail: bool) {
        self.fail_shelf_updates.store(fail, Ordering::SeqCst);
    }

    /// 以降の在庫の解放をストレージエラーで失敗させる
    pub fn fail_releases(&self, fail: bool) {
        self.fail_releases.store(fail, Ordering::SeqCst);
    }

    /// 以降の除却をストレージエラーで失敗させる
    pub fn fail_write_offs(&self, fail: bool) {
        self.fail_write_offs.store(fail, Ordering::SeqCst);
    }

    fn check(switch: &AtomicBool) -> Result<()> {
        if switch.load(Ordering::SeqCst) {
            return Err(BoxError::from("book catalog unavailable"));
        }
        Ok(())
    }

    fn update_copies(
        &self,
        book_id: BookId,
        change: impl FnOnce(&Book) -> Option<Book>,
    ) -> Result<CopyUpdate> {
        let mut books = lock(&self.books)?;
        let Some(current) = books.get(&book_id) else {
            return Ok(CopyUpdate::NotFound);
        };
        match change(current) {
            Some(updated) => {
                books.insert(book_id, updated);
                Ok(CopyUpdate::Applied)
            }
            None => Ok(CopyUpdate::Rejected),
        }
    }
}

impl Default for BookCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BookCatalogTrait for BookCatalog {
    async fn insert(&self, book: Book) -> Result<()> {
        lock(&self.books)?.insert(book.id, book);
        Ok(())
    }

    async fn get_by_id(&self, book_id: BookId) -> Result<Option<Book>> {
        Ok(lock(&self.books)?.get(&book_id).cloned())
    }

    async fn find_by_match_key(&self, key: &BookMatchKey) -> Result<Option<Book>> {
        Ok(lock(&self.books)?
            .values()
            .find(|b| b.match_key() == *key)
            .cloned())
    }

    async fn list_all(&self) -> Result<Vec<Book>> {
        let mut books: Vec<Book> = lock(&self.books)?.values().cloned().collect();
        books.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(books)
    }

    async fn add_copies(&self, book_id: BookId, copies: u32) -> Result<Option<Book>> {
        let mut books = lock(&self.books)?;
        let Some(current) = books.get(&book_id) else {
            return Ok(None);
        };
        let merged = book::merge_copies(current, copies);
        books.insert(book_id, merged.clone());
        Ok(Some(merged))
    }

    async fn try_reserve_copy(&self, book_id: BookId) -> Result<CopyUpdate> {
        self.update_copies(book_id, |b| book::reserve_copy(b).ok())
    }

    async fn release_copy(&self, book_id: BookId) -> Result<CopyUpdate> {
        Self::check(&self.fail_releases)?;
        self.update_copies(book_id, |b| book::release_copy(b).ok())
    }

    async fn write_off_copy(&self, book_id: BookId) -> Result<CopyUpdate> {
        Self::check(&self.fail_write_offs)?;
        self.update_copies(book_id, |b| book::write_off_copy(b).ok())
    }

    async fn reinstate_copy(&self, book_id: BookId) -> Result<CopyUpdate> {
        self.update_copies(book_id, |b| Some(book::reinstate_copy(b)))
    }

    async fn set_shelf_location(
        &self,
        book_id: BookId,
        shelf_no: Option<String>,
    ) -> Result<bool> {
        Self::check(&self.fail_shelf_updates)?;
        let mut books = lock(&self.books)?;
        match books.get_mut(&book_id) {
            Some(book) => {
                book.shelf_location = shelf_no;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::book::{BookCandidate, Genre, new_book};

    fn one_copy_book() -> Book {
        new_book(BookCandidate {
            title: "Dune".to_string(),
            authors: vec!["Frank Herbert".to_string()],
            genre: Genre::Fiction,
            isbn: "9780441013593".to_string(),
            publication_year: 1965,
            total_copies: 1,
        })
    }

    #[tokio::test]
    async fn test_reserve_rejected_when_no_copy_left() {
        let catalog = BookCatalog::new();
        let book = one_copy_book();
        let id = book.id;
        catalog.insert(book).await.unwrap();

        assert_eq!(catalog.try_reserve_copy(id).await.unwrap(), CopyUpdate::Applied);
        assert_eq!(catalog.try_reserve_copy(id).await.unwrap(), CopyUpdate::Rejected);

        let stored = catalog.get_by_id(id).await.unwrap().unwrap();
        assert_eq!(stored.available_copies, 0);
        assert_eq!(stored.total_copies, 1);
    }

    #[tokio::test]
    async fn test_release_beyond_total_is_rejected() {
        let catalog = BookCatalog::new();
        let book = one_copy_book();
        let id = book.id;
        catalog.insert(book).await.unwrap();

        assert_eq!(catalog.release_copy(id).await.unwrap(), CopyUpdate::Rejected);
        assert_eq!(
            catalog.release_copy(BookId::new()).await.unwrap(),
            CopyUpdate::NotFound
        );
    }

    #[tokio::test]
    async fn test_failing_release_leaves_counts_untouched() {
        let catalog = BookCatalog::new();
        let book = one_copy_book();
        let id = book.id;
        catalog.insert(book).await.unwrap();
        catalog.try_reserve_copy(id).await.unwrap();

        catalog.fail_releases(true);
        assert!(catalog.release_copy(id).await.is_err());
        assert_eq!(catalog.get_by_id(id).await.unwrap().unwrap().available_copies, 0);

        catalog.fail_releases(false);
        assert_eq!(catalog.release_copy(id).await.unwrap(), CopyUpdate::Applied);
    }
}
