use crate::domain::shelf::{self, ShelfLocation};
use crate::domain::value_objects::BookId;
use crate::ports::shelf_registry::{Result, ShelfRegistry as ShelfRegistryTrait};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Mutex;

use super::lock;

/// ShelfRegistryのインメモリ実装
///
/// 書架はラベルをキーに持ち、ラベル順に一覧する。
pub struct ShelfRegistry {
    shelves: Mutex<BTreeMap<String, ShelfLocation>>,
}

impl ShelfRegistry {
    pub fn new() -> Self {
        Self {
            shelves: Mutex::new(BTreeMap::new()),
        }
    }
}

impl Default for ShelfRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ShelfRegistryTrait for ShelfRegistry {
    async fn add_book(&self, shelf_no: &str, book_id: BookId) -> Result<ShelfLocation> {
        let mut shelves = lock(&self.shelves)?;
        let updated = match shelves.get(shelf_no) {
            Some(existing) => shelf::add_book(existing, book_id).0,
            None => ShelfLocation::with_book(shelf_no, book_id),
        };
        shelves.insert(shelf_no.to_string(), updated.clone());
        Ok(updated)
    }

    async fn remove_book(&self, shelf_no: &str, book_id: BookId) -> Result<Option<ShelfLocation>> {
        let mut shelves = lock(&self.shelves)?;
        let Some(existing) = shelves.get(shelf_no) else {
            return Ok(None);
        };
        let (updated, _) = shelf::remove_book(existing, book_id);
        shelves.insert(shelf_no.to_string(), updated.clone());
        Ok(Some(updated))
    }

    async fn get_by_shelf_no(&self, shelf_no: &str) -> Result<Option<ShelfLocation>> {
        Ok(lock(&self.shelves)?.get(shelf_no).cloned())
    }

    async fn list_all(&self) -> Result<Vec<ShelfLocation>> {
        Ok(lock(&self.shelves)?.values().cloned().collect())
    }
}
