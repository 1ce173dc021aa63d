use serde::{Deserialize, Serialize};

use super::{Book, BookId, ShelfId};

/// ShelfLocation - 物理的な書架ラベルと、そこに置かれた書籍ID
///
/// `book_ids` は重複を持たない（集合として扱う）。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShelfLocation {
    pub id: ShelfId,
    pub shelf_no: String,
    pub book_ids: Vec<BookId>,
}

impl ShelfLocation {
    /// 1冊だけを持つ新しい書架
    pub fn with_book(shelf_no: impl Into<String>, book_id: BookId) -> Self {
        Self {
            id: ShelfId::new(),
            shelf_no: shelf_no.into(),
            book_ids: vec![book_id],
        }
    }

    pub fn contains(&self, book_id: BookId) -> bool {
        self.book_ids.contains(&book_id)
    }
}

/// 純粋関数：書架に書籍を追加する（既にあれば変更なし）
///
/// 戻り値の bool は変更があったかどうか。
pub fn add_book(shelf: &ShelfLocation, book_id: BookId) -> (ShelfLocation, bool) {
    if shelf.contains(book_id) {
        return (shelf.clone(), false);
    }
    let mut book_ids = shelf.book_ids.clone();
    book_ids.push(book_id);
    (
        ShelfLocation {
            book_ids,
            ..shelf.clone()
        },
        true,
    )
}

/// 純粋関数：書架から書籍を外す（なければ変更なし）
pub fn remove_book(shelf: &ShelfLocation, book_id: BookId) -> (ShelfLocation, bool) {
    if !shelf.contains(book_id) {
        return (shelf.clone(), false);
    }
    (
        ShelfLocation {
            book_ids: shelf
                .book_ids
                .iter()
                .copied()
                .filter(|id| *id != book_id)
                .collect(),
            ..shelf.clone()
        },
        true,
    )
}

/// 書架と書籍の非正規化フィールドの不一致
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ShelfMismatch {
    /// 書籍の shelf_location が指す書架に、その書籍が含まれていない
    BookPointsToMissingMembership { book_id: BookId, shelf_no: String },
    /// 書架に含まれているが、書籍側は別の書架（または未設定）を指している
    ShelfHoldsUnlinkedBook {
        book_id: BookId,
        shelf_no: String,
        book_shelf_location: Option<String>,
    },
}

/// 純粋関数：書架と書籍を突き合わせて不一致をすべて返す
pub fn find_mismatches(shelves: &[ShelfLocation], books: &[Book]) -> Vec<ShelfMismatch> {
    let mut mismatches = Vec::new();

    for book in books {
        if let Some(shelf_no) = &book.shelf_location {
            let linked = shelves
                .iter()
                .any(|s| &s.shelf_no == shelf_no && s.contains(book.id));
            if !linked {
                mismatches.push(ShelfMismatch::BookPointsToMissingMembership {
                    book_id: book.id,
                    shelf_no: shelf_no.clone(),
                });
            }
        }
    }

    for shelf in shelves {
        for book_id in &shelf.book_ids {
            let book_location = books
                .iter()
                .find(|b| b.id == *book_id)
                .and_then(|b| b.shelf_location.clone());
            if book_location.as_deref() != Some(shelf.shelf_no.as_str()) {
                mismatches.push(ShelfMismatch::ShelfHoldsUnlinkedBook {
                    book_id: *book_id,
                    shelf_no: shelf.shelf_no.clone(),
                    book_shelf_location: book_location,
                });
            }
        }
    }

    mismatches
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::book::{BookCandidate, Genre, new_book};

    fn book_on(shelf_no: Option<&str>) -> Book {
        let mut book = new_book(BookCandidate {
            title: "Dune".to_string(),
            authors: vec!["Frank Herbert".to_string()],
            genre: Genre::Fiction,
            isbn: "9780441172719".to_string(),
            publication_year: 1965,
            total_copies: 1,
        });
        book.shelf_location = shelf_no.map(str::to_string);
        book
    }

    #[test]
    fn test_add_book_is_idempotent() {
        let book_id = BookId::new();
        let shelf = ShelfLocation::with_book("A12", book_id);
        let (shelf, changed) = add_book(&shelf, book_id);
        assert!(!changed);
        assert_eq!(shelf.book_ids, vec![book_id]);
    }

    #[test]
    fn test_remove_absent_book_is_noop() {
        let shelf = ShelfLocation::with_book("A12", BookId::new());
        let (after, changed) = remove_book(&shelf, BookId::new());
        assert!(!changed);
        assert_eq!(after, shelf);
    }

    #[test]
    fn test_remove_book() {
        let keep = BookId::new();
        let drop = BookId::new();
        let (shelf, _) = add_book(&ShelfLocation::with_book("A12", keep), drop);
        let (shelf, changed) = remove_book(&shelf, drop);
        assert!(changed);
        assert_eq!(shelf.book_ids, vec![keep]);
    }

    #[test]
    fn test_find_mismatches_consistent() {
        let book = book_on(Some("A12"));
        let shelf = ShelfLocation::with_book("A12", book.id);
        assert!(find_mismatches(&[shelf], &[book]).is_empty());
    }

    #[test]
    fn test_find_mismatches_detects_both_directions() {
        let pointing = book_on(Some("B1"));
        let unlinked = book_on(None);
        let shelf = ShelfLocation::with_book("A12", unlinked.id);

        let mismatches = find_mismatches(&[shelf], &[pointing.clone(), unlinked.clone()]);

        assert_eq!(mismatches.len(), 2);
        assert!(mismatches.contains(&ShelfMismatch::BookPointsToMissingMembership {
            book_id: pointing.id,
            shelf_no: "B1".to_string(),
        }));
        assert!(mismatches.contains(&ShelfMismatch::ShelfHoldsUnlinkedBook {
            book_id: unlinked.id,
            shelf_no: "A12".to_string(),
            book_shelf_location: None,
        }));
    }
}
