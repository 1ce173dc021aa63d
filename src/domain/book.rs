use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{BookId, CatalogError};

/// ジャンル（固定の許可リスト）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Genre {
    Fiction,
    NonFiction,
    Science,
    Technology,
    History,
    Biography,
    Fantasy,
    Mystery,
    Romance,
    Poetry,
    Children,
    Reference,
}

impl Genre {
    pub fn as_str(&self) -> &'static str {
        match self {
            Genre::Fiction => "fiction",
            Genre::NonFiction => "non_fiction",
            Genre::Science => "science",
            Genre::Technology => "technology",
            Genre::History => "history",
            Genre::Biography => "biography",
            Genre::Fantasy => "fantasy",
            Genre::Mystery => "mystery",
            Genre::Romance => "romance",
            Genre::Poetry => "poetry",
            Genre::Children => "children",
            Genre::Reference => "reference",
        }
    }
}

impl fmt::Display for Genre {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Genre {
    type Err = String;

    /// 大文字小文字・区切り文字（空白, `-`, `_`）を無視して解釈する
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '_'))
            .flat_map(char::to_lowercase)
            .collect();

        match normalized.as_str() {
            "fiction" => Ok(Genre::Fiction),
            "nonfiction" => Ok(Genre::NonFiction),
            "science" => Ok(Genre::Science),
            "technology" => Ok(Genre::Technology),
            "history" => Ok(Genre::History),
            "biography" => Ok(Genre::Biography),
            "fantasy" => Ok(Genre::Fantasy),
            "mystery" => Ok(Genre::Mystery),
            "romance" => Ok(Genre::Romance),
            "poetry" => Ok(Genre::Poetry),
            "children" => Ok(Genre::Children),
            "reference" => Ok(Genre::Reference),
            _ => Err(format!("Invalid genre: {}", s.trim())),
        }
    }
}

/// 蔵書の同一性判定キー
///
/// (タイトル, 著者, ジャンル, ISBN, 出版年) の完全一致で同一書籍とみなす。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BookMatchKey {
    pub title: String,
    pub authors: Vec<String>,
    pub genre: Genre,
    pub isbn: String,
    pub publication_year: i32,
}

/// 受け入れ候補（手動登録・CSV取り込みの1行）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookCandidate {
    pub title: String,
    pub authors: Vec<String>,
    pub genre: Genre,
    pub isbn: String,
    pub publication_year: i32,
    pub total_copies: u32,
}

impl BookCandidate {
    pub fn match_key(&self) -> BookMatchKey {
        BookMatchKey {
            title: self.title.clone(),
            authors: self.authors.clone(),
            genre: self.genre,
            isbn: self.isbn.clone(),
            publication_year: self.publication_year,
        }
    }
}

/// Book - 貸出対象となるタイトル＋版
///
/// 不変条件：0 <= available_copies <= total_copies
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    pub id: BookId,
    pub title: String,
    pub authors: Vec<String>,
    pub genre: Genre,
    pub isbn: String,
    pub publication_year: i32,
    pub total_copies: u32,
    pub available_copies: u32,
    /// 非正規化された書架ラベル（ShelfLocation.book_ids と一致させる）
    pub shelf_location: Option<String>,
}

impl Book {
    pub fn match_key(&self) -> BookMatchKey {
        BookMatchKey {
            title: self.title.clone(),
            authors: self.authors.clone(),
            genre: self.genre,
            isbn: self.isbn.clone(),
            publication_year: self.publication_year,
        }
    }

    pub fn is_available(&self) -> bool {
        self.available_copies > 0
    }
}

/// 純粋関数：候補から新しい蔵書レコードを作る（available = total）
pub fn new_book(candidate: BookCandidate) -> Book {
    Book {
        id: BookId::new(),
        title: candidate.title,
        authors: candidate.authors,
        genre: candidate.genre,
        isbn: candidate.isbn,
        publication_year: candidate.publication_year,
        total_copies: candidate.total_copies,
        available_copies: candidate.total_copies,
        shelf_location: None,
    }
}

/// 純粋関数：既存レコードに冊数を合算する
///
/// total と available の両方に同じ冊数を加算する。
pub fn merge_copies(book: &Book, additional: u32) -> Book {
    Book {
        total_copies: book.total_copies.saturating_add(additional),
        available_copies: book.available_copies.saturating_add(additional),
        ..book.clone()
    }
}

/// 純粋関数：1冊を貸出用に確保する
pub fn reserve_copy(book: &Book) -> Result<Book, CatalogError> {
    if !book.is_available() {
        return Err(CatalogError::NotAvailable);
    }
    Ok(Book {
        available_copies: book.available_copies - 1,
        ..book.clone()
    })
}

/// 純粋関数：返却された1冊を在庫に戻す
///
/// total を超える返却は帳簿の不整合として扱い、丸めずにエラーにする。
pub fn release_copy(book: &Book) -> Result<Book, CatalogError> {
    if book.available_copies >= book.total_copies {
        return Err(CatalogError::ReleaseBeyondTotal {
            total: book.total_copies,
        });
    }
    Ok(Book {
        available_copies: book.available_copies + 1,
        ..book.clone()
    })
}

/// 純粋関数：紛失した1冊を蔵書数から除却する
///
/// 貸出中の冊は available に含まれないため、total > available が前提。
pub fn write_off_copy(book: &Book) -> Result<Book, CatalogError> {
    if book.total_copies <= book.available_copies {
        return Err(CatalogError::NoCopyOnLoan);
    }
    Ok(Book {
        total_copies: book.total_copies - 1,
        ..book.clone()
    })
}

/// 純粋関数：除却を取り消して蔵書数を1冊戻す
///
/// 除却の記録に失敗したときの補償に使う。貸出中の冊として戻すため available は変えない。
pub fn reinstate_copy(book: &Book) -> Book {
    Book {
        total_copies: book.total_copies.saturating_add(1),
        ..book.clone()
    }
}
