use crate::domain::book::{Book, BookMatchKey};
use crate::domain::value_objects::BookId;
use async_trait::async_trait;

pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// 冊数更新の結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyUpdate {
    /// 更新された
    Applied,
    /// 条件を満たさず更新されなかった（在庫0、total超過など）
    Rejected,
    /// 書籍が存在しない
    NotFound,
}

/// 蔵書台帳ポート
///
/// 冊数の増減はストレージ側の条件付き更新として原子的に行う。
/// 同じ書籍への同時確保で在庫が負になってはならない。
#[async_trait]
pub trait BookCatalog: Send + Sync {
    async fn insert(&self, book: Book) -> Result<()>;

    async fn get_by_id(&self, book_id: BookId) -> Result<Option<Book>>;

    /// (タイトル, 著者, ジャンル, ISBN, 出版年) の完全一致で検索する
    async fn find_by_match_key(&self, key: &BookMatchKey) -> Result<Option<Book>>;

    async fn list_all(&self) -> Result<Vec<Book>>;

    /// total と available に同じ冊数を加算する
    async fn add_copies(&self, book_id: BookId, copies: u32) -> Result<Option<Book>>;

    /// available > 0 の場合のみ 1 減らす
    async fn try_reserve_copy(&self, book_id: BookId) -> Result<CopyUpdate>;

    /// available < total の場合のみ 1 増やす
    async fn release_copy(&self, book_id: BookId) -> Result<CopyUpdate>;

    /// total > available の場合のみ total を 1 減らす
    async fn write_off_copy(&self, book_id: BookId) -> Result<CopyUpdate>;

    /// total を 1 増やす（除却の取り消し）
    async fn reinstate_copy(&self, book_id: BookId) -> Result<CopyUpdate>;

    /// 非正規化された書架ラベルを設定する。書籍が存在しなければ false
    async fn set_shelf_location(&self, book_id: BookId, shelf_no: Option<String>)
    -> Result<bool>;
}
