use crate::domain::shelf::ShelfLocation;
use crate::domain::value_objects::BookId;
use async_trait::async_trait;

pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// 書架レジストリポート
///
/// 書架ラベルと書籍IDの多対多の対応を保持する。
#[async_trait]
pub trait ShelfRegistry: Send + Sync {
    /// 書架に書籍を追加する
    ///
    /// 書架がなければ作成する。既に含まれていれば何もしない。
    async fn add_book(&self, shelf_no: &str, book_id: BookId) -> Result<ShelfLocation>;

    /// 書架から書籍を外す（含まれていなくてもエラーにしない）
    ///
    /// 書架が存在しない場合は None。
    async fn remove_book(&self, shelf_no: &str, book_id: BookId) -> Result<Option<ShelfLocation>>;

    async fn get_by_shelf_no(&self, shelf_no: &str) -> Result<Option<ShelfLocation>>;

    async fn list_all(&self) -> Result<Vec<ShelfLocation>>;
}
