use crate::domain::value_objects::MemberId;
use async_trait::async_trait;

pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// 通知サービスポート
///
/// 会員への通知配信メカニズムを抽象化する。
/// 配信はベストエフォートで、貸出処理は配信結果に依存しない。
#[async_trait]
pub trait NotificationService: Send + Sync {
    /// 会員にメッセージを送る
    async fn notify(&self, member_id: MemberId, message: &str) -> Result<()>;
}
