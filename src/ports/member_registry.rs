use crate::domain::member::Member;
use crate::domain::value_objects::{MemberId, Money};
use async_trait::async_trait;

pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// 会員台帳ポート
///
/// 貸出コンテキストが必要とする会員の状態（無効化フラグ・罰金合計）のみを扱う。
#[async_trait]
pub trait MemberRegistry: Send + Sync {
    async fn insert(&self, member: Member) -> Result<()>;

    async fn get_by_id(&self, member_id: MemberId) -> Result<Option<Member>>;

    /// 会員が存在しなければ false
    async fn set_disabled(&self, member_id: MemberId, disabled: bool) -> Result<bool>;

    /// 罰金合計のキャッシュを更新する。会員が存在しなければ false
    async fn set_fine(&self, member_id: MemberId, fine: Money) -> Result<bool>;
}
