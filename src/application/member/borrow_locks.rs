use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::domain::MemberId;

/// 会員ごとの貸出開始ロック
///
/// 上限の確認・在庫の確保・貸出開始イベントの保存を、同じ会員について1つずつ行う。
/// このプロセスの中だけで有効で、複数インスタンスが同じデータベースを共有する場合は
/// 直列化されない。
#[derive(Default)]
pub struct BorrowLocks {
    members: Mutex<HashMap<MemberId, Arc<AsyncMutex<()>>>>,
}

impl BorrowLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// 会員のロックを取得する。ガードを破棄するまで同じ会員の貸出開始は待たされる
    pub async fn lock(&self, member_id: MemberId) -> OwnedMutexGuard<()> {
        let member_lock = {
            let mut members = self.members.lock().unwrap_or_else(PoisonError::into_inner);
            // 誰も保持していないロックは捨てる
            members.retain(|id, lock| *id == member_id || Arc::strong_count(lock) > 1);
            Arc::clone(members.entry(member_id).or_default())
        };
        member_lock.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_same_member_waits_for_release() {
        let locks = BorrowLocks::new();
        let member_id = MemberId::new();

        let guard = locks.lock(member_id).await;
        let other = locks.lock(MemberId::new()).await;
        drop(other);

        let members = locks.members.lock().unwrap();
        let lock = members.get(&member_id).unwrap();
        assert!(lock.try_lock().is_err());
        drop(members);

        drop(guard);
        let _again = locks.lock(member_id).await;
    }
}
