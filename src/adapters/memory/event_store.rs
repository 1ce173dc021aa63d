use crate::domain::{events::DomainEvent, value_objects::LoanId};
use crate::ports::event_store::{
    EventStore as EventStoreTrait, Result, StreamAppend, VersionConflict,
};
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use super::{BoxError, lock};

/// EventStoreのインメモリ実装
///
/// 挿入順を保った単一の追記専用ログを持つ。
/// バージョンの確認と追加は同じロックの中で行う。
/// 補償処理のテスト用に、追加を失敗させることができる。
pub struct EventStore {
    log: Mutex<Vec<(LoanId, DomainEvent)>>,
    fail_appends: AtomicBool,
}

impl EventStore {
    pub fn new() -> Self {
        Self {
            log: Mutex::new(Vec::new()),
            fail_appends: AtomicBool::new(false),
        }
    }

    /// 以降の追加をストレージエラーで失敗させる
    pub fn fail_appends(&self, fail: bool) {
        self.fail_appends.store(fail, Ordering::SeqCst);
    }

    /// 保存済みイベントの総数
    pub fn len(&self) -> usize {
        self.log.lock().map(|log| log.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_appends.load(Ordering::SeqCst) {
            return Err(BoxError::from("event store unavailable"));
        }
        Ok(())
    }
}

fn check_version(
    log: &[(LoanId, DomainEvent)],
    aggregate_id: LoanId,
    expected_version: u64,
) -> Result<()> {
    let current = log.iter().filter(|(id, _)| *id == aggregate_id).count() as u64;
    if current != expected_version {
        return Err(Box::new(VersionConflict {
            aggregate_id,
            expected_version,
        }));
    }
    Ok(())
}

impl Default for EventStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventStoreTrait for EventStore {
    async fn append(
        &self,
        aggregate_id: LoanId,
        expected_version: u64,
        events: Vec<DomainEvent>,
    ) -> Result<()> {
        self.check_writable()?;
        let mut log = lock(&self.log)?;
        check_version(&log, aggregate_id, expected_version)?;
        log.extend(events.into_iter().map(|event| (aggregate_id, event)));
        Ok(())
    }

    /// すべてのバージョンを確認してから1つのロックの中で追加する（一部だけの追加は見えない）
    async fn append_batch(&self, batches: Vec<StreamAppend>) -> Result<()> {
        self.check_writable()?;
        let mut log = lock(&self.log)?;
        for batch in &batches {
            check_version(&log, batch.aggregate_id, batch.expected_version)?;
        }
        for batch in batches {
            let aggregate_id = batch.aggregate_id;
            log.extend(batch.events.into_iter().map(|event| (aggregate_id, event)));
        }
        Ok(())
    }

    async fn load(&self, aggregate_id: LoanId) -> Result<Vec<DomainEvent>> {
        let log = lock(&self.log)?;
        Ok(log
            .iter()
            .filter(|(id, _)| *id == aggregate_id)
            .map(|(_, event)| event.clone())
            .collect())
    }

    fn stream_all(&self) -> BoxStream<'_, Result<DomainEvent>> {
        match lock(&self.log) {
            Ok(log) => {
                let snapshot: Vec<DomainEvent> = log.iter().map(|(_, e)| e.clone()).collect();
                stream::iter(snapshot.into_iter().map(Ok)).boxed()
            }
            Err(e) => stream::once(async move { Err(e) }).boxed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::events::{LoanRequested, RequestCancelled};
    use crate::domain::value_objects::{BookId, MemberId};
    use chrono::Utc;
    use futures::TryStreamExt;

    fn requested(loan_id: LoanId) -> DomainEvent {
        DomainEvent::LoanRequested(LoanRequested {
            loan_id,
            book_id: BookId::new(),
            member_id: MemberId::new(),
            requested_at: Utc::now(),
        })
    }

    fn cancelled(loan_id: LoanId) -> DomainEvent {
        DomainEvent::RequestCancelled(RequestCancelled {
            loan_id,
            cancelled_at: Utc::now(),
        })
    }

    fn batch(aggregate_id: LoanId, expected_version: u64, event: DomainEvent) -> StreamAppend {
        StreamAppend {
            aggregate_id,
            expected_version,
            events: vec![event],
        }
    }

    #[tokio::test]
    async fn test_load_returns_only_aggregate_events_in_order() {
        let store = EventStore::new();
        let a = LoanId::new();
        let b = LoanId::new();
        let first = requested(a);
        let last = cancelled(a);

        store.append(a, 0, vec![first.clone()]).await.unwrap();
        store.append(b, 0, vec![requested(b)]).await.unwrap();
        store.append(a, 1, vec![last.clone()]).await.unwrap();

        assert_eq!(store.load(a).await.unwrap(), vec![first, last]);
        assert_eq!(store.load(b).await.unwrap().len(), 1);

        let all: Vec<DomainEvent> = store.stream_all().try_collect().await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[1].loan_id(), b);
    }

    #[tokio::test]
    async fn test_append_with_stale_version_is_rejected() {
        let store = EventStore::new();
        let a = LoanId::new();
        store.append(a, 0, vec![requested(a)]).await.unwrap();

        // 同じバージョンを読んだ2つ目の書き込み
        store.append(a, 1, vec![cancelled(a)]).await.unwrap();
        let err = store.append(a, 1, vec![cancelled(a)]).await.unwrap_err();

        let conflict = err.downcast::<VersionConflict>().unwrap();
        assert_eq!(conflict.aggregate_id, a);
        assert_eq!(conflict.expected_version, 1);
        assert_eq!(store.load(a).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_append_batch_conflict_stores_nothing() {
        let store = EventStore::new();
        let a = LoanId::new();
        let b = LoanId::new();
        store.append(a, 0, vec![requested(a)]).await.unwrap();
        store.append(b, 0, vec![requested(b)]).await.unwrap();

        let result = store
            .append_batch(vec![batch(a, 1, cancelled(a)), batch(b, 0, cancelled(b))])
            .await;

        assert!(result.unwrap_err().downcast::<VersionConflict>().is_ok());
        assert_eq!(store.len(), 2);

        store
            .append_batch(vec![batch(a, 1, cancelled(a)), batch(b, 1, cancelled(b))])
            .await
            .unwrap();
        assert_eq!(store.len(), 4);
    }

    #[tokio::test]
    async fn test_failing_appends_leave_log_untouched() {
        let store = EventStore::new();
        let a = LoanId::new();
        store.fail_appends(true);

        assert!(store.append(a, 0, vec![requested(a)]).await.is_err());
        assert!(store.append_batch(vec![batch(a, 0, requested(a))]).await.is_err());
        assert!(store.is_empty());

        store.fail_appends(false);
        store.append(a, 0, vec![requested(a)]).await.unwrap();
        assert_eq!(store.len(), 1);
    }
}
