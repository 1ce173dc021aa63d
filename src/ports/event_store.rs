use crate::domain::{events::DomainEvent, value_objects::LoanId};
use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// 追加時の期待バージョンが保存済みのイベント数と一致しない
///
/// 読み込みから追加までの間に、別の書き込みが同じ集約にイベントを追加した。
/// アダプターはこの型を `Box<dyn Error>` に包んで返し、呼び出し側は
/// ダウンキャストしてストレージ障害と区別する。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Loan {} was modified concurrently (expected version {expected_version})", .aggregate_id.value())]
pub struct VersionConflict {
    pub aggregate_id: LoanId,
    pub expected_version: u64,
}

/// 1つの集約への追加（`append_batch` 用）
#[derive(Debug, Clone)]
pub struct StreamAppend {
    pub aggregate_id: LoanId,
    /// 読み込んだ時点のイベント数
    pub expected_version: u64,
    pub events: Vec<DomainEvent>,
}

/// イベントストアポート
///
/// 貸出のドメインイベントの永続化と取得を抽象化する。
/// イベントは追記専用ログに保存される不変の事実。
///
/// 集約のバージョンは保存済みのイベント数。追加は楽観的排他制御で行い、
/// 期待バージョンが一致しなければ `VersionConflict` で失敗して何も保存しない。
#[async_trait]
pub trait EventStore: Send + Sync {
    /// 集約のイベントを追加する
    ///
    /// イベントは追記専用ログに保存され、変更・削除不可。
    /// イベントの順序は保持される。
    async fn append(
        &self,
        aggregate_id: LoanId,
        expected_version: u64,
        events: Vec<DomainEvent>,
    ) -> Result<()>;

    /// 複数の集約のイベントを1トランザクションで追加する
    ///
    /// すべて保存されるか、何も保存されないかのどちらか。
    /// どれか1つでもバージョンが一致しなければ全体が失敗する。
    async fn append_batch(&self, batches: Vec<StreamAppend>) -> Result<()>;

    /// 集約のすべてのイベントを読み込む
    ///
    /// 追加された順序でイベントを返す。返した件数が次の追加の期待バージョンになる。
    async fn load(&self, aggregate_id: LoanId) -> Result<Vec<DomainEvent>>;

    /// すべての集約のイベントを挿入順にストリーム配信する
    ///
    /// Read Modelの再構築に使用される。
    fn stream_all(&self) -> BoxStream<'_, Result<DomainEvent>>;
}
