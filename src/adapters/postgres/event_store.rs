use crate::domain::{events::DomainEvent, value_objects::LoanId};
use crate::ports::event_store::{
    EventStore as EventStoreTrait, Result, StreamAppend, VersionConflict,
};
use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use sqlx::{PgPool, Postgres, Row, Transaction};

/// PostgreSQL implementation of EventStore
///
/// Stores domain events in an append-only event log.
/// Events are serialized as JSONB for flexible schema evolution.
pub struct EventStore {
    pool: PgPool,
}

impl EventStore {
    /// Create a new EventStore with a PostgreSQL connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert one aggregate's events inside an open transaction
    ///
    /// The stored maximum aggregate_version must equal `expected_version`.
    /// Two writers that both pass the check collide on the
    /// (aggregate_id, aggregate_version) unique key; either way the loser
    /// gets a `VersionConflict`.
    async fn insert_events(
        tx: &mut Transaction<'_, Postgres>,
        aggregate_id: LoanId,
        expected_version: u64,
        events: &[DomainEvent],
    ) -> Result<()> {
        if events.is_empty() {
            return Ok(());
        }

        let conflict = || -> Box<dyn std::error::Error + Send + Sync> {
            Box::new(VersionConflict {
                aggregate_id,
                expected_version,
            })
        };

        // COALESCE handles NULL when no events exist for this aggregate
        let current_version: i32 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(MAX(aggregate_version), 0)
            FROM events
            WHERE aggregate_id = $1
            "#,
        )
        .bind(aggregate_id.value())
        .fetch_one(&mut **tx)
        .await?;

        if i64::from(current_version) != i64::try_from(expected_version)? {
            return Err(conflict());
        }

        let mut versions = Vec::with_capacity(events.len());
        let mut event_types = Vec::with_capacity(events.len());
        let mut event_data_list = Vec::with_capacity(events.len());
        let mut occurred_at_list = Vec::with_capacity(events.len());

        for (i, event) in events.iter().enumerate() {
            versions.push(current_version + (i as i32) + 1);
            event_types.push(event.event_type());
            event_data_list.push(serde_json::to_value(event)?);
            occurred_at_list.push(event.occurred_at());
        }

        let aggregate_types = vec!["Loan"; events.len()];

        sqlx::query(
            r#"
            INSERT INTO events (
                aggregate_id,
                aggregate_version,
                aggregate_type,
                event_type,
                event_data,
                occurred_at
            )
            SELECT $1, * FROM UNNEST($2::int[], $3::varchar[], $4::varchar[], $5::jsonb[], $6::timestamptz[])
            "#,
        )
        .bind(aggregate_id.value())
        .bind(&versions)
        .bind(&aggregate_types)
        .bind(&event_types)
        .bind(&event_data_list)
        .bind(&occurred_at_list)
        .execute(&mut **tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => conflict(),
            other => Box::new(other) as Box<dyn std::error::Error + Send + Sync>,
        })?;

        Ok(())
    }
}

#[async_trait]
impl EventStoreTrait for EventStore {
    /// Append events for one aggregate atomically
    async fn append(
        &self,
        aggregate_id: LoanId,
        expected_version: u64,
        events: Vec<DomainEvent>,
    ) -> Result<()> {
        if events.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        Self::insert_events(&mut tx, aggregate_id, expected_version, &events).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Append events for several aggregates in one transaction
    ///
    /// Used by fine collection: every payment is recorded or none is.
    /// Any version mismatch rolls the whole transaction back.
    async fn append_batch(&self, batches: Vec<StreamAppend>) -> Result<()> {
        if batches.iter().all(|batch| batch.events.is_empty()) {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        for batch in &batches {
            Self::insert_events(
                &mut tx,
                batch.aggregate_id,
                batch.expected_version,
                &batch.events,
            )
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Load all events for an aggregate in chronological order
    async fn load(&self, aggregate_id: LoanId) -> Result<Vec<DomainEvent>> {
        let rows = sqlx::query(
            r#"
            SELECT event_data
            FROM events
            WHERE aggregate_id = $1
            ORDER BY aggregate_version ASC
            "#,
        )
        .bind(aggregate_id.value())
        .fetch_all(&self.pool)
        .await?;

        let mut events = Vec::with_capacity(rows.len());
        for row in rows {
            let event_data: serde_json::Value = row.get("event_data");
            let event: DomainEvent = serde_json::from_value(event_data)?;
            events.push(event);
        }

        Ok(events)
    }

    /// Stream all events ordered by sequence_number
    ///
    /// Used to rebuild the loan read model.
    fn stream_all(&self) -> BoxStream<'_, Result<DomainEvent>> {
        let stream = sqlx::query(
            r#"
            SELECT event_data
            FROM events
            ORDER BY sequence_number ASC
            "#,
        )
        .fetch(&self.pool)
        .map(|row_result| {
            let row = row_result?;
            let event_data: serde_json::Value = row.get("event_data");
            let event: DomainEvent = serde_json::from_value(event_data)
                .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>)?;
            Ok(event)
        });

        Box::pin(stream)
    }
}
