//! ClickEventStore implementation for SeaOrmStorage
//!
//! 事件日志以 event_id 为主键。写入批次时在同一事务内：
//! 1. 查出批次中已存在的 event_id
//! 2. 只插入新事件
//! 3. 只为新事件累加汇总（upsert，count = count + excluded.count）
//!
//! 因此同一批次被重放（例如写入成功但确认丢失后重试）不会重复计数。

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseBackend, DbErr, EntityTrait, ExprTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, TransactionTrait,
};
use tracing::{debug, info};

use super::SeaOrmStorage;
use super::converters::{event_to_active_model, model_to_event, model_to_rollup, rollup_to_active_model};
use super::retry;
use crate::analytics::rollup::{aggregate_events, resolved_counts};
use crate::errors::Result;
use crate::storage::{
    ClickEvent, ClickEventStore, DateRange, Dimension, RecordOutcome, RollupCount,
};
use migration::entities::{click_event, click_rollup};

/// 单条 INSERT 的最大行数（SQLite 绑定参数上限）
const INSERT_CHUNK: usize = 100;

fn rollup_on_conflict(backend: DatabaseBackend) -> OnConflict {
    // 用表名限定左侧列，避免 PostgreSQL 在 DO UPDATE 中报列名歧义
    let current = Expr::col((click_rollup::Entity, click_rollup::Column::Count));
    let incoming = match backend {
        // MySQL 语法：VALUES(column)
        DatabaseBackend::MySql => Expr::cust("VALUES(count)"),
        // SQLite/PostgreSQL 语法：excluded.column
        _ => Expr::cust("excluded.count"),
    };
    OnConflict::columns([
        click_rollup::Column::ShortCode,
        click_rollup::Column::DayBucket,
        click_rollup::Column::Dimension,
        click_rollup::Column::DimValue,
    ])
    .value(click_rollup::Column::Count, current.add(incoming))
    .to_owned()
}

async fn upsert_rollups<C: ConnectionTrait>(
    db: &C,
    backend: DatabaseBackend,
    deltas: &[RollupCount],
) -> std::result::Result<(), DbErr> {
    for chunk in deltas.chunks(INSERT_CHUNK) {
        let models: Vec<_> = chunk.iter().map(rollup_to_active_model).collect();
        click_rollup::Entity::insert_many(models)
            .on_conflict(rollup_on_conflict(backend))
            .exec_without_returning(db)
            .await?;
    }
    Ok(())
}

impl SeaOrmStorage {
    async fn record_batch_once(
        &self,
        events: &[ClickEvent],
    ) -> std::result::Result<RecordOutcome, DbErr> {
        let txn = self.db.begin().await?;

        let ids: Vec<i64> = events.iter().map(|e| e.event_id).collect();
        let mut existing: HashSet<i64> = HashSet::with_capacity(ids.len());
        for chunk in ids.chunks(500) {
            let found: Vec<i64> = click_event::Entity::find()
                .select_only()
                .column(click_event::Column::EventId)
                .filter(click_event::Column::EventId.is_in(chunk.iter().copied()))
                .into_tuple()
                .all(&txn)
                .await?;
            existing.extend(found);
        }

        // existing 同时用于批次内去重
        let fresh: Vec<ClickEvent> = events
            .iter()
            .filter(|e| existing.insert(e.event_id))
            .cloned()
            .collect();

        for chunk in fresh.chunks(INSERT_CHUNK) {
            let models: Vec<_> = chunk.iter().map(event_to_active_model).collect();
            click_event::Entity::insert_many(models)
                .exec_without_returning(&txn)
                .await?;
        }

        let deltas = aggregate_events(&fresh);
        upsert_rollups(&txn, self.db_backend(), &deltas).await?;

        txn.commit().await?;

        Ok(RecordOutcome {
            inserted: fresh.len(),
            duplicates: events.len() - fresh.len(),
            resolved_per_code: resolved_counts(&fresh),
        })
    }
}

#[async_trait]
impl ClickEventStore for SeaOrmStorage {
    async fn record_batch(&self, events: &[ClickEvent]) -> Result<RecordOutcome> {
        if events.is_empty() {
            return Ok(RecordOutcome::default());
        }

        let outcome = retry::with_retry("record_batch", self.retry_config, || async {
            self.record_batch_once(events).await
        })
        .await?;

        debug!(
            "Recorded {} click events ({} duplicates skipped)",
            outcome.inserted, outcome.duplicates
        );
        Ok(outcome)
    }

    async fn events_after(&self, after_id: Option<i64>, limit: u64) -> Result<Vec<ClickEvent>> {
        let mut query = click_event::Entity::find();
        if let Some(id) = after_id {
            query = query.filter(click_event::Column::EventId.gt(id));
        }
        let models = query
            .order_by_asc(click_event::Column::EventId)
            .limit(limit)
            .all(&self.db)
            .await?;

        models.into_iter().map(model_to_event).collect()
    }

    async fn event_count(&self) -> Result<u64> {
        Ok(click_event::Entity::find().count(&self.db).await?)
    }

    async fn earliest_event_day(&self) -> Result<Option<NaiveDate>> {
        let earliest: Option<DateTime<Utc>> = click_event::Entity::find()
            .select_only()
            .column(click_event::Column::Ts)
            .order_by_asc(click_event::Column::Ts)
            .into_tuple()
            .one(&self.db)
            .await?;
        Ok(earliest.map(|ts| ts.date_naive()))
    }

    async fn apply_rollups(&self, deltas: &[RollupCount]) -> Result<()> {
        if deltas.is_empty() {
            return Ok(());
        }
        let backend = self.db_backend();
        let db = &self.db;
        retry::with_retry("apply_rollups", self.retry_config, || async {
            let txn = db.begin().await?;
            upsert_rollups(&txn, backend, deltas).await?;
            txn.commit().await
        })
        .await?;
        Ok(())
    }

    async fn clear_rollups_from(&self, from: NaiveDate) -> Result<u64> {
        let deleted = click_rollup::Entity::delete_many()
            .filter(click_rollup::Column::DayBucket.gte(from))
            .exec(&self.db)
            .await?
            .rows_affected;
        debug!("Cleared {} rollup rows from {}", deleted, from);
        Ok(deleted)
    }

    async fn query_rollups(
        &self,
        code: &str,
        range: DateRange,
        dimension: Dimension,
    ) -> Result<Vec<RollupCount>> {
        let models = click_rollup::Entity::find()
            .filter(click_rollup::Column::ShortCode.eq(code))
            .filter(click_rollup::Column::Dimension.eq(dimension.as_ref()))
            .filter(click_rollup::Column::DayBucket.between(range.start, range.end))
            .order_by_asc(click_rollup::Column::DayBucket)
            .order_by_asc(click_rollup::Column::DimValue)
            .all(&self.db)
            .await?;

        models.into_iter().map(model_to_rollup).collect()
    }

    async fn totals_by_code(&self, dimension: Dimension, value: &str) -> Result<Vec<(String, u64)>> {
        // 在应用层求和：PostgreSQL 的 SUM(bigint) 返回 numeric
        let rows: Vec<(String, i64)> = click_rollup::Entity::find()
            .select_only()
            .column(click_rollup::Column::ShortCode)
            .column(click_rollup::Column::Count)
            .filter(click_rollup::Column::Dimension.eq(dimension.as_ref()))
            .filter(click_rollup::Column::DimValue.eq(value))
            .order_by_asc(click_rollup::Column::ShortCode)
            .into_tuple()
            .all(&self.db)
            .await?;

        let mut totals: Vec<(String, u64)> = Vec::new();
        for (code, count) in rows {
            let count = Ord::max(count, 0) as u64;
            match totals.last_mut() {
                Some((last, total)) if *last == code => *total += count,
                _ => totals.push((code, count)),
            }
        }
        Ok(totals)
    }

    async fn purge_events_before(&self, before: DateTime<Utc>) -> Result<u64> {
        let deleted = click_event::Entity::delete_many()
            .filter(click_event::Column::Ts.lt(before))
            .exec(&self.db)
            .await?
            .rows_affected;
        if deleted > 0 {
            info!("Purged {} click events older than {}", deleted, before);
        }
        Ok(deleted)
    }

    async fn purge_rollups_before(&self, before: NaiveDate) -> Result<u64> {
        Ok(click_rollup::Entity::delete_many()
            .filter(click_rollup::Column::DayBucket.lt(before))
            .exec(&self.db)
            .await?
            .rows_affected)
    }
}
