//! 进程内存储
//!
//! 链接存放在 DashMap 中，`entry` API 保证同一短码的并发创建只有一个成功；
//! 事件日志与汇总放在同一把锁下，保证写日志与累加汇总的原子性。

use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::Mutex;
use tracing::debug;

use super::models::{
    ClickEvent, DateRange, Dimension, Link, LinkUpdate, RecordOutcome, RollupCount, RollupKey,
};
use super::traits::{ClickEventStore, LinkStore};
use crate::analytics::rollup::{aggregate_events, resolved_counts};
use crate::errors::{LinkpulseError, Result};

#[derive(Default)]
struct EventLog {
    events: BTreeMap<i64, ClickEvent>,
    rollups: HashMap<RollupKey, u64>,
}

impl EventLog {
    fn apply(&mut self, deltas: &[RollupCount]) {
        for delta in deltas {
            *self.rollups.entry(delta.key.clone()).or_insert(0) += delta.count;
        }
    }
}

#[derive(Default)]
pub struct MemoryStorage {
    links: DashMap<String, Link>,
    log: Mutex<EventLog>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LinkStore for MemoryStorage {
    async fn create(&self, link: Link) -> Result<Link> {
        link.validate_new(Utc::now())?;
        match self.links.entry(link.short_code.clone()) {
            Entry::Occupied(_) => Err(LinkpulseError::alias_taken(format!(
                "Short code '{}' is already in use",
                link.short_code
            ))),
            Entry::Vacant(slot) => {
                slot.insert(link.clone());
                Ok(link)
            }
        }
    }

    async fn get(&self, code: &str) -> Result<Option<Link>> {
        Ok(self.links.get(code).map(|l| l.clone()))
    }

    async fn update(&self, code: &str, update: LinkUpdate) -> Result<Link> {
        update.validate(Utc::now())?;
        let mut link = self
            .links
            .get_mut(code)
            .ok_or_else(|| LinkpulseError::not_found(format!("Short link not found: {}", code)))?;
        update.apply_to(&mut link);
        Ok(link.clone())
    }

    async fn deactivate(&self, code: &str) -> Result<()> {
        let mut link = self
            .links
            .get_mut(code)
            .ok_or_else(|| LinkpulseError::not_found(format!("Short link not found: {}", code)))?;
        link.active = false;
        Ok(())
    }

    async fn add_clicks(&self, deltas: &[(String, u64)]) -> Result<()> {
        for (code, n) in deltas {
            if let Some(mut link) = self.links.get_mut(code) {
                link.click_count = link.click_count.saturating_add(*n);
            }
        }
        Ok(())
    }

    async fn set_click_count(&self, code: &str, count: u64) -> Result<()> {
        if let Some(mut link) = self.links.get_mut(code) {
            link.click_count = count;
        }
        Ok(())
    }

    async fn deactivate_expired(&self, now: DateTime<Utc>) -> Result<Vec<String>> {
        let mut codes = Vec::new();
        for mut entry in self.links.iter_mut() {
            if entry.active && entry.is_expired_at(now) {
                entry.active = false;
                codes.push(entry.short_code.clone());
            }
        }
        Ok(codes)
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.links.len() as u64)
    }
}

#[async_trait]
impl ClickEventStore for MemoryStorage {
    async fn record_batch(&self, events: &[ClickEvent]) -> Result<RecordOutcome> {
        let mut log = self.log.lock();

        let mut seen = HashSet::with_capacity(events.len());
        let fresh: Vec<ClickEvent> = events
            .iter()
            .filter(|e| !log.events.contains_key(&e.event_id) && seen.insert(e.event_id))
            .cloned()
            .collect();

        let deltas = aggregate_events(&fresh);
        log.apply(&deltas);
        for event in &fresh {
            log.events.insert(event.event_id, event.clone());
        }

        debug!(
            "Memory event log: recorded {} of {} events",
            fresh.len(),
            events.len()
        );
        Ok(RecordOutcome {
            inserted: fresh.len(),
            duplicates: events.len() - fresh.len(),
            resolved_per_code: resolved_counts(&fresh),
        })
    }

    async fn events_after(&self, after_id: Option<i64>, limit: u64) -> Result<Vec<ClickEvent>> {
        let log = self.log.lock();
        let iter: Box<dyn Iterator<Item = &ClickEvent>> = match after_id {
            Some(id) => Box::new(
                log.events
                    .range((std::ops::Bound::Excluded(id), std::ops::Bound::Unbounded))
                    .map(|(_, e)| e),
            ),
            None => Box::new(log.events.values()),
        };
        Ok(iter.take(limit as usize).cloned().collect())
    }

    async fn event_count(&self) -> Result<u64> {
        Ok(self.log.lock().events.len() as u64)
    }

    async fn earliest_event_day(&self) -> Result<Option<NaiveDate>> {
        Ok(self.log.lock().events.values().map(|e| e.bucket()).min())
    }

    async fn apply_rollups(&self, deltas: &[RollupCount]) -> Result<()> {
        self.log.lock().apply(deltas);
        Ok(())
    }

    async fn clear_rollups_from(&self, from: NaiveDate) -> Result<u64> {
        let mut log = self.log.lock();
        let start = log.rollups.len();
        log.rollups.retain(|k, _| k.bucket < from);
        Ok((start - log.rollups.len()) as u64)
    }

    async fn query_rollups(
        &self,
        code: &str,
        range: DateRange,
        dimension: Dimension,
    ) -> Result<Vec<RollupCount>> {
        let log = self.log.lock();
        let mut rows: Vec<RollupCount> = log
            .rollups
            .iter()
            .filter(|(k, _)| {
                k.short_code == code && k.dimension == dimension && range.contains(k.bucket)
            })
            .map(|(k, v)| RollupCount {
                key: k.clone(),
                count: *v,
            })
            .collect();
        rows.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(rows)
    }

    async fn totals_by_code(&self, dimension: Dimension, value: &str) -> Result<Vec<(String, u64)>> {
        let log = self.log.lock();
        let mut totals: BTreeMap<String, u64> = BTreeMap::new();
        for (key, count) in log
            .rollups
            .iter()
            .filter(|(k, _)| k.dimension == dimension && k.value == value)
        {
            *totals.entry(key.short_code.clone()).or_insert(0) += count;
        }
        Ok(totals.into_iter().collect())
    }

    async fn purge_events_before(&self, before: DateTime<Utc>) -> Result<u64> {
        let mut log = self.log.lock();
        let start = log.events.len();
        log.events.retain(|_, e| e.ts >= before);
        Ok((start - log.events.len()) as u64)
    }

    async fn purge_rollups_before(&self, before: NaiveDate) -> Result<u64> {
        let mut log = self.log.lock();
        let start = log.rollups.len();
        log.rollups.retain(|k, _| k.bucket >= before);
        Ok((start - log.rollups.len()) as u64)
    }
}
