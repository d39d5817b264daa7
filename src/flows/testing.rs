//! In-memory store, cache and clock for unit tests.

use async_trait::async_trait;
use std::{
    collections::HashMap,
    sync::{
        Mutex, MutexGuard, PoisonError,
        atomic::{AtomicBool, AtomicI64, Ordering},
    },
};

use super::cache::BlockCache;
use super::clock::Clock;
use super::error::{CacheError, StoreError};
use super::models::BlockRecord;
use super::store::BlockStore;

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug)]
pub(crate) struct ManualClock(AtomicI64);

impl ManualClock {
    pub(crate) fn new(now: i64) -> Self {
        Self(AtomicI64::new(now))
    }

    pub(crate) fn set(&self, now: i64) {
        self.0.store(now, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }
}

type Key = (String, String, String);

/// Rows keyed by `(tenant, subject, flow)`, like the unique index.
#[derive(Debug, Default)]
pub(crate) struct MemoryBlockStore {
    rows: Mutex<Vec<BlockRecord>>,
    fail_writes: AtomicBool,
    fail_reads: AtomicBool,
}

impl MemoryBlockStore {
    pub(crate) fn rows(&self) -> Vec<BlockRecord> {
        locked(&self.rows).clone()
    }

    pub(crate) fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    fn check(flag: &AtomicBool) -> Result<(), StoreError> {
        if flag.load(Ordering::SeqCst) {
            return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}

fn key_of(record: &BlockRecord) -> Key {
    (
        record.tenant_id.clone(),
        record.subject.clone(),
        record.flow_name.clone(),
    )
}

#[async_trait]
impl BlockStore for MemoryBlockStore {
    async fn upsert(&self, records: &[BlockRecord]) -> Result<(), StoreError> {
        Self::check(&self.fail_writes)?;
        let mut rows = locked(&self.rows);
        for record in records {
            let key = key_of(record);
            match rows.iter_mut().find(|row| key_of(row) == key) {
                Some(row) => {
                    row.reason.clone_from(&record.reason);
                    row.unblocked_at = record.unblocked_at;
                    row.active = record.active;
                }
                None => rows.push(record.clone()),
            }
        }
        Ok(())
    }

    async fn deactivate(
        &self,
        tenant_id: &str,
        subject: &str,
        flow_names: &[String],
    ) -> Result<(), StoreError> {
        Self::check(&self.fail_writes)?;
        let mut rows = locked(&self.rows);
        for row in rows.iter_mut().filter(|row| {
            row.tenant_id == tenant_id && row.subject == subject && flow_names.contains(&row.flow_name)
        }) {
            row.active = false;
        }
        Ok(())
    }

    async fn find_active(
        &self,
        tenant_id: &str,
        subject: &str,
    ) -> Result<Vec<BlockRecord>, StoreError> {
        Self::check(&self.fail_reads)?;
        let mut found: Vec<BlockRecord> = locked(&self.rows)
            .iter()
            .filter(|row| row.tenant_id == tenant_id && row.subject == subject && row.active)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.flow_name.cmp(&b.flow_name));
        Ok(found)
    }

    async fn find_denying(
        &self,
        tenant_id: &str,
        subjects: &[String],
        flow_name: &str,
        now: i64,
    ) -> Result<Option<BlockRecord>, StoreError> {
        Self::check(&self.fail_reads)?;
        let rows = locked(&self.rows);
        Ok(subjects.iter().find_map(|subject| {
            rows.iter()
                .find(|row| {
                    row.tenant_id == tenant_id
                        && &row.subject == subject
                        && row.flow_name == flow_name
                        && row.denies_at(now)
                })
                .cloned()
        }))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Self::check(&self.fail_reads)
    }
}

/// Cache that never expires entries on its own; TTLs are recorded for asserts.
#[derive(Debug, Default)]
pub(crate) struct MemoryBlockCache {
    entries: Mutex<HashMap<String, (String, u64)>>,
    fail: AtomicBool,
    fail_deletes: AtomicBool,
}

impl MemoryBlockCache {
    pub(crate) fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Fail only `delete`, leaving reads and writes working.
    pub(crate) fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn clear(&self) {
        locked(&self.entries).clear();
    }

    pub(crate) fn is_empty(&self) -> bool {
        locked(&self.entries).is_empty()
    }

    pub(crate) fn ttl_of(&self, key: &str) -> Option<u64> {
        locked(&self.entries).get(key).map(|(_, ttl)| *ttl)
    }

    pub(crate) fn insert_raw(&self, key: &str, value: &str) {
        locked(&self.entries).insert(key.to_string(), (value.to_string(), 60));
    }

    fn check(&self) -> Result<(), CacheError> {
        Self::refuse_if(&self.fail)
    }

    fn refuse_if(flag: &AtomicBool) -> Result<(), CacheError> {
        if flag.load(Ordering::SeqCst) {
            return Err(CacheError::Redis(redis::RedisError::from((
                redis::ErrorKind::IoError,
                "connection refused",
            ))));
        }
        Ok(())
    }
}

#[async_trait]
impl BlockCache for MemoryBlockCache {
    async fn put(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<(), CacheError> {
        self.check()?;
        locked(&self.entries).insert(key.to_string(), (value.to_string(), ttl_seconds));
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.check()?;
        Ok(locked(&self.entries).get(key).map(|(value, _)| value.clone()))
    }

    async fn delete(&self, keys: &[String]) -> Result<(), CacheError> {
        self.check()?;
        Self::refuse_if(&self.fail_deletes)?;
        let mut entries = locked(&self.entries);
        for key in keys {
            entries.remove(key);
        }
        Ok(())
    }

    async fn status(&self) -> &'static str {
        if self.check().is_ok() { "ok" } else { "error" }
    }
}
