//! Batched block/unblock and block checks for one subject kind.
//!
//! Flow Overview:
//! 1) `block` upserts one row per flow in a single statement, then writes each
//!    record through to the cache with a TTL ending at its unblock time.
//! 2) `unblock` flips `is_active` for the listed flows in a single statement, then
//!    deletes the matching cache keys so a later, shorter re-block never sees a
//!    stale hit.
//! 3) Checks always ask the store. When the store finds nothing, cached entries
//!    that still claim a block are stale (a failed eviction or a write-through
//!    that landed after an unblock) and are evicted.
//!
//! Store errors propagate. Cache errors are logged and dropped.

use std::{collections::HashSet, sync::Arc};
use tracing::{debug, info, instrument, warn};

use super::cache::BlockCache;
use super::clock::{Clock, SystemClock};
use super::error::{CacheError, FlowError};
use super::models::{BlockCheck, BlockRecord, SubjectKind};
use super::store::BlockStore;

pub struct BlockEngine {
    kind: SubjectKind,
    store: Arc<dyn BlockStore>,
    cache: Arc<dyn BlockCache>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for BlockEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockEngine")
            .field("kind", &self.kind)
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

impl BlockEngine {
    #[must_use]
    pub fn new(kind: SubjectKind, store: Arc<dyn BlockStore>, cache: Arc<dyn BlockCache>) -> Self {
        Self {
            kind,
            store,
            cache,
            clock: Arc::new(SystemClock),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub const fn kind(&self) -> SubjectKind {
        self.kind
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn BlockStore> {
        &self.store
    }

    #[must_use]
    pub fn cache(&self) -> &Arc<dyn BlockCache> {
        &self.cache
    }

    /// Block `flow_names` for a subject until `unblocked_at` (unix seconds).
    ///
    /// Returns the distinct flow names written, in request order. An
    /// `unblocked_at` already in the past is stored but never denies.
    ///
    /// # Errors
    /// Returns `FlowError::Store` if the durable write fails.
    #[instrument(skip(self, subject, reason), fields(kind = %self.kind))]
    pub async fn block(
        &self,
        tenant_id: &str,
        subject: &str,
        flow_names: &[String],
        reason: &str,
        unblocked_at: i64,
    ) -> Result<Vec<String>, FlowError> {
        let flows = distinct(flow_names);
        if flows.is_empty() {
            return Ok(flows);
        }

        let records: Vec<BlockRecord> = flows
            .iter()
            .map(|flow_name| BlockRecord {
                tenant_id: tenant_id.to_string(),
                subject: subject.to_string(),
                flow_name: flow_name.clone(),
                reason: reason.to_string(),
                unblocked_at,
                active: true,
            })
            .collect();

        self.store.upsert(&records).await.map_err(|err| {
            warn!("Failed to save blocked flows: {err}");
            FlowError::Store(err)
        })?;

        info!("Blocked {} flow(s) until {unblocked_at}", flows.len());

        self.write_through(&records).await;

        Ok(flows)
    }

    /// Unblock `flow_names` for a subject, keeping the rows for audit.
    ///
    /// # Errors
    /// Returns `FlowError::Store` if the durable update fails.
    #[instrument(skip(self, subject), fields(kind = %self.kind))]
    pub async fn unblock(
        &self,
        tenant_id: &str,
        subject: &str,
        flow_names: &[String],
    ) -> Result<Vec<String>, FlowError> {
        let flows = distinct(flow_names);
        if flows.is_empty() {
            return Ok(flows);
        }

        self.store
            .deactivate(tenant_id, subject, &flows)
            .await
            .map_err(|err| {
                warn!("Failed to unblock flows: {err}");
                FlowError::Store(err)
            })?;

        info!("Unblocked {} flow(s)", flows.len());

        let keys: Vec<String> = flows
            .iter()
            .map(|flow_name| self.kind.cache_key(tenant_id, subject, flow_name))
            .collect();
        if let Err(err) = self.cache.delete(&keys).await {
            warn!("Failed to evict unblocked flows from cache: {err}");
        }

        Ok(flows)
    }

    /// Blocks currently in force for a subject.
    ///
    /// # Errors
    /// Returns `FlowError::Store` if the read fails.
    #[instrument(skip(self, subject), fields(kind = %self.kind))]
    pub async fn list_active(
        &self,
        tenant_id: &str,
        subject: &str,
    ) -> Result<Vec<BlockRecord>, FlowError> {
        let now = self.clock.now();
        let records = self.store.find_active(tenant_id, subject).await?;
        Ok(records
            .into_iter()
            .filter(|record| record.denies_at(now))
            .collect())
    }

    /// Whether `subject` is blocked for `flow_name` right now.
    ///
    /// # Errors
    /// Returns `FlowError::Store` if the store has to be consulted and fails.
    pub async fn check_blocked(
        &self,
        tenant_id: &str,
        subject: &str,
        flow_name: &str,
    ) -> Result<BlockCheck, FlowError> {
        self.check_blocked_any(tenant_id, &[subject.to_string()], flow_name)
            .await
    }

    /// Whether any of `subjects` is blocked for `flow_name` right now.
    ///
    /// Blank subjects are ignored; no usable subject means not blocked. The
    /// reason returned is that of the first denying subject in `subjects` order.
    ///
    /// # Errors
    /// Returns `FlowError::Store` if the store has to be consulted and fails.
    #[instrument(skip(self, subjects), fields(kind = %self.kind, subjects = subjects.len()))]
    pub async fn check_blocked_any(
        &self,
        tenant_id: &str,
        subjects: &[String],
        flow_name: &str,
    ) -> Result<BlockCheck, FlowError> {
        let subjects: Vec<String> = distinct(
            &subjects
                .iter()
                .map(|subject| subject.trim().to_string())
                .filter(|subject| !subject.is_empty())
                .collect::<Vec<_>>(),
        );
        if subjects.is_empty() {
            return Ok(BlockCheck::allowed_for(flow_name));
        }

        let now = self.clock.now();

        let record = self
            .store
            .find_denying(tenant_id, &subjects, flow_name, now)
            .await?;

        if let Some(record) = record {
            return Ok(BlockCheck::blocked(flow_name, record.reason));
        }

        self.evict_stale(tenant_id, &subjects, flow_name, now).await;

        Ok(BlockCheck::allowed_for(flow_name))
    }

    /// Drop cached entries that still deny although the store says otherwise.
    async fn evict_stale(&self, tenant_id: &str, subjects: &[String], flow_name: &str, now: i64) {
        let mut stale = Vec::new();
        for subject in subjects {
            if let Some(record) = self.cached(tenant_id, subject, flow_name).await {
                if record.denies_at(now) {
                    stale.push(self.kind.cache_key(tenant_id, subject, flow_name));
                }
            }
        }
        if stale.is_empty() {
            return;
        }

        debug!("Evicting {} stale cache entries", stale.len());
        if let Err(err) = self.cache.delete(&stale).await {
            warn!("Failed to evict stale cache entries: {err}");
        }
    }

    async fn write_through(&self, records: &[BlockRecord]) {
        let now = self.clock.now();
        for record in records {
            let value = match serde_json::to_string(record) {
                Ok(value) => value,
                Err(err) => {
                    warn!(
                        "Skipping cache write for flow {}: {err}",
                        record.flow_name
                    );
                    continue;
                }
            };
            let key = self
                .kind
                .cache_key(&record.tenant_id, &record.subject, &record.flow_name);
            if let Err(err) = self
                .cache
                .put(&key, &value, record.cache_ttl_seconds(now))
                .await
            {
                warn!(
                    "Failed to cache blocked flow {}: {err}",
                    record.flow_name
                );
            }
        }
    }

    async fn cached(&self, tenant_id: &str, subject: &str, flow_name: &str) -> Option<BlockRecord> {
        let key = self.kind.cache_key(tenant_id, subject, flow_name);
        let lookup = match self.cache.get(&key).await {
            Ok(Some(value)) => serde_json::from_str::<BlockRecord>(&value).map_err(CacheError::from),
            Ok(None) => return None,
            Err(err) => Err(err),
        };
        match lookup {
            Ok(record) => Some(record),
            Err(err) => {
                warn!("Ignoring unusable cache entry: {err}");
                None
            }
        }
    }
}

/// Drop repeated names, keeping first-occurrence order.
fn distinct(names: &[String]) -> Vec<String> {
    let mut seen = HashSet::with_capacity(names.len());
    names
        .iter()
        .filter(|name| seen.insert(*name))
        .cloned()
        .collect()
}
