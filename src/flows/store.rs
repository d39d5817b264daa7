//! Durable, tenant-scoped block storage.
//!
//! Writes are single statements so a multi-flow batch is applied as a unit:
//! `UNNEST` feeds the rows of an upsert, `= ANY($n)` drives the unblock update.
//! Rows are never deleted; the time window is evaluated at read time.

use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::{Instrument, info_span, instrument};

use super::error::StoreError;
use super::models::{BlockRecord, SubjectKind};

#[async_trait]
pub trait BlockStore: Send + Sync {
    /// Insert or overwrite every record in one atomic statement.
    async fn upsert(&self, records: &[BlockRecord]) -> Result<(), StoreError>;

    /// Mark the listed flows inactive for a subject in one atomic statement.
    async fn deactivate(
        &self,
        tenant_id: &str,
        subject: &str,
        flow_names: &[String],
    ) -> Result<(), StoreError>;

    /// Every row flagged active for a subject, expired or not.
    async fn find_active(&self, tenant_id: &str, subject: &str)
        -> Result<Vec<BlockRecord>, StoreError>;

    /// First record, in `subjects` order, that denies `flow_name` at `now`.
    async fn find_denying(
        &self,
        tenant_id: &str,
        subjects: &[String],
        flow_name: &str,
        now: i64,
    ) -> Result<Option<BlockRecord>, StoreError>;

    /// Liveness probe used by `/health`.
    async fn ping(&self) -> Result<(), StoreError>;
}

#[derive(Debug, Clone)]
pub struct PgBlockStore {
    pool: PgPool,
    kind: SubjectKind,
}

impl PgBlockStore {
    #[must_use]
    pub fn new(pool: PgPool, kind: SubjectKind) -> Self {
        Self { pool, kind }
    }

    fn table(&self) -> &'static str {
        self.kind.table()
    }
}

fn record_from_row(row: &PgRow) -> BlockRecord {
    BlockRecord {
        tenant_id: row.get("tenant_id"),
        subject: row.get("subject"),
        flow_name: row.get("flow_name"),
        reason: row.get("reason"),
        unblocked_at: row.get("unblocked_at"),
        active: row.get("is_active"),
    }
}

#[async_trait]
impl BlockStore for PgBlockStore {
    #[instrument(skip_all, fields(kind = %self.kind, rows = records.len()))]
    async fn upsert(&self, records: &[BlockRecord]) -> Result<(), StoreError> {
        if records.is_empty() {
            return Ok(());
        }

        let mut tenant_ids = Vec::with_capacity(records.len());
        let mut subjects = Vec::with_capacity(records.len());
        let mut flow_names = Vec::with_capacity(records.len());
        let mut reasons = Vec::with_capacity(records.len());
        let mut unblocked_ats = Vec::with_capacity(records.len());
        let mut actives = Vec::with_capacity(records.len());
        for record in records {
            tenant_ids.push(record.tenant_id.clone());
            subjects.push(record.subject.clone());
            flow_names.push(record.flow_name.clone());
            reasons.push(record.reason.clone());
            unblocked_ats.push(record.unblocked_at);
            actives.push(record.active);
        }

        // The key columns are never touched on conflict.
        let query = format!(
            r"
            INSERT INTO {table} (tenant_id, subject, flow_name, reason, unblocked_at, is_active)
            SELECT * FROM UNNEST($1::text[], $2::text[], $3::text[], $4::text[], $5::bigint[], $6::bool[])
            ON CONFLICT (tenant_id, subject, flow_name) DO UPDATE SET
                reason = EXCLUDED.reason,
                unblocked_at = EXCLUDED.unblocked_at,
                is_active = EXCLUDED.is_active,
                updated_at = NOW()
            ",
            table = self.table()
        );
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query.as_str()
        );
        sqlx::query(&query)
            .bind(tenant_ids)
            .bind(subjects)
            .bind(flow_names)
            .bind(reasons)
            .bind(unblocked_ats)
            .bind(actives)
            .execute(&self.pool)
            .instrument(span)
            .await?;

        Ok(())
    }

    #[instrument(skip_all, fields(kind = %self.kind, tenant_id = %tenant_id, flows = flow_names.len()))]
    async fn deactivate(
        &self,
        tenant_id: &str,
        subject: &str,
        flow_names: &[String],
    ) -> Result<(), StoreError> {
        if flow_names.is_empty() {
            return Ok(());
        }

        let query = format!(
            r"
            UPDATE {table}
            SET is_active = FALSE, updated_at = NOW()
            WHERE tenant_id = $1 AND subject = $2 AND flow_name = ANY($3)
            ",
            table = self.table()
        );
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query.as_str()
        );
        sqlx::query(&query)
            .bind(tenant_id)
            .bind(subject)
            .bind(flow_names)
            .execute(&self.pool)
            .instrument(span)
            .await?;

        Ok(())
    }

    #[instrument(skip_all, fields(kind = %self.kind, tenant_id = %tenant_id))]
    async fn find_active(
        &self,
        tenant_id: &str,
        subject: &str,
    ) -> Result<Vec<BlockRecord>, StoreError> {
        let query = format!(
            r"
            SELECT tenant_id, subject, flow_name, reason, unblocked_at, is_active
            FROM {table}
            WHERE tenant_id = $1 AND subject = $2 AND is_active
            ORDER BY flow_name
            ",
            table = self.table()
        );
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query.as_str()
        );
        let rows = sqlx::query(&query)
            .bind(tenant_id)
            .bind(subject)
            .fetch_all(&self.pool)
            .instrument(span)
            .await?;

        Ok(rows.iter().map(record_from_row).collect())
    }

    #[instrument(skip_all, fields(kind = %self.kind, tenant_id = %tenant_id, flow_name = %flow_name, subjects = subjects.len()))]
    async fn find_denying(
        &self,
        tenant_id: &str,
        subjects: &[String],
        flow_name: &str,
        now: i64,
    ) -> Result<Option<BlockRecord>, StoreError> {
        if subjects.is_empty() {
            return Ok(None);
        }

        let query = format!(
            r"
            SELECT tenant_id, subject, flow_name, reason, unblocked_at, is_active
            FROM {table}
            WHERE tenant_id = $1
              AND subject = ANY($2)
              AND flow_name = $3
              AND is_active
              AND unblocked_at > $4
            ORDER BY array_position($2::text[], subject)
            LIMIT 1
            ",
            table = self.table()
        );
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query.as_str()
        );
        let row = sqlx::query(&query)
            .bind(tenant_id)
            .bind(subjects)
            .bind(flow_name)
            .bind(now)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await?;

        Ok(row.as_ref().map(record_from_row))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let span = info_span!("db.ping", db.system = "postgresql", db.operation = "PING");
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .instrument(span)
            .await?;
        Ok(())
    }
}
