//! PostgreSQL store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::{info, instrument};
use uuid::Uuid;

use super::{FacilityConfigStore, StoreResult, SyncHistoryStore};
use crate::error::SyncError;
use crate::model::{FacilitySyncConfig, SyncChange, SyncLog};
use crate::types::{ApplyStatus, ReviewDecision, SyncLogStatus};

/// Store backed by PostgreSQL.
///
/// A partial unique index on `fms_sync_logs (facility_id)` for non-terminal
/// statuses keeps the one-active-log rule even across processes.
#[derive(Debug, Clone)]
pub struct PgSyncStore {
    pool: PgPool,
}

impl PgSyncStore {
    /// Create a new store.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get the underlying pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply embedded migrations.
    pub async fn run_migrations(&self) -> StoreResult<()> {
        info!("Running sync store migrations...");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| SyncError::store(format!("migration failed: {e}")))?;
        info!("Sync store migrations completed");
        Ok(())
    }
}

#[async_trait]
impl FacilityConfigStore for PgSyncStore {
    #[instrument(skip(self))]
    async fn get_config(&self, facility_id: Uuid) -> StoreResult<Option<FacilitySyncConfig>> {
        let row = sqlx::query_as::<_, ConfigRow>(
            r"
            SELECT id, facility_id, provider_type, enabled, provider_settings,
                   last_sync_at, last_sync_status, created_at, updated_at
            FROM facility_sync_configs
            WHERE facility_id = $1
            ",
        )
        .bind(facility_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(ConfigRow::into_config).transpose()
    }

    #[instrument(skip(self, config), fields(facility_id = %config.facility_id))]
    async fn save_config(&self, config: &FacilitySyncConfig) -> StoreResult<()> {
        sqlx::query(
            r"
            INSERT INTO facility_sync_configs (
                id, facility_id, provider_type, enabled, provider_settings,
                last_sync_at, last_sync_status, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (facility_id) DO UPDATE SET
                provider_type = EXCLUDED.provider_type,
                enabled = EXCLUDED.enabled,
                provider_settings = EXCLUDED.provider_settings,
                updated_at = NOW()
            ",
        )
        .bind(config.id)
        .bind(config.facility_id)
        .bind(config.provider_type.to_string())
        .bind(config.enabled)
        .bind(&config.provider_settings)
        .bind(config.last_sync_at)
        .bind(config.last_sync_status.map(|s| s.as_str()))
        .bind(config.created_at)
        .bind(config.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn update_last_sync(
        &self,
        facility_id: Uuid,
        at: DateTime<Utc>,
        status: SyncLogStatus,
    ) -> StoreResult<()> {
        let result = sqlx::query(
            r"
            UPDATE facility_sync_configs
            SET last_sync_at = $2,
                last_sync_status = $3,
                updated_at = NOW()
            WHERE facility_id = $1
            ",
        )
        .bind(facility_id)
        .bind(at)
        .bind(status.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(SyncError::config_not_found(facility_id));
        }
        Ok(())
    }
}

#[async_trait]
impl SyncHistoryStore for PgSyncStore {
    #[instrument(skip(self, log), fields(facility_id = %log.facility_id, sync_log_id = %log.id))]
    async fn create_log(&self, log: &SyncLog) -> StoreResult<()> {
        let result = sqlx::query(
            r"
            INSERT INTO fms_sync_logs (
                id, facility_id, config_id, status, started_at, completed_at, triggered_by,
                changes_detected, changes_applied, changes_pending, changes_rejected,
                error_message, summary
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ",
        )
        .bind(log.id)
        .bind(log.facility_id)
        .bind(log.config_id)
        .bind(log.status.as_str())
        .bind(log.started_at)
        .bind(log.completed_at)
        .bind(&log.triggered_by)
        .bind(log.changes_detected)
        .bind(log.changes_applied)
        .bind(log.changes_pending)
        .bind(log.changes_rejected)
        .bind(&log.error_message)
        .bind(serde_json::to_value(&log.summary)?)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                let active = self.find_active_log(log.facility_id).await?;
                Err(SyncError::already_running(
                    log.facility_id,
                    active.map(|l| l.id),
                ))
            }
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip(self, log), fields(sync_log_id = %log.id, status = %log.status))]
    async fn update_log(&self, log: &SyncLog) -> StoreResult<()> {
        let result = sqlx::query(
            r"
            UPDATE fms_sync_logs
            SET status = $2,
                completed_at = $3,
                changes_detected = $4,
                changes_applied = $5,
                changes_pending = $6,
                changes_rejected = $7,
                error_message = $8,
                summary = $9
            WHERE id = $1 AND status IN ('running', 'review_needed')
            ",
        )
        .bind(log.id)
        .bind(log.status.as_str())
        .bind(log.completed_at)
        .bind(log.changes_detected)
        .bind(log.changes_applied)
        .bind(log.changes_pending)
        .bind(log.changes_rejected)
        .bind(&log.error_message)
        .bind(serde_json::to_value(&log.summary)?)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return match self.get_log(log.id).await? {
                Some(existing) => Err(SyncError::invalid_state_transition(
                    existing.status.as_str(),
                    log.status.as_str(),
                )),
                None => Err(SyncError::not_found("SyncLog", log.id)),
            };
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_log(&self, id: Uuid) -> StoreResult<Option<SyncLog>> {
        let row = sqlx::query_as::<_, LogRow>(
            r"
            SELECT id, facility_id, config_id, status, started_at, completed_at, triggered_by,
                   changes_detected, changes_applied, changes_pending, changes_rejected,
                   error_message, summary
            FROM fms_sync_logs
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(LogRow::into_log).transpose()
    }

    #[instrument(skip(self))]
    async fn find_active_log(&self, facility_id: Uuid) -> StoreResult<Option<SyncLog>> {
        let row = sqlx::query_as::<_, LogRow>(
            r"
            SELECT id, facility_id, config_id, status, started_at, completed_at, triggered_by,
                   changes_detected, changes_applied, changes_pending, changes_rejected,
                   error_message, summary
            FROM fms_sync_logs
            WHERE facility_id = $1 AND status IN ('running', 'review_needed')
            LIMIT 1
            ",
        )
        .bind(facility_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(LogRow::into_log).transpose()
    }

    #[instrument(skip(self))]
    async fn list_logs(
        &self,
        facility_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> StoreResult<(Vec<SyncLog>, i64)> {
        let rows = sqlx::query_as::<_, LogRow>(
            r"
            SELECT id, facility_id, config_id, status, started_at, completed_at, triggered_by,
                   changes_detected, changes_applied, changes_pending, changes_rejected,
                   error_message, summary
            FROM fms_sync_logs
            WHERE facility_id = $1
            ORDER BY started_at DESC, id DESC
            LIMIT $2 OFFSET $3
            ",
        )
        .bind(facility_id)
        .bind(limit.max(0))
        .bind(offset.max(0))
        .fetch_all(&self.pool)
        .await?;

        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM fms_sync_logs WHERE facility_id = $1")
                .bind(facility_id)
                .fetch_one(&self.pool)
                .await?;

        let logs = rows
            .into_iter()
            .map(LogRow::into_log)
            .collect::<StoreResult<Vec<_>>>()?;
        Ok((logs, total))
    }

    #[instrument(skip(self))]
    async fn list_logs_by_status(&self, status: SyncLogStatus) -> StoreResult<Vec<SyncLog>> {
        let rows = sqlx::query_as::<_, LogRow>(
            r"
            SELECT id, facility_id, config_id, status, started_at, completed_at, triggered_by,
                   changes_detected, changes_applied, changes_pending, changes_rejected,
                   error_message, summary
            FROM fms_sync_logs
            WHERE status = $1
            ORDER BY started_at ASC
            ",
        )
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(LogRow::into_log).collect()
    }

    #[instrument(skip(self, changes), fields(count = changes.len()))]
    async fn insert_changes(&self, changes: &[SyncChange]) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        for change in changes {
            sqlx::query(
                r"
                INSERT INTO fms_sync_changes (
                    id, sync_log_id, position, change_type, entity_type, external_id,
                    entity_key, before_data, after_data, impact_summary, required_actions,
                    requires_review, is_reviewed, decision, reviewed_by, reviewed_at,
                    apply_status, apply_error, created_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15,
                        $16, $17, $18, $19)
                ",
            )
            .bind(change.id)
            .bind(change.sync_log_id)
            .bind(change.position)
            .bind(change.change_type.as_str())
            .bind(change.entity_type.as_str())
            .bind(&change.external_id)
            .bind(&change.entity_key)
            .bind(&change.before_data)
            .bind(&change.after_data)
            .bind(&change.impact_summary)
            .bind(serde_json::to_value(&change.required_actions)?)
            .bind(change.requires_review)
            .bind(change.is_reviewed)
            .bind(change.decision.map(|d| d.as_str()))
            .bind(&change.reviewed_by)
            .bind(change.reviewed_at)
            .bind(change.apply_status.as_str())
            .bind(&change.apply_error)
            .bind(change.created_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_change(&self, id: Uuid) -> StoreResult<Option<SyncChange>> {
        let row = sqlx::query_as::<_, ChangeRow>(
            r"
            SELECT id, sync_log_id, position, change_type, entity_type, external_id,
                   entity_key, before_data, after_data, impact_summary, required_actions,
                   requires_review, is_reviewed, decision, reviewed_by, reviewed_at,
                   apply_status, apply_error, created_at
            FROM fms_sync_changes
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(ChangeRow::into_change).transpose()
    }

    #[instrument(skip(self))]
    async fn list_changes(&self, sync_log_id: Uuid) -> StoreResult<Vec<SyncChange>> {
        let rows = sqlx::query_as::<_, ChangeRow>(
            r"
            SELECT id, sync_log_id, position, change_type, entity_type, external_id,
                   entity_key, before_data, after_data, impact_summary, required_actions,
                   requires_review, is_reviewed, decision, reviewed_by, reviewed_at,
                   apply_status, apply_error, created_at
            FROM fms_sync_changes
            WHERE sync_log_id = $1
            ORDER BY position ASC
            ",
        )
        .bind(sync_log_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ChangeRow::into_change).collect()
    }

    #[instrument(skip(self))]
    async fn record_decision(
        &self,
        change_id: Uuid,
        decision: ReviewDecision,
        reviewer: Option<&str>,
    ) -> StoreResult<SyncChange> {
        let row = sqlx::query_as::<_, ChangeRow>(
            r"
            UPDATE fms_sync_changes
            SET is_reviewed = TRUE,
                decision = $2,
                reviewed_by = $3,
                reviewed_at = NOW()
            WHERE id = $1 AND is_reviewed = FALSE
            RETURNING id, sync_log_id, position, change_type, entity_type, external_id,
                      entity_key, before_data, after_data, impact_summary, required_actions,
                      requires_review, is_reviewed, decision, reviewed_by, reviewed_at,
                      apply_status, apply_error, created_at
            ",
        )
        .bind(change_id)
        .bind(decision.as_str())
        .bind(reviewer)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => row.into_change(),
            None => match self.get_change(change_id).await? {
                Some(_) => Err(SyncError::AlreadyReviewed { change_id }),
                None => Err(SyncError::not_found("SyncChange", change_id)),
            },
        }
    }

    #[instrument(skip(self))]
    async fn record_apply_outcome(
        &self,
        change_id: Uuid,
        status: ApplyStatus,
        error: Option<&str>,
    ) -> StoreResult<()> {
        let result = sqlx::query(
            r"
            UPDATE fms_sync_changes
            SET apply_status = $2,
                apply_error = $3
            WHERE id = $1
            ",
        )
        .bind(change_id)
        .bind(status.as_str())
        .bind(error)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(SyncError::not_found("SyncChange", change_id));
        }
        Ok(())
    }
}

fn parse_column<T>(column: &str, value: &str) -> StoreResult<T>
where
    T: std::str::FromStr<Err = String>,
{
    value
        .parse()
        .map_err(|e| SyncError::store(format!("invalid {column} '{value}': {e}")))
}

/// Database row for a facility sync configuration.
#[derive(Debug, sqlx::FromRow)]
struct ConfigRow {
    id: Uuid,
    facility_id: Uuid,
    provider_type: String,
    enabled: bool,
    provider_settings: serde_json::Value,
    last_sync_at: Option<DateTime<Utc>>,
    last_sync_status: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ConfigRow {
    fn into_config(self) -> StoreResult<FacilitySyncConfig> {
        Ok(FacilitySyncConfig {
            id: self.id,
            facility_id: self.facility_id,
            provider_type: parse_column("provider_type", &self.provider_type)?,
            enabled: self.enabled,
            provider_settings: self.provider_settings,
            last_sync_at: self.last_sync_at,
            last_sync_status: self
                .last_sync_status
                .as_deref()
                .map(|s| parse_column("last_sync_status", s))
                .transpose()?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Database row for a sync log.
#[derive(Debug, sqlx::FromRow)]
struct LogRow {
    id: Uuid,
    facility_id: Uuid,
    config_id: Uuid,
    status: String,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    triggered_by: Option<String>,
    changes_detected: i32,
    changes_applied: i32,
    changes_pending: i32,
    changes_rejected: i32,
    error_message: Option<String>,
    summary: serde_json::Value,
}

impl LogRow {
    fn into_log(self) -> StoreResult<SyncLog> {
        Ok(SyncLog {
            id: self.id,
            facility_id: self.facility_id,
            config_id: self.config_id,
            status: parse_column("status", &self.status)?,
            started_at: self.started_at,
            completed_at: self.completed_at,
            triggered_by: self.triggered_by,
            changes_detected: self.changes_detected,
            changes_applied: self.changes_applied,
            changes_pending: self.changes_pending,
            changes_rejected: self.changes_rejected,
            error_message: self.error_message,
            summary: serde_json::from_value(self.summary)?,
        })
    }
}

/// Database row for a sync change.
#[derive(Debug, sqlx::FromRow)]
struct ChangeRow {
    id: Uuid,
    sync_log_id: Uuid,
    position: i32,
    change_type: String,
    entity_type: String,
    external_id: Option<String>,
    entity_key: String,
    before_data: Option<serde_json::Value>,
    after_data: serde_json::Value,
    impact_summary: String,
    required_actions: serde_json::Value,
    requires_review: bool,
    is_reviewed: bool,
    decision: Option<String>,
    reviewed_by: Option<String>,
    reviewed_at: Option<DateTime<Utc>>,
    apply_status: String,
    apply_error: Option<String>,
    created_at: DateTime<Utc>,
}

impl ChangeRow {
    fn into_change(self) -> StoreResult<SyncChange> {
        Ok(SyncChange {
            id: self.id,
            sync_log_id: self.sync_log_id,
            position: self.position,
            change_type: parse_column("change_type", &self.change_type)?,
            entity_type: parse_column("entity_type", &self.entity_type)?,
            external_id: self.external_id,
            entity_key: self.entity_key,
            before_data: self.before_data,
            after_data: self.after_data,
            impact_summary: self.impact_summary,
            required_actions: serde_json::from_value(self.required_actions)?,
            requires_review: self.requires_review,
            is_reviewed: self.is_reviewed,
            decision: self
                .decision
                .as_deref()
                .map(|d| parse_column("decision", d))
                .transpose()?,
            reviewed_by: self.reviewed_by,
            reviewed_at: self.reviewed_at,
            apply_status: parse_column("apply_status", &self.apply_status)?,
            apply_error: self.apply_error,
            created_at: self.created_at,
        })
    }
}
