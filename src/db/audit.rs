use std::future::Future;

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use uuid::Uuid;

use super::{DBClient, page_offset};
use crate::models::{ActorSnapshot, AuditEntry, ResourceSnapshot};

/// Audit store operations
///
/// Append-only: no update or delete.
pub trait AuditExt: Send + Sync {
    fn append_audit_entry(
        &self,
        entry: &AuditEntry,
    ) -> impl Future<Output = Result<(), sqlx::Error>> + Send;

    /// Newest first by `created_at`, ties broken by reverse insertion order
    fn get_audit_entries(
        &self,
        page: i64,
        limit: i64,
    ) -> impl Future<Output = Result<Vec<AuditEntry>, sqlx::Error>> + Send;

    fn get_audit_entry_count(&self) -> impl Future<Output = Result<i64, sqlx::Error>> + Send;
}

#[derive(Debug, sqlx::FromRow)]
struct AuditRow {
    id: Uuid,
    action: String,
    performed_by: Json<ActorSnapshot>,
    target_resource: Option<Json<ResourceSnapshot>>,
    details: String,
    ip_address: String,
    created_at: DateTime<Utc>,
}

impl From<AuditRow> for AuditEntry {
    fn from(row: AuditRow) -> Self {
        AuditEntry {
            id: row.id,
            action: row.action,
            performed_by: row.performed_by.0,
            target_resource: row.target_resource.map(|t| t.0),
            details: row.details,
            ip_address: row.ip_address,
            created_at: row.created_at,
        }
    }
}

impl AuditExt for DBClient {
    async fn append_audit_entry(&self, entry: &AuditEntry) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO audit_log (id, action, performed_by, target_resource, details, ip_address, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(entry.id)
        .bind(&entry.action)
        .bind(Json(&entry.performed_by))
        .bind(entry.target_resource.as_ref().map(Json))
        .bind(&entry.details)
        .bind(&entry.ip_address)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_audit_entries(&self, page: i64, limit: i64) -> Result<Vec<AuditEntry>, sqlx::Error> {
        let offset = page_offset(page, limit);

        let rows = sqlx::query_as::<_, AuditRow>(
            r#"
            SELECT id, action, performed_by, target_resource, details, ip_address, created_at
            FROM audit_log
            ORDER BY created_at DESC, seq DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(AuditEntry::from).collect())
    }

    async fn get_audit_entry_count(&self) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM audit_log")
            .fetch_one(&self.pool)
            .await
    }
}
