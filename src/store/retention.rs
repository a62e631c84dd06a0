//! Retention purges run by the background sweep task.
//!
//! Soft-deleted rows older than the configured window are removed for good.
//! Child tables are purged before their parents so foreign keys never
//! dangle mid-sweep.

use sqlx::PgPool;

use crate::error::Result;
use crate::metrics::RETENTION_PURGED_TOTAL;

/// Soft-deletable tables in purge order.
const PURGE_TABLES: &[&str] = &[
    "comments",
    "attachments",
    "bugs",
    "test_runs",
    "test_cases",
    "test_plans",
    "test_suites",
    "repositories",
    "projects",
];

#[derive(Clone)]
pub struct RetentionStore {
    pool: PgPool,
}

impl RetentionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Purge rows soft-deleted longer ago than `days`. Returns the total
    /// number of rows removed across all tables.
    pub async fn purge_soft_deleted(&self, days: i64) -> Result<u64> {
        let mut total = 0u64;

        for table in PURGE_TABLES {
            let deleted = sqlx::query(&format!(
                "DELETE FROM {table} WHERE deleted_at IS NOT NULL \
                 AND deleted_at < NOW() - ($1 || ' days')::interval"
            ))
            .bind(days.to_string())
            .execute(&self.pool)
            .await?
            .rows_affected();

            if deleted > 0 {
                RETENTION_PURGED_TOTAL
                    .with_label_values(&[table])
                    .inc_by(deleted);
                tracing::debug!(table = table, purged = deleted, "Purged soft-deleted rows");
            }

            total += deleted;
        }

        Ok(total)
    }
}
