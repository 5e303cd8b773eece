//! Refresh entry storage.
//!
//! Entries are revoked, never deleted. Rotation runs in a transaction whose
//! conditional `UPDATE` decides which of several concurrent rotations wins.

use sqlx::sqlite::SqlitePool;

use crate::store::{RefreshEntry, RefreshStore, StoreResult};

#[derive(Clone)]
pub struct SqliteRefreshStore {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct RefreshRow {
    refresh_id: String,
    secret: String,
    user_id: i64,
    issued_at: i64,
    expires_at: i64,
    revoked: i32,
    replaced_by: Option<String>,
}

impl From<RefreshRow> for RefreshEntry {
    fn from(row: RefreshRow) -> Self {
        Self {
            refresh_id: row.refresh_id,
            secret: row.secret,
            user_id: row.user_id,
            issued_at: row.issued_at.max(0) as u64,
            expires_at: row.expires_at.max(0) as u64,
            revoked: row.revoked != 0,
            replaced_by: row.replaced_by,
        }
    }
}

const INSERT_ENTRY: &str = "INSERT INTO refresh_tokens (refresh_id, secret, user_id, issued_at, expires_at, revoked, replaced_by) VALUES (?, ?, ?, ?, ?, ?, ?)";

impl SqliteRefreshStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl RefreshStore for SqliteRefreshStore {
    async fn insert(&self, entry: &RefreshEntry) -> StoreResult<()> {
        sqlx::query(INSERT_ENTRY)
            .bind(&entry.refresh_id)
            .bind(&entry.secret)
            .bind(entry.user_id)
            .bind(entry.issued_at as i64)
            .bind(entry.expires_at as i64)
            .bind(entry.revoked as i32)
            .bind(entry.replaced_by.as_deref())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get(&self, refresh_id: &str) -> StoreResult<Option<RefreshEntry>> {
        let row: Option<RefreshRow> = sqlx::query_as(
            "SELECT refresh_id, secret, user_id, issued_at, expires_at, revoked, replaced_by FROM refresh_tokens WHERE refresh_id = ?",
        )
        .bind(refresh_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(RefreshEntry::from))
    }

    async fn revoke(&self, refresh_id: &str) -> StoreResult<bool> {
        let result = sqlx::query("UPDATE refresh_tokens SET revoked = 1 WHERE refresh_id = ?")
            .bind(refresh_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn rotate(&self, refresh_id: &str, successor: &RefreshEntry) -> StoreResult<bool> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            "UPDATE refresh_tokens SET revoked = 1, replaced_by = ? WHERE refresh_id = ? AND revoked = 0",
        )
        .bind(&successor.refresh_id)
        .bind(refresh_id)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query(INSERT_ENTRY)
            .bind(&successor.refresh_id)
            .bind(&successor.secret)
            .bind(successor.user_id)
            .bind(successor.issued_at as i64)
            .bind(successor.expires_at as i64)
            .bind(successor.revoked as i32)
            .bind(successor.replaced_by.as_deref())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn list_by_user(&self, user_id: i64, now: u64) -> StoreResult<Vec<RefreshEntry>> {
        let rows: Vec<RefreshRow> = sqlx::query_as(
            "SELECT refresh_id, secret, user_id, issued_at, expires_at, revoked, replaced_by FROM refresh_tokens WHERE user_id = ? AND revoked = 0 AND expires_at >= ? ORDER BY issued_at DESC",
        )
        .bind(user_id)
        .bind(now as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(RefreshEntry::from).collect())
    }
}
