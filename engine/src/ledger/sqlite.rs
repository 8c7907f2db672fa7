use std::str::FromStr;

use async_trait::async_trait;
use follower_blocker_common::UserId;
use log::{debug, info};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Row, SqlitePool,
};

use crate::{settings::SqliteSettingsStore, LedgerError};

use super::{
    record_parent, validate_run, AttemptOutcome, BlockLedger, BlockLedgerConfig, BlockRecord,
    PendingItem, RunInfo,
};

const RECORD_COLUMNS: &str = "user_id, user_name, parent_id, reason, block_date";

#[derive(Debug, Clone)]
pub struct SqliteBlockLedgerConfig {
    connection_string: String,
}

impl SqliteBlockLedgerConfig {
    pub fn new(connection_string: String) -> Self {
        Self { connection_string }
    }

    pub fn from_path(path: &str) -> Self {
        Self::new(format!("sqlite://{path}"))
    }

    pub fn in_memory() -> Self {
        Self::new("sqlite::memory:".to_owned())
    }
}

#[async_trait]
impl BlockLedgerConfig for SqliteBlockLedgerConfig {
    type BlockLedger = SqliteBlockLedger;

    async fn create_ledger(self) -> Result<Self::BlockLedger, LedgerError> {
        let options =
            SqliteConnectOptions::from_str(&self.connection_string)?.create_if_missing(true);
        // one connection: a single writer, and `sqlite::memory:` stays one database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        sqlx::migrate!("database/migrations").run(&pool).await?;
        info!("Opened block ledger at '{}'", self.connection_string);

        Ok(SqliteBlockLedger { pool })
    }
}

#[derive(Debug, Clone)]
pub struct SqliteBlockLedger {
    pool: SqlitePool,
}

impl SqliteBlockLedger {
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Settings live in the same database as the ledger.
    pub fn settings(&self) -> SqliteSettingsStore {
        SqliteSettingsStore::new(self.pool.clone())
    }
}

fn user_id(row: &SqliteRow, column: &str) -> Result<UserId, sqlx::Error> {
    row.try_get::<i64, _>(column).map(UserId::new)
}

fn block_record(row: SqliteRow) -> Result<BlockRecord, sqlx::Error> {
    Ok(BlockRecord {
        user_id: user_id(&row, "user_id")?,
        display_name: row.try_get("user_name")?,
        parent_id: row.try_get::<Option<i64>, _>("parent_id")?.map(UserId::new),
        reason: row.try_get("reason")?,
        blocked_at: row.try_get("block_date")?,
    })
}

fn pending_item(row: SqliteRow) -> Result<PendingItem, sqlx::Error> {
    Ok(PendingItem {
        user_id: user_id(&row, "user_id")?,
        parent_id: user_id(&row, "parent_id")?,
        reason: row.try_get("reason")?,
    })
}

fn count(value: i64) -> u64 {
    u64::try_from(value).unwrap_or_default()
}

#[async_trait]
impl BlockLedger for SqliteBlockLedger {
    async fn begin_run(
        &mut self,
        target_id: UserId,
        member_ids: &[UserId],
        reason: &str,
    ) -> Result<(), LedgerError> {
        validate_run(target_id, member_ids)?;

        let mut tx = self.pool.begin().await?;
        let discarded = sqlx::query("DELETE FROM current_block_run")
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if discarded > 0 {
            info!("Discarding {discarded} pending items of the previous run");
        }

        for member_id in member_ids.iter().chain(std::iter::once(&target_id)) {
            sqlx::query(
                "INSERT INTO current_block_run (user_id, parent_id, reason) VALUES (?, ?, ?)
                ON CONFLICT(user_id, parent_id) DO UPDATE SET reason = excluded.reason",
            )
            .bind(member_id.value())
            .bind(target_id.value())
            .bind(reason)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        debug!(
            "Seeded run for {target_id} with {} members",
            member_ids.len()
        );
        Ok(())
    }

    async fn record_block_attempt(
        &mut self,
        item: &PendingItem,
        outcome: AttemptOutcome,
    ) -> Result<(), LedgerError> {
        let mut tx = self.pool.begin().await?;

        if let AttemptOutcome::Blocked { user, date } = outcome {
            let parent_id = record_parent(user.id, item.parent_id).map(|id| id.value());
            // parent_id is nullable, so the key is matched with IS rather than ON CONFLICT
            let updated = sqlx::query(
                "UPDATE blocked_users SET user_name = ? WHERE user_id = ? AND parent_id IS ?",
            )
            .bind(&user.display_name)
            .bind(user.id.value())
            .bind(parent_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

            if updated == 0 {
                sqlx::query(
                    "INSERT INTO blocked_users (user_id, user_name, parent_id, reason, block_date)
                    VALUES (?, ?, ?, ?, ?)",
                )
                .bind(user.id.value())
                .bind(&user.display_name)
                .bind(parent_id)
                .bind(&item.reason)
                .bind(date)
                .execute(&mut *tx)
                .await?;
            }
        }

        sqlx::query("DELETE FROM current_block_run WHERE user_id = ? AND parent_id = ?")
            .bind(item.user_id.value())
            .bind(item.parent_id.value())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn pending_items(&self) -> Result<Vec<PendingItem>, LedgerError> {
        let rows =
            sqlx::query("SELECT user_id, parent_id, reason FROM current_block_run ORDER BY rowid")
                .fetch_all(&self.pool)
                .await?;

        Ok(rows
            .into_iter()
            .map(pending_item)
            .collect::<Result<Vec<_>, _>>()?)
    }

    async fn active_run_target(&self) -> Result<Option<UserId>, LedgerError> {
        let parents: Vec<UserId> =
            sqlx::query_scalar::<_, i64>("SELECT DISTINCT parent_id FROM current_block_run")
                .fetch_all(&self.pool)
                .await?
                .into_iter()
                .map(UserId::new)
                .collect();

        match parents.len() {
            0 => Ok(None),
            1 => Ok(Some(parents[0])),
            _ => Err(LedgerError::MultipleActiveRuns(parents)),
        }
    }

    async fn completed_count(&self) -> Result<u64, LedgerError> {
        let blocked: i64 = sqlx::query_scalar("SELECT COUNT(DISTINCT user_id) FROM blocked_users")
            .fetch_one(&self.pool)
            .await?;
        Ok(count(blocked))
    }

    async fn find_block_record(
        &self,
        user_id: UserId,
        parent_id: Option<UserId>,
    ) -> Result<Option<BlockRecord>, LedgerError> {
        let row = sqlx::query(&format!(
            "SELECT {RECORD_COLUMNS} FROM blocked_users WHERE user_id = ? AND parent_id IS ?"
        ))
        .bind(user_id.value())
        .bind(parent_id.map(|id| id.value()))
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(block_record).transpose()?)
    }

    async fn blocked_user(&self, user_id: UserId) -> Result<Option<BlockRecord>, LedgerError> {
        let row = sqlx::query(&format!(
            "SELECT {RECORD_COLUMNS} FROM blocked_users WHERE user_id = ?
            ORDER BY block_date LIMIT 1"
        ))
        .bind(user_id.value())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(block_record).transpose()?)
    }

    async fn blocked_for_target(&self, target_id: UserId) -> Result<u64, LedgerError> {
        let blocked: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM blocked_users
            WHERE parent_id = ? OR (user_id = ? AND parent_id IS NULL)",
        )
        .bind(target_id.value())
        .bind(target_id.value())
        .fetch_one(&self.pool)
        .await?;
        Ok(count(blocked))
    }

    async fn last_run_info(&self) -> Result<RunInfo, LedgerError> {
        let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM current_block_run")
            .fetch_one(&self.pool)
            .await?;
        let reason: Option<String> =
            sqlx::query_scalar("SELECT reason FROM current_block_run ORDER BY rowid LIMIT 1")
                .fetch_optional(&self.pool)
                .await?;

        Ok(RunInfo {
            remaining: count(remaining),
            reason,
        })
    }

    async fn close(self) -> Result<(), LedgerError> {
        self.pool.close().await;
        debug!("Closed block ledger");
        Ok(())
    }
}
