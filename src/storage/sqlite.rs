//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::model::RecipeResponse;
use crate::retry::StatusUpdate;
use crate::state::{TargetKind, TargetStatus};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageResult};
use crate::storage::{PersistOutcome, RunRecord, RunStatus, TargetRecord};
use crate::HarvestError;
use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(HarvestError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, HarvestError> {
        let conn = Connection::open(path)?;

        // Configure SQLite for better performance
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> Result<Self, HarvestError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

/// Columns selected for a TargetRecord, in `map_target_row` order
const TARGET_COLUMNS: &str = "kind, target_id, payload, status, http_status, error_text, \
     retry_count, last_checked, next_eligible";

/// Maps a row of TARGET_COLUMNS into a TargetRecord
fn map_target_row(row: &Row<'_>) -> rusqlite::Result<TargetRecord> {
    let kind_str: String = row.get(0)?;
    let status_str: String = row.get(3)?;

    Ok(TargetRecord {
        kind: TargetKind::from_db_string(&kind_str).unwrap_or(TargetKind::Recipe),
        target_id: row.get(1)?,
        payload: row.get(2)?,
        status: TargetStatus::from_db_string(&status_str).unwrap_or(TargetStatus::Pending),
        http_status: row.get(4)?,
        error_text: row.get(5)?,
        retry_count: row.get(6)?,
        last_checked: parse_timestamp(row.get::<_, Option<String>>(7)?),
        next_eligible: parse_timestamp(row.get::<_, Option<String>>(8)?),
    })
}

fn parse_timestamp(value: Option<String>) -> Option<DateTime<Utc>> {
    value
        .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

impl Storage for SqliteStorage {
    // ===== Run Management =====

    fn create_run(&mut self, kind: TargetKind, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (started_at, kind, config_hash, status) VALUES (?1, ?2, ?3, ?4)",
            params![
                now,
                kind.to_db_string(),
                config_hash,
                RunStatus::Running.to_db_string()
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_latest_run(&self, kind: TargetKind) -> StorageResult<Option<RunRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, started_at, finished_at, kind, config_hash, status
             FROM runs WHERE kind = ?1 ORDER BY id DESC LIMIT 1",
        )?;

        let run = stmt
            .query_row(params![kind.to_db_string()], |row| {
                let kind_str: String = row.get(3)?;
                Ok(RunRecord {
                    id: row.get(0)?,
                    started_at: row.get(1)?,
                    finished_at: row.get(2)?,
                    kind: TargetKind::from_db_string(&kind_str).unwrap_or(TargetKind::Recipe),
                    config_hash: row.get(4)?,
                    status: RunStatus::from_db_string(&row.get::<_, String>(5)?)
                        .unwrap_or(RunStatus::Running),
                })
            })
            .optional()?;

        Ok(run)
    }

    fn update_run_status(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()> {
        self.conn.execute(
            "UPDATE runs SET status = ?1 WHERE id = ?2",
            params![status.to_db_string(), run_id],
        )?;
        Ok(())
    }

    fn complete_run(&mut self, run_id: i64) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2 WHERE id = ?3",
            params![RunStatus::Completed.to_db_string(), now, run_id],
        )?;
        Ok(())
    }

    // ===== Target Bookkeeping =====

    fn insert_pending_targets(
        &mut self,
        kind: TargetKind,
        targets: &[(i64, Option<String>)],
    ) -> StorageResult<usize> {
        let tx = self.conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO targets (kind, target_id, payload, status)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for (target_id, payload) in targets {
                inserted += stmt.execute(params![
                    kind.to_db_string(),
                    target_id,
                    payload,
                    TargetStatus::Pending.to_db_string()
                ])?;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    fn get_target(&self, kind: TargetKind, target_id: i64) -> StorageResult<Option<TargetRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM targets WHERE kind = ?1 AND target_id = ?2",
            TARGET_COLUMNS
        ))?;

        let record = stmt
            .query_row(params![kind.to_db_string(), target_id], map_target_row)
            .optional()?;

        Ok(record)
    }

    fn get_targets_in_range(
        &self,
        kind: TargetKind,
        low: i64,
        high: i64,
    ) -> StorageResult<Vec<TargetRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM targets
             WHERE kind = ?1 AND target_id BETWEEN ?2 AND ?3
             ORDER BY target_id ASC",
            TARGET_COLUMNS
        ))?;

        let records = stmt
            .query_map(params![kind.to_db_string(), low, high], map_target_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(records)
    }

    fn claim_targets(
        &mut self,
        kind: TargetKind,
        target_ids: &[i64],
        now: DateTime<Utc>,
    ) -> StorageResult<()> {
        let now_str = now.to_rfc3339();
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "UPDATE targets SET status = ?1, last_checked = ?2
                 WHERE kind = ?3 AND target_id = ?4",
            )?;
            for target_id in target_ids {
                stmt.execute(params![
                    TargetStatus::InFlight.to_db_string(),
                    now_str,
                    kind.to_db_string(),
                    target_id
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn apply_update(
        &mut self,
        kind: TargetKind,
        target_id: i64,
        update: &StatusUpdate,
        now: DateTime<Utc>,
    ) -> StorageResult<()> {
        // Single statement so the status/retry read-modify-write is atomic
        self.conn.execute(
            "UPDATE targets
             SET status = ?1,
                 retry_count = retry_count + ?2,
                 http_status = ?3,
                 error_text = ?4,
                 last_checked = ?5,
                 next_eligible = ?6
             WHERE kind = ?7 AND target_id = ?8",
            params![
                update.status.to_db_string(),
                update.retry_increment,
                update.http_status,
                update.error_text,
                now.to_rfc3339(),
                update.next_eligible.map(|t| t.to_rfc3339()),
                kind.to_db_string(),
                target_id
            ],
        )?;
        Ok(())
    }

    fn reconcile_stale_in_flight(
        &mut self,
        kind: TargetKind,
        grace: Duration,
        now: DateTime<Utc>,
    ) -> StorageResult<usize> {
        let cutoff = (now - grace).to_rfc3339();
        let reset = self.conn.execute(
            "UPDATE targets SET status = ?1
             WHERE kind = ?2 AND status = ?3
               AND (last_checked IS NULL OR last_checked <= ?4)",
            params![
                TargetStatus::Pending.to_db_string(),
                kind.to_db_string(),
                TargetStatus::InFlight.to_db_string(),
                cutoff
            ],
        )?;
        Ok(reset)
    }

    fn reset_failed_targets(
        &mut self,
        kind: TargetKind,
        start_id: Option<i64>,
        end_id: Option<i64>,
    ) -> StorageResult<usize> {
        let reset = self.conn.execute(
            "UPDATE targets
             SET status = ?1, retry_count = 0, next_eligible = NULL, error_text = NULL
             WHERE kind = ?2
               AND status IN (?3, ?4)
               AND (?5 IS NULL OR target_id >= ?5)
               AND (?6 IS NULL OR target_id <= ?6)",
            params![
                TargetStatus::Pending.to_db_string(),
                kind.to_db_string(),
                TargetStatus::RetryPending.to_db_string(),
                TargetStatus::PermanentlyFailed.to_db_string(),
                start_id,
                end_id
            ],
        )?;
        Ok(reset)
    }

    fn max_target_id(&self, kind: TargetKind) -> StorageResult<Option<i64>> {
        let max: Option<i64> = self.conn.query_row(
            "SELECT MAX(target_id) FROM targets WHERE kind = ?1",
            params![kind.to_db_string()],
            |row| row.get(0),
        )?;
        Ok(max)
    }

    fn min_unsettled_target_id(&self, kind: TargetKind) -> StorageResult<Option<i64>> {
        let min: Option<i64> = self.conn.query_row(
            "SELECT MIN(target_id) FROM targets
             WHERE kind = ?1 AND status NOT IN (?2, ?3)",
            params![
                kind.to_db_string(),
                TargetStatus::Succeeded.to_db_string(),
                TargetStatus::PermanentlyFailed.to_db_string()
            ],
            |row| row.get(0),
        )?;
        Ok(min)
    }

    // ===== URL Check Selection =====

    fn backfill_url_targets(
        &mut self,
        start_id: Option<i64>,
        end_id: Option<i64>,
    ) -> StorageResult<usize> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO targets (kind, target_id, payload, status)
             SELECT ?1, r.id, r.source_url, ?2
             FROM recipes r
             WHERE r.source_url IS NOT NULL AND r.source_url <> ''
               AND (?3 IS NULL OR r.id >= ?3)
               AND (?4 IS NULL OR r.id <= ?4)",
            params![
                TargetKind::SourceUrl.to_db_string(),
                TargetStatus::Pending.to_db_string(),
                start_id,
                end_id
            ],
        )?;
        Ok(inserted)
    }

    fn select_url_batch(
        &self,
        start_id: Option<i64>,
        end_id: Option<i64>,
        check_all: bool,
        max_attempts: u32,
        limit: usize,
        now: DateTime<Utc>,
    ) -> StorageResult<Vec<TargetRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM targets
             WHERE kind = ?1
               AND (next_eligible IS NULL OR next_eligible <= ?2)
               AND retry_count < ?3
               AND (status IN (?4, ?5) OR (?6 = 1 AND status = ?7))
               AND (?8 IS NULL OR target_id >= ?8)
               AND (?9 IS NULL OR target_id <= ?9)
             ORDER BY CASE WHEN retry_count = 0 THEN 0 ELSE 1 END,
                      last_checked ASC
             LIMIT ?10",
            TARGET_COLUMNS
        ))?;

        let records = stmt
            .query_map(
                params![
                    TargetKind::SourceUrl.to_db_string(),
                    now.to_rfc3339(),
                    max_attempts,
                    TargetStatus::Pending.to_db_string(),
                    TargetStatus::RetryPending.to_db_string(),
                    check_all as i64,
                    TargetStatus::Succeeded.to_db_string(),
                    start_id,
                    end_id,
                    limit as i64
                ],
                map_target_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(records)
    }

    // ===== Derived Entity Persistence =====

    fn persist_recipe(
        &mut self,
        target_id: i64,
        raw_json: &str,
        recipe: &RecipeResponse,
        now: DateTime<Utc>,
    ) -> StorageResult<PersistOutcome> {
        let now_str = now.to_rfc3339();
        let tx = self.conn.transaction()?;

        // The recipe primary key doubles as the duplicate guard: zero rows
        // changed means a concurrent run committed this target first.
        let inserted = tx.execute(
            "INSERT OR IGNORE INTO recipes (
                id, title, image_url, ready_in_minutes, servings, source_url,
                vegetarian, vegan, gluten_free, very_popular,
                preparation_minutes, cooking_minutes, aggregate_likes,
                instructions, fetched_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                recipe.id,
                recipe.title,
                recipe.image,
                recipe.ready_in_minutes,
                recipe.servings,
                recipe.source_url,
                recipe.vegetarian,
                recipe.vegan,
                recipe.gluten_free,
                recipe.very_popular,
                recipe.preparation_minutes,
                recipe.cooking_minutes,
                recipe.aggregate_likes,
                recipe.instructions,
                now_str
            ],
        )?;

        if inserted == 0 {
            // Dropping the transaction rolls back; nothing was written
            return Ok(PersistOutcome::Conflict);
        }

        tx.execute(
            "INSERT INTO raw_responses (target_id, fetched_at, raw_json) VALUES (?1, ?2, ?3)",
            params![target_id, now_str, raw_json],
        )?;

        for ingredient in &recipe.extended_ingredients {
            tx.execute(
                "INSERT INTO recipe_ingredients (
                    recipe_id, ingredient_id, name, name_clean,
                    original, original_name, amount, unit
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    recipe.id,
                    ingredient.id,
                    ingredient.name,
                    ingredient.name_clean,
                    ingredient.original,
                    ingredient.original_name,
                    ingredient.amount,
                    ingredient.unit
                ],
            )?;
        }

        for cuisine in &recipe.cuisines {
            tx.execute(
                "INSERT OR IGNORE INTO cuisines (name) VALUES (?1)",
                params![cuisine],
            )?;
            let cuisine_id: i64 = tx.query_row(
                "SELECT id FROM cuisines WHERE name = ?1",
                params![cuisine],
                |row| row.get(0),
            )?;
            tx.execute(
                "INSERT OR IGNORE INTO recipe_cuisines (recipe_id, cuisine_id) VALUES (?1, ?2)",
                params![recipe.id, cuisine_id],
            )?;
        }

        for dish_type in &recipe.dish_types {
            tx.execute(
                "INSERT OR IGNORE INTO dish_types (name) VALUES (?1)",
                params![dish_type],
            )?;
            let dish_type_id: i64 = tx.query_row(
                "SELECT id FROM dish_types WHERE name = ?1",
                params![dish_type],
                |row| row.get(0),
            )?;
            tx.execute(
                "INSERT OR IGNORE INTO recipe_dish_types (recipe_id, dish_type_id) VALUES (?1, ?2)",
                params![recipe.id, dish_type_id],
            )?;
        }

        tx.commit()?;
        Ok(PersistOutcome::Inserted)
    }

    fn mark_image_downloaded(&mut self, recipe_id: i64, file_ext: &str) -> StorageResult<()> {
        self.conn.execute(
            "UPDATE recipes SET image_downloaded = 1, image_file_type = ?1 WHERE id = ?2",
            params![file_ext, recipe_id],
        )?;
        Ok(())
    }

    // ===== Statistics =====

    fn count_targets_by_status(
        &self,
        kind: TargetKind,
        status: TargetStatus,
    ) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM targets WHERE kind = ?1 AND status = ?2",
            params![kind.to_db_string(), status.to_db_string()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn count_targets(&self, kind: TargetKind) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM targets WHERE kind = ?1",
            params![kind.to_db_string()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn count_raw_responses(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM raw_responses", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_recipes(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM recipes", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}
