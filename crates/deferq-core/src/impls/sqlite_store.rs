//! SqliteTaskStore - SQLite の 1 テーブルを正本とするタスクストア
//!
//! # 学習ポイント
//! - `Mutex<Connection>` で `Send + Sync` にする（rusqlite の Connection は `!Sync`）
//! - `BEGIN IMMEDIATE` + 条件付き UPDATE による行の claim
//! - busy timeout により、競合する書き込みはエラーではなく待機になる
//!
//! # 行のライフサイクル
//! ```text
//! run_at IS NULL        → 未実行（lookup に見える）
//! run_at = <timestamp>  → 成功済み（lookup から見えない。purge_completed で削除）
//! (行なし)              → remove された、または試行回数を使い切った
//! ```
//!
//! # 注意
//! 呼び出し中はコネクションのロックとトランザクションを保持しています。
//! ターゲットのメソッドから同じ `SqliteTaskStore` を呼ぶとデッドロックします。
//! 別のストア（別コネクション）を使ってください。

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, TransactionBehavior, params};

use crate::domain::{
    AttemptVerdict, CreateError, NewTask, RetryBudget, StoreError, Tag, TargetRef, Task,
    TaskCollection, TaskError, TaskId,
};
use crate::ports::{Clock, SystemClock, TaskStore};
use crate::typed::TargetRegistry;

const BUSY_TIMEOUT: Duration = Duration::from_secs(30);

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS scheduled_tasks (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    attempts     INTEGER NOT NULL DEFAULT 0,
    title        TEXT NOT NULL,
    tag          TEXT NOT NULL,
    instance     TEXT NULL,
    type_name    TEXT NULL,
    method       TEXT NOT NULL,
    args         TEXT NOT NULL,
    scheduled_at TEXT NOT NULL,
    run_at       TEXT NULL,
    CHECK ((instance IS NULL) <> (type_name IS NULL))
);
CREATE INDEX IF NOT EXISTS idx_scheduled_tasks_tag_run_at
    ON scheduled_tasks (tag, run_at);
";

const COLUMNS: &str = "id, attempts, title, tag, instance, type_name, method, args, scheduled_at";

pub struct SqliteTaskStore {
    conn: Mutex<Connection>,
    budget: RetryBudget,
    registry: Arc<TargetRegistry>,
    clock: Arc<dyn Clock>,
}

impl SqliteTaskStore {
    /// Open (or create) the database at `path` and ensure the table exists.
    pub fn open(
        path: impl AsRef<Path>,
        max_attempts: u32,
        registry: Arc<TargetRegistry>,
    ) -> Result<Self, StoreError> {
        Self::from_connection(Connection::open(path)?, max_attempts, registry)
    }

    pub fn open_in_memory(
        max_attempts: u32,
        registry: Arc<TargetRegistry>,
    ) -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?, max_attempts, registry)
    }

    pub fn from_connection(
        conn: Connection,
        max_attempts: u32,
        registry: Arc<TargetRegistry>,
    ) -> Result<Self, StoreError> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
            budget: RetryBudget::new(max_attempts),
            registry,
            clock: Arc::new(SystemClock),
        })
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Delete rows of tasks that already ran successfully. Returns how many.
    pub fn purge_completed(&self) -> Result<usize, StoreError> {
        let conn = self.lock()?;
        let purged = conn.execute("DELETE FROM scheduled_tasks WHERE run_at IS NOT NULL", [])?;
        tracing::debug!(purged, "completed tasks purged");
        Ok(purged)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }

    fn insert(&self, task: &Task) -> Result<i64, StoreError> {
        let (instance, type_name) = match task.target() {
            target @ TargetRef::Instance { .. } => (Some(serde_json::to_string(target)?), None),
            TargetRef::Type { type_name } => (None, Some(type_name.as_str())),
        };
        let args = serde_json::to_string(task.args())?;

        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO scheduled_tasks
                 (attempts, title, tag, instance, type_name, method, args, scheduled_at)
             VALUES (0, ?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                task.title().unwrap_or_default(),
                task.tag().as_str(),
                instance,
                type_name,
                task.method(),
                args,
                task.scheduled_at().to_rfc3339(),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Pending rows matching `filter` (appended to `WHERE run_at IS NULL`),
    /// ordered by id. Rows that do not decode are skipped.
    fn select(&self, filter: &str, params: impl rusqlite::Params) -> Result<Vec<Task>, StoreError> {
        let conn = self.lock()?;
        let sql =
            format!("SELECT {COLUMNS} FROM scheduled_tasks WHERE run_at IS NULL{filter} ORDER BY id");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params, StoredRow::from_row)?;

        let mut tasks = Vec::new();
        for row in rows {
            let row = row?;
            let id = row.id;
            match row.decode() {
                Ok(task) => tasks.push(task),
                Err(e) => tracing::warn!(row_id = id, error = %e, "undecodable task row skipped"),
            }
        }
        Ok(tasks)
    }

    fn collect(&self, filter: &str, params: impl rusqlite::Params) -> TaskCollection {
        match self.select(filter, params) {
            Ok(tasks) => tasks.into_iter().collect(),
            Err(e) => {
                tracing::warn!(error = %e, "task lookup failed");
                TaskCollection::new()
            }
        }
    }

    fn try_run(&self, task: &mut Task) -> Result<bool, StoreError> {
        let now = self.clock.now();
        if !task.is_due(now) {
            return Ok(false);
        }
        let Some(row_id) = task.id().as_row_id() else {
            return Ok(false);
        };

        let mut conn = self.lock()?;
        let mut tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        // 失敗時は claim だけを巻き戻し、attempts の更新は同じトランザクションで書く
        let mut claim = tx.savepoint()?;

        // claim: 競合する runner は上の BEGIN IMMEDIATE で待たされ、ここで 0 行になる
        let claimed = claim.execute(
            "UPDATE scheduled_tasks SET run_at = ?1 WHERE id = ?2 AND run_at IS NULL",
            params![now.to_rfc3339(), row_id],
        )?;
        if claimed == 0 {
            tracing::debug!(task_id = %task.id(), "task not claimed");
            return Ok(false);
        }

        let stored = claim
            .query_row(
                &format!("SELECT {COLUMNS} FROM scheduled_tasks WHERE id = ?1"),
                [row_id],
                StoredRow::from_row,
            )
            .optional()?;
        let Some(stored) = stored else {
            return Ok(false);
        };
        let stored = match stored.decode() {
            Ok(stored) => stored,
            Err(e) => {
                tracing::warn!(row_id, error = %e, "claimed task row is undecodable");
                return Ok(false);
            }
        };

        match self.registry.invoke(&stored) {
            Ok(()) => {
                claim.commit()?;
                tx.commit()?;
                task.set_attempts(stored.attempts());
                tracing::info!(task_id = %stored.id(), tag = %stored.tag(), "task succeeded");
                Ok(true)
            }
            Err(error) => {
                // ROLLBACK TO, then RELEASE
                claim.rollback()?;
                claim.commit()?;

                let verdict = self.budget.record_failure(stored.attempts());
                match verdict {
                    AttemptVerdict::Exhausted(attempts) => {
                        tx.execute("DELETE FROM scheduled_tasks WHERE id = ?1", [row_id])?;
                        tracing::warn!(
                            task_id = %stored.id(),
                            attempts,
                            error = %error,
                            "task dropped after exhausting its attempts"
                        );
                    }
                    AttemptVerdict::Retry(attempts) => {
                        tx.execute(
                            "UPDATE scheduled_tasks SET attempts = ?1 WHERE id = ?2",
                            params![attempts, row_id],
                        )?;
                        tracing::info!(task_id = %stored.id(), attempts, error = %error, "task failed");
                    }
                }
                tx.commit()?;
                task.set_attempts(verdict.attempts());
                Ok(false)
            }
        }
    }
}

impl TaskStore for SqliteTaskStore {
    fn create(&self, new_task: NewTask) -> Result<Option<Task>, CreateError> {
        self.registry.resolve(new_task.target(), new_task.method())?;

        // 本当の ID は INSERT 後に決まる
        let task = new_task.into_task(TaskId::from(0_i64), self.clock.now());
        match self.insert(&task) {
            Ok(row_id) => {
                let task = task.with_id(TaskId::from(row_id));
                tracing::debug!(task_id = %task.id(), tag = %task.tag(), "task stored");
                Ok(Some(task))
            }
            Err(e) => {
                tracing::warn!(error = %e, "cannot persist task");
                Ok(None)
            }
        }
    }

    fn get_by_id(&self, id: &TaskId) -> Option<Task> {
        let row_id = id.as_row_id()?;
        self.collect(" AND id = ?1", [row_id]).into_iter().next()
    }

    fn get_by_tag(&self, tag: &str) -> TaskCollection {
        let tag = Tag::new(tag);
        self.collect(" AND tag = ?1", [tag.as_str()])
    }

    fn get_all(&self) -> TaskCollection {
        self.collect("", [])
    }

    fn remove(&self, task: &Task) -> bool {
        let Some(row_id) = task.id().as_row_id() else {
            return false;
        };
        let deleted = self.lock().and_then(|conn| {
            Ok(conn.execute("DELETE FROM scheduled_tasks WHERE id = ?1", [row_id])?)
        });
        match deleted {
            Ok(n) => n > 0,
            Err(e) => {
                tracing::warn!(row_id, error = %e, "cannot remove task");
                false
            }
        }
    }

    fn run(&self, task: &mut Task) -> bool {
        self.try_run(task).unwrap_or_else(|e| {
            tracing::warn!(task_id = %task.id(), error = %e, "task run aborted by storage error");
            false
        })
    }

    fn max_attempts(&self) -> u32 {
        self.budget.max_attempts()
    }
}

/// Raw column values of one row, decoded outside of rusqlite.
struct StoredRow {
    id: i64,
    attempts: i64,
    title: String,
    tag: String,
    instance: Option<String>,
    type_name: Option<String>,
    method: String,
    args: String,
    scheduled_at: String,
}

#[derive(Debug, thiserror::Error)]
enum RowError {
    #[error("malformed JSON column: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed timestamp: {0}")]
    Timestamp(#[from] chrono::ParseError),

    #[error(transparent)]
    Task(#[from] TaskError),

    #[error("row has neither an instance nor a type name")]
    NoTarget,
}

impl StoredRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            attempts: row.get(1)?,
            title: row.get(2)?,
            tag: row.get(3)?,
            instance: row.get(4)?,
            type_name: row.get(5)?,
            method: row.get(6)?,
            args: row.get(7)?,
            scheduled_at: row.get(8)?,
        })
    }

    fn decode(self) -> Result<Task, RowError> {
        let target = match (self.instance, self.type_name) {
            (Some(instance), _) => serde_json::from_str::<TargetRef>(&instance)?,
            (None, Some(type_name)) => TargetRef::named(type_name),
            (None, None) => return Err(RowError::NoTarget),
        };
        let scheduled_at = DateTime::parse_from_rfc3339(&self.scheduled_at)?.with_timezone(&Utc);

        let mut task = Task::new(
            self.id.to_string(),
            self.title,
            &self.tag,
            target,
            self.method,
            serde_json::from_str(&self.args)?,
            scheduled_at,
        )?;
        task.set_attempts(u32::try_from(self.attempts).unwrap_or(0));
        Ok(task)
    }
}
