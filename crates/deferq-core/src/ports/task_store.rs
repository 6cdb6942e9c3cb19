//! TaskStore port - 両バックエンドが実装するストレージ契約
//!
//! TaskStore は以下を管理します：
//! - タスクの作成（検証 + ID 割り当て + 永続化）
//! - 未実行タスクの検索（ID / タグ / 全件）
//! - 実行（期限チェック → claim → 呼び出し → 試行回数の記録 → 削除）
//!
//! # 実装
//! - `impls::FileTaskStore`: タグごとのディレクトリ + `.task` ファイル
//! - `impls::SqliteTaskStore`: 1 テーブル + トランザクションによる行の claim

use crate::domain::{CreateError, NewTask, Task, TaskCollection, TaskId};

/// TaskStore はタスクの永続化とライフサイクルの正本（source of truth）
///
/// # 設計原則
/// - 検証エラーだけが `Err` として呼び出し元に返る
/// - 永続化の失敗は `None` / `false` になり、`tracing` の warn として残る
/// - 実行時の失敗（`InvokeError`）は `run()` の中で吸収される
/// - `run()` は同期的。呼び出し中はブロックする（タイムアウトなし）
pub trait TaskStore: Send + Sync {
    /// Validate, assign an id and persist.
    ///
    /// Returns `Ok(None)` when the task could not be persisted.
    fn create(&self, new_task: NewTask) -> Result<Option<Task>, CreateError>;

    /// The task, if it is still pending.
    fn get_by_id(&self, id: &TaskId) -> Option<Task>;

    /// Pending tasks whose tag equals the normalized `tag`, in creation order.
    fn get_by_tag(&self, tag: &str) -> TaskCollection;

    /// All pending tasks, in creation order.
    fn get_all(&self) -> TaskCollection;

    /// `true` iff a stored record was deleted.
    fn remove(&self, task: &Task) -> bool;

    /// Try to execute `task`. `true` only when the invocation succeeded.
    ///
    /// A task that is not yet due is left untouched. On failure the task's
    /// attempt counter is updated in place with the persisted value.
    fn run(&self, task: &mut Task) -> bool;

    fn max_attempts(&self) -> u32;
}
