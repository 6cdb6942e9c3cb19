//! Task identifier.
//!
//! # バックエンドごとの ID 表現
//! - **FileTaskStore**: ULID（時刻 + ランダム）。文字列としてソートすると生成順になる
//! - **SqliteTaskStore**: INTEGER PRIMARY KEY を 10 進数で表現したもの
//!
//! どちらも `TaskId` という 1 つの newtype に収め、空文字列だけを拒否します。
//! 空の ID はデコード時（serde）にも拒否されるため、壊れたタスクファイルが
//! ストアの外に漏れることはありません。

use serde::{Deserialize, Serialize};
use std::fmt;
use ulid::Ulid;

use super::errors::TaskError;

/// Store-assigned identifier of a task. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TaskId(String);

impl TaskId {
    /// Build an id from its textual form.
    ///
    /// # Errors
    /// `TaskError::EmptyIdentifier` if `value` is empty or whitespace only.
    pub fn new(value: impl Into<String>) -> Result<Self, TaskError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(TaskError::EmptyIdentifier);
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Interpret the id as a relational row id.
    pub fn as_row_id(&self) -> Option<i64> {
        self.0.parse().ok()
    }
}

impl From<Ulid> for TaskId {
    fn from(ulid: Ulid) -> Self {
        Self(ulid.to_string())
    }
}

impl From<i64> for TaskId {
    fn from(row_id: i64) -> Self {
        Self(row_id.to_string())
    }
}

impl TryFrom<String> for TaskId {
    type Error = TaskError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TaskId> for String {
    fn from(id: TaskId) -> Self {
        id.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
