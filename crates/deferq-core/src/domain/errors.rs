//! Errors - エラー型と分類
//!
//! # 分類
//! - **検証エラー**（`TaskError`, `CreateError`）: `create()` から呼び出し元へ伝播する
//! - **永続化エラー**（`StoreError`）: 呼び出し元に返るのはストアの構築時のみ。
//!   操作中の I/O / SQL 失敗は `Option::None` / `false` に変換され、ログに残るだけ
//! - **実行エラー**（`InvokeError`）: ターゲットのメソッドが返す失敗。
//!   `run()` の内部で完全に吸収され、試行回数の加算に変わる

use std::path::PathBuf;

use thiserror::Error;

/// Violations of the task model itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    #[error("task id cannot be empty")]
    EmptyIdentifier,
}

/// Validation failures raised synchronously by `TaskStore::create`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CreateError {
    #[error("target type '{0}' is not registered")]
    TargetNotFound(String),

    #[error("method '{method}' is not invocable on target '{type_name}'")]
    MethodNotFound { type_name: String, method: String },

    #[error(transparent)]
    Invalid(#[from] TaskError),
}

/// Storage-layer failures.
///
/// Only store construction (and `SqliteTaskStore::purge_completed`) returns
/// these to the caller. Inside `TaskStore` operations they are logged and
/// turned into `None` / `false` / an empty collection.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("path not found: {}", .0.display())]
    PathNotFound(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("encoding error: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("connection lock poisoned")]
    LockPoisoned,
}

/// A failed invocation of a target method.
///
/// `kind` は失敗の種類（例: `"decode"`, `"panic"`, ターゲット固有の名前）、
/// `message` は人間向けの説明。ログ行では `Error: <kind> - <message>` になる。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} - {message}")]
pub struct InvokeError {
    pub kind: String,
    pub message: String,
}

impl InvokeError {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::new("decode", message)
    }

    pub fn panic(message: impl Into<String>) -> Self {
        Self::new("panic", message)
    }

    pub fn method_missing(type_name: &str, method: &str) -> Self {
        Self::new(
            "method_not_found",
            format!("method '{method}' is not invocable on target '{type_name}'"),
        )
    }

    pub fn target_missing(type_name: &str) -> Self {
        Self::new(
            "target_not_found",
            format!("target type '{type_name}' is not registered"),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invoke_error_display_matches_log_format() {
        let err = InvokeError::new("timeout", "upstream did not answer");
        assert_eq!(err.to_string(), "timeout - upstream did not answer");
    }

    #[test]
    fn task_error_converts_into_create_error() {
        let err: CreateError = TaskError::EmptyIdentifier.into();
        assert_eq!(err, CreateError::Invalid(TaskError::EmptyIdentifier));
        assert_eq!(err.to_string(), "task id cannot be empty");
    }
}
