//! Impls - TaskStore の実装
//!
//! # 含まれる実装
//! - **FileTaskStore**: タグごとのディレクトリに 1 タスク 1 ファイル
//! - **SqliteTaskStore**: `scheduled_tasks` テーブル 1 つ
//!
//! どちらも同じ `TaskStore` 契約を満たし、同じ `TargetRegistry` を共有できます。

pub mod file_store;
pub mod sqlite_store;

// 主要な型を再エクスポート
pub use self::file_store::FileTaskStore;
pub use self::sqlite_store::SqliteTaskStore;
