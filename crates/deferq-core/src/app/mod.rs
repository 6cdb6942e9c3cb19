//! App - アプリケーション層
//!
//! このモジュールは、ports を組み合わせてアプリケーションロジックを実装します。
//!
//! # 主要コンポーネント
//! - **AppBuilder**: registry の構築と起動時検証、設定からのストア構築
//! - **Runner**: ストアを駆動するループ（run-all / run-tag / run）
//! - **status**: 1 実行 = 1 行のステータス表示

pub mod builder;
pub mod runner;
pub mod status;

// 主要な型を再エクスポート
pub use self::builder::{App, AppBuilder, BuildError};
pub use self::runner::{RunOnce, Runner, Scope};
pub use self::status::{RunReport, TASK_NOT_FOUND, status_line};
