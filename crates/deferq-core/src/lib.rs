//! deferq-core
//!
//! Persisted deferred tasks: create now, run later, retry on failure.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, tag, target, task, collection, retry, errors）
//! - **typed**: 型付きターゲット API（Target trait, DynTarget, TargetRegistry）
//! - **ports**: 抽象化レイヤー（TaskStore, Clock, IdGenerator）
//! - **impls**: TaskStore の実装（FileTaskStore, SqliteTaskStore）
//! - **app**: アプリケーション層（AppBuilder, Runner, status）
//! - **config**: TOML 設定（StoreConfig）
//!
//! # 使用例
//! ```ignore
//! let app = AppBuilder::new().register::<Mailer>()?.build()?;
//! let store = app.open_store(&StoreConfig::from_file(path)?)?;
//!
//! store.create(NewTask::instance(&mailer, "send")?.arg("bob@example.com"))?;
//!
//! let runner = Runner::new(store, config.interval());
//! runner.run_forever(Scope::All, shutdown_rx).await;
//! ```

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod ports;
pub mod typed;

pub use app::{App, AppBuilder, RunOnce, RunReport, Runner, Scope};
pub use config::{BackendConfig, StoreConfig};
pub use domain::{CreateError, InvokeError, NewTask, StoreError, Task, TaskCollection, TaskId};
pub use ports::TaskStore;
pub use typed::{Target, TargetRegistry};
