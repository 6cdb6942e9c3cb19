//! AppBuilder - アプリケーションの構築とワイヤリング
//!
//! # 学習ポイント
//! - Builder パターンの実装
//! - 起動時検証（Fail-fast 設計）
//! - バックエンドの明示的な選択（設定から構築して注入する）

use std::sync::Arc;

use crate::config::{BackendConfig, StoreConfig};
use crate::domain::StoreError;
use crate::impls::{FileTaskStore, SqliteTaskStore};
use crate::ports::TaskStore;
use crate::typed::{RegistryError, Target, TargetRegistry};

/// AppBuilder はアプリケーションを構築
///
/// # 使用例
/// ```ignore
/// let app = AppBuilder::new()
///     .register::<Mailer>()?
///     .expect_targets(&["shop.mailer.v1"])
///     .build()?;
/// let store = app.open_store(&config)?;
/// ```
///
/// # Fail-fast 設計
/// - expect_targets() で期待される type_name を登録
/// - build() 時に「期待集合 ⊆ 登録済み集合」をチェック
/// - 不足があれば BuildError を返す
pub struct AppBuilder {
    registry: TargetRegistry,
    expected_targets: Option<Vec<String>>,
}

/// BuildError はアプリケーション構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Missing target types: {0:?}. These targets were expected but not registered.")]
    MissingTargetTypes(Vec<String>),
}

impl AppBuilder {
    pub fn new() -> Self {
        Self {
            registry: TargetRegistry::new(),
            expected_targets: None,
        }
    }

    /// Target を登録
    pub fn register<T: Target>(mut self) -> Result<Self, RegistryError> {
        self.registry.register::<T>()?;
        Ok(self)
    }

    pub fn expect_targets(mut self, type_names: &[&str]) -> Self {
        self.expected_targets = Some(type_names.iter().map(|t| t.to_string()).collect());
        self
    }

    /// # 検証
    /// - expect_targets() で設定された type_name が全て登録されているかチェック
    /// - 不足があれば BuildError::MissingTargetTypes を返す
    pub fn build(self) -> Result<App, BuildError> {
        if let Some(expected) = &self.expected_targets {
            let registered = self.registry.registered_types();
            let missing: Vec<String> = expected
                .iter()
                .filter(|t| !registered.contains(t))
                .cloned()
                .collect();
            if !missing.is_empty() {
                return Err(BuildError::MissingTargetTypes(missing));
            }
        }
        Ok(App {
            registry: Arc::new(self.registry),
        })
    }
}

impl Default for AppBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// App は検証済みの registry を保持し、設定からストアを組み立てる
pub struct App {
    pub registry: Arc<TargetRegistry>,
}

impl App {
    /// Construct the backend named by `config`. Both backends share this
    /// app's registry.
    pub fn open_store(&self, config: &StoreConfig) -> Result<Arc<dyn TaskStore>, StoreError> {
        let registry = Arc::clone(&self.registry);
        let store: Arc<dyn TaskStore> = match &config.backend {
            BackendConfig::Files { path } => {
                Arc::new(FileTaskStore::open(path, config.max_attempts, registry)?)
            }
            BackendConfig::Sqlite { path } => {
                Arc::new(SqliteTaskStore::open(path, config.max_attempts, registry)?)
            }
        };
        tracing::debug!(backend = ?config.backend, "task store opened");
        Ok(store)
    }
}
