//! TargetRegistry - Target の登録と解決
//!
//! # 学習ポイント
//! - HashMap での型消去された trait object の管理
//! - Generic methods での登録と型安全性
//! - Arc による共有所有権（両バックエンドが同じ registry を共有する）
//! - `catch_unwind` による panic の封じ込め

use std::any::Any;
use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use super::handler::{DynTarget, TypedTarget};
use super::target::Target;
use crate::domain::{CreateError, InvokeError, Task, TargetRef};

/// TargetRegistry は type_name → DynTarget を管理
///
/// # 使用例
/// ```ignore
/// let mut registry = TargetRegistry::new();
/// registry.register::<Mailer>()?;
///
/// // create 時の検証
/// registry.resolve(&TargetRef::of_type::<Mailer>(), "send")?;
/// ```
///
/// # 設計
/// - 初期化時に構築（mutable）
/// - 実行時は `Arc<TargetRegistry>` として共有（immutable、ロック不要）
#[derive(Default)]
pub struct TargetRegistry {
    targets: HashMap<String, Arc<dyn DynTarget>>,
}

/// RegistryError は TargetRegistry の操作エラー
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Target type '{0}' is already registered")]
    AlreadyRegistered(String),
}

impl TargetRegistry {
    pub fn new() -> Self {
        Self {
            targets: HashMap::new(),
        }
    }

    pub fn register<T: Target>(&mut self) -> Result<(), RegistryError> {
        let type_name = T::TYPE.to_string();
        if self.targets.contains_key(&type_name) {
            return Err(RegistryError::AlreadyRegistered(type_name));
        }
        self.targets
            .insert(type_name, Arc::new(TypedTarget::<T>::new()));
        Ok(())
    }

    pub fn get(&self, type_name: &str) -> Option<Arc<dyn DynTarget>> {
        self.targets.get(type_name).cloned()
    }

    /// Registered type names, sorted.
    pub fn registered_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.targets.keys().cloned().collect();
        types.sort();
        types
    }

    /// Check that `method` is invocable on `target`.
    ///
    /// # Errors
    /// - `CreateError::TargetNotFound` if the type is not registered
    /// - `CreateError::MethodNotFound` if the method is unknown, or is an
    ///   instance method requested on a type reference
    pub fn resolve(&self, target: &TargetRef, method: &str) -> Result<(), CreateError> {
        let type_name = target.type_name();
        let handler = self
            .get(type_name)
            .ok_or_else(|| CreateError::TargetNotFound(type_name.to_string()))?;

        if !handler.has_method(target.receiver(), method) {
            return Err(CreateError::MethodNotFound {
                type_name: type_name.to_string(),
                method: method.to_string(),
            });
        }
        Ok(())
    }

    /// Invoke the task's method. Panics are caught and reported as
    /// `InvokeError` of kind `"panic"`.
    pub fn invoke(&self, task: &Task) -> Result<(), InvokeError> {
        let type_name = task.target().type_name();
        let handler = self
            .get(type_name)
            .ok_or_else(|| InvokeError::target_missing(type_name))?;

        catch_unwind(AssertUnwindSafe(|| {
            handler.invoke(task.target(), task.method(), task.args())
        }))
        .unwrap_or_else(|payload| Err(InvokeError::panic(panic_message(payload.as_ref()))))
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
