//! DynTarget - Target の型消去
//!
//! # 学習ポイント
//! - Object-safe trait (DynTarget)
//! - Type erasure パターン (TypedTarget<T> → DynTarget)
//! - PhantomData によるゼロサイズの型情報

use std::marker::PhantomData;

use super::target::Target;
use crate::domain::{InvokeError, Receiver, TargetRef};

/// DynTarget は object-safe な Target の抽象化
///
/// TypedTarget<T> を DynTarget に変換することで、
/// HashMap<String, Arc<dyn DynTarget>> に格納可能にします。
pub trait DynTarget: Send + Sync {
    fn type_name(&self) -> &str;

    /// `method` が `receiver` 経由で呼べるか（create 時の検証に使う）
    fn has_method(&self, receiver: Receiver, method: &str) -> bool;

    fn invoke(
        &self,
        target: &TargetRef,
        method: &str,
        args: &[serde_json::Value],
    ) -> Result<(), InvokeError>;
}

pub struct TypedTarget<T: Target> {
    _marker: PhantomData<T>,
}

impl<T: Target> TypedTarget<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T: Target> Default for TypedTarget<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Target> DynTarget for TypedTarget<T> {
    fn type_name(&self) -> &str {
        T::TYPE
    }

    fn has_method(&self, receiver: Receiver, method: &str) -> bool {
        let is_static = T::STATIC_METHODS.contains(&method);
        match receiver {
            Receiver::Type => is_static,
            Receiver::Instance => is_static || T::INSTANCE_METHODS.contains(&method),
        }
    }

    fn invoke(
        &self,
        target: &TargetRef,
        method: &str,
        args: &[serde_json::Value],
    ) -> Result<(), InvokeError> {
        if T::STATIC_METHODS.contains(&method) {
            return T::call_static(method, args);
        }

        match target {
            TargetRef::Instance { state, .. } if T::INSTANCE_METHODS.contains(&method) => {
                let receiver: T = serde_json::from_value(state.clone())
                    .map_err(|e| InvokeError::decode(format!("json decode: {e}")))?;
                receiver.call(method, args)
            }
            _ => Err(InvokeError::method_missing(T::TYPE, method)),
        }
    }
}
