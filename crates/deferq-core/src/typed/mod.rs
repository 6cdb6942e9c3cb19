//! Typed - 型付きターゲット API
//!
//! このモジュールは永続化された `type_name` / メソッド名を
//! Rust の型に対応付け、create 時に存在確認を行います。
//!
//! # 二層構造
//! - **表層（Typed）**: `Target` trait - 型安全
//! - **内部（Dyn）**: `DynTarget` trait - object-safe, type erasure

pub mod handler;
pub mod registry;
pub mod target;

#[cfg(test)]
pub(crate) mod fixtures;

// 主要な trait/型 を再エクスポート
pub use self::handler::{DynTarget, TypedTarget};
pub use self::registry::{RegistryError, TargetRegistry};
pub use self::target::{Target, arg};
