//! Target trait - 型付きターゲットの定義
//!
//! タスクは「ターゲット + メソッド名 + 引数」を永続化します。
//! ターゲットは `Target` を実装した具体型で、`TYPE` によって
//! 永続化された `type_name` と Rust の型が対応付けられます。
//!
//! # 学習ポイント
//! - Associated Constants (`const TYPE`, `const INSTANCE_METHODS`)
//! - デフォルト実装付きの trait メソッド
//! - Trait bounds の組み合わせ (Serialize + DeserializeOwned + Send + Sync + 'static)

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::domain::InvokeError;

/// Target は type_name と型、メソッド一覧を対応付ける
///
/// # 使用例
/// ```ignore
/// #[derive(Serialize, Deserialize)]
/// struct Mailer {
///     sender: String,
/// }
///
/// impl Target for Mailer {
///     const TYPE: &'static str = "acme.mailer.v1";
///     const INSTANCE_METHODS: &'static [&'static str] = &["send"];
///
///     fn call(&self, method: &str, args: &[Value]) -> Result<(), InvokeError> {
///         let to: String = arg(args, 0)?;
///         send_mail(&self.sender, &to)
///     }
/// }
/// ```
///
/// # メソッドの種類
/// - `INSTANCE_METHODS`: キャプチャしたインスタンス（`TargetRef::Instance`）に対して呼ぶ
/// - `STATIC_METHODS`: 型そのもの（`TargetRef::Type`）に対して呼ぶ。インスタンスからも呼べる
pub trait Target: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// type_name の定義
    ///
    /// # 命名規約
    /// - `{namespace}.{name}.v{major}`
    /// - 例: `acme.mailer.v1`
    const TYPE: &'static str;

    const INSTANCE_METHODS: &'static [&'static str] = &[];

    const STATIC_METHODS: &'static [&'static str] = &[];

    /// Run an instance method. Only called with names from `INSTANCE_METHODS`.
    fn call(&self, method: &str, _args: &[serde_json::Value]) -> Result<(), InvokeError> {
        Err(InvokeError::method_missing(Self::TYPE, method))
    }

    /// Run a static method. Only called with names from `STATIC_METHODS`.
    fn call_static(method: &str, _args: &[serde_json::Value]) -> Result<(), InvokeError> {
        Err(InvokeError::method_missing(Self::TYPE, method))
    }
}

/// Decode the positional argument at `index`.
pub fn arg<T: DeserializeOwned>(args: &[serde_json::Value], index: usize) -> Result<T, InvokeError> {
    let value = args
        .get(index)
        .ok_or_else(|| InvokeError::new("missing_argument", format!("no argument at position {index}")))?;
    serde_json::from_value(value.clone())
        .map_err(|e| InvokeError::decode(format!("argument {index}: {e}")))
}
