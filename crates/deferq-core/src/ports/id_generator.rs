//! IdGenerator port - ID 生成の抽象化
//!
//! ファイルストアのタスク ID は「現在時刻 + ランダム値」から作ります（ULID）。
//! テスト容易性のために、trait として抽象化しています。
//!
//! # 実装
//! - **UlidGenerator**: ULID ベース。同一プロセス内では単調増加
//!
//! # 注意
//! 衝突チェックは行いません。別プロセスが同じミリ秒に同じランダム値を
//! 引いた場合の衝突は検出されません。

use std::sync::{Mutex, PoisonError};
use std::time::SystemTime;

use ulid::{Generator, Ulid};

use crate::domain::TaskId;
use crate::ports::Clock;

/// IdGenerator はストアが割り当てるタスク ID を生成
///
/// # Thread Safety
/// - `Send + Sync` を要求（複数スレッドから使える）
pub trait IdGenerator: Send + Sync {
    fn generate_task_id(&self) -> TaskId;
}

/// UlidGenerator は ULID ベースの ID 生成器
///
/// Clock を使って現在時刻ベースの ULID を生成します。
/// 同じミリ秒内では `ulid::Generator` がランダム部分を +1 するので、
/// 生成順 = 文字列のソート順になります。
pub struct UlidGenerator<C> {
    clock: C,
    generator: Mutex<Generator>,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            generator: Mutex::new(Generator::new()),
        }
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn generate_task_id(&self) -> TaskId {
        let now = self.clock.now();
        let mut generator = self
            .generator
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        // ランダム部分が溢れた場合（同一ミリ秒で 2^80 回）は単調性を諦める
        let ulid = generator
            .generate_from_datetime(SystemTime::from(now))
            .unwrap_or_else(|_| Ulid::from_parts(now.timestamp_millis() as u64, rand::random()));
        TaskId::from(ulid)
    }
}
