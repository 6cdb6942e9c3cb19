//! Domain model (ids, tags, targets, tasks, collections, retry budget).

pub mod collection;
pub mod errors;
pub mod ids;
pub mod retry;
pub mod tag;
pub mod target;
pub mod task;

pub use collection::{TaskCollection, Visit};
pub use errors::{CreateError, InvokeError, StoreError, TaskError};
pub use ids::TaskId;
pub use retry::{AttemptVerdict, RetryBudget};
pub use tag::{DEFAULT_TAG, Tag};
pub use target::{Receiver, TargetRef};
pub use task::{NewTask, Task};
