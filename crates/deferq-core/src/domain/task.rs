//! Task model: identity, payload and the attempt counter.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::TaskError;
use super::ids::TaskId;
use super::tag::Tag;
use super::target::TargetRef;
use crate::typed::Target;

/// A persisted deferred invocation.
///
/// Everything except `attempts` is fixed once the store hands the task out.
/// `attempts` is only changed by `TaskStore::run`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    id: TaskId,
    #[serde(default)]
    title: String,
    tag: Tag,
    target: TargetRef,
    method: String,
    #[serde(default)]
    args: Vec<serde_json::Value>,
    scheduled_at: DateTime<Utc>,
    #[serde(default)]
    attempts: u32,
}

impl Task {
    /// Rebuild a task from stored parts. `tag` is normalized here.
    ///
    /// # Errors
    /// `TaskError::EmptyIdentifier` when `id` is empty.
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        tag: &str,
        target: TargetRef,
        method: impl Into<String>,
        args: Vec<serde_json::Value>,
        scheduled_at: DateTime<Utc>,
    ) -> Result<Self, TaskError> {
        Ok(Self {
            id: TaskId::new(id)?,
            title: title.into(),
            tag: Tag::new(tag),
            target,
            method: method.into(),
            args,
            scheduled_at,
            attempts: 0,
        })
    }

    pub fn id(&self) -> &TaskId {
        &self.id
    }

    /// `None` when the task was created without a title.
    pub fn title(&self) -> Option<&str> {
        (!self.title.is_empty()).then_some(self.title.as_str())
    }

    pub fn tag(&self) -> &Tag {
        &self.tag
    }

    pub fn target(&self) -> &TargetRef {
        &self.target
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn args(&self) -> &[serde_json::Value] {
        &self.args
    }

    pub fn scheduled_at(&self) -> DateTime<Utc> {
        self.scheduled_at
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// A task is due once `now` has reached its scheduled time.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        now >= self.scheduled_at
    }

    pub(crate) fn set_attempts(&mut self, attempts: u32) {
        self.attempts = attempts;
    }

    /// Re-key a task whose final id is only known after it was persisted.
    pub(crate) fn with_id(mut self, id: TaskId) -> Self {
        self.id = id;
        self
    }
}

/// Input of `TaskStore::create`.
///
/// # 使用例
/// ```ignore
/// let task = store
///     .create(
///         NewTask::instance(&mailer, "send")?
///             .arg("alice@example.com")
///             .title("welcome mail")
///             .tag("mail-out"),
///     )?
///     .expect("persisted");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct NewTask {
    target: TargetRef,
    method: String,
    args: Vec<serde_json::Value>,
    title: String,
    tag: Tag,
    scheduled_at: Option<DateTime<Utc>>,
}

impl NewTask {
    pub fn new(target: TargetRef, method: impl Into<String>) -> Self {
        Self {
            target,
            method: method.into(),
            args: Vec::new(),
            title: String::new(),
            tag: Tag::default(),
            scheduled_at: None,
        }
    }

    /// Capture `target` as the receiver of an instance method.
    pub fn instance<T: Target>(
        target: &T,
        method: impl Into<String>,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self::new(TargetRef::instance(target)?, method))
    }

    /// Call a static method of `T`.
    pub fn of_type<T: Target>(method: impl Into<String>) -> Self {
        Self::new(TargetRef::of_type::<T>(), method)
    }

    /// Call a static method of a type known only by name.
    pub fn type_name(type_name: impl Into<String>, method: impl Into<String>) -> Self {
        Self::new(TargetRef::named(type_name), method)
    }

    pub fn args(mut self, args: impl IntoIterator<Item = serde_json::Value>) -> Self {
        self.args = args.into_iter().collect();
        self
    }

    pub fn arg(mut self, arg: impl Into<serde_json::Value>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn tag(mut self, tag: &str) -> Self {
        self.tag = Tag::new(tag);
        self
    }

    /// Without this the store schedules the task for "now".
    pub fn scheduled_at(mut self, at: DateTime<Utc>) -> Self {
        self.scheduled_at = Some(at);
        self
    }

    pub fn target(&self) -> &TargetRef {
        &self.target
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    /// Turn the request into the authoritative task under a store-assigned id.
    pub(crate) fn into_task(self, id: TaskId, now: DateTime<Utc>) -> Task {
        let scheduled_at = self.scheduled_at.unwrap_or(now);
        Task {
            id,
            title: self.title,
            tag: self.tag,
            target: self.target,
            method: self.method,
            args: self.args,
            scheduled_at,
            attempts: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    fn at(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, h, 0, 0).unwrap()
    }

    #[test]
    fn new_rejects_empty_id() {
        let result = Task::new("", "", "t", TargetRef::named("x"), "m", vec![], at(0));
        assert_eq!(result, Err(TaskError::EmptyIdentifier));
    }

    #[test]
    fn new_normalizes_tag_and_starts_at_zero_attempts() {
        let task = Task::new("1", "", "a-b!", TargetRef::named("x"), "m", vec![], at(0)).unwrap();
        assert_eq!(task.tag().as_str(), "a_b");
        assert_eq!(task.attempts(), 0);
        assert_eq!(task.title(), None);
    }

    #[test]
    fn due_at_and_after_scheduled_time() {
        let task = Task::new("1", "t", "", TargetRef::named("x"), "m", vec![], at(10)).unwrap();
        assert!(!task.is_due(at(10) - Duration::seconds(1)));
        assert!(task.is_due(at(10)));
        assert!(task.is_due(at(11)));
    }

    #[test]
    fn builder_fills_defaults() {
        let task = NewTask::new(TargetRef::named("x"), "m")
            .arg(1)
            .arg("two")
            .into_task(TaskId::new("9").unwrap(), at(3));

        assert_eq!(task.tag().as_str(), "default");
        assert_eq!(task.scheduled_at(), at(3));
        assert_eq!(task.args(), &[json!(1), json!("two")]);
    }

    #[test]
    fn explicit_schedule_wins_over_now() {
        let task = NewTask::new(TargetRef::named("x"), "m")
            .scheduled_at(at(5))
            .title("later")
            .into_task(TaskId::new("9").unwrap(), at(3));

        assert_eq!(task.scheduled_at(), at(5));
        assert_eq!(task.title(), Some("later"));
    }

    #[test]
    fn json_roundtrip_keeps_attempts() {
        let mut task =
            Task::new("7", "t", "x", TargetRef::named("x"), "m", vec![json!([1])], at(1)).unwrap();
        task.set_attempts(2);

        let encoded = serde_json::to_string(&task).unwrap();
        let decoded: Task = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, task);
    }
}
