//! Runner - ストアを外から駆動するループ
//!
//! # 学習ポイント
//! - 同期的な `TaskStore` を `spawn_blocking` で async から呼ぶ
//! - `watch` チャネルによる shutdown 通知（sleep と `select!` で競合させる）
//!
//! # 方針
//! - ストアは自分でスケジューリングしない。順番とペースは runner が決める
//! - 1 パス = コレクションを 1 回取得して、挿入順に due なタスクを run
//! - run のたびに `interval` だけ待つ（最低 1 秒）
//! - 実行中の run は中断しない。shutdown は「次を取らない」だけ

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use super::status::{RunReport, status_line};
use crate::domain::{Task, TaskCollection, TaskId};
use crate::ports::{Clock, SystemClock, TaskStore};

const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Which tasks a pass looks at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    All,
    Tag(String),
}

/// Result of `Runner::run_once`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOnce {
    NotFound,
    /// Pending but scheduled for later; nothing was run.
    NotDue,
    Ran(RunReport),
}

type Reporter = Arc<dyn Fn(&RunReport) + Send + Sync>;

pub struct Runner {
    store: Arc<dyn TaskStore>,
    interval: Duration,
    clock: Arc<dyn Clock>,
    reporter: Reporter,
}

impl Runner {
    /// `interval` below one second is raised to one second.
    pub fn new(store: Arc<dyn TaskStore>, interval: Duration) -> Self {
        Self {
            store,
            interval: interval.max(MIN_INTERVAL),
            clock: Arc::new(SystemClock),
            reporter: Arc::new(|report| println!("{}", status_line(report))),
        }
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Replace the default reporter (one status line per run on stdout).
    pub fn with_reporter(mut self, reporter: impl Fn(&RunReport) + Send + Sync + 'static) -> Self {
        self.reporter = Arc::new(reporter);
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run a single task by id, without looping.
    pub async fn run_once(&self, id: TaskId) -> RunOnce {
        let store = Arc::clone(&self.store);
        let Some(task) = blocking(move || store.get_by_id(&id)).await.flatten() else {
            return RunOnce::NotFound;
        };
        if !task.is_due(self.clock.now()) {
            return RunOnce::NotDue;
        }
        match self.run_task(task).await {
            Some(report) => RunOnce::Ran(report),
            None => RunOnce::NotFound,
        }
    }

    /// One pass over `scope`: run every due task once, in insertion order,
    /// pausing `interval` after each run. Stops early on shutdown.
    pub async fn run_pass(
        &self,
        scope: &Scope,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Vec<RunReport> {
        let tasks = self.fetch(scope).await;
        let mut reports = Vec::new();

        for task in tasks {
            if stopped(shutdown) {
                break;
            }
            if !task.is_due(self.clock.now()) {
                continue;
            }
            if let Some(report) = self.run_task(task).await {
                reports.push(report);
            }
            if !self.pause(shutdown).await {
                break;
            }
        }
        reports
    }

    /// Repeat passes until shutdown is signalled or the sender is dropped.
    ///
    /// A pass that ran nothing is followed by one `interval` of idle time.
    pub async fn run_forever(&self, scope: Scope, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(?scope, interval = ?self.interval, "runner started");
        while !stopped(&mut shutdown) {
            let reports = self.run_pass(&scope, &mut shutdown).await;
            if reports.is_empty() && !self.pause(&mut shutdown).await {
                break;
            }
        }
        tracing::info!("runner stopped");
    }

    async fn fetch(&self, scope: &Scope) -> TaskCollection {
        let store = Arc::clone(&self.store);
        let scope = scope.clone();
        blocking(move || match scope {
            Scope::All => store.get_all(),
            Scope::Tag(tag) => store.get_by_tag(&tag),
        })
        .await
        .unwrap_or_default()
    }

    async fn run_task(&self, mut task: Task) -> Option<RunReport> {
        let store = Arc::clone(&self.store);
        let report = blocking(move || {
            let success = store.run(&mut task);
            RunReport::new(&task, success)
        })
        .await?;

        tracing::debug!(task_id = %report.id, success = report.success, "task run");
        (self.reporter)(&report);
        Some(report)
    }

    /// Sleep one interval. `false` if shutdown arrived meanwhile.
    async fn pause(&self, shutdown: &mut watch::Receiver<bool>) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(self.interval) => !stopped(shutdown),
            changed = shutdown.changed() => changed.is_ok() && !*shutdown.borrow(),
        }
    }
}

fn stopped(shutdown: &mut watch::Receiver<bool>) -> bool {
    *shutdown.borrow() || shutdown.has_changed().is_err()
}

/// Store calls block (file I/O, SQLite locks, the invoked method itself).
async fn blocking<T, F>(f: F) -> Option<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::error!(error = %e, "store call did not complete");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::NewTask;
    use crate::impls::SqliteTaskStore;
    use crate::ports::FixedClock;
    use crate::typed::fixtures::{Recorder, recorded, shared_registry};
    use chrono::{Duration as ChronoDuration, TimeZone, Utc};
    use std::sync::Mutex;

    fn clock() -> FixedClock {
        FixedClock::new(Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap())
    }

    fn store(clock: &FixedClock) -> Arc<SqliteTaskStore> {
        Arc::new(
            SqliteTaskStore::open_in_memory(3, shared_registry())
                .unwrap()
                .with_clock(clock.clone()),
        )
    }

    fn runner(store: Arc<SqliteTaskStore>, clock: &FixedClock) -> (Runner, Arc<Mutex<Vec<String>>>) {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&lines);
        let runner = Runner::new(store, Duration::from_secs(1))
            .with_clock(clock.clone())
            .with_reporter(move |report| sink.lock().unwrap().push(status_line(report)));
        (runner, lines)
    }

    fn record(key: &str) -> NewTask {
        NewTask::instance(&Recorder::new(key), "record").unwrap()
    }

    #[test]
    fn interval_is_at_least_one_second() {
        let clock = clock();
        let runner = Runner::new(store(&clock), Duration::ZERO);
        assert_eq!(runner.interval(), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn run_once_runs_a_due_task() {
        let clock = clock();
        let store = store(&clock);
        let task = store.create(record("runner-once").title("hi")).unwrap().unwrap();
        let (runner, lines) = runner(store.clone(), &clock);

        let outcome = runner.run_once(task.id().clone()).await;
        assert!(matches!(&outcome, RunOnce::Ran(report) if report.success));
        assert_eq!(recorded("runner-once"), 1);
        assert_eq!(
            lines.lock().unwrap().clone(),
            vec![format!("[SUCCESS] - ID: {} - Title: hi - Tag: default", task.id())]
        );

        // gone after success
        assert_eq!(runner.run_once(task.id().clone()).await, RunOnce::NotFound);
    }

    #[tokio::test(start_paused = true)]
    async fn run_once_leaves_future_tasks_alone() {
        let clock = clock();
        let store = store(&clock);
        let task = store
            .create(record("runner-later").scheduled_at(clock.now() + ChronoDuration::hours(1)))
            .unwrap()
            .unwrap();
        let (runner, lines) = runner(store.clone(), &clock);

        assert_eq!(runner.run_once(task.id().clone()).await, RunOnce::NotDue);
        assert_eq!(recorded("runner-later"), 0);
        assert!(lines.lock().unwrap().is_empty());
        assert!(store.get_by_id(task.id()).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn run_pass_runs_due_tasks_in_insertion_order() {
        let clock = clock();
        let store = store(&clock);
        let ok = store.create(record("runner-pass-ok")).unwrap().unwrap();
        store
            .create(record("runner-pass-later").scheduled_at(clock.now() + ChronoDuration::hours(1)))
            .unwrap()
            .unwrap();
        let failing = store
            .create(NewTask::instance(&Recorder::new("runner-pass-fail"), "fail").unwrap())
            .unwrap()
            .unwrap();
        let (runner, _lines) = runner(store.clone(), &clock);
        let (_tx, mut rx) = watch::channel(false);

        let reports = runner.run_pass(&Scope::All, &mut rx).await;

        let summary: Vec<(TaskId, bool, u32)> = reports
            .iter()
            .map(|r| (r.id.clone(), r.success, r.attempts))
            .collect();
        assert_eq!(
            summary,
            vec![(ok.id().clone(), true, 0), (failing.id().clone(), false, 1)]
        );
        assert_eq!(recorded("runner-pass-later"), 0);
        assert_eq!(store.get_all().count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn run_pass_can_be_limited_to_a_tag() {
        let clock = clock();
        let store = store(&clock);
        store.create(record("runner-tag-in").tag("mail")).unwrap().unwrap();
        store.create(record("runner-tag-out").tag("billing")).unwrap().unwrap();
        let (runner, _lines) = runner(store.clone(), &clock);
        let (_tx, mut rx) = watch::channel(false);

        let reports = runner.run_pass(&Scope::Tag("mail".to_string()), &mut rx).await;

        assert_eq!(reports.len(), 1);
        assert_eq!(recorded("runner-tag-in"), 1);
        assert_eq!(recorded("runner-tag-out"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn run_pass_stops_when_shutdown_is_already_requested() {
        let clock = clock();
        let store = store(&clock);
        store.create(record("runner-stopped")).unwrap().unwrap();
        let (runner, _lines) = runner(store.clone(), &clock);
        let (tx, mut rx) = watch::channel(false);
        tx.send(true).unwrap();

        assert!(runner.run_pass(&Scope::All, &mut rx).await.is_empty());
        assert_eq!(recorded("runner-stopped"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn run_forever_retries_until_exhausted_then_stops_on_shutdown() {
        let clock = clock();
        let store = store(&clock);
        store
            .create(NewTask::instance(&Recorder::new("runner-forever"), "fail").unwrap())
            .unwrap()
            .unwrap();
        let (runner, lines) = runner(store.clone(), &clock);
        let runner = Arc::new(runner);
        let (tx, rx) = watch::channel(false);

        let handle = {
            let runner = Arc::clone(&runner);
            tokio::spawn(async move { runner.run_forever(Scope::All, rx).await })
        };

        tokio::time::sleep(Duration::from_secs(30)).await;
        tx.send(true).unwrap();
        handle.await.unwrap();

        assert_eq!(recorded("runner-forever"), 3);
        assert!(store.get_all().is_empty());
        let lines = lines.lock().unwrap().clone();
        assert_eq!(lines.len(), 3);
        assert!(lines[2].ends_with("- Attempt 3"));
    }

    #[tokio::test(start_paused = true)]
    async fn run_forever_stops_when_the_sender_is_dropped() {
        let clock = clock();
        let (runner, _lines) = runner(store(&clock), &clock);
        let (tx, rx) = watch::channel(false);
        drop(tx);

        runner.run_forever(Scope::All, rx).await;
    }
}
