//! FileTaskStore - ディレクトリツリーを正本とするタスクストア
//!
//! # レイアウト
//! ```text
//! <base>/tasks/
//!   .log                  実行結果（1 行 = 1 回の run）
//!   <tag>/<id>.task       未実行タスク（JSON）
//!   <tag>/<id>.claim      実行中のタスク（claim 済み）
//! ```
//!
//! # 学習ポイント
//! - `fs::rename` のアトミック性を使った claim（ロックファイル不要）
//! - 一時ファイル + rename による書き込み（途中で落ちても壊れたファイルが残らない）
//! - `VecDeque` による幅優先探索
//!
//! # 並行性
//! 同じディレクトリを複数のプロセスが run しても、`.task` → `.claim` の
//! rename に成功した 1 つだけがタスクを実行します。
//! クラッシュで残った `.claim` は回収しません（再実行されない）。

use std::collections::VecDeque;
use std::ffi::OsStr;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::domain::{
    AttemptVerdict, CreateError, InvokeError, NewTask, RetryBudget, StoreError, Tag, Task,
    TaskCollection, TaskId,
};
use crate::ports::{Clock, IdGenerator, SystemClock, TaskStore, UlidGenerator};
use crate::typed::TargetRegistry;

const TASKS_DIR: &str = "tasks";
const LOG_FILE: &str = ".log";
const TASK_EXT: &str = "task";
const CLAIM_EXT: &str = "claim";
const TMP_EXT: &str = "tmp";

pub struct FileTaskStore {
    tasks_dir: PathBuf,
    budget: RetryBudget,
    registry: Arc<TargetRegistry>,
    clock: Arc<dyn Clock>,
    ids: UlidGenerator<Arc<dyn Clock>>,
}

impl FileTaskStore {
    /// Open a store rooted at `base_dir`, creating `base_dir/tasks` if needed.
    ///
    /// # Errors
    /// - `StoreError::PathNotFound` if `base_dir` is not an existing directory
    /// - `StoreError::Io` if the `tasks` directory cannot be created
    pub fn open(
        base_dir: impl AsRef<Path>,
        max_attempts: u32,
        registry: Arc<TargetRegistry>,
    ) -> Result<Self, StoreError> {
        let base_dir = base_dir.as_ref();
        if !base_dir.is_dir() {
            return Err(StoreError::PathNotFound(base_dir.to_path_buf()));
        }

        let tasks_dir = base_dir.join(TASKS_DIR);
        fs::create_dir_all(&tasks_dir)?;

        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        Ok(Self {
            tasks_dir,
            budget: RetryBudget::new(max_attempts),
            registry,
            ids: UlidGenerator::new(clock.clone()),
            clock,
        })
    }

    /// Replace the clock used for due checks, default schedules and ids.
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(clock);
        self.ids = UlidGenerator::new(clock.clone());
        self.clock = clock;
        self
    }

    pub fn root(&self) -> &Path {
        &self.tasks_dir
    }

    pub fn log_path(&self) -> PathBuf {
        self.tasks_dir.join(LOG_FILE)
    }

    fn task_path(&self, tag: &Tag, id: &TaskId) -> Option<PathBuf> {
        let id = id.as_str();
        if id.contains(['/', '\\']) || id == "." || id == ".." {
            return None;
        }
        Some(
            self.tasks_dir
                .join(tag.as_str())
                .join(format!("{id}.{TASK_EXT}")),
        )
    }

    /// Breadth-first walk of `root`, decoding every `*.task` file whose stem
    /// passes `wanted`. Results are sorted by id.
    fn scan(&self, root: &Path, wanted: impl Fn(&str) -> bool) -> Vec<Task> {
        let mut tasks = Vec::new();
        let mut queue = VecDeque::from([root.to_path_buf()]);

        while let Some(dir) = queue.pop_front() {
            let entries = match fs::read_dir(&dir) {
                Ok(entries) => entries,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => {
                    tracing::warn!(dir = %dir.display(), error = %e, "cannot list task directory");
                    continue;
                }
            };

            for entry in entries.flatten() {
                let path = entry.path();
                let Ok(file_type) = entry.file_type() else {
                    continue;
                };
                if file_type.is_dir() {
                    queue.push_back(path);
                    continue;
                }
                if path.extension() != Some(OsStr::new(TASK_EXT)) {
                    continue;
                }
                let Some(stem) = path.file_stem().and_then(OsStr::to_str) else {
                    continue;
                };
                if !wanted(stem) {
                    continue;
                }

                match read_task(&path) {
                    Ok(task) if task.id().as_str() == stem => tasks.push(task),
                    Ok(task) => {
                        tracing::warn!(
                            path = %path.display(),
                            task_id = %task.id(),
                            "task file name does not match its id; skipped"
                        );
                    }
                    // claimed or removed between listing and reading
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "undecodable task file skipped");
                    }
                }
            }
        }

        tasks.sort_by(|a, b| a.id().cmp(b.id()));
        tasks
    }

    fn append_log(&self, line: &str) {
        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.log_path())
            .and_then(|mut file| file.write_all(format!("{line}\n").as_bytes()));

        if let Err(e) = result {
            tracing::warn!(error = %e, "cannot append to run log");
        }
    }

    /// Bookkeeping after a failed invocation of a claimed task.
    fn record_failure(&self, claimed: &mut Task, claim: &Path, path: &Path, error: &InvokeError) {
        let previous = claimed.attempts();
        let verdict = self.budget.record_failure(previous);
        claimed.set_attempts(verdict.attempts());
        self.append_log(&log_line(claimed, Some(error)));

        match verdict {
            AttemptVerdict::Exhausted(attempts) => {
                tracing::warn!(
                    task_id = %claimed.id(),
                    attempts,
                    error = %error,
                    "task dropped after exhausting its attempts"
                );
                if let Err(e) = fs::remove_file(claim) {
                    tracing::warn!(path = %claim.display(), error = %e, "cannot delete claim file");
                }
            }
            AttemptVerdict::Retry(attempts) => {
                tracing::info!(task_id = %claimed.id(), attempts, error = %error, "task failed");
                // 書き戻しに失敗しても claim は必ず解放する
                if let Err(e) = write_task(claim, claimed) {
                    tracing::warn!(
                        task_id = %claimed.id(),
                        attempts,
                        error = %e,
                        "cannot persist attempt count; releasing task unchanged"
                    );
                    claimed.set_attempts(previous);
                }
                if let Err(e) = fs::rename(claim, path) {
                    tracing::warn!(
                        task_id = %claimed.id(),
                        error = %e,
                        "cannot release claimed task"
                    );
                }
            }
        }
    }
}

impl TaskStore for FileTaskStore {
    fn create(&self, new_task: NewTask) -> Result<Option<Task>, CreateError> {
        self.registry.resolve(new_task.target(), new_task.method())?;

        let task = new_task.into_task(self.ids.generate_task_id(), self.clock.now());
        let Some(path) = self.task_path(task.tag(), task.id()) else {
            return Ok(None);
        };

        let written = path
            .parent()
            .map_or(Ok(()), fs::create_dir_all)
            .and_then(|()| write_task(&path, &task));

        match written {
            Ok(()) => {
                tracing::debug!(task_id = %task.id(), tag = %task.tag(), "task stored");
                Ok(Some(task))
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "cannot persist task");
                Ok(None)
            }
        }
    }

    fn get_by_id(&self, id: &TaskId) -> Option<Task> {
        self.scan(&self.tasks_dir, |stem| stem == id.as_str())
            .into_iter()
            .next()
    }

    fn get_by_tag(&self, tag: &str) -> TaskCollection {
        let tag = Tag::new(tag);
        self.scan(&self.tasks_dir.join(tag.as_str()), |_| true)
            .into_iter()
            .filter(|task| task.tag() == &tag)
            .collect()
    }

    fn get_all(&self) -> TaskCollection {
        self.scan(&self.tasks_dir, |_| true).into_iter().collect()
    }

    fn remove(&self, task: &Task) -> bool {
        self.task_path(task.tag(), task.id())
            .is_some_and(|path| fs::remove_file(path).is_ok())
    }

    fn run(&self, task: &mut Task) -> bool {
        if !task.is_due(self.clock.now()) {
            return false;
        }
        let Some(path) = self.task_path(task.tag(), task.id()) else {
            return false;
        };

        let claim = path.with_extension(CLAIM_EXT);
        if let Err(e) = fs::rename(&path, &claim) {
            tracing::debug!(task_id = %task.id(), error = %e, "task not claimed");
            return false;
        }

        let mut claimed = match read_task(&claim) {
            Ok(claimed) => claimed,
            Err(e) => {
                tracing::warn!(path = %claim.display(), error = %e, "claimed task is unreadable");
                if let Err(e) = fs::rename(&claim, &path) {
                    tracing::warn!(path = %claim.display(), error = %e, "cannot release claim");
                }
                return false;
            }
        };

        let outcome = self.registry.invoke(&claimed);
        let succeeded = match outcome {
            Ok(()) => {
                self.append_log(&log_line(&claimed, None));
                if let Err(e) = fs::remove_file(&claim) {
                    tracing::warn!(path = %claim.display(), error = %e, "cannot delete claim file");
                }
                tracing::info!(task_id = %claimed.id(), tag = %claimed.tag(), "task succeeded");
                true
            }
            Err(error) => {
                self.record_failure(&mut claimed, &claim, &path, &error);
                false
            }
        };

        task.set_attempts(claimed.attempts());
        succeeded
    }

    fn max_attempts(&self) -> u32 {
        self.budget.max_attempts()
    }
}

fn read_task(path: &Path) -> io::Result<Task> {
    Ok(serde_json::from_slice(&fs::read(path)?)?)
}

/// Write through a sibling temp file so readers never see a partial task.
fn write_task(path: &Path, task: &Task) -> io::Result<()> {
    let tmp = path.with_extension(TMP_EXT);
    let mut file = fs::File::create(&tmp)?;
    file.write_all(&serde_json::to_vec_pretty(task)?)?;
    file.sync_all()?;
    drop(file);
    fs::rename(&tmp, path)
}

/// `[SUCCESS|ERROR] ID: <id>[ - Title: <title>] - Tag: <tag>[ - Attempt <n>][ - Error: <kind> - <message>]`
fn log_line(task: &Task, failure: Option<&InvokeError>) -> String {
    let status = if failure.is_some() { "ERROR" } else { "SUCCESS" };
    let mut line = format!("[{status}] ID: {}", task.id());
    if let Some(title) = task.title() {
        line.push_str(&format!(" - Title: {title}"));
    }
    line.push_str(&format!(" - Tag: {}", task.tag()));
    if let Some(error) = failure {
        line.push_str(&format!(" - Attempt {} - Error: {error}", task.attempts()));
    }
    line
}
