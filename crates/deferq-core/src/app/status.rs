//! Status - 実行結果の表示
//!
//! runner が 1 タスクごとに出力する 1 行を組み立てます。
//! ファイルストアの `.log` とは別物です（こちらは人間向けの標準出力）。

use serde::Serialize;

use crate::domain::{Tag, Task, TaskId};

/// Printed when `run <id>` finds nothing pending under that id.
pub const TASK_NOT_FOUND: &str = "[ERROR] Task not found";

/// Outcome of one `TaskStore::run` call as seen by the runner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub id: TaskId,
    pub title: Option<String>,
    pub tag: Tag,
    pub success: bool,
    /// Attempt count after the run.
    pub attempts: u32,
}

impl RunReport {
    pub fn new(task: &Task, success: bool) -> Self {
        Self {
            id: task.id().clone(),
            title: task.title().map(str::to_string),
            tag: task.tag().clone(),
            success,
            attempts: task.attempts(),
        }
    }
}

/// `[SUCCESS|ERROR] - ID: <id>[ - Title: <title>] - Tag: <tag>[ - Attempt <n>]`
///
/// The attempt count is only shown for failures.
pub fn status_line(report: &RunReport) -> String {
    let status = if report.success { "SUCCESS" } else { "ERROR" };
    let mut line = format!("[{status}] - ID: {}", report.id);
    if let Some(title) = &report.title {
        line.push_str(&format!(" - Title: {title}"));
    }
    line.push_str(&format!(" - Tag: {}", report.tag));
    if !report.success {
        line.push_str(&format!(" - Attempt {}", report.attempts));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn report(title: Option<&str>, success: bool, attempts: u32) -> RunReport {
        RunReport {
            id: TaskId::new("42").unwrap(),
            title: title.map(str::to_string),
            tag: Tag::new("mail"),
            success,
            attempts,
        }
    }

    #[rstest]
    #[case::success(report(None, true, 0), "[SUCCESS] - ID: 42 - Tag: mail")]
    #[case::success_with_title(
        report(Some("welcome"), true, 1),
        "[SUCCESS] - ID: 42 - Title: welcome - Tag: mail"
    )]
    #[case::failure(report(None, false, 2), "[ERROR] - ID: 42 - Tag: mail - Attempt 2")]
    #[case::failure_with_title(
        report(Some("welcome"), false, 3),
        "[ERROR] - ID: 42 - Title: welcome - Tag: mail - Attempt 3"
    )]
    fn formats_status_lines(#[case] report: RunReport, #[case] expected: &str) {
        assert_eq!(status_line(&report), expected);
    }
}
