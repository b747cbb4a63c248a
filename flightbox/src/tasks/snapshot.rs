//! Point-in-time view of tracked tasks and its text rendering

use std::fmt;
use std::io::{self, Write};
use std::time::Duration;

use crate::domain::TaskId;

/// Lifecycle state of a tracked task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskState {
    /// Spawned, not yet polled
    #[default]
    Idle,
    /// Inside `poll`
    Running,
    /// Last poll returned `Pending`
    Suspended,
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TaskState::Idle => "IDLE",
            TaskState::Running => "RUNNING",
            TaskState::Suspended => "SUSPENDED",
        })
    }
}

/// One tracked task as seen by [`snapshot_all_tasks`](super::snapshot_all_tasks)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSnapshot {
    pub id: TaskId,
    pub name: String,
    pub state: TaskState,
    /// Number of times the task has been polled
    pub polls: u64,
    /// Time since spawn
    pub age: Duration,
    /// Time since the last poll started, `None` if never polled
    pub since_last_poll: Option<Duration>,
    /// Label set with [`mark_suspension_point`](super::mark_suspension_point)
    pub suspension_point: Option<String>,
    /// `file:line:column` of the `spawn_tracked` call
    pub spawn_location: String,
}

/// Render a task dump
///
/// ```text
/// Tracked tasks: 1
///
/// Task #3 "accept-loop", state: SUSPENDED
///     waiting for connection
///     polls: 12, age: 4.021s, last poll: 0.250s ago
///     spawned at src/server.rs:40:5
/// ```
///
/// # Errors
/// Returns an error if the writer fails
pub fn write_task_dump(out: &mut dyn Write, tasks: &[TaskSnapshot]) -> io::Result<()> {
    writeln!(out, "Tracked tasks: {}", tasks.len())?;

    for task in tasks {
        writeln!(out)?;
        writeln!(out, "Task {} \"{}\", state: {}", task.id, task.name, task.state)?;
        writeln!(out, "    {}", task.suspension_point.as_deref().unwrap_or("unknown suspension point"))?;

        let last_poll = task
            .since_last_poll
            .map_or_else(|| "never".to_string(), |ago| format!("{:.3}s ago", ago.as_secs_f64()));
        writeln!(
            out,
            "    polls: {}, age: {:.3}s, last poll: {last_poll}",
            task.polls,
            task.age.as_secs_f64()
        )?;
        writeln!(out, "    spawned at {}", task.spawn_location)?;
    }

    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(id: u64, name: &str, state: TaskState) -> TaskSnapshot {
        TaskSnapshot {
            id: TaskId(id),
            name: name.to_string(),
            state,
            polls: 2,
            age: Duration::from_millis(1500),
            since_last_poll: Some(Duration::from_millis(250)),
            suspension_point: None,
            spawn_location: "src/main.rs:10:5".to_string(),
        }
    }

    fn render(tasks: &[TaskSnapshot]) -> String {
        let mut out = Vec::new();
        write_task_dump(&mut out, tasks).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_dump_lists_every_task() {
        let mut waiting = task(2, "reader", TaskState::Suspended);
        waiting.suspension_point = Some("waiting for socket".to_string());
        let text = render(&[task(1, "ticker", TaskState::Running), waiting]);

        assert!(text.starts_with("Tracked tasks: 2\n"));
        assert!(text.contains("Task #1 \"ticker\", state: RUNNING\n    unknown suspension point\n"));
        assert!(text.contains("Task #2 \"reader\", state: SUSPENDED\n    waiting for socket\n"));
        assert!(text.contains("    polls: 2, age: 1.500s, last poll: 0.250s ago\n"));
        assert!(text.contains("    spawned at src/main.rs:10:5\n"));
    }

    #[test]
    fn test_never_polled_task() {
        let mut idle = task(7, "lazy", TaskState::Idle);
        idle.polls = 0;
        idle.since_last_poll = None;
        let text = render(&[idle]);
        assert!(text.contains("state: IDLE"));
        assert!(text.contains("last poll: never"));
    }

    #[test]
    fn test_empty_dump_has_header_only() {
        assert_eq!(render(&[]), "Tracked tasks: 0\n");
    }
}
