//! Process-wide registry of tracked tasks
//!
//! Tasks spawned through [`spawn_tracked`] while the registry is installed
//! are wrapped in a tracking future that records poll activity and
//! registers itself. The wrapper deregisters the task when it is dropped,
//! which covers completion, abort and runtime shutdown alike.

use std::collections::BTreeMap;
use std::future::Future;
use std::panic::Location;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use std::time::Instant;

use log::debug;

use super::snapshot::{TaskSnapshot, TaskState};
use crate::domain::TaskId;

tokio::task_local! {
    static CURRENT_TASK: Arc<TaskRecord>;
}

static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

/// `None` while not installed
type Registry = Option<BTreeMap<TaskId, Arc<TaskRecord>>>;

static TASK_REGISTRY: Mutex<Registry> = Mutex::new(None);

fn registry() -> MutexGuard<'static, Registry> {
    TASK_REGISTRY.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Start tracking tasks spawned with [`spawn_tracked`]
///
/// Idempotent: installing twice keeps the tasks already registered.
pub fn install() {
    let mut registry = registry();
    if registry.is_none() {
        *registry = Some(BTreeMap::new());
        debug!("Task registry installed");
    }
}

/// Stop tracking and forget every registered task
///
/// Tasks keep running; they just no longer show up in dumps.
pub fn uninstall() {
    if registry().take().is_some() {
        debug!("Task registry uninstalled");
    }
}

#[must_use]
pub fn is_installed() -> bool {
    registry().is_some()
}

/// ID of the tracked task currently being polled, if any
#[must_use]
pub fn current_task_id() -> Option<TaskId> {
    CURRENT_TASK.try_with(|task| task.id).ok()
}

/// Describe where the current tracked task is about to suspend
///
/// Shown in task dumps until the task is polled again. Outside a tracked
/// task this does nothing.
pub fn mark_suspension_point(label: impl Into<String>) {
    let label = label.into();
    let _ = CURRENT_TASK.try_with(|task| task.progress().suspension_point = Some(label));
}

/// Snapshot every registered task, ordered by ID
#[must_use]
pub fn snapshot_all_tasks() -> Vec<TaskSnapshot> {
    let now = Instant::now();
    registry()
        .as_ref()
        .map(|tasks| tasks.values().map(|task| task.snapshot(now)).collect())
        .unwrap_or_default()
}

/// Spawn a task onto the current Tokio runtime, tracking it when installed
///
/// Without an installed registry this is exactly `tokio::spawn`.
///
/// # Panics
/// Panics when called outside a Tokio runtime, like `tokio::spawn`
#[track_caller]
pub fn spawn_tracked<F>(name: impl Into<String>, future: F) -> tokio::task::JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    let caller = Location::caller();
    let record = {
        let mut registry = registry();
        let Some(tasks) = registry.as_mut() else {
            return tokio::spawn(future);
        };

        let record = Arc::new(TaskRecord {
            id: TaskId(NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed)),
            name: name.into(),
            spawn_location: format!("{}:{}:{}", caller.file(), caller.line(), caller.column()),
            spawned_at: Instant::now(),
            progress: Mutex::new(TaskProgress::default()),
        });
        tasks.insert(record.id, Arc::clone(&record));
        record
    };

    tokio::spawn(TrackedFuture { inner: Box::pin(future), record })
}

struct TaskRecord {
    id: TaskId,
    name: String,
    spawn_location: String,
    spawned_at: Instant,
    progress: Mutex<TaskProgress>,
}

#[derive(Default)]
struct TaskProgress {
    state: TaskState,
    polls: u64,
    last_poll: Option<Instant>,
    suspension_point: Option<String>,
}

impl TaskRecord {
    fn progress(&self) -> MutexGuard<'_, TaskProgress> {
        self.progress.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn snapshot(&self, now: Instant) -> TaskSnapshot {
        let progress = self.progress();
        TaskSnapshot {
            id: self.id,
            name: self.name.clone(),
            state: progress.state,
            polls: progress.polls,
            age: now.saturating_duration_since(self.spawned_at),
            since_last_poll: progress.last_poll.map(|at| now.saturating_duration_since(at)),
            suspension_point: progress.suspension_point.clone(),
            spawn_location: self.spawn_location.clone(),
        }
    }
}

struct TrackedFuture<F> {
    inner: Pin<Box<F>>,
    record: Arc<TaskRecord>,
}

impl<F: Future> Future for TrackedFuture<F> {
    type Output = F::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        {
            let mut progress = this.record.progress();
            progress.state = TaskState::Running;
            progress.polls += 1;
            progress.last_poll = Some(Instant::now());
            progress.suspension_point = None;
        }

        let inner = &mut this.inner;
        let result = CURRENT_TASK.sync_scope(Arc::clone(&this.record), || inner.as_mut().poll(cx));

        if result.is_pending() {
            this.record.progress().state = TaskState::Suspended;
        }
        result
    }
}

impl<F> Drop for TrackedFuture<F> {
    fn drop(&mut self) {
        if let Some(tasks) = registry().as_mut() {
            tasks.remove(&self.record.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    /// The registry is process-global; tests touching it run one at a time
    static SERIAL: Mutex<()> = Mutex::new(());

    fn serial() -> MutexGuard<'static, ()> {
        SERIAL.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_current_thread().enable_time().build().unwrap()
    }

    fn find(name: &str) -> Option<TaskSnapshot> {
        snapshot_all_tasks().into_iter().find(|task| task.name == name)
    }

    #[test]
    fn test_untracked_when_not_installed() {
        let _serial = serial();
        uninstall();
        runtime().block_on(async {
            let handle = spawn_tracked("plain", std::future::pending::<()>());
            tokio::task::yield_now().await;
            assert!(snapshot_all_tasks().is_empty());
            handle.abort();
        });
    }

    #[test]
    fn test_suspended_task_shows_label_and_location() {
        let _serial = serial();
        install();
        runtime().block_on(async {
            let handle = spawn_tracked("waiter", async {
                mark_suspension_point("waiting for shutdown signal");
                std::future::pending::<()>().await;
            });
            tokio::time::sleep(Duration::from_millis(10)).await;

            let task = find("waiter").unwrap();
            assert_eq!(task.state, TaskState::Suspended);
            assert_eq!(task.polls, 1);
            assert_eq!(task.suspension_point.as_deref(), Some("waiting for shutdown signal"));
            assert!(task.spawn_location.contains("registry.rs"), "{}", task.spawn_location);

            handle.abort();
            let _ = handle.await;
            assert!(find("waiter").is_none());
        });
        uninstall();
    }

    #[test]
    fn test_completed_task_leaves_registry() {
        let _serial = serial();
        install();
        runtime().block_on(async {
            let id = spawn_tracked("short", async { current_task_id() }).await.unwrap();
            assert!(id.is_some());
            assert!(find("short").is_none());
        });
        uninstall();
    }

    #[test]
    fn test_current_task_id_outside_task() {
        assert_eq!(current_task_id(), None);
        // No-op outside a tracked task
        mark_suspension_point("nowhere");
    }

    #[test]
    fn test_uninstall_forgets_tasks() {
        let _serial = serial();
        install();
        runtime().block_on(async {
            let handle = spawn_tracked("forgotten", std::future::pending::<()>());
            tokio::task::yield_now().await;
            assert!(find("forgotten").is_some());

            uninstall();
            assert!(!is_installed());
            assert!(snapshot_all_tasks().is_empty());
            handle.abort();
        });
    }
}
