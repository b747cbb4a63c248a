//! Tracked Tokio tasks and task dumps
//!
//! Install the registry once at startup and spawn the tasks you want to see
//! in capture archives with [`spawn_tracked`]:
//!
//! ```no_run
//! flightbox::tasks::install();
//!
//! # async fn serve() {}
//! # async fn run() {
//! flightbox::tasks::spawn_tracked("accept-loop", async {
//!     flightbox::tasks::mark_suspension_point("waiting for connection");
//!     serve().await;
//! });
//! # }
//! ```

mod introspection;
mod registry;
mod snapshot;

pub use introspection::{capture_task_dump, GlobalTasks, TaskIntrospection, NOT_INSTALLED_MESSAGE};
pub use registry::{
    current_task_id, install, is_installed, mark_suspension_point, snapshot_all_tasks, spawn_tracked,
    uninstall,
};
pub use snapshot::{write_task_dump, TaskSnapshot, TaskState};
