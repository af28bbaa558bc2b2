pub mod enums;
pub mod task;
pub mod timestamp;
pub mod views;

pub use enums::{TaskState, UiMode};
pub use task::{validate_new_task, Task, TaskId};
pub use views::{compute_totals, format_clock, task_rows, TaskRow};
