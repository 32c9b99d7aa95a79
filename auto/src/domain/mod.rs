//! Domain types owned by the pipeline state
//!
//! Tasks and objectives are stored by id and reference each other by id
//! only; traversal always goes through the state maps.

mod id;
mod objective;
mod priority;
mod task;

pub use id::{objective_fingerprint, task_fingerprint};
pub use objective::{Objective, ObjectiveLevel, ObjectiveStatus};
pub use priority::Priority;
pub use task::{Task, TaskCategory, TaskStatus};
