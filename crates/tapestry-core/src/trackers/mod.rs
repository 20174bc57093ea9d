//! Status trackers: informational side channels next to the result tree.
//!
//! - [`TaskStatus`]: timestamped progress messages for one named task.
//! - [`GeneratorStatus`]: flat success/failure log for a whole run.

pub mod generator;
pub mod task;

pub use self::generator::{GeneratorMessage, GeneratorStatus};
pub use self::task::{StatusMessage, TaskStatus};
