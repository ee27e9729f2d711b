//! Work queues: single-threaded, ordered task execution.
//!
//! A [`WorkQueue`] owns one thread and a schedule of immediate and
//! delayed tasks. Everything posted to it runs strictly one at a time.
//!
//! ```text
//! ┌──────────────┐   Command::Post / Remove / Quit   ┌──────────────────┐
//! │ WorkQueue    │ ────────────────────────────────▶ │  Queue Thread    │
//! │ (any clone)  │                                   │  deadline heap   │
//! └──────────────┘                                   │  runs tasks      │
//!                                                    └──────────────────┘
//! ```

mod messages;
mod work_queue;

pub use messages::{Task, TaskToken};
pub use work_queue::WorkQueue;
