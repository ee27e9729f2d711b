//! Message types between queue handles and the queue thread.

use std::cmp::Ordering;
use std::time::Instant;

/// A unit of work for a [`WorkQueue`](super::WorkQueue).
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Identity attached to posted work so it can be cancelled later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskToken(pub(crate) u64);

impl TaskToken {
    /// Raw token value.
    #[inline]
    pub const fn get(self) -> u64 {
        self.0
    }
}

/// Commands sent from handles to the queue thread.
pub(crate) enum Command {
    /// Run `task` once `due` has passed. `None` is due on arrival.
    Post {
        due: Option<Instant>,
        token: Option<TaskToken>,
        task: Task,
    },
    /// Drop every pending task carrying this token.
    Remove(TaskToken),
    /// Stop the thread, discarding pending work.
    Quit,
}

/// A task waiting in the queue thread's schedule.
pub(crate) struct Scheduled {
    pub(crate) due: Instant,
    /// Submission order, breaks ties between equal deadlines.
    pub(crate) seq: u64,
    pub(crate) token: Option<TaskToken>,
    pub(crate) task: Task,
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl Eq for Scheduled {}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scheduled {
    fn cmp(&self, other: &Self) -> Ordering {
        self.due.cmp(&other.due).then(self.seq.cmp(&other.seq))
    }
}
