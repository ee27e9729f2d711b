//! Work Queue: a dedicated thread that runs posted tasks one at a time.
//!
//! Handles are cheap to clone and can be sent anywhere. All of them talk
//! to the same thread over a crossbeam channel. The thread keeps its own
//! schedule of delayed tasks, ordered by deadline and then by submission.

use super::messages::{Command, Scheduled, Task, TaskToken};
use crate::error::LoopError;
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use parking_lot::Mutex;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

/// Deadline used when `now + delay` overflows `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(60 * 60 * 24 * 365 * 30);

/// Handle to a single-threaded, ordered task queue.
///
/// Tasks posted through any clone run serially on the queue thread.
/// Ready tasks run in deadline order, and equal deadlines run in
/// submission order.
#[derive(Clone)]
pub struct WorkQueue {
    inner: Arc<Inner>,
}

struct Inner {
    /// Thread name.
    name: String,
    /// Long-lived queue that controllers must not quit.
    shared: bool,
    /// Command channel into the thread.
    sender: Sender<Command>,
    /// Id of the queue thread.
    thread_id: ThreadId,
    /// Join handle, taken by the first `join()`.
    handle: Mutex<Option<JoinHandle<()>>>,
    /// Set by `quit()` and by the thread on exit.
    closed: Arc<AtomicBool>,
    /// Source of fresh task tokens.
    next_token: AtomicU64,
}

/// Marks the queue closed when the thread exits, panics included.
struct ClosedGuard(Arc<AtomicBool>);

impl Drop for ClosedGuard {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Release);
    }
}

impl WorkQueue {
    /// Spawn a dedicated queue thread.
    ///
    /// A controller that owns a dedicated queue quits it on dispose.
    pub fn spawn(name: impl Into<String>) -> Result<Self, LoopError> {
        Self::spawn_inner(name.into(), false)
    }

    /// Spawn a long-lived queue meant to be shared between controllers.
    ///
    /// Controllers never quit a shared queue. Only [`WorkQueue::quit`]
    /// called directly by its owner stops it.
    pub fn spawn_shared(name: impl Into<String>) -> Result<Self, LoopError> {
        Self::spawn_inner(name.into(), true)
    }

    fn spawn_inner(name: String, shared: bool) -> Result<Self, LoopError> {
        let (sender, receiver) = unbounded::<Command>();
        let closed = Arc::new(AtomicBool::new(false));
        let closed_clone = Arc::clone(&closed);

        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                let _guard = ClosedGuard(closed_clone);
                Self::run_loop(&receiver);
            })
            .map_err(LoopError::Spawn)?;

        let thread_id = handle.thread().id();
        tracing::debug!(queue = %name, shared, "work queue started");

        Ok(Self {
            inner: Arc::new(Inner {
                name,
                shared,
                sender,
                thread_id,
                handle: Mutex::new(Some(handle)),
                closed,
                next_token: AtomicU64::new(1),
            }),
        })
    }

    /// Queue thread name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Whether this is a shared, long-lived queue.
    pub fn is_shared(&self) -> bool {
        self.inner.shared
    }

    /// Id of the queue thread.
    pub fn thread_id(&self) -> ThreadId {
        self.inner.thread_id
    }

    /// Check whether the caller is running on this queue's thread.
    pub fn is_current_thread(&self) -> bool {
        thread::current().id() == self.inner.thread_id
    }

    /// Whether the queue still accepts work.
    pub fn is_alive(&self) -> bool {
        !self.inner.closed.load(Ordering::Acquire)
    }

    /// Check whether two handles refer to the same queue thread.
    pub fn same_queue(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Hand out a token that no other caller of this queue holds.
    pub fn new_token(&self) -> TaskToken {
        TaskToken(self.inner.next_token.fetch_add(1, Ordering::Relaxed))
    }

    /// Run a task as soon as the queue gets to it.
    pub fn post<F>(&self, task: F) -> Result<(), LoopError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.send_task(None, None, Box::new(task))
    }

    /// Run a task once `delay` has elapsed.
    pub fn post_delayed<F>(&self, task: F, delay: Duration) -> Result<(), LoopError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.send_task(Some(deadline(delay)), None, Box::new(task))
    }

    /// Like [`WorkQueue::post`], tagged with a cancellable token.
    pub fn post_with_token<F>(&self, token: TaskToken, task: F) -> Result<(), LoopError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.send_task(None, Some(token), Box::new(task))
    }

    /// Like [`WorkQueue::post_delayed`], tagged with a cancellable token.
    pub fn post_delayed_with_token<F>(
        &self,
        token: TaskToken,
        task: F,
        delay: Duration,
    ) -> Result<(), LoopError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.send_task(Some(deadline(delay)), Some(token), Box::new(task))
    }

    /// Drop every pending task tagged with `token`.
    ///
    /// A task that has already started still runs to completion. Removing
    /// from a closed queue is a no-op.
    pub fn remove_callbacks(&self, token: TaskToken) {
        let _ = self.inner.sender.send(Command::Remove(token));
    }

    /// Stop the queue thread and discard pending tasks.
    ///
    /// Returns immediately. Use [`WorkQueue::join`] to wait for the thread.
    pub fn quit(&self) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let _ = self.inner.sender.send(Command::Quit);
        tracing::debug!(queue = %self.inner.name, "work queue quit requested");
    }

    /// Quit and wait for the queue thread to finish.
    ///
    /// Does not wait when called from the queue thread itself.
    pub fn join(&self) {
        self.quit();
        if self.is_current_thread() {
            return;
        }
        if let Some(handle) = self.inner.handle.lock().take() {
            let _ = handle.join();
        }
    }

    fn send_task(
        &self,
        due: Option<Instant>,
        token: Option<TaskToken>,
        task: Task,
    ) -> Result<(), LoopError> {
        if !self.is_alive() {
            tracing::warn!(queue = %self.inner.name, "task posted to closed work queue");
            return Err(LoopError::QueueClosed);
        }
        self.inner
            .sender
            .send(Command::Post { due, token, task })
            .map_err(|_| LoopError::QueueClosed)
    }

    /// Main queue loop.
    fn run_loop(receiver: &Receiver<Command>) {
        let mut pending: BinaryHeap<Reverse<Scheduled>> = BinaryHeap::new();
        let mut seq = 0u64;

        loop {
            // Apply everything already sent, including commands issued by
            // the task that just ran, before picking the next task.
            loop {
                match receiver.try_recv() {
                    Ok(command) => {
                        if !Self::apply(command, &mut pending, &mut seq) {
                            return;
                        }
                    }
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => return,
                }
            }

            let now = Instant::now();
            if pending.peek().is_some_and(|Reverse(next)| next.due <= now) {
                if let Some(Reverse(scheduled)) = pending.pop() {
                    (scheduled.task)();
                }
                continue;
            }

            let command = match pending.peek() {
                Some(Reverse(next)) => match receiver.recv_deadline(next.due) {
                    Ok(command) => command,
                    Err(RecvTimeoutError::Timeout) => continue,
                    Err(RecvTimeoutError::Disconnected) => return,
                },
                None => match receiver.recv() {
                    Ok(command) => command,
                    Err(_) => return,
                },
            };

            if !Self::apply(command, &mut pending, &mut seq) {
                return;
            }
        }
    }

    /// Apply one command to the schedule. Returns `false` on quit.
    fn apply(command: Command, pending: &mut BinaryHeap<Reverse<Scheduled>>, seq: &mut u64) -> bool {
        match command {
            Command::Post { due, token, task } => {
                pending.push(Reverse(Scheduled {
                    due: due.unwrap_or_else(Instant::now),
                    seq: *seq,
                    token,
                    task,
                }));
                *seq += 1;
                true
            }
            Command::Remove(token) => {
                pending.retain(|Reverse(scheduled)| scheduled.token != Some(token));
                true
            }
            Command::Quit => false,
        }
    }
}

impl std::fmt::Debug for WorkQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkQueue")
            .field("name", &self.inner.name)
            .field("shared", &self.inner.shared)
            .field("alive", &self.is_alive())
            .finish()
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let _ = self.sender.send(Command::Quit);
    }
}

fn deadline(delay: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(delay)
        .or_else(|| now.checked_add(FAR_FUTURE))
        .unwrap_or(now)
}
