//! Loop Controller: a fixed-delay frame loop on a work queue.
//!
//! Each tick measures the time since the previous tick, hands that delta
//! to the callback, then posts the next tick after whatever is left of
//! the frame interval. The next tick is only posted once the current one
//! has returned, so there is never more than one pending tick and the
//! callback never overlaps with itself.
//!
//! ```text
//!  connect() ──▶ tick ──▶ callback(delta) ──▶ post_delayed(max(1ms, interval - exec))
//!                 ▲                                          │
//!                 └──────────────────────────────────────────┘
//! ```

use super::clock::DeltaClock;
use crate::error::{CallbackError, LoopError};
use crate::queue::{TaskToken, WorkQueue};
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Shortest delay between the end of one tick and the start of the next.
const MIN_DELAY: Duration = Duration::from_millis(1);

/// Boxed loop callback. Receives the frame delta in seconds.
pub type LoopCallback = Box<dyn FnMut(f64) -> Result<(), CallbackError> + Send + 'static>;

/// Configuration for a [`LoopController`].
#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// Target ticks per second. Values below 1 are allowed.
    pub frame_rate: f64,
    /// Thread name for a queue the controller spawns itself.
    pub queue_name: String,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            frame_rate: 60.0,
            queue_name: "looper".to_string(),
        }
    }
}

/// One completed tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tick {
    /// Frame number since the controller was created (0-based).
    pub frame: u64,
    /// Seconds since the previous tick of the same run.
    pub delta: f64,
}

/// Timing state, touched by ticks and by `connect()`.
struct Timing {
    rate: f64,
    clock: DeltaClock,
    last_delta: f64,
    frames: u64,
    last_tick: Option<Tick>,
}

struct Shared {
    queue: WorkQueue,
    /// Tags this controller's ticks on the queue.
    token: TaskToken,
    running: AtomicBool,
    disposed: AtomicBool,
    /// Bumped by every `connect()`. Ticks from older runs drop themselves.
    generation: AtomicU64,
    timing: Mutex<Timing>,
    callback: Mutex<LoopCallback>,
    errors: Sender<LoopError>,
}

impl Shared {
    fn schedule(self: &Arc<Self>, generation: u64, delay: Duration) -> Result<(), LoopError> {
        let shared = Arc::clone(self);
        let task = move || shared.tick(generation);
        if delay.is_zero() {
            self.queue.post_with_token(self.token, task)
        } else {
            self.queue.post_delayed_with_token(self.token, task, delay)
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        !self.disposed.load(Ordering::Acquire)
            && self.running.load(Ordering::Acquire)
            && self.generation.load(Ordering::Acquire) == generation
    }

    fn tick(self: &Arc<Self>, generation: u64) {
        let (frame, delta) = {
            let mut timing = self.timing.lock();
            if !self.is_current(generation) {
                return;
            }

            let nominal = 1.0 / timing.rate;
            let delta = match timing.clock.lap() {
                Some(elapsed) if !elapsed.is_zero() => elapsed.as_secs_f64(),
                _ => nominal,
            };

            let frame = timing.frames;
            timing.frames += 1;
            timing.last_delta = delta;
            timing.last_tick = Some(Tick { frame, delta });
            (frame, delta)
        };

        let started = Instant::now();
        let result = (self.callback.lock())(delta);
        let exec = started.elapsed();

        if let Err(source) = result {
            {
                // Only end the run this tick belongs to.
                let _timing = self.timing.lock();
                if self.generation.load(Ordering::Acquire) == generation {
                    self.running.store(false, Ordering::Release);
                }
            }
            tracing::error!(queue = %self.queue.name(), frame, error = %source, "loop callback failed");
            let _ = self.errors.send(LoopError::Callback { frame, source });
            return;
        }

        tracing::trace!(
            frame,
            delta,
            exec_us = u64::try_from(exec.as_micros()).unwrap_or(u64::MAX),
            "tick"
        );

        if !self.is_current(generation) {
            return;
        }

        // Rate changes made by the callback apply to this reschedule.
        let interval = frame_interval(self.timing.lock().rate);
        let delay = interval.saturating_sub(exec).max(MIN_DELAY);
        if let Err(e) = self.schedule(generation, delay) {
            tracing::warn!(queue = %self.queue.name(), error = %e, "loop stopped, queue closed");
            self.running.store(false, Ordering::Release);
        }
    }
}

/// Cloneable control surface of a [`LoopController`].
///
/// Hand one to the callback (for example through a `OnceLock`) to stop
/// or retune the loop from inside a tick.
#[derive(Clone)]
pub struct LoopHandle {
    shared: Arc<Shared>,
}

impl LoopHandle {
    /// Set the target ticks per second.
    ///
    /// Takes effect on the next reschedule. Any positive, finite rate is
    /// accepted, including rates below one tick per second.
    pub fn configure(&self, rate_hz: f64) -> Result<(), LoopError> {
        if !(rate_hz.is_finite() && rate_hz > 0.0) {
            return Err(LoopError::InvalidRate(rate_hz));
        }
        self.shared.timing.lock().rate = rate_hz;
        Ok(())
    }

    /// Set the target time between ticks, in seconds.
    pub fn set_interval(&self, interval_secs: f64) -> Result<(), LoopError> {
        self.configure(1.0 / interval_secs)
    }

    /// Current target ticks per second.
    pub fn rate(&self) -> f64 {
        self.shared.timing.lock().rate
    }

    /// Start (or restart) the loop with an immediate tick.
    ///
    /// Cancels any pending tick first. The first tick of the new run
    /// reports the nominal delta `1 / rate`.
    pub fn connect(&self) -> Result<(), LoopError> {
        // Disposal flips under the same lock, so a disposed controller is
        // never re-armed.
        let generation = {
            let mut timing = self.shared.timing.lock();
            if self.shared.disposed.load(Ordering::Acquire) {
                return Err(LoopError::Disposed);
            }
            timing.clock.reset();
            self.shared.running.store(true, Ordering::Release);
            self.shared.generation.fetch_add(1, Ordering::AcqRel) + 1
        };

        self.shared.queue.remove_callbacks(self.shared.token);

        if let Err(e) = self.shared.schedule(generation, Duration::ZERO) {
            let _timing = self.shared.timing.lock();
            if self.shared.generation.load(Ordering::Acquire) == generation {
                self.shared.running.store(false, Ordering::Release);
            }
            return Err(e);
        }
        tracing::debug!(queue = %self.shared.queue.name(), generation, "loop connected");
        Ok(())
    }

    /// Stop the loop. Calling it when already stopped does nothing.
    ///
    /// A tick that is already running finishes but does not schedule
    /// another one.
    pub fn disconnect(&self) {
        if self.shared.running.swap(false, Ordering::AcqRel) {
            tracing::debug!(queue = %self.shared.queue.name(), "loop disconnected");
        }
        self.shared.queue.remove_callbacks(self.shared.token);
    }

    /// Stop the loop for good.
    ///
    /// Quits the queue unless it is shared. Later `connect()` calls fail
    /// with [`LoopError::Disposed`]. Repeated calls do nothing.
    pub fn dispose(&self) {
        {
            let _timing = self.shared.timing.lock();
            if self.shared.disposed.swap(true, Ordering::AcqRel) {
                return;
            }
            self.shared.running.store(false, Ordering::Release);
            self.shared.generation.fetch_add(1, Ordering::AcqRel);
        }
        self.shared.queue.remove_callbacks(self.shared.token);

        if self.shared.queue.is_shared() {
            tracing::debug!(queue = %self.shared.queue.name(), "loop disposed, shared queue kept");
        } else {
            self.shared.queue.quit();
            tracing::debug!(queue = %self.shared.queue.name(), "loop disposed");
        }
    }

    /// Whether ticks are being scheduled.
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    /// Whether [`LoopHandle::dispose`] has been called.
    pub fn is_disposed(&self) -> bool {
        self.shared.disposed.load(Ordering::Acquire)
    }

    /// Delta of the most recent tick in seconds (1.0 before the first).
    pub fn last_delta(&self) -> f64 {
        self.shared.timing.lock().last_delta
    }

    /// The most recent tick, if any.
    pub fn last_tick(&self) -> Option<Tick> {
        self.shared.timing.lock().last_tick
    }

    /// Number of ticks delivered so far.
    pub fn frames(&self) -> u64 {
        self.shared.timing.lock().frames
    }

    /// Run an arbitrary task on the loop's queue.
    pub fn enqueue<F>(&self, task: F) -> Result<(), LoopError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.shared.queue.post(task)
    }

    /// The queue ticks run on.
    pub fn queue(&self) -> &WorkQueue {
        &self.shared.queue
    }
}

/// A frame loop driven by a [`WorkQueue`].
///
/// Dropping the controller disposes it.
pub struct LoopController {
    handle: LoopHandle,
    errors: Receiver<LoopError>,
}

impl LoopController {
    /// Create a controller with the default configuration (60 ticks/s).
    ///
    /// # Arguments
    ///
    /// * `queue` - Queue to tick on. `None` spawns a dedicated queue.
    /// * `callback` - Called once per tick with the delta in seconds.
    pub fn new<F>(queue: Option<WorkQueue>, callback: F) -> Result<Self, LoopError>
    where
        F: FnMut(f64) -> Result<(), CallbackError> + Send + 'static,
    {
        Self::with_config(queue, LoopConfig::default(), callback)
    }

    /// Create a controller whose callback ignores the delta.
    pub fn with_action<F>(queue: Option<WorkQueue>, mut action: F) -> Result<Self, LoopError>
    where
        F: FnMut() + Send + 'static,
    {
        Self::new(queue, move |_| {
            action();
            Ok(())
        })
    }

    /// Create a controller with a custom configuration.
    pub fn with_config<F>(
        queue: Option<WorkQueue>,
        config: LoopConfig,
        callback: F,
    ) -> Result<Self, LoopError>
    where
        F: FnMut(f64) -> Result<(), CallbackError> + Send + 'static,
    {
        if !(config.frame_rate.is_finite() && config.frame_rate > 0.0) {
            return Err(LoopError::InvalidRate(config.frame_rate));
        }

        let queue = match queue {
            Some(queue) => queue,
            None => WorkQueue::spawn(config.queue_name)?,
        };
        let (errors_tx, errors_rx) = unbounded();

        let shared = Arc::new(Shared {
            token: queue.new_token(),
            queue,
            running: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            timing: Mutex::new(Timing {
                rate: config.frame_rate,
                clock: DeltaClock::new(),
                last_delta: 1.0,
                frames: 0,
                last_tick: None,
            }),
            callback: Mutex::new(Box::new(callback)),
            errors: errors_tx,
        });

        Ok(Self {
            handle: LoopHandle { shared },
            errors: errors_rx,
        })
    }

    /// A cloneable handle for controlling the loop from elsewhere.
    pub fn handle(&self) -> LoopHandle {
        self.handle.clone()
    }

    /// Receiver of fatal callback errors.
    ///
    /// Each failed tick ends its run and sends one [`LoopError::Callback`].
    pub const fn errors(&self) -> &Receiver<LoopError> {
        &self.errors
    }

    /// See [`LoopHandle::configure`].
    pub fn configure(&self, rate_hz: f64) -> Result<(), LoopError> {
        self.handle.configure(rate_hz)
    }

    /// See [`LoopHandle::set_interval`].
    pub fn set_interval(&self, interval_secs: f64) -> Result<(), LoopError> {
        self.handle.set_interval(interval_secs)
    }

    /// Current target ticks per second.
    pub fn rate(&self) -> f64 {
        self.handle.rate()
    }

    /// See [`LoopHandle::connect`].
    pub fn connect(&self) -> Result<(), LoopError> {
        self.handle.connect()
    }

    /// See [`LoopHandle::disconnect`].
    pub fn disconnect(&self) {
        self.handle.disconnect();
    }

    /// See [`LoopHandle::dispose`].
    pub fn dispose(&self) {
        self.handle.dispose();
    }

    /// Whether ticks are being scheduled.
    pub fn is_running(&self) -> bool {
        self.handle.is_running()
    }

    /// Whether the controller has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.handle.is_disposed()
    }

    /// Delta of the most recent tick in seconds.
    pub fn last_delta(&self) -> f64 {
        self.handle.last_delta()
    }

    /// The most recent tick, if any.
    pub fn last_tick(&self) -> Option<Tick> {
        self.handle.last_tick()
    }

    /// Number of ticks delivered so far.
    pub fn frames(&self) -> u64 {
        self.handle.frames()
    }

    /// Run an arbitrary task on the loop's queue.
    pub fn enqueue<F>(&self, task: F) -> Result<(), LoopError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.handle.enqueue(task)
    }

    /// The queue ticks run on.
    pub fn queue(&self) -> &WorkQueue {
        self.handle.queue()
    }
}

impl Drop for LoopController {
    fn drop(&mut self) {
        self.handle.dispose();
    }
}

/// Target time between ticks for `rate` ticks per second.
fn frame_interval(rate: f64) -> Duration {
    Duration::try_from_secs_f64(1.0 / rate).unwrap_or(Duration::MAX)
}
