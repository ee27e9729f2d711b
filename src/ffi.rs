//! C Foreign Function Interface (FFI) for Looper.
//!
//! This module exposes the frame loop to native hosts (NDK code, game
//! engines, other languages). All functions are `extern "C"` with a
//! stable ABI.
//!
//! # Safety
//!
//! All functions that accept pointers require valid pointers obtained
//! from this module. Null handles are tolerated and reported as
//! [`LooperResult::NullPointer`]. The caller owns the handle and must
//! release it with `looper_controller_destroy`.
//!
//! The tick callback runs on the controller's queue thread, not on the
//! thread that created the controller. `user_data` must be safe to use
//! from that thread.
//!
//! # Example (C)
//!
//! ```c
//! #include "looper.h"
//!
//! static int on_tick(double delta, void* user_data) {
//!     game_step((Game*)user_data, delta);
//!     return 0;
//! }
//!
//! int main() {
//!     LooperController* loop = looper_controller_new(60.0, on_tick, &game);
//!     if (!loop) return 1;
//!
//!     looper_controller_connect(loop);
//!     // ...
//!     looper_controller_destroy(loop);
//!     return 0;
//! }
//! ```

// FFI modules intentionally use unsafe and no_mangle
#![allow(unsafe_code)]
#![allow(unsafe_op_in_unsafe_fn)]
#![allow(clippy::missing_safety_doc)]
#![allow(clippy::not_unsafe_ptr_arg_deref)]

use crate::error::LoopError;
use crate::frame::{LoopConfig, LoopController};
use crossbeam_channel::TryRecvError;
use std::ffi::c_void;
use std::os::raw::{c_char, c_int};
use std::ptr;

// =============================================================================
// Opaque Handle Types
// =============================================================================

/// Opaque handle to a loop controller.
pub struct LooperController(LoopController);

/// Tick callback. Return 0 to continue; any other value ends the run.
pub type LooperTickFn = extern "C" fn(delta: f64, user_data: *mut c_void) -> c_int;

/// Host pointer handed back to the callback.
struct UserData(*mut c_void);

// SAFETY: the host promises `user_data` may be used from the queue thread.
unsafe impl Send for UserData {}

impl UserData {
    const fn get(&self) -> *mut c_void {
        self.0
    }
}

/// Nonzero status returned by a native callback.
#[derive(Debug, thiserror::Error)]
#[error("native callback returned {0}")]
struct NativeCallbackError(c_int);

// =============================================================================
// Result Codes
// =============================================================================

/// Result codes for FFI functions.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LooperResult {
    /// Operation succeeded.
    Ok = 0,
    /// Null pointer passed.
    NullPointer = 1,
    /// Controller has been disposed.
    Disposed = 2,
    /// Frame rate was zero, negative, or not finite.
    InvalidRate = 3,
    /// Work queue is closed.
    QueueClosed = 4,
    /// Queue thread could not be spawned.
    SpawnFailed = 5,
    /// Callback failed.
    CallbackFailed = 6,
}

impl From<&LoopError> for LooperResult {
    fn from(error: &LoopError) -> Self {
        match error {
            LoopError::Disposed => Self::Disposed,
            LoopError::InvalidRate(_) => Self::InvalidRate,
            LoopError::QueueClosed => Self::QueueClosed,
            LoopError::Spawn(_) => Self::SpawnFailed,
            LoopError::Callback { .. } => Self::CallbackFailed,
        }
    }
}

fn to_result(result: Result<(), LoopError>) -> LooperResult {
    match result {
        Ok(()) => LooperResult::Ok,
        Err(e) => LooperResult::from(&e),
    }
}

// =============================================================================
// Controller Functions
// =============================================================================

/// Create a loop controller on its own queue thread.
///
/// A null `callback` ticks without doing anything. Returns NULL on
/// failure (invalid rate, or the thread could not be spawned).
#[unsafe(no_mangle)]
pub extern "C" fn looper_controller_new(
    frame_rate: f64,
    callback: Option<LooperTickFn>,
    user_data: *mut c_void,
) -> *mut LooperController {
    let config = LoopConfig {
        frame_rate,
        ..LoopConfig::default()
    };
    let user_data = UserData(user_data);

    let controller = LoopController::with_config(None, config, move |delta| {
        let Some(callback) = callback else {
            return Ok(());
        };
        match callback(delta, user_data.get()) {
            0 => Ok(()),
            status => Err(NativeCallbackError(status).into()),
        }
    });

    match controller {
        Ok(controller) => Box::into_raw(Box::new(LooperController(controller))),
        Err(_) => ptr::null_mut(),
    }
}

/// Destroy a loop controller, disposing it first.
///
/// Blocks until a tick callback that is already running has returned, so
/// `user_data` may be freed once this returns. Called from inside the
/// callback it cannot wait and returns straight away.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn looper_controller_destroy(controller: *mut LooperController) {
    if controller.is_null() {
        return;
    }
    let controller = Box::from_raw(controller);
    controller.0.dispose();
    controller.0.queue().join();
}

/// Start (or restart) the loop.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn looper_controller_connect(controller: *const LooperController) -> LooperResult {
    if controller.is_null() {
        return LooperResult::NullPointer;
    }
    to_result((*controller).0.connect())
}

/// Stop the loop.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn looper_controller_disconnect(controller: *const LooperController) -> LooperResult {
    if controller.is_null() {
        return LooperResult::NullPointer;
    }
    (*controller).0.disconnect();
    LooperResult::Ok
}

/// Stop the loop for good and shut its queue down.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn looper_controller_dispose(controller: *const LooperController) -> LooperResult {
    if controller.is_null() {
        return LooperResult::NullPointer;
    }
    (*controller).0.dispose();
    LooperResult::Ok
}

/// Set the target ticks per second.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn looper_controller_set_frame_rate(
    controller: *const LooperController,
    frame_rate: f64,
) -> LooperResult {
    if controller.is_null() {
        return LooperResult::NullPointer;
    }
    to_result((*controller).0.configure(frame_rate))
}

/// Get the target ticks per second (0 for a null handle).
#[unsafe(no_mangle)]
pub unsafe extern "C" fn looper_controller_frame_rate(controller: *const LooperController) -> f64 {
    if controller.is_null() {
        return 0.0;
    }
    (*controller).0.rate()
}

/// Get the delta of the most recent tick in seconds.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn looper_controller_last_delta(controller: *const LooperController) -> f64 {
    if controller.is_null() {
        return 0.0;
    }
    (*controller).0.last_delta()
}

/// Get the number of ticks delivered so far.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn looper_controller_frames(controller: *const LooperController) -> u64 {
    if controller.is_null() {
        return 0;
    }
    (*controller).0.frames()
}

/// Check if the loop is scheduling ticks.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn looper_controller_is_running(controller: *const LooperController) -> bool {
    if controller.is_null() {
        return false;
    }
    (*controller).0.is_running()
}

/// Pop the next callback failure, if any.
///
/// Returns `true` and writes the failing frame number to `frame_out`
/// (when non-null) if a failure was pending.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn looper_controller_poll_error(
    controller: *const LooperController,
    frame_out: *mut u64,
) -> bool {
    if controller.is_null() {
        return false;
    }
    match (*controller).0.errors().try_recv() {
        Ok(LoopError::Callback { frame, .. }) => {
            if !frame_out.is_null() {
                *frame_out = frame;
            }
            true
        }
        Ok(_) | Err(TryRecvError::Empty | TryRecvError::Disconnected) => false,
    }
}

// =============================================================================
// Utility Functions
// =============================================================================

/// Get the library version string.
#[unsafe(no_mangle)]
pub extern "C" fn looper_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr().cast::<c_char>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CStr;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::thread;
    use std::time::{Duration, Instant};

    extern "C" fn count_ticks(_delta: f64, user_data: *mut c_void) -> c_int {
        let counter = unsafe { &*(user_data as *const AtomicU32) };
        counter.fetch_add(1, Ordering::SeqCst);
        0
    }

    extern "C" fn slow_tick(_delta: f64, user_data: *mut c_void) -> c_int {
        let state = unsafe { &*(user_data as *const AtomicU32) };
        state.store(1, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(150));
        state.store(2, Ordering::SeqCst);
        0
    }

    extern "C" fn fail_immediately(_delta: f64, _user_data: *mut c_void) -> c_int {
        7
    }

    fn wait_until(deadline: Duration, mut done: impl FnMut() -> bool) -> bool {
        let start = Instant::now();
        while start.elapsed() < deadline {
            if done() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        done()
    }

    #[test]
    fn test_controller_ticks_callback() {
        static COUNTER: AtomicU32 = AtomicU32::new(0);

        unsafe {
            let controller = looper_controller_new(
                200.0,
                Some(count_ticks),
                ptr::addr_of!(COUNTER).cast_mut().cast::<c_void>(),
            );
            assert!(!controller.is_null());
            assert_eq!(looper_controller_frame_rate(controller), 200.0);

            assert_eq!(looper_controller_connect(controller), LooperResult::Ok);
            assert!(wait_until(Duration::from_secs(2), || COUNTER.load(Ordering::SeqCst) >= 3));
            assert!(looper_controller_frames(controller) >= 3);

            assert_eq!(looper_controller_dispose(controller), LooperResult::Ok);
            assert_eq!(looper_controller_connect(controller), LooperResult::Disposed);
            looper_controller_destroy(controller);
        }
    }

    #[test]
    fn test_destroy_waits_for_running_callback() {
        static STATE: AtomicU32 = AtomicU32::new(0);

        unsafe {
            let controller = looper_controller_new(
                10.0,
                Some(slow_tick),
                ptr::addr_of!(STATE).cast_mut().cast::<c_void>(),
            );
            assert_eq!(looper_controller_connect(controller), LooperResult::Ok);
            assert!(wait_until(Duration::from_secs(2), || STATE.load(Ordering::SeqCst) == 1));

            looper_controller_destroy(controller);
            assert_eq!(STATE.load(Ordering::SeqCst), 2);
        }
    }

    #[test]
    fn test_callback_failure_is_reported() {
        unsafe {
            let controller = looper_controller_new(100.0, Some(fail_immediately), ptr::null_mut());
            assert_eq!(looper_controller_connect(controller), LooperResult::Ok);

            let mut frame = u64::MAX;
            assert!(wait_until(Duration::from_secs(2), || {
                looper_controller_poll_error(controller, &mut frame)
            }));
            assert_eq!(frame, 0);
            assert!(!looper_controller_is_running(controller));

            looper_controller_destroy(controller);
        }
    }

    #[test]
    fn test_invalid_rate_and_null_handles() {
        assert!(looper_controller_new(0.0, None, ptr::null_mut()).is_null());

        unsafe {
            let null = ptr::null::<LooperController>();
            assert_eq!(looper_controller_connect(null), LooperResult::NullPointer);
            assert_eq!(looper_controller_set_frame_rate(null, 30.0), LooperResult::NullPointer);
            assert!(!looper_controller_is_running(null));
            assert!(!looper_controller_poll_error(null, ptr::null_mut()));
            looper_controller_destroy(ptr::null_mut());

            let controller = looper_controller_new(30.0, None, ptr::null_mut());
            assert_eq!(
                looper_controller_set_frame_rate(controller, -1.0),
                LooperResult::InvalidRate
            );
            assert_eq!(looper_controller_disconnect(controller), LooperResult::Ok);
            looper_controller_destroy(controller);
        }
    }

    #[test]
    fn test_looper_version() {
        unsafe {
            let version = looper_version();
            let version_str = CStr::from_ptr(version).to_str().unwrap();
            assert_eq!(version_str, env!("CARGO_PKG_VERSION"));
        }
    }
}
