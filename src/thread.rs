//! Thread assertions against a work queue.
//!
//! Whichever queue the application treats as its UI or main queue plays
//! the role of the "UI thread" here.

use crate::queue::WorkQueue;

/// Check whether the caller runs on `queue`'s thread.
pub fn is_queue_thread(queue: &WorkQueue) -> bool {
    queue.is_current_thread()
}

/// Panic unless the caller runs on `queue`'s thread.
///
/// # Panics
///
/// Panics when called from any other thread.
#[track_caller]
pub fn assert_queue_thread(queue: &WorkQueue) {
    assert!(
        queue.is_current_thread(),
        "not on the {} queue thread",
        queue.name()
    );
}

/// Panic if the caller runs on the main queue's thread.
///
/// # Panics
///
/// Panics when called from `main_queue`'s thread.
#[track_caller]
pub fn assert_background_thread(main_queue: &WorkQueue) {
    assert!(
        !main_queue.is_current_thread(),
        "expected a background thread, but running on {}",
        main_queue.name()
    );
}
