//! Error types.
//!
//! Loop scheduling and storage discovery fail in unrelated ways, so each
//! gets its own enum.

use std::io;
use std::path::PathBuf;

/// Error returned by a loop callback.
pub type CallbackError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors from the frame loop and its work queue.
#[derive(Debug, thiserror::Error)]
pub enum LoopError {
    /// The controller was disposed and can no longer be connected.
    #[error("loop controller is disposed")]
    Disposed,

    /// A frame rate that is zero, negative, or not finite.
    #[error("invalid frame rate: {0}")]
    InvalidRate(f64),

    /// The work queue has quit (or its thread died).
    #[error("work queue is closed")]
    QueueClosed,

    /// The OS refused to spawn the queue thread.
    #[error("failed to spawn work queue thread: {0}")]
    Spawn(#[source] io::Error),

    /// The loop callback failed. The run is over until the next `connect()`.
    #[error("loop callback failed on frame {frame}: {source}")]
    Callback {
        /// Frame number of the failing tick (0-based).
        frame: u64,
        /// Error returned by the callback.
        #[source]
        source: CallbackError,
    },
}

impl LoopError {
    /// Whether this error means the controller is no longer usable.
    pub const fn is_illegal_state(&self) -> bool {
        matches!(self, Self::Disposed)
    }
}

/// Errors from storage discovery and size queries.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// No candidate directory exists.
    #[error("no external storage directory found")]
    NotFound,

    /// No mounted disk contains the path.
    #[error("no disk is mounted for {}", .0.display())]
    NoDisk(PathBuf),

    /// Filesystem access failed.
    #[error(transparent)]
    Io(#[from] io::Error),
}
