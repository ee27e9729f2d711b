//! # Looper
//!
//! Handler-thread frame loops and small platform helpers.
//!
//! Looper runs a delta-time callback at a target rate on a single-threaded
//! work queue. It needs no timer thread or thread pool. Each tick re-posts
//! itself once the callback returns.
//!
//! ## Core Concepts
//!
//! - **Work queue**: one thread, ordered immediate and delayed tasks
//! - **Fixed-delay ticks**: next tick = end of this tick + (interval - exec), min 1ms
//! - **Let it crash**: a failing callback ends the run and reports the error
//! - **Shared queues**: never torn down by a single controller
//!
//! ## Example
//!
//! ```rust,ignore
//! use looper::LoopController;
//!
//! let controller = LoopController::new(None, |delta| {
//!     println!("{delta:.3}s since last frame");
//!     Ok(())
//! })?;
//! controller.configure(30.0)?;
//! controller.connect()?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod device;
pub mod display;
pub mod error;
pub mod ffi;
pub mod frame;
pub mod intent;
pub mod permission;
pub mod queue;
pub mod text;
pub mod thread;

// Re-exports for convenience
pub use device::{DiskStat, FsStat, Storage, StorageLocator};
pub use display::{DisplayMetrics, Orientation, SurfaceRotation};
pub use error::{CallbackError, LoopError, StorageError};
pub use frame::{DeltaClock, LoopConfig, LoopController, LoopHandle, Tick};
pub use intent::{ActivityLauncher, Intent};
pub use permission::{PermissionChecker, PermissionType};
pub use queue::{TaskToken, WorkQueue};
pub use text::compact_string;
