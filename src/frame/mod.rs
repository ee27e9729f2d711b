//! Frame loops: delta-time ticking on a work queue.
//!
//! - [`LoopController`]: owns the loop and its callback
//! - [`LoopHandle`]: cloneable control surface, usable inside the callback
//! - [`DeltaClock`]: stopwatch behind the tick deltas
//!
//! # Example
//!
//! ```rust,ignore
//! use looper::{LoopController, WorkQueue};
//!
//! let controller = LoopController::new(None, |delta| {
//!     world.step(delta);
//!     Ok(())
//! })?;
//! controller.configure(30.0)?;
//! controller.connect()?;
//! ```

mod clock;
mod controller;

pub use clock::DeltaClock;
pub use controller::{LoopCallback, LoopConfig, LoopController, LoopHandle, Tick};
