//! Cadence Scheduling Core
//!
//! Frame-stepped scheduling primitives for interactive front-ends:
//!
//! - **Update List**: ordered collection that tolerates add/remove/clear from
//!   inside its own iteration
//! - **Frame Dispatch**: delayed, repeated, and per-frame callbacks counted in ticks
//! - **Coroutines**: `async` task bodies suspended on frame counts, predicates,
//!   labels, or nested tasks, resumed one step per update
//!
//! Everything here is single-threaded and has no notion of wall-clock time;
//! the host converts elapsed time into whole ticks and calls `update()` once
//! per tick.
//!
//! # Example
//!
//! ```rust
//! use cadence_core::FrameDispatch;
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! let dispatch = FrameDispatch::new();
//! let fired = Rc::new(Cell::new(false));
//!
//! let flag = fired.clone();
//! dispatch.delay(2, move || flag.set(true));
//!
//! dispatch.update();
//! assert!(!fired.get());
//! dispatch.update();
//! assert!(fired.get());
//! assert!(dispatch.is_clear());
//! ```

pub mod coroutine;
pub mod dispatch;
pub mod error;
pub mod update_list;

pub use coroutine::{
    Coroutine, CoroutineManager, CoroutineState, Suspend, Suspension, TaskResult, Yielder,
};
pub use dispatch::{FrameDispatch, IntoTicks};
pub use error::{Result, SequenceError};
pub use update_list::{EntryId, Tag, UpdateList};
