//! Cooperative coroutines
//!
//! A coroutine is an `async` task body that suspends at explicit points and is
//! resumed by the frame loop. Each suspension hands the scheduler a
//! [`Suspension`], a predicate that is re-checked once per update. When the
//! predicate is satisfied the task resumes within that same update.
//!
//! ```
//! use cadence_core::CoroutineManager;
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! let manager = CoroutineManager::new();
//! let step = Rc::new(Cell::new(0));
//!
//! let progress = step.clone();
//! manager.run(move |co| async move {
//!     progress.set(1);
//!     co.frames(2).await;
//!     progress.set(2);
//!     Ok(())
//! });
//!
//! manager.update().unwrap();
//! assert_eq!(step.get(), 1);
//! manager.update().unwrap();
//! manager.update().unwrap();
//! assert_eq!(step.get(), 2);
//! ```

use std::cell::{Cell, RefCell};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use futures::future::LocalBoxFuture;
use futures::task::noop_waker_ref;
use futures::FutureExt;
use rustc_hash::FxHashMap;
use tracing::trace;

use crate::dispatch::IntoTicks;
use crate::error::{Result, SequenceError};
use crate::update_list::{EntryId, Tag, UpdateList};

/// What a task body returns
pub type TaskResult = anyhow::Result<()>;

type TaskFuture = LocalBoxFuture<'static, TaskResult>;
type Predicate = Box<dyn FnMut() -> Result<bool>>;

/// A suspension point: a predicate checked once per update until it holds
pub struct Suspension {
    predicate: Predicate,
}

impl Suspension {
    /// Resume on the next update
    pub fn frame() -> Self {
        Self::condition(|| true)
    }

    /// Resume after `count` updates
    pub fn frames(count: impl IntoTicks) -> Self {
        let mut remaining = count.into_ticks();
        Self::condition(move || {
            remaining -= 1;
            remaining <= 0
        })
    }

    /// Resume once `condition` returns true
    pub fn condition<F>(mut condition: F) -> Self
    where
        F: FnMut() -> bool + 'static,
    {
        Self {
            predicate: Box::new(move || Ok(condition())),
        }
    }

    /// Resume once a nested coroutine completes
    ///
    /// The nested coroutine advances one step each time this suspension is
    /// checked. Its failure becomes the failure of the waiting coroutine.
    pub fn coroutine(mut nested: Coroutine) -> Self {
        Self {
            predicate: Box::new(move || nested.update()),
        }
    }

    fn is_satisfied(&mut self) -> Result<bool> {
        (self.predicate)()
    }
}

impl fmt::Debug for Suspension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Suspension").finish_non_exhaustive()
    }
}

/// Value a task hands back to its coroutine when it stops running
enum Yielded {
    Suspend(Suspension),
    Cancel,
}

type YieldSlot = Rc<RefCell<Option<Yielded>>>;

/// Named flags shared by every coroutine of a manager
#[derive(Clone, Default)]
struct Labels {
    flags: Rc<RefCell<FxHashMap<String, Rc<Cell<bool>>>>>,
}

impl Labels {
    fn define(&self, name: &str) {
        self.flags
            .borrow_mut()
            .entry(name.to_string())
            .or_insert_with(|| Rc::new(Cell::new(false)));
    }

    fn flag(&self, name: &str) -> Result<Rc<Cell<bool>>> {
        self.flags
            .borrow()
            .get(name)
            .cloned()
            .ok_or_else(|| SequenceError::UnknownLabel(name.to_string()))
    }
}

/// Future returned by every suspension request
///
/// The first poll hands the suspension to the owning coroutine and returns
/// `Pending`; the coroutine polls again once the suspension is satisfied.
#[must_use = "suspensions do nothing unless awaited"]
pub struct Suspend {
    slot: YieldSlot,
    request: Option<Yielded>,
}

impl Future for Suspend {
    type Output = ();

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<()> {
        let this = self.get_mut();
        match this.request.take() {
            Some(request) => {
                *this.slot.borrow_mut() = Some(request);
                Poll::Pending
            }
            None => Poll::Ready(()),
        }
    }
}

/// Handle a task body uses to suspend itself
#[derive(Clone)]
pub struct Yielder {
    slot: YieldSlot,
    labels: Labels,
}

impl Yielder {
    fn new(labels: Labels) -> Self {
        Self {
            slot: Rc::new(RefCell::new(None)),
            labels,
        }
    }

    fn request(&self, request: Yielded) -> Suspend {
        Suspend {
            slot: self.slot.clone(),
            request: Some(request),
        }
    }

    /// Suspend until `suspension` is satisfied
    pub fn suspend(&self, suspension: Suspension) -> Suspend {
        self.request(Yielded::Suspend(suspension))
    }

    /// Suspend until the next update
    pub fn next_frame(&self) -> Suspend {
        self.suspend(Suspension::frame())
    }

    /// Suspend for `count` updates
    pub fn frames(&self, count: impl IntoTicks) -> Suspend {
        self.suspend(Suspension::frames(count))
    }

    /// Suspend until `condition` returns true
    pub fn until<F>(&self, condition: F) -> Suspend
    where
        F: FnMut() -> bool + 'static,
    {
        self.suspend(Suspension::condition(condition))
    }

    /// Run `task` as a nested coroutine and suspend until it completes
    pub fn join<F, Fut>(&self, task: F) -> Suspend
    where
        F: FnOnce(Yielder) -> Fut,
        Fut: Future<Output = TaskResult> + 'static,
    {
        let nested = Coroutine::with_labels(self.labels.clone(), task);
        self.suspend(Suspension::coroutine(nested))
    }

    /// Suspend until the named label is raised
    ///
    /// Fails immediately if the label was never defined on the manager.
    pub fn wait_for(&self, label: &str) -> Result<Suspend> {
        let flag = self.labels.flag(label)?;
        Ok(self.until(move || flag.get()))
    }

    /// End the task now; the code after this point never runs
    pub fn cancel(&self) -> Suspend {
        self.request(Yielded::Cancel)
    }
}

impl fmt::Debug for Yielder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Yielder").finish_non_exhaustive()
    }
}

/// Coroutine lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CoroutineState {
    /// Will resume on the next update
    Running,
    /// Waiting on an unsatisfied suspension
    Suspended,
    /// Finished, failed, or cancelled
    Complete,
}

/// A single cooperative task
pub struct Coroutine {
    task: Option<TaskFuture>,
    slot: YieldSlot,
    waiting: Option<Suspension>,
}

impl Coroutine {
    /// Create a coroutine; the body does not run until the first update
    pub fn new<F, Fut>(task: F) -> Self
    where
        F: FnOnce(Yielder) -> Fut,
        Fut: Future<Output = TaskResult> + 'static,
    {
        Self::with_labels(Labels::default(), task)
    }

    fn with_labels<F, Fut>(labels: Labels, task: F) -> Self
    where
        F: FnOnce(Yielder) -> Fut,
        Fut: Future<Output = TaskResult> + 'static,
    {
        let yielder = Yielder::new(labels);
        let slot = yielder.slot.clone();
        Self {
            task: Some(task(yielder).boxed_local()),
            slot,
            waiting: None,
        }
    }

    pub fn state(&self) -> CoroutineState {
        match (&self.task, &self.waiting) {
            (None, _) => CoroutineState::Complete,
            (Some(_), Some(_)) => CoroutineState::Suspended,
            (Some(_), None) => CoroutineState::Running,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.task.is_none()
    }

    /// Advance by at most one resumption step
    ///
    /// Returns `Ok(true)` once the coroutine is complete. An error from the
    /// task body completes the coroutine and is returned.
    pub fn update(&mut self) -> Result<bool> {
        if self.task.is_none() {
            return Ok(true);
        }

        if let Some(waiting) = self.waiting.as_mut() {
            match waiting.is_satisfied() {
                Ok(true) => self.waiting = None,
                Ok(false) => return Ok(false),
                Err(err) => {
                    self.finish();
                    return Err(err);
                }
            }
        }

        let Some(task) = self.task.as_mut() else {
            return Ok(true);
        };
        let mut cx = Context::from_waker(noop_waker_ref());
        match task.as_mut().poll(&mut cx) {
            Poll::Ready(Ok(())) => {
                trace!("coroutine completed");
                self.finish();
                Ok(true)
            }
            Poll::Ready(Err(err)) => {
                self.finish();
                Err(SequenceError::Task(err))
            }
            Poll::Pending => {
                let yielded = self.slot.borrow_mut().take();
                match yielded {
                    Some(Yielded::Suspend(suspension)) => {
                        self.waiting = Some(suspension);
                        Ok(false)
                    }
                    Some(Yielded::Cancel) => {
                        trace!("coroutine cancelled itself");
                        self.finish();
                        Ok(true)
                    }
                    None => {
                        // awaited something other than a suspension, try again next update
                        self.waiting = Some(Suspension::frame());
                        Ok(false)
                    }
                }
            }
        }
    }

    fn finish(&mut self) {
        self.task = None;
        self.waiting = None;
    }
}

impl fmt::Debug for Coroutine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Coroutine")
            .field("state", &self.state())
            .finish()
    }
}

/// Runs many coroutines, one resumption step each per update
///
/// Cloning yields another handle to the same set of tasks, so a task can
/// spawn or cancel siblings from inside its own step.
#[derive(Clone, Default)]
pub struct CoroutineManager {
    tasks: Rc<UpdateList<Coroutine>>,
    labels: Labels,
}

impl CoroutineManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a task; its first step runs on the next update
    pub fn run<F, Fut>(&self, task: F) -> EntryId
    where
        F: FnOnce(Yielder) -> Fut,
        Fut: Future<Output = TaskResult> + 'static,
    {
        self.tasks
            .add(Coroutine::with_labels(self.labels.clone(), task))
    }

    /// Start a task bound to an explicit context value
    pub fn run_with<C, F, Fut>(&self, context: C, task: F) -> EntryId
    where
        F: FnOnce(Yielder, C) -> Fut,
        Fut: Future<Output = TaskResult> + 'static,
    {
        self.run(move |co| task(co, context))
    }

    pub fn run_tagged<F, Fut>(&self, tag: impl Into<Tag>, task: F) -> EntryId
    where
        F: FnOnce(Yielder) -> Fut,
        Fut: Future<Output = TaskResult> + 'static,
    {
        self.tasks
            .add_tagged(Coroutine::with_labels(self.labels.clone(), task), tag)
    }

    /// Resume every running task once
    ///
    /// A task body error stops this update and is returned; the failed task
    /// is dropped on the next update.
    pub fn update(&self) -> Result<()> {
        self.tasks.try_update(Coroutine::update, true)
    }

    /// Cancel every task without running any more of its body
    pub fn clear(&self) {
        self.tasks.clear();
    }

    pub fn is_clear(&self) -> bool {
        self.tasks.is_clear()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Cancel the task or tagged group
    pub fn remove(&self, tag: impl Into<Tag>) -> bool {
        self.tasks.remove(tag)
    }

    /// Declare a label tasks can wait on
    pub fn define_label(&self, name: &str) {
        self.labels.define(name);
    }

    /// Raise a label, releasing every task waiting on it
    pub fn raise_label(&self, name: &str) -> Result<()> {
        self.labels.flag(name)?.set(true);
        Ok(())
    }

    /// Lower a raised label so later waits suspend again
    pub fn reset_label(&self, name: &str) -> Result<()> {
        self.labels.flag(name)?.set(false);
        Ok(())
    }

    pub fn is_label_raised(&self, name: &str) -> Result<bool> {
        Ok(self.labels.flag(name)?.get())
    }

    pub fn dispose(&self) -> Result<()> {
        tracing::debug!(running = self.len(), "disposing coroutine manager");
        self.tasks.dispose()
    }
}

impl fmt::Debug for CoroutineManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoroutineManager")
            .field("tasks", &self.tasks)
            .finish()
    }
}
