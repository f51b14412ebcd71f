//! Node tree
//!
//! An application is a tree of nodes. Each node owns the scheduling
//! components it uses, created on first use, and drives them once per frame
//! in a fixed order:
//!
//! 1. frame dispatch (delays, repeats, hooks)
//! 2. tweens
//! 3. coroutines
//! 4. children, in the order they were added
//!
//! Running tweens before coroutines lets a coroutine waiting on a tween
//! resume in the same frame the tween writes its final value.
//!
//! A node's [`NodeCore`] is a cheap handle, so closures and coroutines can
//! keep one to schedule work, add children, or remove children later.

use std::cell::{Cell, OnceCell, RefCell};
use std::fmt;
use std::future::Future;
use std::rc::Rc;

use cadence_animation::{Curve, TweenHandle, TweenManager, TweenParams, Tweenable};
use cadence_core::{
    CoroutineManager, EntryId, FrameDispatch, IntoTicks, Tag, TaskResult, UpdateList, Yielder,
};
use serde_json::Value;
use tracing::{debug, warn};

use crate::context::Context;
use crate::error::{AppError, Result};
use crate::events::{EventDispatcher, EventListener, EVENT_DISPATCH_KEY};

/// Context key for the tween flushing flag read by [`NodeCore::dispose`]
pub const FLUSH_TWEENS_KEY: &str = "flush_tweens_on_dispose";

/// A participant in the frame loop
pub trait Node {
    fn core(&self) -> &NodeCore;

    /// Called once after the node has been attached and given its context
    fn begin(&mut self) -> Result<()> {
        Ok(())
    }

    /// Advance one frame
    fn update(&mut self) -> Result<()> {
        self.core().update()
    }

    /// Tear the node down; overrides must still dispose the core
    fn dispose(&mut self) -> Result<()> {
        self.core().dispose()
    }
}

/// A node shared with its parent
pub type SharedNode = Rc<RefCell<dyn Node>>;

struct ChildEntry {
    node: SharedNode,
    tag: Tag,
}

struct CoreInner {
    context: RefCell<Context>,
    dispatch: OnceCell<FrameDispatch>,
    tweens: OnceCell<TweenManager>,
    coroutines: OnceCell<CoroutineManager>,
    children: OnceCell<UpdateList<ChildEntry>>,
    disposables: RefCell<Vec<Box<dyn FnOnce()>>>,
    disposed: Cell<bool>,
}

/// Per-node scheduling state
///
/// Cloning yields another handle to the same node state.
#[derive(Clone)]
pub struct NodeCore {
    inner: Rc<CoreInner>,
}

impl NodeCore {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(CoreInner {
                context: RefCell::new(Context::new()),
                dispatch: OnceCell::new(),
                tweens: OnceCell::new(),
                coroutines: OnceCell::new(),
                children: OnceCell::new(),
                disposables: RefCell::new(Vec::new()),
                disposed: Cell::new(false),
            }),
        }
    }

    pub fn context(&self) -> Context {
        self.inner.context.borrow().clone()
    }

    pub(crate) fn set_context(&self, context: Context) {
        *self.inner.context.borrow_mut() = context;
    }

    pub fn frame_dispatch(&self) -> FrameDispatch {
        self.inner.dispatch.get_or_init(FrameDispatch::new).clone()
    }

    pub fn tween_manager(&self) -> TweenManager {
        self.inner.tweens.get_or_init(TweenManager::new).clone()
    }

    pub fn coroutine_manager(&self) -> CoroutineManager {
        self.inner
            .coroutines
            .get_or_init(CoroutineManager::new)
            .clone()
    }

    fn children(&self) -> &UpdateList<ChildEntry> {
        self.inner.children.get_or_init(UpdateList::new)
    }

    /// Attach `node` as the last child and begin it
    pub fn add_child<N: Node + 'static>(&self, node: N) -> Result<Rc<RefCell<N>>> {
        let node = Rc::new(RefCell::new(node));
        self.attach(node.clone())?;
        Ok(node)
    }

    /// Attach an already shared node as the last child and begin it
    ///
    /// The child gets a context derived from this node's. It is first
    /// updated on this node's next update.
    pub fn attach(&self, child: SharedNode) -> Result<()> {
        child.borrow().core().set_context(self.context().derive());
        let tag = Tag::of(&child);
        self.children().add_tagged(
            ChildEntry {
                node: child.clone(),
                tag: tag.clone(),
            },
            tag,
        );
        let result = child.borrow_mut().begin();
        result
    }

    /// Detach and dispose a child
    ///
    /// A child removing itself from inside its own update is disposed as
    /// soon as that update returns.
    pub fn remove_child<N>(&self, child: &Rc<RefCell<N>>) -> Result<bool>
    where
        N: Node + ?Sized + 'static,
    {
        let Some(children) = self.inner.children.get() else {
            return Ok(false);
        };
        if !children.remove(Tag::of(child)) {
            return Ok(false);
        }
        match child.try_borrow_mut() {
            Ok(mut node) => node.dispose()?,
            Err(_) => debug!("child is updating, disposing it once its update returns"),
        }
        Ok(true)
    }

    /// Detach and dispose every child
    pub fn remove_all_children(&self) -> Result<()> {
        let Some(children) = self.inner.children.get() else {
            return Ok(());
        };
        let mut outcome = Ok(());
        for entry in children.drain() {
            keep_first(&mut outcome, entry.dispose());
        }
        outcome
    }

    pub fn child_count(&self) -> usize {
        self.inner.children.get().map_or(0, UpdateList::len)
    }

    /// Start a tween on `target`, driven by this node
    pub fn tween<T, I, K>(
        &self,
        target: &Rc<RefCell<T>>,
        curve: Curve,
        properties: I,
        params: TweenParams,
    ) -> Result<TweenHandle>
    where
        T: Tweenable + 'static,
        I: IntoIterator<Item = (K, f64)>,
        K: AsRef<str>,
    {
        Ok(self.tween_manager().tween(target, curve, properties, params)?)
    }

    /// Call `f` once, `count` frames from now
    pub fn delay<F: FnOnce() + 'static>(&self, count: impl IntoTicks, f: F) -> EntryId {
        self.frame_dispatch().delay(count, f)
    }

    /// Start a coroutine driven by this node
    pub fn run<F, Fut>(&self, task: F) -> EntryId
    where
        F: FnOnce(Yielder) -> Fut,
        Fut: Future<Output = TaskResult> + 'static,
    {
        self.coroutine_manager().run(task)
    }

    /// Register cleanup to run when the node is disposed
    pub fn add_disposable<F: FnOnce() + 'static>(&self, cleanup: F) {
        if self.inner.disposed.get() {
            warn!("disposable added to a disposed node, running it now");
            cleanup();
            return;
        }
        self.inner.disposables.borrow_mut().push(Box::new(cleanup));
    }

    /// The event dispatcher published in this node's context
    pub fn event_dispatcher(&self) -> Result<EventDispatcher> {
        self.context()
            .get::<EventDispatcher>(EVENT_DISPATCH_KEY)
            .ok_or(AppError::MissingContext(EVENT_DISPATCH_KEY))
    }

    /// Listen for `event` until this node is disposed
    pub fn event_listen<F>(&self, event: &str, callback: F) -> Result<()>
    where
        F: FnMut(&Value) + 'static,
    {
        let dispatcher = self.event_dispatcher()?;
        let mut listener = EventListener::new(&dispatcher, event, callback);
        self.add_disposable(move || listener.dispose());
        Ok(())
    }

    pub fn event_dispatch(&self, event: &str, details: &Value) -> Result<()> {
        self.event_dispatcher()?.dispatch(event, details);
        Ok(())
    }

    pub fn event_defer(&self, event: &str, details: Value) -> Result<()> {
        self.event_dispatcher()?.defer(event, details);
        Ok(())
    }

    /// Run one frame: dispatch, tweens, coroutines, then children
    pub fn update(&self) -> Result<()> {
        if self.inner.disposed.get() {
            return Ok(());
        }

        if let Some(dispatch) = self.inner.dispatch.get() {
            dispatch.update();
        }
        if let Some(tweens) = self.inner.tweens.get() {
            tweens.update();
        }
        if let Some(coroutines) = self.inner.coroutines.get() {
            coroutines.update()?;
        }
        if let Some(children) = self.inner.children.get() {
            children.try_update(
                |entry| {
                    let mut node = entry.node.borrow_mut();
                    node.update()?;
                    if !children.contains(entry.tag.clone()) && !node.core().is_disposed() {
                        node.dispose()?;
                    }
                    Ok::<bool, AppError>(false)
                },
                false,
            )?;
        }
        Ok(())
    }

    /// Dispose children, then components, then registered cleanups
    ///
    /// Every step runs even if an earlier one fails; the first error is
    /// returned.
    pub fn dispose(&self) -> Result<()> {
        if self.inner.disposed.replace(true) {
            return Err(AppError::AlreadyDisposed("node"));
        }
        debug!(children = self.child_count(), "disposing node");

        let mut outcome = Ok(());
        if let Some(children) = self.inner.children.get() {
            for entry in children.drain() {
                keep_first(&mut outcome, entry.dispose());
            }
            keep_first(&mut outcome, children.dispose().map_err(AppError::from));
        }

        if let Some(tweens) = self.inner.tweens.get() {
            if self.context().get_or(FLUSH_TWEENS_KEY, false) {
                tweens.complete_all();
            }
            keep_first(&mut outcome, tweens.dispose().map_err(AppError::from));
        }
        if let Some(coroutines) = self.inner.coroutines.get() {
            keep_first(&mut outcome, coroutines.dispose().map_err(AppError::from));
        }
        if let Some(dispatch) = self.inner.dispatch.get() {
            keep_first(&mut outcome, dispatch.dispose().map_err(AppError::from));
        }

        let disposables = std::mem::take(&mut *self.inner.disposables.borrow_mut());
        for cleanup in disposables {
            cleanup();
        }
        outcome
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.get()
    }
}

impl ChildEntry {
    fn dispose(self) -> Result<()> {
        let outcome = match self.node.try_borrow_mut() {
            Ok(mut node) => node.dispose(),
            // the visit that holds it disposes it after its update
            Err(_) => Ok(()),
        };
        outcome
    }
}

fn keep_first(outcome: &mut Result<()>, result: Result<()>) {
    if outcome.is_ok() {
        *outcome = result;
    }
}

impl Default for NodeCore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for NodeCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeCore")
            .field("children", &self.child_count())
            .field("disposed", &self.is_disposed())
            .finish_non_exhaustive()
    }
}

/// A node with no behaviour of its own
#[derive(Debug, Default)]
pub struct BasicNode {
    core: NodeCore,
}

impl BasicNode {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Node for BasicNode {
    fn core(&self) -> &NodeCore {
        &self.core
    }
}
