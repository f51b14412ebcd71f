//! Tween manager
//!
//! Owns the running tweens and advances each one frame per update, dropping
//! those that reach the end of their curve.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use cadence_core::{Tag, UpdateList};
use tracing::debug;

use crate::easing::Curve;
use crate::error::TweenError;
use crate::property::Tweenable;
use crate::tween::{Tween, TweenHandle, TweenParams};

/// Advances a set of tweens once per frame
///
/// Clones share the same tweens.
#[derive(Clone, Default)]
pub struct TweenManager {
    tweens: Rc<UpdateList<TweenHandle>>,
}

impl TweenManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an existing tween; it is first stepped on the next update
    pub fn add(&self, tween: Tween) -> TweenHandle {
        let tag = tween.tag();
        let handle = TweenHandle::new(tween);
        self.tweens.add_tagged(handle.clone(), tag);
        handle
    }

    /// Build a tween on `target` and register it
    pub fn tween<T, I, K>(
        &self,
        target: &Rc<RefCell<T>>,
        curve: Curve,
        properties: I,
        params: TweenParams,
    ) -> Result<TweenHandle, TweenError>
    where
        T: Tweenable + 'static,
        I: IntoIterator<Item = (K, f64)>,
        K: AsRef<str>,
    {
        let tween = Tween::new(target, curve, properties, params)?;
        Ok(self.add(tween))
    }

    /// Stop every tween driving `target`, leaving its properties as they are
    pub fn remove_tweens_of<T: ?Sized>(&self, target: &Rc<T>) -> bool {
        self.tweens.remove(Tag::of(target))
    }

    /// Step every tween one frame and drop the finished ones
    pub fn update(&self) {
        self.tweens.update(|tween| tween.update(), true);
    }

    /// Jump every tween to its final frame, firing completion callbacks
    pub fn complete_all(&self) {
        debug!(running = self.len(), "completing all tweens");
        self.tweens.update(
            |tween| {
                tween.complete();
                true
            },
            true,
        );
    }

    /// Drop every tween without completing it
    pub fn clear(&self) {
        self.tweens.clear();
    }

    pub fn is_clear(&self) -> bool {
        self.tweens.is_clear()
    }

    pub fn len(&self) -> usize {
        self.tweens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tweens.is_empty()
    }

    pub fn dispose(&self) -> cadence_core::Result<()> {
        debug!(running = self.len(), "disposing tween manager");
        self.tweens.dispose()
    }
}

impl fmt::Debug for TweenManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TweenManager")
            .field("tweens", &self.tweens)
            .finish()
    }
}
