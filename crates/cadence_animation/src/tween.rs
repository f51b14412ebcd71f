//! Property tweens
//!
//! A [`Tween`] walks a precomputed [`Curve`] one frame per update, writing
//! `initial * (1 - ratio) + final * ratio` to every tracked property of its
//! target. Start values are captured from the target when the tween is
//! created, and captured again when a delay runs out, so changes made to the
//! target during the delay become the new starting point.
//!
//! Tweens hold their target weakly. Two tweens writing the same property in
//! the same frame are not arbitrated: whichever updates later wins. Use
//! [`TweenManager::remove_tweens_of`](crate::TweenManager::remove_tweens_of)
//! before starting an animation that should override an older one.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use cadence_core::{IntoTicks, Suspension, Tag};
use smallvec::SmallVec;
use tracing::{trace, warn};

use crate::easing::Curve;
use crate::error::TweenError;
use crate::property::{PropertyValue, Tweenable};

type OnComplete = Box<dyn FnOnce()>;

/// Start and end of one animated property
#[derive(Clone, Debug, PartialEq)]
struct TrackedProperty {
    name: String,
    initial: f64,
    target: f64,
    suffix: Option<String>,
}

impl TrackedProperty {
    fn capture(target: &dyn Tweenable, name: &str, final_value: f64) -> Result<Self, TweenError> {
        let current = target
            .property(name)
            .ok_or_else(|| TweenError::MissingProperty(name.to_string()))?;
        let (initial, suffix) =
            current
                .split_numeric()
                .ok_or_else(|| TweenError::NotNumeric {
                    property: name.to_string(),
                    value: current.to_string(),
                })?;

        Ok(Self {
            name: name.to_string(),
            initial,
            target: final_value,
            suffix,
        })
    }

    fn value_at(&self, ratio: f64) -> PropertyValue {
        let value = self.initial * (1.0 - ratio) + self.target * ratio;
        PropertyValue::with_suffix(value, self.suffix.as_deref())
    }
}

/// Optional tween behaviour
#[derive(Default)]
pub struct TweenParams {
    on_complete: Option<OnComplete>,
    delay: u32,
}

impl TweenParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: call `f` once, after the final frame has been written
    pub fn on_complete<F: FnOnce() + 'static>(mut self, f: F) -> Self {
        self.on_complete = Some(Box::new(f));
        self
    }

    /// Builder: wait `frames` updates before the first write
    pub fn delay(mut self, frames: impl IntoTicks) -> Self {
        self.delay = frames.into_ticks().clamp(0, i64::from(u32::MAX)) as u32;
        self
    }
}

impl fmt::Debug for TweenParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TweenParams")
            .field("on_complete", &self.on_complete.is_some())
            .field("delay", &self.delay)
            .finish()
    }
}

/// A frame-stepped animation of numeric properties on one target
pub struct Tween {
    target: Weak<RefCell<dyn Tweenable>>,
    tag: Tag,
    curve: Curve,
    properties: SmallVec<[TrackedProperty; 4]>,
    frame: usize,
    delay: u32,
    on_complete: Option<OnComplete>,
}

impl Tween {
    /// Capture the current values of `properties` on `target`
    ///
    /// Each property must exist on the target and hold a number, or text
    /// starting with a number.
    pub fn new<T, I, K>(
        target: &Rc<RefCell<T>>,
        curve: Curve,
        properties: I,
        params: TweenParams,
    ) -> Result<Self, TweenError>
    where
        T: Tweenable + 'static,
        I: IntoIterator<Item = (K, f64)>,
        K: AsRef<str>,
    {
        let tracked = {
            let current = target.borrow();
            properties
                .into_iter()
                .map(|(name, value)| TrackedProperty::capture(&*current, name.as_ref(), value))
                .collect::<Result<SmallVec<_>, _>>()?
        };

        let shared: Rc<RefCell<dyn Tweenable>> = target.clone();
        Ok(Self {
            target: Rc::downgrade(&shared),
            tag: Tag::of(target),
            curve,
            properties: tracked,
            frame: 0,
            delay: params.delay,
            on_complete: params.on_complete,
        })
    }

    /// Advance one frame, returning true once the tween is complete
    pub fn update(&mut self) -> bool {
        let (finished, on_complete) = self.step();
        if let Some(on_complete) = on_complete {
            on_complete();
        }
        finished
    }

    /// Jump straight to the final frame and fire the completion callback
    pub fn complete(&mut self) -> bool {
        if let Some(on_complete) = self.finish_now() {
            on_complete();
        }
        true
    }

    /// Advance one frame without running the completion callback
    ///
    /// The callback is handed back so it can run with no borrow held.
    pub(crate) fn step(&mut self) -> (bool, Option<OnComplete>) {
        if self.delay > 0 {
            self.delay -= 1;
            if self.delay == 0 {
                self.recapture();
            }
            return (false, None);
        }

        if let Some(&ratio) = self.curve.get(self.frame) {
            self.frame += 1;
            if !self.write(ratio) {
                warn!("tween target was dropped, abandoning tween");
                self.frame = self.curve.len();
                self.on_complete = None;
                return (true, None);
            }
        }

        let finished = self.frame >= self.curve.len();
        let on_complete = if finished {
            trace!(frames = self.curve.len(), "tween finished");
            self.on_complete.take()
        } else {
            None
        };
        (finished, on_complete)
    }

    pub(crate) fn finish_now(&mut self) -> Option<OnComplete> {
        let ratio = self.curve.final_ratio().unwrap_or(1.0);
        if !self.write(ratio) {
            warn!("tween target was dropped before completion");
            self.on_complete = None;
        }
        self.delay = 0;
        self.frame = self.curve.len();
        self.on_complete.take()
    }

    fn write(&self, ratio: f64) -> bool {
        let Some(target) = self.target.upgrade() else {
            return false;
        };
        let mut target = target.borrow_mut();
        for property in &self.properties {
            target.set_property(&property.name, property.value_at(ratio));
        }
        true
    }

    fn recapture(&mut self) {
        let Some(target) = self.target.upgrade() else {
            return;
        };
        let target = target.borrow();
        for property in &mut self.properties {
            match TrackedProperty::capture(&*target, &property.name, property.target) {
                Ok(fresh) => *property = fresh,
                Err(err) => warn!(%err, "keeping start value captured at creation"),
            }
        }
    }

    /// Frames written so far
    pub fn frame(&self) -> usize {
        self.frame
    }

    pub fn curve(&self) -> &Curve {
        &self.curve
    }

    /// Whether the tween is still waiting out its delay
    pub fn is_delaying(&self) -> bool {
        self.delay > 0
    }

    /// Whether the cursor has reached the end of the curve
    pub fn is_finished(&self) -> bool {
        self.delay == 0 && self.frame >= self.curve.len()
    }

    /// Removal key shared by every tween on the same target
    pub fn tag(&self) -> Tag {
        self.tag.clone()
    }
}

impl fmt::Debug for Tween {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tween")
            .field("properties", &self.properties)
            .field("frame", &self.frame)
            .field("frames", &self.curve.len())
            .field("delay", &self.delay)
            .finish_non_exhaustive()
    }
}

/// Shared handle to a tween registered with a manager
#[derive(Clone)]
pub struct TweenHandle {
    tween: Rc<RefCell<Tween>>,
}

impl TweenHandle {
    pub fn new(tween: Tween) -> Self {
        Self {
            tween: Rc::new(RefCell::new(tween)),
        }
    }

    /// Advance one frame, returning true once complete
    pub fn update(&self) -> bool {
        let (finished, on_complete) = self.tween.borrow_mut().step();
        if let Some(on_complete) = on_complete {
            on_complete();
        }
        finished
    }

    /// Jump to the final frame and fire the completion callback
    pub fn complete(&self) {
        let on_complete = self.tween.borrow_mut().finish_now();
        if let Some(on_complete) = on_complete {
            on_complete();
        }
    }

    pub fn is_finished(&self) -> bool {
        self.tween.borrow().is_finished()
    }

    pub fn frame(&self) -> usize {
        self.tween.borrow().frame()
    }

    pub fn tag(&self) -> Tag {
        self.tween.borrow().tag()
    }

    /// Suspension that holds until this tween reaches the end of its curve
    pub fn suspension(&self) -> Suspension {
        let handle = self.clone();
        Suspension::condition(move || handle.is_finished())
    }
}

impl From<&TweenHandle> for Suspension {
    fn from(handle: &TweenHandle) -> Self {
        handle.suspension()
    }
}

impl fmt::Debug for TweenHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.tween.try_borrow() {
            Ok(tween) => tween.fmt(f),
            Err(_) => f.write_str("TweenHandle(<updating>)"),
        }
    }
}
