//! Frame dispatch
//!
//! Delayed, repeated, and per-frame callbacks counted in whole ticks.

use std::fmt;
use std::rc::Rc;

use crate::error::Result;
use crate::update_list::{EntryId, Tag, UpdateList};

/// Conversion of a caller-supplied count into whole ticks
///
/// Fractional counts are floored.
pub trait IntoTicks {
    fn into_ticks(self) -> i64;
}

macro_rules! impl_into_ticks_int {
    ($($ty:ty),*) => {
        $(
            impl IntoTicks for $ty {
                fn into_ticks(self) -> i64 {
                    i64::try_from(self).unwrap_or(i64::MAX)
                }
            }
        )*
    };
}

impl_into_ticks_int!(i8, i16, i32, i64, u8, u16, u32, u64, usize, isize);

impl IntoTicks for f32 {
    fn into_ticks(self) -> i64 {
        self.floor() as i64
    }
}

impl IntoTicks for f64 {
    fn into_ticks(self) -> i64 {
        self.floor() as i64
    }
}

fn clamp_ticks(ticks: i64) -> u32 {
    ticks.clamp(1, i64::from(u32::MAX)) as u32
}

type TickFn = Box<dyn FnMut()>;
type FinalFn = Box<dyn FnOnce()>;

/// A scheduled callback
enum Dispatch {
    /// Fire once when the countdown reaches zero
    Delay {
        remaining: u32,
        on_fire: Option<FinalFn>,
    },
    /// Fire every tick until the countdown reaches zero
    Recur { remaining: u32, on_tick: TickFn },
    /// Fire every tick until removed
    Hook { on_tick: TickFn },
}

impl Dispatch {
    /// Advance one tick, returning true once the entry is spent
    fn tick(&mut self) -> bool {
        match self {
            Dispatch::Delay { remaining, on_fire } => {
                *remaining = remaining.saturating_sub(1);
                if *remaining > 0 {
                    return false;
                }
                if let Some(on_fire) = on_fire.take() {
                    on_fire();
                }
                true
            }
            Dispatch::Recur { remaining, on_tick } => {
                on_tick();
                *remaining = remaining.saturating_sub(1);
                *remaining == 0
            }
            Dispatch::Hook { on_tick } => {
                on_tick();
                false
            }
        }
    }
}

/// Schedules callbacks against the frame counter
///
/// Cloning a `FrameDispatch` yields another handle to the same schedule, so
/// callbacks can schedule or cancel further work on the dispatcher that
/// runs them.
#[derive(Clone, Default)]
pub struct FrameDispatch {
    entries: Rc<UpdateList<Dispatch>>,
}

impl FrameDispatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Call `f` once, `count` ticks from now
    ///
    /// Counts below one are treated as one.
    pub fn delay<F>(&self, count: impl IntoTicks, f: F) -> EntryId
    where
        F: FnOnce() + 'static,
    {
        self.entries.add(Self::delay_entry(count, f))
    }

    pub fn delay_tagged<F>(&self, count: impl IntoTicks, f: F, tag: impl Into<Tag>) -> EntryId
    where
        F: FnOnce() + 'static,
    {
        self.entries.add_tagged(Self::delay_entry(count, f), tag)
    }

    fn delay_entry<F: FnOnce() + 'static>(count: impl IntoTicks, f: F) -> Dispatch {
        Dispatch::Delay {
            remaining: clamp_ticks(count.into_ticks()),
            on_fire: Some(Box::new(f)),
        }
    }

    /// Call `f` on each of the next `count` ticks
    ///
    /// A count below one schedules nothing and returns `None`.
    pub fn recur<F>(&self, count: impl IntoTicks, f: F) -> Option<EntryId>
    where
        F: FnMut() + 'static,
    {
        let entry = Self::recur_entry(count, f)?;
        Some(self.entries.add(entry))
    }

    pub fn recur_tagged<F>(&self, count: impl IntoTicks, f: F, tag: impl Into<Tag>) -> Option<EntryId>
    where
        F: FnMut() + 'static,
    {
        let entry = Self::recur_entry(count, f)?;
        Some(self.entries.add_tagged(entry, tag))
    }

    fn recur_entry<F: FnMut() + 'static>(count: impl IntoTicks, f: F) -> Option<Dispatch> {
        let ticks = count.into_ticks();
        if ticks <= 0 {
            return None;
        }
        Some(Dispatch::Recur {
            remaining: clamp_ticks(ticks),
            on_tick: Box::new(f),
        })
    }

    /// Call `f` every tick until removed
    pub fn hook<F>(&self, f: F) -> EntryId
    where
        F: FnMut() + 'static,
    {
        self.entries.add(Dispatch::Hook {
            on_tick: Box::new(f),
        })
    }

    pub fn hook_tagged<F>(&self, f: F, tag: impl Into<Tag>) -> EntryId
    where
        F: FnMut() + 'static,
    {
        self.entries.add_tagged(
            Dispatch::Hook {
                on_tick: Box::new(f),
            },
            tag,
        )
    }

    /// Call `f` on the next tick only
    pub fn once<F>(&self, f: F) -> EntryId
    where
        F: FnMut() + 'static,
    {
        self.entries.add(Dispatch::Recur {
            remaining: 1,
            on_tick: Box::new(f),
        })
    }

    pub fn once_tagged<F>(&self, f: F, tag: impl Into<Tag>) -> EntryId
    where
        F: FnMut() + 'static,
    {
        self.entries.add_tagged(
            Dispatch::Recur {
                remaining: 1,
                on_tick: Box::new(f),
            },
            tag,
        )
    }

    /// Advance every scheduled entry by one tick
    pub fn update(&self) {
        self.entries.update(Dispatch::tick, true);
    }

    /// Cancel everything without firing
    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn is_clear(&self) -> bool {
        self.entries.is_clear()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cancel the entry or tagged group without firing
    pub fn remove(&self, tag: impl Into<Tag>) -> bool {
        self.entries.remove(tag)
    }

    pub fn dispose(&self) -> Result<()> {
        tracing::debug!(pending = self.len(), "disposing frame dispatch");
        self.entries.dispose()
    }
}

impl fmt::Debug for FrameDispatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameDispatch")
            .field("entries", &self.entries)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};

    fn counter() -> (Rc<Cell<u32>>, impl FnMut() + 'static) {
        let count = Rc::new(Cell::new(0));
        let handle = count.clone();
        (count, move || handle.set(handle.get() + 1))
    }

    #[test]
    fn test_delay_one_fires_on_first_update() {
        let dispatch = FrameDispatch::new();
        let fired = Rc::new(Cell::new(0));
        let f = fired.clone();
        dispatch.delay(1, move || f.set(f.get() + 1));

        dispatch.update();
        assert_eq!(fired.get(), 1);
        assert!(dispatch.is_clear());

        dispatch.update();
        assert_eq!(fired.get(), 1);
    }

    #[test]
    fn test_delay_three_fires_on_third_update() {
        let dispatch = FrameDispatch::new();
        let fired = Rc::new(Cell::new(false));
        let f = fired.clone();
        dispatch.delay(3, move || f.set(true));

        dispatch.update();
        dispatch.update();
        assert!(!fired.get());
        dispatch.update();
        assert!(fired.get());
        assert!(dispatch.is_clear());
    }

    #[test]
    fn test_delay_counts_are_floored_and_clamped() {
        let dispatch = FrameDispatch::new();
        let order = Rc::new(RefCell::new(Vec::new()));

        for (label, count) in [("zero", 0.0), ("negative", -4.0), ("fraction", 2.9)] {
            let order = order.clone();
            dispatch.delay(count, move || order.borrow_mut().push(label));
        }

        dispatch.update();
        assert_eq!(*order.borrow(), vec!["zero", "negative"]);
        dispatch.update();
        assert_eq!(*order.borrow(), vec!["zero", "negative", "fraction"]);
    }

    #[test]
    fn test_recur_fires_each_tick_then_stops() {
        let dispatch = FrameDispatch::new();
        let (count, f) = counter();
        assert!(dispatch.recur(3, f).is_some());

        for _ in 0..5 {
            dispatch.update();
        }
        assert_eq!(count.get(), 3);
        assert!(dispatch.is_clear());
    }

    #[test]
    fn test_recur_non_positive_is_noop() {
        let dispatch = FrameDispatch::new();
        let (count, f) = counter();
        assert!(dispatch.recur(0, f).is_none());
        dispatch.update();
        assert_eq!(count.get(), 0);
        assert!(dispatch.is_clear());
    }

    #[test]
    fn test_hook_never_auto_clears() {
        let dispatch = FrameDispatch::new();
        let (count, f) = counter();
        let id = dispatch.hook(f);

        for _ in 0..5 {
            dispatch.update();
        }
        assert_eq!(count.get(), 5);
        assert!(!dispatch.is_clear());

        assert!(dispatch.remove(id));
        dispatch.update();
        assert_eq!(count.get(), 5);
    }

    #[test]
    fn test_once() {
        let dispatch = FrameDispatch::new();
        let (count, f) = counter();
        dispatch.once(f);

        dispatch.update();
        dispatch.update();
        assert_eq!(count.get(), 1);
        assert!(dispatch.is_clear());
    }

    #[test]
    fn test_remove_by_tag_cancels_group() {
        let dispatch = FrameDispatch::new();
        let (count, f) = counter();
        let (other, g) = counter();
        dispatch.hook_tagged(f, "button");
        dispatch.delay_tagged(1, move || {}, "button");
        dispatch.hook(g);

        assert!(dispatch.remove("button"));
        assert!(!dispatch.remove("button"));
        assert_eq!(dispatch.len(), 1);

        dispatch.update();
        assert_eq!(count.get(), 0);
        assert_eq!(other.get(), 1);
    }

    #[test]
    fn test_callbacks_can_schedule_on_same_dispatcher() {
        let dispatch = FrameDispatch::new();
        let fired = Rc::new(Cell::new(0));

        let inner = dispatch.clone();
        let f = fired.clone();
        dispatch.once(move || {
            let f = f.clone();
            inner.delay(1, move || f.set(f.get() + 1));
        });

        dispatch.update();
        assert_eq!(fired.get(), 0);
        dispatch.update();
        assert_eq!(fired.get(), 1);
        assert!(dispatch.is_clear());
    }

    #[test]
    fn test_clear_never_fires() {
        let dispatch = FrameDispatch::new();
        let fired = Rc::new(Cell::new(false));
        let f = fired.clone();
        dispatch.delay(2, move || f.set(true));

        dispatch.update();
        dispatch.clear();
        dispatch.update();
        dispatch.update();
        assert!(!fired.get());
    }

    #[test]
    fn test_clear_and_reschedule_from_callback() {
        let dispatch = FrameDispatch::new();
        let fired = Rc::new(Cell::new(0));
        dispatch.hook(|| {});

        let inner = dispatch.clone();
        let f = fired.clone();
        dispatch.once(move || {
            inner.clear();
            let f = f.clone();
            inner.delay(1, move || f.set(f.get() + 1));
        });

        dispatch.update();
        assert_eq!(dispatch.len(), 1);
        assert_eq!(fired.get(), 0);
        dispatch.update();
        assert_eq!(fired.get(), 1);
        assert!(dispatch.is_clear());
    }

    #[test]
    fn test_stale_id_after_clear_cancels_nothing() {
        let dispatch = FrameDispatch::new();
        let stale = dispatch.delay(5, || {});
        dispatch.clear();

        let (ticks, tick) = counter();
        dispatch.hook(tick);
        assert!(!dispatch.remove(stale));

        dispatch.update();
        assert_eq!(ticks.get(), 1);
    }

    #[test]
    fn test_dispose() {
        let dispatch = FrameDispatch::new();
        dispatch.hook(|| {});
        assert!(dispatch.dispose().is_ok());
        assert!(dispatch.is_clear());
        assert!(dispatch.dispose().is_err());
    }
}
