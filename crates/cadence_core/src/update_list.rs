//! Ordered update list
//!
//! An ordered collection that can be added to, removed from, or cleared from
//! inside its own `update` callback.
//!
//! Iteration starts on a fast path: a plain index walk over the live order,
//! with no allocation. The first structural mutation made during an update
//! snapshots the entries not yet visited; the rest of that update then runs on
//! the slow path, visiting each snapshotted entry only if it is still present.
//! Entries added during an update are never visited by that same update.
//!
//! Payloads live in a generational arena, so "still present" is a key lookup
//! and a removed entry can never be confused with a later one.

use std::borrow::Cow;
use std::cell::{Cell, RefCell};
use std::convert::Infallible;
use std::fmt;
use std::rc::Rc;

use slotmap::{new_key_type, SlotMap};
use tracing::{trace, warn};

use crate::error::{Result, SequenceError};

new_key_type! {
    /// Stable identity of an entry in an [`UpdateList`]
    pub struct EntryId;
}

/// Key used to remove entries in bulk
///
/// Every entry can be removed through its own [`EntryId`]; an optional tag
/// lets many entries share one removal key.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Tag {
    /// A single entry
    Entry(EntryId),
    /// A named group
    Name(Cow<'static, str>),
    /// A numeric group
    Key(u64),
    /// Identity of a shared object (the address of its allocation)
    Object(usize),
}

impl Tag {
    /// Tag by the identity of a reference-counted object
    pub fn of<T: ?Sized>(object: &Rc<T>) -> Self {
        Tag::Object(Rc::as_ptr(object) as *const () as usize)
    }
}

impl From<EntryId> for Tag {
    fn from(id: EntryId) -> Self {
        Tag::Entry(id)
    }
}

impl From<&'static str> for Tag {
    fn from(name: &'static str) -> Self {
        Tag::Name(Cow::Borrowed(name))
    }
}

impl From<String> for Tag {
    fn from(name: String) -> Self {
        Tag::Name(Cow::Owned(name))
    }
}

impl From<u64> for Tag {
    fn from(key: u64) -> Self {
        Tag::Key(key)
    }
}

struct Slot<T> {
    /// `None` only while the payload is being visited
    payload: Option<T>,
    tag: Option<Tag>,
}

impl<T> Slot<T> {
    fn matches(&self, id: EntryId, tag: &Tag) -> bool {
        match tag {
            Tag::Entry(entry) => *entry == id,
            other => self.tag.as_ref() == Some(other),
        }
    }
}

/// Ordered collection that tolerates mutation from inside its own iteration
pub struct UpdateList<T> {
    slots: RefCell<SlotMap<EntryId, Slot<T>>>,
    order: RefCell<Vec<EntryId>>,
    iterating: Cell<bool>,
    /// Index of the entry currently being visited on the fast path
    cursor: Cell<usize>,
    slow_path: Cell<bool>,
    /// Entries still to visit once the fast path has been abandoned
    pending: RefCell<Vec<EntryId>>,
    disposed: Cell<bool>,
}

impl<T> UpdateList<T> {
    pub fn new() -> Self {
        Self {
            slots: RefCell::new(SlotMap::with_key()),
            order: RefCell::new(Vec::new()),
            iterating: Cell::new(false),
            cursor: Cell::new(0),
            slow_path: Cell::new(false),
            pending: RefCell::new(Vec::new()),
            disposed: Cell::new(false),
        }
    }

    /// Append an entry
    pub fn add(&self, payload: T) -> EntryId {
        self.insert(payload, None)
    }

    /// Append an entry that can also be removed through `tag`
    pub fn add_tagged(&self, payload: T, tag: impl Into<Tag>) -> EntryId {
        self.insert(payload, Some(tag.into()))
    }

    fn insert(&self, payload: T, tag: Option<Tag>) -> EntryId {
        if self.disposed.get() {
            warn!("entry added to a disposed update list was dropped");
            return EntryId::default();
        }

        // the snapshot must be taken before the new entry exists
        self.enable_slow_path_if_required();

        let id = self.slots.borrow_mut().insert(Slot {
            payload: Some(payload),
            tag,
        });
        self.order.borrow_mut().push(id);
        id
    }

    /// Remove every entry matching `tag`
    ///
    /// Returns whether anything was removed.
    pub fn remove(&self, tag: impl Into<Tag>) -> bool {
        let tag = tag.into();
        self.enable_slow_path_if_required();

        let mut removed = Vec::new();
        {
            let mut slots = self.slots.borrow_mut();
            self.order.borrow_mut().retain(|&id| {
                let matched = slots.get(id).is_some_and(|slot| slot.matches(id, &tag));
                if matched {
                    removed.extend(slots.remove(id));
                }
                !matched
            });
        }

        // payload destructors run with no borrow held
        let did_remove = !removed.is_empty();
        drop(removed);
        did_remove
    }

    /// Remove every entry
    pub fn clear(&self) {
        self.enable_slow_path_if_required();

        self.order.borrow_mut().clear();
        // draining in place bumps slot versions so cleared ids stay dead
        let cleared: Vec<Slot<T>> = self
            .slots
            .borrow_mut()
            .drain()
            .map(|(_, slot)| slot)
            .collect();
        drop(cleared);
    }

    /// Remove every entry, handing back the payloads in order
    ///
    /// A payload that is being visited is not returned; it is dropped when
    /// its visit ends.
    pub fn drain(&self) -> Vec<T> {
        self.enable_slow_path_if_required();

        let order = std::mem::take(&mut *self.order.borrow_mut());
        let slots: Vec<Slot<T>> = {
            let mut arena = self.slots.borrow_mut();
            order.into_iter().filter_map(|id| arena.remove(id)).collect()
        };
        slots.into_iter().filter_map(|slot| slot.payload).collect()
    }

    /// Whether the list holds no entries
    pub fn is_clear(&self) -> bool {
        self.order.borrow().is_empty()
    }

    pub fn len(&self) -> usize {
        self.order.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.is_clear()
    }

    /// Whether any entry matches `tag`
    pub fn contains(&self, tag: impl Into<Tag>) -> bool {
        let tag = tag.into();
        let slots = self.slots.borrow();
        self.order.borrow().iter().any(|&id| {
            slots
                .get(id)
                .is_some_and(|slot| slot.matches(id, &tag))
        })
    }

    /// Whether an update is currently running
    pub fn is_iterating(&self) -> bool {
        self.iterating.get()
    }

    /// Visit every entry present when the call starts, in order
    ///
    /// When `remove_on_true` is set, entries whose visit returns `true` are
    /// removed. Calling `update` from inside a visit does nothing.
    pub fn update<F>(&self, mut visit: F, remove_on_true: bool)
    where
        F: FnMut(&mut T) -> bool,
    {
        let outcome = self.walk(
            |payload| Ok::<bool, Infallible>(visit(payload)),
            remove_on_true,
        );
        match outcome {
            Ok(()) => {}
            Err(never) => match never {},
        }
    }

    /// Fallible [`update`](Self::update)
    ///
    /// The first error stops the iteration and is returned; entries after the
    /// failing one are not visited and nothing is removed for the failure.
    pub fn try_update<F, E>(&self, visit: F, remove_on_true: bool) -> std::result::Result<(), E>
    where
        F: FnMut(&mut T) -> std::result::Result<bool, E>,
    {
        self.walk(visit, remove_on_true)
    }

    fn walk<F, E>(&self, mut visit: F, remove_on_true: bool) -> std::result::Result<(), E>
    where
        F: FnMut(&mut T) -> std::result::Result<bool, E>,
    {
        if self.disposed.get() || self.iterating.get() {
            return Ok(());
        }

        self.iterating.set(true);
        let _guard = IterationGuard { list: self };

        let mut index = 0;
        let mut length = self.order.borrow().len();
        while index < length && !self.slow_path.get() {
            self.cursor.set(index);
            let id = self.order.borrow()[index];

            let finished = self.visit_entry(id, &mut visit)?;
            if finished && remove_on_true {
                if self.slow_path.get() {
                    // the order changed under us, find the entry again
                    self.detach(id);
                } else {
                    self.order.borrow_mut().remove(index);
                    let slot = self.slots.borrow_mut().remove(id);
                    drop(slot);
                    length -= 1;
                }
            } else {
                index += 1;
            }
        }

        if self.slow_path.get() {
            let pending = std::mem::take(&mut *self.pending.borrow_mut());
            for &id in &pending {
                if !self.slots.borrow().contains_key(id) {
                    continue;
                }
                if self.visit_entry(id, &mut visit)? && remove_on_true {
                    self.detach(id);
                }
            }
            // keep the buffer for the next fallback
            let mut buffer = pending;
            buffer.clear();
            *self.pending.borrow_mut() = buffer;
        }

        Ok(())
    }

    fn visit_entry<F, E>(&self, id: EntryId, visit: &mut F) -> std::result::Result<bool, E>
    where
        F: FnMut(&mut T) -> std::result::Result<bool, E>,
    {
        let payload = self
            .slots
            .borrow_mut()
            .get_mut(id)
            .and_then(|slot| slot.payload.take());
        let Some(mut payload) = payload else {
            return Ok(false);
        };

        let outcome = visit(&mut payload);

        if let Some(slot) = self.slots.borrow_mut().get_mut(id) {
            slot.payload = Some(payload);
        }
        outcome
    }

    fn detach(&self, id: EntryId) {
        let slot = self.slots.borrow_mut().remove(id);
        if slot.is_some() {
            self.order.borrow_mut().retain(|&other| other != id);
        }
        drop(slot);
    }

    fn enable_slow_path_if_required(&self) {
        if !self.iterating.get() || self.slow_path.get() {
            return;
        }
        self.slow_path.set(true);

        let order = self.order.borrow();
        let mut pending = self.pending.borrow_mut();
        pending.clear();
        pending.extend(order.iter().skip(self.cursor.get() + 1).copied());
        trace!(remaining = pending.len(), "update list mutated mid-iteration, using slow path");
    }

    /// Release every entry; the list must not be used afterwards
    pub fn dispose(&self) -> Result<()> {
        if self.disposed.replace(true) {
            return Err(SequenceError::AlreadyDisposed {
                component: "update list",
            });
        }
        self.clear();
        Ok(())
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.get()
    }
}

impl<T> Default for UpdateList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for UpdateList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateList")
            .field("len", &self.len())
            .field("iterating", &self.iterating.get())
            .field("slow_path", &self.slow_path.get())
            .field("disposed", &self.disposed.get())
            .finish()
    }
}

/// Resets iteration state when an update ends, including by unwinding
struct IterationGuard<'a, T> {
    list: &'a UpdateList<T>,
}

impl<T> Drop for IterationGuard<'_, T> {
    fn drop(&mut self) {
        self.list.iterating.set(false);
        self.list.slow_path.set(false);
        self.list.cursor.set(0);
        if let Ok(mut pending) = self.list.pending.try_borrow_mut() {
            pending.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::collections::HashSet;

    fn collect<T: Copy>(list: &UpdateList<T>) -> Vec<T> {
        let mut seen = Vec::new();
        list.update(
            |v| {
                seen.push(*v);
                false
            },
            false,
        );
        seen
    }

    #[test]
    fn test_visits_in_insertion_order() {
        let list = UpdateList::new();
        for v in 1..=4 {
            list.add(v);
        }
        assert_eq!(collect(&list), vec![1, 2, 3, 4]);
        assert_eq!(list.len(), 4);
    }

    #[test]
    fn test_remove_on_true() {
        let list = UpdateList::new();
        for v in 1..=6 {
            list.add(v);
        }
        list.update(|v| *v % 2 == 0, true);
        assert_eq!(collect(&list), vec![1, 3, 5]);

        // without the flag nothing is removed
        list.update(|_| true, false);
        assert_eq!(list.len(), 3);
    }

    #[test]
    fn test_add_during_update_is_deferred() {
        let list = UpdateList::new();
        list.add(1);
        list.add(2);

        let mut seen = Vec::new();
        list.update(
            |v| {
                seen.push(*v);
                if *v == 1 {
                    list.add(10);
                }
                false
            },
            false,
        );

        assert_eq!(seen, vec![1, 2]);
        assert_eq!(collect(&list), vec![1, 2, 10]);
    }

    #[test]
    fn test_remove_ahead_is_not_visited() {
        let list = UpdateList::new();
        list.add(1);
        let second = list.add(2);
        list.add(3);

        let mut seen = Vec::new();
        list.update(
            |v| {
                seen.push(*v);
                if *v == 1 {
                    assert!(list.remove(second));
                }
                false
            },
            false,
        );

        assert_eq!(seen, vec![1, 3]);
    }

    #[test]
    fn test_remove_behind_does_not_skip() {
        let list = UpdateList::new();
        let first = list.add(1);
        list.add(2);
        list.add(3);

        let mut seen = Vec::new();
        list.update(
            |v| {
                seen.push(*v);
                if *v == 2 {
                    list.remove(first);
                }
                false
            },
            false,
        );

        assert_eq!(seen, vec![1, 2, 3]);
        assert_eq!(collect(&list), vec![2, 3]);
    }

    #[test]
    fn test_self_removal_with_remove_on_true() {
        let list = UpdateList::new();
        list.add(1);
        let second = list.add(2);
        list.add(3);

        let mut seen = Vec::new();
        list.update(
            |v| {
                seen.push(*v);
                if *v == 2 {
                    list.remove(second);
                    return true;
                }
                *v == 3
            },
            true,
        );

        assert_eq!(seen, vec![1, 2, 3]);
        assert_eq!(collect(&list), vec![1]);
    }

    #[test]
    fn test_clear_mid_update_stops_visits() {
        let list = UpdateList::new();
        for v in 1..=4 {
            list.add(v);
        }

        let mut seen = Vec::new();
        list.update(
            |v| {
                seen.push(*v);
                if *v == 2 {
                    list.clear();
                    list.add(99);
                }
                false
            },
            false,
        );

        assert_eq!(seen, vec![1, 2]);
        assert_eq!(collect(&list), vec![99]);
    }

    #[test]
    fn test_drain_mid_update_skips_visiting_entry() {
        let list = UpdateList::new();
        for v in 1..=4 {
            list.add(v);
        }

        let mut drained = Vec::new();
        list.update(
            |v| {
                if *v == 2 {
                    drained = list.drain();
                }
                false
            },
            false,
        );

        assert_eq!(drained, vec![1, 3, 4]);
        assert!(list.is_clear());
        assert!(list.drain().is_empty());
    }

    #[test]
    fn test_reentrant_update_is_noop() {
        let list = UpdateList::new();
        list.add(1);
        list.add(2);

        let mut outer = 0;
        let mut inner = 0;
        list.update(
            |_| {
                outer += 1;
                list.update(
                    |_| {
                        inner += 1;
                        false
                    },
                    false,
                );
                false
            },
            false,
        );

        assert_eq!(outer, 2);
        assert_eq!(inner, 0);
        assert!(!list.is_iterating());
    }

    #[test]
    fn test_remove_by_tag() {
        let list = UpdateList::new();
        list.add_tagged(1, "fade");
        list.add(2);
        list.add_tagged(3, "fade");
        list.add_tagged(4, 7u64);

        assert!(list.contains("fade"));
        assert!(list.remove("fade"));
        assert_eq!(collect(&list), vec![2, 4]);

        // absent tags mutate nothing
        assert!(!list.remove("fade"));
        assert!(!list.remove(8u64));
        assert_eq!(list.len(), 2);

        assert!(list.remove(7u64));
        assert_eq!(collect(&list), vec![2]);
    }

    #[test]
    fn test_removed_id_is_not_reused() {
        let list = UpdateList::new();
        let first = list.add(1);
        assert!(list.remove(first));
        let second = list.add(2);

        assert_ne!(first, second);
        assert!(!list.remove(first));
        assert_eq!(collect(&list), vec![2]);
    }

    #[test]
    fn test_try_update_stops_on_error() {
        let list = UpdateList::new();
        for v in 1..=4 {
            list.add(v);
        }

        let mut seen = Vec::new();
        let result = list.try_update(
            |v| {
                seen.push(*v);
                if *v == 2 {
                    return Err("boom");
                }
                Ok(true)
            },
            true,
        );

        assert_eq!(result, Err("boom"));
        assert_eq!(seen, vec![1, 2]);
        assert!(!list.is_iterating());
        assert_eq!(collect(&list), vec![2, 3, 4]);
    }

    #[test]
    fn test_state_resets_after_slow_path() {
        let list = UpdateList::new();
        list.add(1);
        list.add(2);

        list.update(
            |v| {
                if *v == 1 {
                    list.add(3);
                }
                false
            },
            false,
        );

        // the next update starts on the fast path with all three entries
        assert_eq!(collect(&list), vec![1, 2, 3]);
    }

    #[test]
    fn test_dispose_twice_is_error() {
        let list = UpdateList::new();
        list.add(1);
        assert!(list.dispose().is_ok());
        assert!(list.is_clear());
        assert!(matches!(
            list.dispose(),
            Err(SequenceError::AlreadyDisposed { .. })
        ));

        list.add(2);
        assert!(list.is_clear());
    }

    #[test]
    fn test_object_tag_identity() {
        let a = Rc::new(5);
        let b = Rc::new(5);
        assert_eq!(Tag::of(&a), Tag::of(&a.clone()));
        assert_ne!(Tag::of(&a), Tag::of(&b));
    }

    #[test]
    fn test_clear_then_add_mid_update_defers_new_entries() {
        let list = UpdateList::new();
        for v in 1..=3 {
            list.add(v);
        }

        let mut seen = Vec::new();
        list.update(
            |v| {
                seen.push(*v);
                if *v == 1 {
                    list.clear();
                    list.add(10);
                    list.add(20);
                }
                false
            },
            false,
        );

        assert_eq!(seen, vec![1]);
        assert_eq!(collect(&list), vec![10, 20]);
    }

    #[test]
    fn test_drain_then_add_mid_update_defers_new_entries() {
        let list = UpdateList::new();
        for v in 1..=3 {
            list.add(v);
        }

        let mut seen = Vec::new();
        let mut drained = Vec::new();
        list.update(
            |v| {
                seen.push(*v);
                if *v == 1 {
                    drained = list.drain();
                    list.add(10);
                }
                false
            },
            false,
        );

        assert_eq!(seen, vec![1]);
        assert_eq!(drained, vec![2, 3]);
        assert_eq!(collect(&list), vec![10]);
    }

    #[test]
    fn test_stale_id_after_clear_removes_nothing() {
        let list = UpdateList::new();
        let stale = list.add(1);
        list.clear();
        let live = list.add(2);

        assert_ne!(stale, live);
        assert!(!list.contains(stale));
        assert!(!list.remove(stale));
        assert_eq!(collect(&list), vec![2]);

        let drained = list.add(3);
        list.drain();
        list.add(4);
        assert!(!list.remove(drained));
        assert!(!list.remove(live));
        assert_eq!(collect(&list), vec![4]);
    }

    /// Random add/remove/clear scripts run from inside the visit callback
    ///
    /// One visit per run always clears the list and refills it, so ids from
    /// before the clear get exercised against entries added after it.
    #[test]
    fn test_randomized_mutation_during_update() {
        for seed in 0..200u64 {
            let mut rng = StdRng::seed_from_u64(seed);
            let list = UpdateList::new();
            let initial = rng.gen_range(1..12usize);
            // ids[n] is the entry holding value n
            let mut ids: Vec<EntryId> = (0..initial).map(|n| list.add(n)).collect();
            let at_start: HashSet<usize> = (0..initial).collect();
            // live values in list order
            let mut expected: Vec<usize> = (0..initial).collect();
            let refill_visit = rng.gen_range(1..=initial);

            let mut next = initial;
            let mut visited = Vec::new();
            let mut removed: HashSet<usize> = HashSet::new();
            let mut added: HashSet<usize> = HashSet::new();
            let mut refilled = false;

            list.update(
                |value| {
                    let value = *value;
                    assert!(!removed.contains(&value), "seed {seed}: visited removed {value}");
                    assert!(!added.contains(&value), "seed {seed}: visited added {value}");
                    visited.push(value);

                    let mut ops: Vec<u32> = (0..rng.gen_range(0..3))
                        .map(|_| rng.gen_range(0..10))
                        .collect();
                    if visited.len() == refill_visit {
                        ops.extend([9, 0, 0]);
                        refilled = true;
                    }

                    for op in ops {
                        match op {
                            0..=3 => {
                                ids.push(list.add(next));
                                expected.push(next);
                                added.insert(next);
                                next += 1;
                            }
                            4..=8 => {
                                let victim = rng.gen_range(0..ids.len());
                                let live = expected.contains(&victim);
                                assert_eq!(
                                    list.remove(ids[victim]),
                                    live,
                                    "seed {seed}: remove({victim})"
                                );
                                if live {
                                    expected.retain(|&v| v != victim);
                                    removed.insert(victim);
                                }
                            }
                            _ => {
                                removed.extend(expected.drain(..));
                                list.clear();
                            }
                        }
                    }
                    false
                },
                false,
            );

            assert!(refilled || visited.len() < refill_visit, "seed {seed}: no refill");

            let unique: HashSet<usize> = visited.iter().copied().collect();
            assert_eq!(unique.len(), visited.len(), "seed {seed}: double visit");

            // every entry present at the start was visited unless removed first
            for n in &at_start {
                assert!(
                    unique.contains(n) || removed.contains(n),
                    "seed {seed}: skipped {n}"
                );
            }
            for n in &unique {
                assert!(at_start.contains(n), "seed {seed}: visited late entry {n}");
            }

            // survivors plus additions, nothing removed comes back
            assert_eq!(collect(&list), expected, "seed {seed}: final contents");
        }
    }
}
