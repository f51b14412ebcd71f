//! State switching
//!
//! A [`StateSwitch`] turns a stream of plain values into begin/update/end
//! transitions. Feed it the current value every frame; it finds the first
//! case whose check accepts the value and:
//!
//! - begins that case if it is not active (ending the previous one first),
//! - updates it if it is active and the value is unchanged,
//! - restarts it (end, then begin) if it is active but the value changed.
//!
//! When no case matches, the active case is ended.

use std::fmt;

/// A guard deciding whether a case accepts a value
pub type Check<V> = Box<dyn Fn(&V) -> bool>;

/// An action run with the accepted value
pub type ValueAction<V> = Box<dyn FnMut(&V)>;

/// An action run when a case ends
pub type EndAction = Box<dyn FnMut()>;

/// One branch of a [`StateSwitch`]
pub struct SwitchCase<V> {
    check: Check<V>,
    on_begin: Option<ValueAction<V>>,
    on_update: Option<ValueAction<V>>,
    on_end: Option<EndAction>,
}

impl<V> SwitchCase<V> {
    /// Create a case accepting values for which `check` returns true
    pub fn new<F: Fn(&V) -> bool + 'static>(check: F) -> Self {
        Self {
            check: Box::new(check),
            on_begin: None,
            on_update: None,
            on_end: None,
        }
    }

    /// Add an action run when the case becomes active
    pub fn on_begin<F: FnMut(&V) + 'static>(mut self, action: F) -> Self {
        self.on_begin = Some(Box::new(action));
        self
    }

    /// Add an action run on each repeat of the same value
    pub fn on_update<F: FnMut(&V) + 'static>(mut self, action: F) -> Self {
        self.on_update = Some(Box::new(action));
        self
    }

    /// Add an action run when the case stops being active
    pub fn on_end<F: FnMut() + 'static>(mut self, action: F) -> Self {
        self.on_end = Some(Box::new(action));
        self
    }

    fn begin(&mut self, value: &V) {
        if let Some(action) = self.on_begin.as_mut() {
            action(value);
        }
    }

    fn update(&mut self, value: &V) {
        if let Some(action) = self.on_update.as_mut() {
            action(value);
        }
    }

    fn end(&mut self) {
        if let Some(action) = self.on_end.as_mut() {
            action();
        }
    }
}

impl<V: PartialEq + 'static> SwitchCase<V> {
    /// Create a case accepting exactly `expected`
    pub fn equals(expected: V) -> Self {
        Self::new(move |value| *value == expected)
    }
}

/// Converts per-frame values into stateful case transitions
pub struct StateSwitch<V> {
    cases: Vec<SwitchCase<V>>,
    active: Option<usize>,
    last_value: Option<V>,
}

impl<V: Clone + PartialEq> StateSwitch<V> {
    pub fn new() -> Self {
        Self {
            cases: Vec::new(),
            active: None,
            last_value: None,
        }
    }

    /// Builder: append a case; earlier cases take priority
    pub fn case(mut self, case: SwitchCase<V>) -> Self {
        self.cases.push(case);
        self
    }

    pub fn add(&mut self, case: SwitchCase<V>) {
        self.cases.push(case);
    }

    /// Apply the current value
    pub fn update(&mut self, value: &V) {
        let matched = self.cases.iter().position(|case| (case.check)(value));

        let Some(index) = matched else {
            self.end();
            return;
        };

        if self.active == Some(index) && self.last_value.as_ref() == Some(value) {
            self.cases[index].update(value);
            return;
        }

        self.end();
        self.active = Some(index);
        self.last_value = Some(value.clone());
        self.cases[index].begin(value);
    }

    /// End the active case, if any
    pub fn end(&mut self) {
        if let Some(index) = self.active.take() {
            self.last_value = None;
            if let Some(case) = self.cases.get_mut(index) {
                case.end();
            }
        }
    }

    /// Index of the active case, in insertion order
    pub fn active_case(&self) -> Option<usize> {
        self.active
    }

    pub fn last_value(&self) -> Option<&V> {
        self.last_value.as_ref()
    }
}

impl<V: Clone + PartialEq> Default for StateSwitch<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: fmt::Debug> fmt::Debug for StateSwitch<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateSwitch")
            .field("cases", &self.cases.len())
            .field("active", &self.active)
            .field("last_value", &self.last_value)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    type Log = Rc<RefCell<Vec<String>>>;

    fn logged_case(log: &Log, name: &'static str, check: fn(&i32) -> bool) -> SwitchCase<i32> {
        let (b, u, e) = (log.clone(), log.clone(), log.clone());
        SwitchCase::new(check)
            .on_begin(move |v| b.borrow_mut().push(format!("begin {name} {v}")))
            .on_update(move |v| u.borrow_mut().push(format!("update {name} {v}")))
            .on_end(move || e.borrow_mut().push(format!("end {name}")))
    }

    #[test]
    fn test_begin_update_restart_end() {
        let log: Log = Rc::default();
        let mut switch = StateSwitch::new()
            .case(logged_case(&log, "neg", |v| *v < 0))
            .case(logged_case(&log, "small", |v| *v < 10));

        switch.update(&-1);
        switch.update(&-1);
        switch.update(&-2);
        switch.update(&3);
        switch.update(&50);
        switch.update(&50);

        assert_eq!(
            *log.borrow(),
            vec![
                "begin neg -1",
                "update neg -1",
                "end neg",
                "begin neg -2",
                "end neg",
                "begin small 3",
                "end small",
            ]
        );
        assert_eq!(switch.active_case(), None);
    }

    #[test]
    fn test_first_matching_case_wins() {
        let hits = Rc::new(RefCell::new(Vec::new()));
        let (a, b) = (hits.clone(), hits.clone());
        let mut switch = StateSwitch::new()
            .case(SwitchCase::equals("loading").on_begin(move |_| a.borrow_mut().push("exact")))
            .case(SwitchCase::new(|_| true).on_begin(move |v| b.borrow_mut().push(*v)));

        switch.update(&"loading");
        switch.update(&"ready");
        assert_eq!(*hits.borrow(), vec!["exact", "ready"]);
        assert_eq!(switch.active_case(), Some(1));
        assert_eq!(switch.last_value(), Some(&"ready"));
    }
}
