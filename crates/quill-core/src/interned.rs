//! The interned-string registry.
//!
//! Words that appear across many lines (identifiers, keywords) are stored
//! once in a process-wide pool; an [`InternedString`] is a reference-counted
//! handle to a pool slot. Acquiring the same value twice hands back the same
//! slot; the slot is reclaimed for reuse only when the last handle drops.
//! Slot reuse can never invalidate an outstanding handle: handles keep the
//! underlying storage alive independently of the slot table.
//!
//! The pool is thread-local, which is process-wide for this codebase: the
//! core is single-threaded by contract.

use std::borrow::Borrow;
use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::ops::Deref;
use std::rc::Rc;

struct Slot {
    data: Rc<str>,
    refs: usize,
}

#[derive(Default)]
struct Registry {
    slots: Vec<Option<Slot>>,
    free_slots: Vec<usize>,
    by_value: HashMap<Rc<str>, usize>,
}

impl Registry {
    fn acquire(&mut self, value: &str) -> (usize, Rc<str>) {
        if let Some(&slot) = self.by_value.get(value) {
            let entry = self.slots[slot].as_mut().expect("mapped slot is live");
            entry.refs += 1;
            return (slot, Rc::clone(&entry.data));
        }

        let data: Rc<str> = Rc::from(value);
        let slot = match self.free_slots.pop() {
            Some(slot) => {
                self.slots[slot] = Some(Slot {
                    data: Rc::clone(&data),
                    refs: 1,
                });
                slot
            }
            None => {
                self.slots.push(Some(Slot {
                    data: Rc::clone(&data),
                    refs: 1,
                }));
                self.slots.len() - 1
            }
        };
        self.by_value.insert(Rc::clone(&data), slot);
        (slot, data)
    }

    fn retain(&mut self, slot: usize) {
        if let Some(entry) = self.slots[slot].as_mut() {
            entry.refs += 1;
        }
    }

    fn release(&mut self, slot: usize) {
        let Some(entry) = self.slots[slot].as_mut() else {
            debug_assert!(false, "releasing a dead slot");
            return;
        };
        debug_assert!(entry.refs > 0);
        entry.refs -= 1;
        if entry.refs == 0 {
            let entry = self.slots[slot].take().expect("checked live");
            self.by_value.remove(&entry.data);
            self.free_slots.push(slot);
        }
    }
}

thread_local! {
    static REGISTRY: RefCell<Registry> = RefCell::new(Registry::default());
}

/// A reference-counted handle to a pooled string.
///
/// Compares, orders, and hashes by string value. Dropping the handle releases
/// its reference; the pool slot is reclaimed when the count reaches zero.
pub struct InternedString {
    slot: usize,
    view: Rc<str>,
}

impl InternedString {
    /// Acquire a handle for `value`, pooling it if it is new.
    pub fn new(value: &str) -> Self {
        let (slot, view) = REGISTRY.with(|r| r.borrow_mut().acquire(value));
        Self { slot, view }
    }

    /// The pooled string.
    pub fn as_str(&self) -> &str {
        &self.view
    }

    #[cfg(test)]
    fn slot(&self) -> usize {
        self.slot
    }
}

impl Clone for InternedString {
    fn clone(&self) -> Self {
        REGISTRY.with(|r| r.borrow_mut().retain(self.slot));
        Self {
            slot: self.slot,
            view: Rc::clone(&self.view),
        }
    }
}

impl Drop for InternedString {
    fn drop(&mut self) {
        // The registry may already be gone during thread teardown; the Rc
        // keeps the storage itself alive either way.
        let _ = REGISTRY.try_with(|r| r.borrow_mut().release(self.slot));
    }
}

impl Deref for InternedString {
    type Target = str;

    fn deref(&self) -> &str {
        self.as_str()
    }
}

impl Borrow<str> for InternedString {
    fn borrow(&self) -> &str {
        self.as_str()
    }
}

impl PartialEq for InternedString {
    fn eq(&self, other: &Self) -> bool {
        // Same slot means same value; different slots still compare content
        // so handles outliving a reclaimed slot behave correctly.
        self.slot == other.slot || self.view == other.view
    }
}

impl Eq for InternedString {}

impl PartialOrd for InternedString {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for InternedString {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_str().cmp(other.as_str())
    }
}

impl std::hash::Hash for InternedString {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.as_str().hash(state);
    }
}

impl fmt::Debug for InternedString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.as_str(), f)
    }
}

impl fmt::Display for InternedString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
