//! The backing collection.
//!
//! [`RecordList`] is a dense, ordered sequence of JSON records behind a
//! cheaply clonable handle. It owns nothing about filtering; its job is to
//! mutate and to tell subscribers exactly what moved: splices as
//! `(start, removed, added)` framed by will/did notifications, per-record
//! property writes as `(index, path)`. Range observers are notified only
//! when a change intersects their registered span, and a registration's
//! span can be re-scoped in place.

use serde_json::Value;
use std::cell::RefCell;
use std::ops::Range;
use std::rc::Rc;
use tracing::debug;

use crate::engine::types::FastIndexMap;
use crate::query::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListObserverId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListRangeObserverId(u64);

/// Watches the whole collection.
pub trait ListObserver {
    fn list_will_change(&self, _start: usize, _removed: usize, _added: usize) {}
    fn list_did_change(&self, _start: usize, _removed: usize, _added: usize) {}
    fn record_property_did_change(&self, _index: usize, _path: &Path) {}
}

/// Watches a span of the collection. In-place record changes arrive as
/// `(index, 1, 1)`.
pub trait ListRangeObserver {
    fn range_did_change(&self, start: usize, removed: usize, added: usize);
}

struct RangeRegistration {
    range: Option<Range<usize>>,
    observer: Rc<dyn ListRangeObserver>,
}

#[derive(Default)]
struct ListInner {
    records: Vec<Value>,
    observers: FastIndexMap<u64, Rc<dyn ListObserver>>,
    range_observers: FastIndexMap<u64, RangeRegistration>,
    next_handle: u64,
}

impl ListInner {
    fn alloc_handle(&mut self) -> u64 {
        let handle = self.next_handle;
        self.next_handle += 1;
        handle
    }
}

#[derive(Clone, Default)]
pub struct RecordList {
    inner: Rc<RefCell<ListInner>>,
}

impl RecordList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: Vec<Value>) -> Self {
        Self { inner: Rc::new(RefCell::new(ListInner { records, ..Default::default() })) }
    }

    /// Two handles are the same collection iff they share storage.
    pub fn ptr_eq(&self, other: &RecordList) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.borrow().records.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        self.inner.borrow().records.get(index).cloned()
    }

    pub fn to_vec(&self) -> Vec<Value> {
        self.inner.borrow().records.clone()
    }

    // --- Mutation ---

    pub fn push(&self, record: Value) {
        let start = self.len();
        self.splice(start, 0, vec![record]);
    }

    pub fn insert(&self, index: usize, record: Value) {
        self.splice(index, 0, vec![record]);
    }

    pub fn remove(&self, index: usize) -> Option<Value> {
        if index >= self.len() {
            return None;
        }
        let removed = self.inner.borrow().records[index].clone();
        self.splice(index, 1, vec![]);
        Some(removed)
    }

    pub fn replace(&self, index: usize, record: Value) -> Option<Value> {
        if index >= self.len() {
            return None;
        }
        let previous = self.inner.borrow().records[index].clone();
        self.splice(index, 1, vec![record]);
        Some(previous)
    }

    /// Remove `removed` records at `start` and insert `added` in their
    /// place, with will/did framing around the physical change.
    pub fn splice(&self, start: usize, removed: usize, added: Vec<Value>) {
        let len = self.len();
        let start = start.min(len);
        let removed = removed.min(len - start);
        let added_count = added.len();
        if removed == 0 && added_count == 0 {
            return;
        }

        let observers = self.observer_snapshot();
        for observer in &observers {
            observer.list_will_change(start, removed, added_count);
        }

        {
            let mut inner = self.inner.borrow_mut();
            inner.records.splice(start..start + removed, added);
        }
        debug!(start, removed, added = added_count, "collection spliced");

        for observer in &observers {
            observer.list_did_change(start, removed, added_count);
        }
        self.notify_ranges(start, removed, added_count);
    }

    /// Write one field of a record in place. Intermediate segments must
    /// already be objects; the leaf is created if absent. Returns false
    /// when the path cannot be reached.
    pub fn set_path(&self, index: usize, path: &str, value: Value) -> bool {
        let path = Path::new(path);
        let updated = {
            let mut inner = self.inner.borrow_mut();
            let Some(record) = inner.records.get_mut(index) else {
                return false;
            };
            write_path(record, &path, value)
        };
        if updated {
            let observers = self.observer_snapshot();
            for observer in &observers {
                observer.record_property_did_change(index, &path);
            }
            self.notify_ranges(index, 1, 1);
        }
        updated
    }

    // --- Subscription ---

    pub fn add_observer(&self, observer: Rc<dyn ListObserver>) -> ListObserverId {
        let mut inner = self.inner.borrow_mut();
        let handle = inner.alloc_handle();
        inner.observers.insert(handle, observer);
        ListObserverId(handle)
    }

    pub fn remove_observer(&self, id: ListObserverId) -> bool {
        self.inner.borrow_mut().observers.shift_remove(&id.0).is_some()
    }

    /// `range` of `None` means the whole collection, including growth.
    pub fn add_range_observer(
        &self,
        range: Option<Range<usize>>,
        observer: Rc<dyn ListRangeObserver>,
    ) -> ListRangeObserverId {
        let mut inner = self.inner.borrow_mut();
        let handle = inner.alloc_handle();
        inner.range_observers.insert(handle, RangeRegistration { range, observer });
        ListRangeObserverId(handle)
    }

    /// Re-scope an existing registration without re-subscribing.
    pub fn update_range_observer(&self, id: ListRangeObserverId, range: Option<Range<usize>>) -> bool {
        match self.inner.borrow_mut().range_observers.get_mut(&id.0) {
            Some(registration) => {
                registration.range = range;
                true
            }
            None => false,
        }
    }

    pub fn remove_range_observer(&self, id: ListRangeObserverId) -> bool {
        self.inner.borrow_mut().range_observers.shift_remove(&id.0).is_some()
    }

    // --- Dispatch ---

    fn observer_snapshot(&self) -> Vec<Rc<dyn ListObserver>> {
        self.inner.borrow().observers.values().cloned().collect()
    }

    fn notify_ranges(&self, start: usize, removed: usize, added: usize) {
        let span = start..start + removed.max(added);
        let interested: Vec<Rc<dyn ListRangeObserver>> = self
            .inner
            .borrow()
            .range_observers
            .values()
            .filter(|reg| match &reg.range {
                None => true,
                Some(r) => r.start < span.end && span.start < r.end,
            })
            .map(|reg| reg.observer.clone())
            .collect();
        for observer in interested {
            observer.range_did_change(start, removed, added);
        }
    }
}

fn write_path(record: &mut Value, path: &Path, value: Value) -> bool {
    let segments = path.segments();
    let Some((leaf, parents)) = segments.split_last() else {
        return false;
    };
    let mut current = record;
    for segment in parents {
        match current.as_object_mut().and_then(|obj| obj.get_mut(segment.as_str())) {
            Some(next) => current = next,
            None => return false,
        }
    }
    match current.as_object_mut() {
        Some(obj) => {
            obj.insert(leaf.to_string(), value);
            true
        }
        None => false,
    }
}
