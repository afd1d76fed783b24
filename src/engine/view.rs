//! The live filtered view.
//!
//! A [`QueryView`] watches one [`RecordList`] through one [`Query`] and
//! maintains the set of private indices whose records currently match.
//! Reads go through the index translator; membership changes go through
//! diffing and the batch scheduler; external consumers subscribe through
//! content observers or proxied range observers. The view itself is a
//! read-only projection: structural mutations must target the backing
//! collection.

use serde_json::Value;
use std::cell::RefCell;
use std::ops::Range;
use std::rc::{Rc, Weak};
use std::time::Duration;
use tracing::debug;

use crate::collection::{ListObserver, ListRangeObserver, ListObserverId, ListRangeObserverId, RecordList};
use crate::error::ViewError;
use crate::metrics::ViewMetrics;
use crate::observe::{
    ObserverId, PublicIndexes, RangeObserver, RangeObserverId, ViewChange, ViewObserver,
};
use crate::query::{Path, Query};
use crate::scheduler::Scheduler;

use super::batch::{self, BatchState};
use super::index_set::IndexSet;
use super::translate;
use super::types::{DiffRequest, FastIndexMap, PublicIndex};

/// Budget for one scheduling turn of batch application.
pub const DEFAULT_TIME_BUDGET: Duration = Duration::from_millis(5);

#[derive(Clone, Debug)]
pub struct ViewConfig {
    pub time_budget: Duration,
    /// Optional instrumentation; pass a collector to count engine events.
    pub metrics: Option<Rc<ViewMetrics>>,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self { time_budget: DEFAULT_TIME_BUDGET, metrics: None }
    }
}

pub(crate) struct ViewState {
    pub(crate) list: Option<RecordList>,
    pub(crate) query: Option<Query>,
    pub(crate) set: IndexSet,
    pub(crate) batch: BatchState,
    pub(crate) config: ViewConfig,
    subscription: Option<ListObserverId>,
    pub(crate) destroyed: bool,
}

struct RangeRegistration {
    requested: Option<Range<PublicIndex>>,
    observer: Rc<dyn RangeObserver>,
    list_handle: Option<ListRangeObserverId>,
}

#[derive(Default)]
pub(crate) struct ObserverTable {
    content: FastIndexMap<u64, Rc<dyn ViewObserver>>,
    ranges: FastIndexMap<u64, RangeRegistration>,
    next_handle: u64,
}

impl ObserverTable {
    fn alloc(&mut self) -> u64 {
        let handle = self.next_handle;
        self.next_handle += 1;
        handle
    }
}

pub(crate) struct ViewShared {
    pub(crate) state: RefCell<ViewState>,
    pub(crate) observers: RefCell<ObserverTable>,
    pub(crate) scheduler: Rc<dyn Scheduler>,
    pub(crate) metrics: Option<Rc<ViewMetrics>>,
}

#[derive(Clone)]
pub struct QueryView {
    shared: Rc<ViewShared>,
}

impl QueryView {
    pub fn new(scheduler: Rc<dyn Scheduler>) -> Self {
        Self::with_config(scheduler, ViewConfig::default())
    }

    pub fn with_config(scheduler: Rc<dyn Scheduler>, config: ViewConfig) -> Self {
        let metrics = config.metrics.clone();
        Self {
            shared: Rc::new(ViewShared {
                state: RefCell::new(ViewState {
                    list: None,
                    query: None,
                    set: IndexSet::new(),
                    batch: BatchState::new(),
                    config,
                    subscription: None,
                    destroyed: false,
                }),
                observers: RefCell::new(ObserverTable::default()),
                scheduler,
                metrics,
            }),
        }
    }

    // --- Binding ---

    /// Attach, replace, or detach the backing collection. The old
    /// membership is drained through the normal removal pipeline, then the
    /// new collection is evaluated in full; the request queue serializes
    /// the two when the drain suspends.
    pub fn set_collection(&self, list: Option<RecordList>) {
        {
            let mut state = self.shared.state.borrow_mut();
            if state.destroyed {
                return;
            }
            match (&state.list, &list) {
                (Some(old), Some(new)) if old.ptr_eq(new) => return,
                (None, None) => return,
                _ => {}
            }
            if let Some(old) = state.list.take() {
                if let Some(id) = state.subscription.take() {
                    old.remove_observer(id);
                }
                let mut observers = self.shared.observers.borrow_mut();
                for registration in observers.ranges.values_mut() {
                    if let Some(handle) = registration.list_handle.take() {
                        old.remove_range_observer(handle);
                    }
                }
            }
            // Pending operations and queued requests target the old
            // collection's index space.
            state.batch.reset();
            state.list = list.clone();
            if let Some(new) = list {
                let bridge = Rc::new(ListBridge { shared: Rc::downgrade(&self.shared) });
                state.subscription = Some(new.add_observer(bridge));
            }
        }
        batch::submit(&self.shared, DiffRequest::force_full());
        batch::submit(&self.shared, DiffRequest::full());
        refresh_range_registrations(&self.shared);
    }

    /// Replace or clear the query. Clearing drains the view; replacing
    /// resynchronizes in full.
    pub fn set_query(&self, query: Option<Query>) {
        let drained = {
            let mut state = self.shared.state.borrow_mut();
            if state.destroyed {
                return;
            }
            state.query = query;
            state.query.is_none()
        };
        if drained {
            batch::submit(&self.shared, DiffRequest::force_full());
        } else {
            batch::submit(&self.shared, DiffRequest::full());
        }
    }

    /// Re-parse the current query source and resynchronize.
    pub fn recompile_query(&self) -> anyhow::Result<()> {
        {
            let mut state = self.shared.state.borrow_mut();
            if state.destroyed {
                return Ok(());
            }
            match state.query.as_mut() {
                Some(query) => query.recompile()?,
                None => return Ok(()),
            }
        }
        batch::submit(&self.shared, DiffRequest::full());
        Ok(())
    }

    /// Force a full resynchronization.
    pub fn refresh(&self) {
        batch::submit(&self.shared, DiffRequest::full());
    }

    /// Tear down: unsubscribe from the backing collection, discard
    /// membership and registrations. A continuation scheduled by a
    /// suspended batch finds the destroyed flag and drops itself.
    pub fn destroy(&self) {
        {
            let mut state = self.shared.state.borrow_mut();
            if state.destroyed {
                return;
            }
            state.destroyed = true;
            if let Some(list) = state.list.take() {
                if let Some(id) = state.subscription.take() {
                    list.remove_observer(id);
                }
                let mut observers = self.shared.observers.borrow_mut();
                for registration in observers.ranges.values_mut() {
                    if let Some(handle) = registration.list_handle.take() {
                        list.remove_range_observer(handle);
                    }
                }
            }
            state.query = None;
            state.set.clear();
            state.batch.reset();
        }
        let mut observers = self.shared.observers.borrow_mut();
        observers.content.clear();
        observers.ranges.clear();
        debug!("view destroyed");
    }

    // --- Read contract ---

    pub fn len(&self) -> usize {
        self.shared.state.borrow().set.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Record at public position `public`, or `None` past the end.
    pub fn get(&self, public: PublicIndex) -> Option<Value> {
        let state = self.shared.state.borrow();
        let private = translate::public_to_private(&state.set, public)?;
        state.list.as_ref()?.get(private)
    }

    pub fn index_of(&self, record: &Value) -> Option<PublicIndex> {
        self.index_of_from(record, 0)
    }

    /// First public position at or after `start_at` holding `record`.
    pub fn index_of_from(&self, record: &Value, start_at: PublicIndex) -> Option<PublicIndex> {
        let state = self.shared.state.borrow();
        let list = state.list.as_ref()?;
        let result = state
            .set
            .iter()
            .enumerate()
            .skip(start_at)
            .find(|(_, private)| list.get(*private).as_ref() == Some(record))
            .map(|(ordinal, _)| ordinal);
        result
    }

    pub fn last_index_of(&self, record: &Value) -> Option<PublicIndex> {
        let len = self.len();
        if len == 0 {
            return None;
        }
        self.last_index_of_from(record, len - 1)
    }

    /// Last public position at or before `start_at` holding `record`.
    pub fn last_index_of_from(&self, record: &Value, start_at: PublicIndex) -> Option<PublicIndex> {
        let state = self.shared.state.borrow();
        let list = state.list.as_ref()?;
        let mut found = None;
        for (ordinal, private) in state.set.iter().enumerate() {
            if ordinal > start_at {
                break;
            }
            if list.get(private).as_ref() == Some(record) {
                found = Some(ordinal);
            }
        }
        found
    }

    /// Materialize the current contents in order.
    pub fn to_vec(&self) -> Vec<Value> {
        let state = self.shared.state.borrow();
        let Some(list) = state.list.as_ref() else {
            return Vec::new();
        };
        state.set.iter().filter_map(|private| list.get(private)).collect()
    }

    /// True while a batch is running or suspended.
    pub fn in_progress(&self) -> bool {
        self.shared.state.borrow().batch.in_progress()
    }

    // --- Rejected mutation surface ---

    pub fn try_insert(&self, _index: PublicIndex, _record: Value) -> Result<(), ViewError> {
        Err(ViewError::ImmutableView)
    }

    pub fn try_remove(&self, _index: PublicIndex) -> Result<Value, ViewError> {
        Err(ViewError::ImmutableView)
    }

    pub fn try_replace(&self, _index: PublicIndex, _record: Value) -> Result<Value, ViewError> {
        Err(ViewError::ImmutableView)
    }

    // --- Subscription ---

    pub fn add_observer(&self, observer: Rc<dyn ViewObserver>) -> ObserverId {
        let mut observers = self.shared.observers.borrow_mut();
        let id = observers.alloc();
        observers.content.insert(id, observer);
        ObserverId(id)
    }

    pub fn remove_observer(&self, id: ObserverId) -> bool {
        self.shared.observers.borrow_mut().content.shift_remove(&id.0).is_some()
    }

    /// Watch a public sub-range (`None` watches everything, including
    /// future growth). The range is translated into the backing
    /// collection's index space and registered there; notifications are
    /// filtered to positions actually present in the view and remapped to
    /// public space before delivery.
    pub fn add_range_observer(
        &self,
        requested: Option<Range<PublicIndex>>,
        observer: Rc<dyn RangeObserver>,
    ) -> RangeObserverId {
        let id = {
            let mut observers = self.shared.observers.borrow_mut();
            let id = observers.alloc();
            observers.ranges.insert(
                id,
                RangeRegistration { requested, observer, list_handle: None },
            );
            id
        };
        refresh_range_registrations(&self.shared);
        RangeObserverId(id)
    }

    /// Re-scope an existing registration without re-subscribing.
    pub fn update_range_observer(
        &self,
        id: RangeObserverId,
        requested: Option<Range<PublicIndex>>,
    ) -> bool {
        {
            let mut observers = self.shared.observers.borrow_mut();
            let Some(registration) = observers.ranges.get_mut(&id.0) else {
                return false;
            };
            registration.requested = requested;
        }
        refresh_range_registrations(&self.shared);
        true
    }

    pub fn remove_range_observer(&self, id: RangeObserverId) -> bool {
        let removed = self.shared.observers.borrow_mut().ranges.shift_remove(&id.0);
        match removed {
            Some(registration) => {
                if let Some(handle) = registration.list_handle {
                    if let Some(list) = self.shared.state.borrow().list.as_ref() {
                        list.remove_range_observer(handle);
                    }
                }
                true
            }
            None => false,
        }
    }
}

// --- Backing-collection bridge ---

/// The view's own subscription to the backing collection; turns raw list
/// notifications into diff requests.
struct ListBridge {
    shared: Weak<ViewShared>,
}

impl ListObserver for ListBridge {
    fn list_did_change(&self, start: usize, removed: usize, added: usize) {
        let Some(shared) = self.shared.upgrade() else {
            return;
        };
        let new_len = {
            let state = shared.state.borrow();
            state.list.as_ref().map(|list| list.len()).unwrap_or(0)
        };
        let old_len = (new_len + removed).saturating_sub(added);
        // A splice that grows or shrinks the middle moves every subsequent
        // element, so the whole tail needs re-evaluation.
        let shifted = added != removed && start + removed < old_len;
        let request = if shifted {
            DiffRequest::shifted(start, old_len.max(new_len) - start)
        } else {
            DiffRequest::scoped(start, removed.max(added))
        };
        batch::submit(&shared, request);
    }

    fn record_property_did_change(&self, index: usize, _path: &Path) {
        let Some(shared) = self.shared.upgrade() else {
            return;
        };
        batch::submit(&shared, DiffRequest::scoped(index, 1));
    }
}

/// Proxy leg of one range-observer registration: receives the backing
/// collection's notification, keeps only positions present in the view,
/// remaps them to public space, and forwards the frozen result.
struct RangeBridge {
    shared: Weak<ViewShared>,
    id: u64,
}

impl ListRangeObserver for RangeBridge {
    fn range_did_change(&self, start: usize, removed: usize, added: usize) {
        let Some(shared) = self.shared.upgrade() else {
            return;
        };
        let publics: Vec<PublicIndex> = {
            let state = shared.state.borrow();
            if state.destroyed {
                return;
            }
            let span = start..start + removed.max(added);
            state
                .set
                .members_in(span)
                .filter_map(|private| translate::private_to_public(&state.set, private))
                .collect()
        };
        let Some((observer, requested)) = shared
            .observers
            .borrow()
            .ranges
            .get(&self.id)
            .map(|reg| (reg.observer.clone(), reg.requested.clone()))
        else {
            return;
        };
        let publics: Vec<PublicIndex> = match requested {
            None => publics,
            Some(range) => publics.into_iter().filter(|p| range.contains(p)).collect(),
        };
        if publics.is_empty() {
            return;
        }
        observer.range_did_change(&PublicIndexes::from_vec(publics));
    }
}

// --- Internal helpers shared with the batch scheduler ---

pub(crate) fn notify_will(shared: &ViewShared, change: &ViewChange) {
    let observers: Vec<Rc<dyn ViewObserver>> =
        shared.observers.borrow().content.values().cloned().collect();
    for observer in observers {
        observer.view_will_change(change);
    }
}

pub(crate) fn notify_did(shared: &ViewShared, change: &ViewChange) {
    let observers: Vec<Rc<dyn ViewObserver>> =
        shared.observers.borrow().content.values().cloned().collect();
    for observer in observers {
        observer.view_did_change(change);
    }
}

/// Re-translate every proxied registration against current membership and
/// push the spans down to the backing collection, registering legs that do
/// not exist yet. Runs after each batch completes and after rebinding.
pub(crate) fn refresh_range_registrations(shared: &Rc<ViewShared>) {
    let list = { shared.state.borrow().list.clone() };
    let Some(list) = list else {
        return;
    };
    let ids: Vec<u64> = shared.observers.borrow().ranges.keys().copied().collect();
    for id in ids {
        let Some(requested) =
            shared.observers.borrow().ranges.get(&id).map(|reg| reg.requested.clone())
        else {
            continue;
        };
        let translated = {
            let state = shared.state.borrow();
            translate_public_range(&state.set, requested, list.len())
        };
        let existing = shared.observers.borrow().ranges.get(&id).and_then(|reg| reg.list_handle);
        match existing {
            Some(handle) => {
                list.update_range_observer(handle, translated);
            }
            None => {
                let bridge = Rc::new(RangeBridge { shared: Rc::downgrade(shared), id });
                let handle = list.add_range_observer(translated, bridge);
                match shared.observers.borrow_mut().ranges.get_mut(&id) {
                    Some(registration) => registration.list_handle = Some(handle),
                    // Unregistered while we were translating; roll back.
                    None => {
                        list.remove_range_observer(handle);
                    }
                }
            }
        }
    }
}

/// Translate a requested public range into a private span. An unresolvable
/// start falls back to observing everything; an unresolvable end extends
/// to the end of the collection so the view can grow into the request.
fn translate_public_range(
    set: &IndexSet,
    requested: Option<Range<PublicIndex>>,
    list_len: usize,
) -> Option<Range<usize>> {
    let range = requested?;
    if range.start >= range.end {
        return Some(0..0);
    }
    let Some(start) = translate::public_to_private(set, range.start) else {
        return None;
    };
    let end = translate::public_to_private(set, range.end - 1)
        .map(|private| private + 1)
        .unwrap_or(list_len);
    Some(start..end.max(start))
}
