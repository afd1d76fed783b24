//! Subscription surface of the view.
//!
//! Observers are explicit trait objects held behind registration handles;
//! there is no implicit dependency tracking. Content observers see
//! coarse-grained `(start, removed, added)` framing in public index space;
//! range observers see the exact public positions that survived
//! translation, as a frozen set.

use serde::Serialize;
use std::ops::Deref;

use crate::engine::types::PublicIndex;

/// One content change, framed the way array observers expect it: at
/// `start`, `removed` members went away and `added` members came in.
/// Everything from `start` onward may have shifted.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewChange {
    pub start: PublicIndex,
    pub removed: usize,
    pub added: usize,
}

impl ViewChange {
    pub fn new(start: PublicIndex, removed: usize, added: usize) -> Self {
        Self { start, removed, added }
    }
}

/// Watches the view's content as a whole.
pub trait ViewObserver {
    fn view_will_change(&self, _change: &ViewChange) {}
    fn view_did_change(&self, change: &ViewChange);
}

/// Frozen set of public positions, ascending. Handed to range observers;
/// never mutated after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicIndexes(Box<[PublicIndex]>);

impl PublicIndexes {
    pub(crate) fn from_vec(mut indexes: Vec<PublicIndex>) -> Self {
        indexes.sort_unstable();
        Self(indexes.into_boxed_slice())
    }
}

impl Deref for PublicIndexes {
    type Target = [PublicIndex];

    fn deref(&self) -> &[PublicIndex] {
        &self.0
    }
}

/// Watches a sub-range of the view through the observer proxy.
pub trait RangeObserver {
    fn range_did_change(&self, indexes: &PublicIndexes);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(pub(crate) u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RangeObserverId(pub(crate) u64);
