use rustc_hash::FxHasher;
use smallvec::SmallVec;
use std::hash::BuildHasherDefault;

pub type FastMap<K, V> = std::collections::HashMap<K, V, BuildHasherDefault<FxHasher>>;
pub type FastIndexMap<K, V> = indexmap::IndexMap<K, V, BuildHasherDefault<FxHasher>>;

/// Position within the backing collection.
pub type PrivateIndex = usize;
/// Position within the filtered view.
pub type PublicIndex = usize;

/// What a single diff operation does to the view's index set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    Add,
    Remove,
}

/// A single membership change produced by diffing. No-ops are never
/// materialized; every op is either an addition or a removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOp {
    pub index: PrivateIndex,
    pub kind: OpKind,
}

impl BatchOp {
    #[inline]
    pub fn add(index: PrivateIndex) -> Self {
        Self { index, kind: OpKind::Add }
    }

    #[inline]
    pub fn remove(index: PrivateIndex) -> Self {
        Self { index, kind: OpKind::Remove }
    }

    #[inline]
    pub fn is_addition(&self) -> bool {
        matches!(self.kind, OpKind::Add)
    }
}

/// Inline storage for the common small-change case.
pub type OpList = SmallVec<[BatchOp; 8]>;

/// Where a diff request came from. Shift-origin batches collapse their
/// change notifications to start 0: every element from the splice point
/// onward may occupy a new public position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChangeOrigin {
    #[default]
    Scoped,
    Shift,
}

/// A request to re-evaluate membership over a region of the backing
/// collection. `start`/`changed` of `None` mean the entire current length
/// (full resynchronization). `force_removal` drops the region from the view
/// without re-evaluating elements; it is the only valid shape when the
/// elements are no longer reachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiffRequest {
    pub start: Option<PrivateIndex>,
    pub changed: Option<usize>,
    pub force_removal: bool,
    pub origin: ChangeOrigin,
}

impl DiffRequest {
    /// Re-evaluate the whole backing collection.
    pub fn full() -> Self {
        Self { start: None, changed: None, force_removal: false, origin: ChangeOrigin::Scoped }
    }

    /// Re-evaluate `changed` elements starting at `start`.
    pub fn scoped(start: PrivateIndex, changed: usize) -> Self {
        Self {
            start: Some(start),
            changed: Some(changed),
            force_removal: false,
            origin: ChangeOrigin::Scoped,
        }
    }

    /// Like [`DiffRequest::scoped`], but for a splice that shifted the tail
    /// of the backing collection.
    pub fn shifted(start: PrivateIndex, changed: usize) -> Self {
        Self {
            start: Some(start),
            changed: Some(changed),
            force_removal: false,
            origin: ChangeOrigin::Shift,
        }
    }

    /// Drop every current member from the view without re-evaluation.
    pub fn force_full() -> Self {
        Self { start: None, changed: None, force_removal: true, origin: ChangeOrigin::Scoped }
    }
}
