//! Membership diffing.
//!
//! Compares current membership against predicate evaluation over a region
//! of the backing collection and emits only the operations that change the
//! index set. Re-running a diff over a settled region therefore yields
//! nothing.

use tracing::debug;

use crate::collection::RecordList;
use crate::query::Query;

use super::index_set::IndexSet;
use super::types::{BatchOp, DiffRequest, OpList};

/// Compute the operations a request implies against the current set.
///
/// Forced removals consult only the set: the affected elements are assumed
/// unreachable. Normal diffing requires both a query and a collection;
/// with either missing the request degrades to a no-op. An index at or
/// beyond the collection's current length is treated as a removal, since
/// there is no element left to evaluate.
pub(crate) fn compute(
    set: &IndexSet,
    query: Option<&Query>,
    list: Option<&RecordList>,
    request: &DiffRequest,
) -> OpList {
    let mut ops = OpList::new();

    if request.force_removal {
        let start = request.start.unwrap_or(0);
        let end = match request.changed {
            Some(changed) => start.saturating_add(changed),
            None => usize::MAX,
        };
        ops.extend(set.members_in(start..end).map(BatchOp::remove));
        return ops;
    }

    let (Some(query), Some(list)) = (query, list) else {
        debug!("diff skipped: query or backing collection unset");
        return ops;
    };

    let len = list.len();
    let start = request.start.unwrap_or(0);
    let changed = request.changed.unwrap_or_else(|| len.saturating_sub(start));
    let end = start.saturating_add(changed);

    for index in start..end {
        let contained = set.contains(index);
        match list.get(index) {
            Some(record) => {
                let matches = query.matches(&record);
                if !contained && matches {
                    ops.push(BatchOp::add(index));
                } else if contained && !matches {
                    ops.push(BatchOp::remove(index));
                }
            }
            None => {
                if contained {
                    ops.push(BatchOp::remove(index));
                }
            }
        }
    }

    // A full resynchronization also sweeps members the evaluated span no
    // longer covers (the collection shrank since they were added).
    if request.start.is_none() && request.changed.is_none() {
        ops.extend(set.members_in(end..usize::MAX).map(BatchOp::remove));
    }

    ops
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::engine::types::OpKind;
    use serde_json::json;

    fn fixture() -> (RecordList, Query) {
        let list = RecordList::from_records((0..10).map(|i| json!({ "value": i })).collect());
        let query = Query::parse("value >= 6").unwrap();
        (list, query)
    }

    fn apply(set: &mut IndexSet, ops: &OpList) {
        for op in ops {
            match op.kind {
                OpKind::Add => set.add(op.index),
                OpKind::Remove => set.remove(op.index),
            };
        }
    }

    #[test]
    fn test_full_diff_from_empty() {
        let (list, query) = fixture();
        let set = IndexSet::new();
        let ops = compute(&set, Some(&query), Some(&list), &DiffRequest::full());
        let added: Vec<_> = ops.iter().map(|op| op.index).collect();
        assert_eq!(added, vec![6, 7, 8, 9]);
        assert!(ops.iter().all(|op| op.is_addition()));
    }

    #[test]
    fn test_settled_region_yields_nothing() {
        let (list, query) = fixture();
        let mut set = IndexSet::new();
        let ops = compute(&set, Some(&query), Some(&list), &DiffRequest::full());
        apply(&mut set, &ops);
        let again = compute(&set, Some(&query), Some(&list), &DiffRequest::full());
        assert!(again.is_empty());
    }

    #[test]
    fn test_scoped_diff_touches_only_the_span() {
        let (list, query) = fixture();
        let set: IndexSet = [6, 7, 8, 9].into_iter().collect();
        // Stale member 2 exists outside the span; a scoped diff must not see it.
        let mut set = set;
        set.add(2);
        let ops = compute(&set, Some(&query), Some(&list), &DiffRequest::scoped(6, 2));
        assert!(ops.is_empty());
    }

    #[test]
    fn test_out_of_range_member_is_removed() {
        let (list, query) = fixture();
        let set: IndexSet = [6, 7, 8, 9, 14].into_iter().collect();
        let ops = compute(&set, Some(&query), Some(&list), &DiffRequest::full());
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0], BatchOp::remove(14));
    }

    #[test]
    fn test_forced_removal_ignores_predicate() {
        let (_, query) = fixture();
        let set: IndexSet = [1, 2, 8].into_iter().collect();
        let ops = compute(&set, Some(&query), None, &DiffRequest::force_full());
        let removed: Vec<_> = ops.iter().map(|op| op.index).collect();
        assert_eq!(removed, vec![1, 2, 8]);
    }

    #[test]
    fn test_detached_diff_is_noop() {
        let set: IndexSet = [1].into_iter().collect();
        let ops = compute(&set, None, None, &DiffRequest::full());
        assert!(ops.is_empty());
    }
}
