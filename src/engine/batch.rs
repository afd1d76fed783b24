//! Time-budgeted batch application.
//!
//! Operations produced by diffing are partitioned into a removal set and
//! an addition set; each side is applied as maximal contiguous ranges,
//! removals first so a private index vacated and reused in the same batch
//! never collides. Every range is atomic with respect to observers:
//! will-change, physical application in ascending order, did-change.
//! Between ranges the elapsed time of the current scheduling turn is
//! checked against the budget; on overrun the batch suspends and a
//! continuation is handed to the scheduler. Requests arriving while a
//! batch is in progress are queued and drained FIFO once it completes.

use smallvec::SmallVec;
use std::collections::VecDeque;
use std::ops::Range;
use std::rc::{Rc, Weak};
use std::time::Instant;
use tracing::{debug, error};

use crate::error::ViewError;
use crate::observe::ViewChange;

use super::diff;
use super::index_set::IndexSet;
use super::translate;
use super::types::{ChangeOrigin, DiffRequest, OpKind, OpList, PrivateIndex};
use super::view::{self, ViewShared};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum BatchPhase {
    #[default]
    Idle,
    Running,
    Suspended,
}

#[derive(Debug, Default)]
pub(crate) struct BatchState {
    pub(crate) phase: BatchPhase,
    removals: IndexSet,
    additions: IndexSet,
    completed: IndexSet,
    origin: ChangeOrigin,
    pub(crate) queue: VecDeque<DiffRequest>,
}

impl BatchState {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub(crate) fn in_progress(&self) -> bool {
        !matches!(self.phase, BatchPhase::Idle)
    }

    /// Partition `ops` into the removal and addition sets and start
    /// running. Must only be called through [`begin`].
    fn load(&mut self, ops: &OpList, origin: ChangeOrigin) {
        for op in ops {
            match op.kind {
                OpKind::Add => self.additions.add(op.index),
                OpKind::Remove => self.removals.add(op.index),
            };
        }
        self.completed.clear();
        self.origin = origin;
        self.phase = BatchPhase::Running;
    }

    /// First range with work left: removals drain before additions, and
    /// ranges already fully applied are skipped, which is what makes
    /// resumption idempotent.
    fn next_pending(&self) -> Option<(OpKind, Range<PrivateIndex>)> {
        for range in self.removals.ranges() {
            if range.clone().any(|i| !self.completed.contains(i)) {
                return Some((OpKind::Remove, range));
            }
        }
        for range in self.additions.ranges() {
            if range.clone().any(|i| !self.completed.contains(i)) {
                return Some((OpKind::Add, range));
            }
        }
        None
    }

    fn finish_ops(&mut self) {
        self.removals.clear();
        self.additions.clear();
        self.completed.clear();
        self.phase = BatchPhase::Idle;
    }

    /// Abandon everything, including queued requests. Used when the state
    /// the pending operations were computed against is being discarded.
    pub(crate) fn reset(&mut self) {
        self.finish_ops();
        self.queue.clear();
    }
}

/// Guarded entry into batch application. Overlapping application while a
/// batch is in progress is a sequencing bug in the caller: queuing exists
/// precisely so this never has to happen.
pub(crate) fn begin(
    batch: &mut BatchState,
    ops: &OpList,
    origin: ChangeOrigin,
) -> Result<(), ViewError> {
    if batch.in_progress() {
        error!("rejected overlapping batch application; queue requests instead");
        return Err(ViewError::ReentrantBatch);
    }
    batch.load(ops, origin);
    Ok(())
}

/// Diff and apply, or queue when a batch is already in progress.
pub(crate) fn submit(shared: &Rc<ViewShared>, request: DiffRequest) {
    {
        let mut state = shared.state.borrow_mut();
        if state.destroyed {
            return;
        }
        if state.batch.in_progress() {
            debug!(?request, "batch in progress; request queued");
            state.batch.queue.push_back(request);
            if let Some(metrics) = &shared.metrics {
                metrics.record_queued_request();
            }
            return;
        }
        let ops = diff::compute(&state.set, state.query.as_ref(), state.list.as_ref(), &request);
        if let Some(metrics) = &shared.metrics {
            metrics.record_diff_run();
        }
        if ops.is_empty() {
            return;
        }
        if begin(&mut state.batch, &ops, request.origin).is_err() {
            return;
        }
    }
    run(shared);
}

/// Apply pending ranges until the batch drains or the turn's budget runs
/// out. One invocation is one scheduling turn.
fn run(shared: &Rc<ViewShared>) {
    let turn_started = Instant::now();
    let budget = shared.state.borrow().config.time_budget;

    loop {
        let (kind, targets, change) = {
            let mut state = shared.state.borrow_mut();
            if state.destroyed {
                state.batch.reset();
                return;
            }
            // An observer callback may have rebound the view mid-batch;
            // whoever changed the phase owns the batch now.
            if !matches!(state.batch.phase, BatchPhase::Running) {
                return;
            }
            let Some((kind, range)) = state.batch.next_pending() else {
                state.batch.finish_ops();
                let next = state.batch.queue.pop_front();
                drop(state);
                view::refresh_range_registrations(shared);
                if let Some(request) = next {
                    debug!(?request, "batch complete; draining queued request");
                    submit(shared, request);
                }
                return;
            };

            let targets: SmallVec<[PrivateIndex; 8]> = range
                .clone()
                .filter(|i| !state.batch.completed.contains(*i))
                .filter(|i| match kind {
                    OpKind::Remove => state.set.contains(*i),
                    OpKind::Add => !state.set.contains(*i),
                })
                .collect();
            if targets.is_empty() {
                for i in range {
                    state.batch.completed.add(i);
                }
                continue;
            }

            let change = range_change(&state.set, state.batch.origin, kind, &targets);
            (kind, targets, change)
        };

        view::notify_will(shared, &change);
        {
            let mut state = shared.state.borrow_mut();
            for &index in &targets {
                match kind {
                    OpKind::Remove => state.set.remove(index),
                    OpKind::Add => state.set.add(index),
                };
                state.batch.completed.add(index);
            }
        }
        view::notify_did(shared, &change);
        if let Some(metrics) = &shared.metrics {
            metrics.record_range_applied();
        }

        if turn_started.elapsed() >= budget {
            suspend(shared);
            return;
        }
    }
}

/// Notification framing for one contiguous range. Shift-origin batches pin
/// the start to 0: the splice moved every subsequent element, so a precise
/// start would under-invalidate. The same pin is the fallback when the
/// range's own start cannot be resolved against the current set.
fn range_change(
    set: &IndexSet,
    origin: ChangeOrigin,
    kind: OpKind,
    targets: &[PrivateIndex],
) -> ViewChange {
    let count = targets.len();
    match kind {
        OpKind::Remove => {
            let start = match origin {
                ChangeOrigin::Shift => 0,
                ChangeOrigin::Scoped => {
                    translate::private_to_public(set, targets[0]).unwrap_or(0)
                }
            };
            ViewChange::new(start, count, 0)
        }
        OpKind::Add => {
            let start = match origin {
                ChangeOrigin::Shift => 0,
                ChangeOrigin::Scoped => translate::rank(set, targets[0]),
            };
            ViewChange::new(start, 0, count)
        }
    }
}

fn suspend(shared: &Rc<ViewShared>) {
    {
        let mut state = shared.state.borrow_mut();
        state.batch.phase = BatchPhase::Suspended;
    }
    if let Some(metrics) = &shared.metrics {
        metrics.record_suspension();
    }
    debug!("batch suspended; continuation scheduled");
    let weak = Rc::downgrade(shared);
    shared.scheduler.schedule(Box::new(move || resume(weak)));
}

/// Continuation body. The weak handle plus the destroyed flag are the
/// defense against the dangling-continuation failure mode: a view torn
/// down while suspended must not have its discarded state resurrected.
fn resume(weak: Weak<ViewShared>) {
    let Some(shared) = weak.upgrade() else {
        debug!("continuation dropped: view deallocated");
        return;
    };
    {
        let mut state = shared.state.borrow_mut();
        if state.destroyed {
            drop(state);
            if let Some(metrics) = &shared.metrics {
                metrics.record_dropped_continuation();
            }
            error!("continuation dropped: view destroyed while batch was suspended");
            return;
        }
        match state.batch.phase {
            BatchPhase::Suspended => state.batch.phase = BatchPhase::Running,
            // The batch was abandoned (collection replaced) between the
            // suspension and this turn; nothing left to resume.
            _ => {
                debug!("continuation ignored: no suspended batch");
                return;
            }
        }
    }
    run(&shared);
}
