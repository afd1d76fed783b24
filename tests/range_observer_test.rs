mod common;

use common::*;
use qview::{PublicIndexes, RangeObserver};
use serde_json::json;
use std::cell::RefCell;
use std::rc::Rc;

struct RangeRecorder {
    hits: RefCell<Vec<Vec<usize>>>,
}

impl RangeRecorder {
    fn new() -> Rc<Self> {
        Rc::new(Self { hits: RefCell::new(Vec::new()) })
    }

    fn take(&self) -> Vec<Vec<usize>> {
        std::mem::take(&mut *self.hits.borrow_mut())
    }
}

impl RangeObserver for RangeRecorder {
    fn range_did_change(&self, indexes: &PublicIndexes) {
        self.hits.borrow_mut().push(indexes.to_vec());
    }
}

/// A null-range registration observes everything, delivered in public
/// index space.
#[test]
fn test_full_range_observer_reports_public_positions() {
    let fx = setup(0..20, "5 <= value AND value < 10");
    let recorder = RangeRecorder::new();
    fx.view.add_range_observer(None, recorder.clone());

    // Private 6 is public 1; the write keeps it in the view.
    assert!(fx.list.set_path(6, "value", json!(7)));
    fx.run_loop.run_until_idle();

    assert_eq!(recorder.take(), vec![vec![1]]);
}

/// A null-range registration still observes growth beyond the current
/// view length.
#[test]
fn test_growth_visible_through_null_range() {
    let fx = setup(0..20, "5 <= value AND value < 10");
    let recorder = RangeRecorder::new();
    fx.view.add_range_observer(None, recorder.clone());

    fx.list.push(make_record(7));
    fx.run_loop.run_until_idle();

    assert_eq!(recorder.take(), vec![vec![5]]);
}

/// A scoped registration only hears about its own public positions.
#[test]
fn test_scoped_range_filters_positions() {
    let fx = setup(0..20, "5 <= value AND value < 10");
    let recorder = RangeRecorder::new();
    fx.view.add_range_observer(Some(0..2), recorder.clone());

    // Public 3 (private 8): outside the requested range.
    assert!(fx.list.set_path(8, "value", json!(8)));
    fx.run_loop.run_until_idle();
    assert!(recorder.take().is_empty());

    // Public 0 (private 5): inside.
    assert!(fx.list.set_path(5, "value", json!(6)));
    fx.run_loop.run_until_idle();
    assert_eq!(recorder.take(), vec![vec![0]]);
}

/// Re-scoping an existing registration takes effect without
/// re-subscribing.
#[test]
fn test_update_range_observer_rescopes() {
    let fx = setup(0..20, "5 <= value AND value < 10");
    let recorder = RangeRecorder::new();
    let id = fx.view.add_range_observer(Some(0..2), recorder.clone());

    assert!(fx.view.update_range_observer(id, Some(3..5)));

    assert!(fx.list.set_path(8, "value", json!(8)));
    fx.run_loop.run_until_idle();
    assert_eq!(recorder.take(), vec![vec![3]]);

    assert!(fx.list.set_path(5, "value", json!(6)));
    fx.run_loop.run_until_idle();
    assert!(recorder.take().is_empty());
}

#[test]
fn test_remove_range_observer_silences() {
    let fx = setup(0..20, "5 <= value AND value < 10");
    let recorder = RangeRecorder::new();
    let id = fx.view.add_range_observer(None, recorder.clone());

    assert!(fx.view.remove_range_observer(id));
    assert!(!fx.view.remove_range_observer(id));

    fx.list.push(make_record(7));
    fx.run_loop.run_until_idle();
    assert!(recorder.take().is_empty());
}

/// Registrations are re-translated as membership changes, so a scoped
/// observer follows its public positions onto new private indices.
#[test]
fn test_translation_tracks_membership_changes() {
    let fx = setup(0..20, "5 <= value AND value < 10");
    let recorder = RangeRecorder::new();
    fx.view.add_range_observer(Some(0..2), recorder.clone());

    // Evict private 5; the translated set goes empty for the eviction
    // itself, so the proxy stays silent.
    assert!(fx.list.set_path(5, "value", json!(0)));
    fx.run_loop.run_until_idle();
    assert!(recorder.take().is_empty());

    // Public 0 is now private 6.
    assert!(fx.list.set_path(6, "value", json!(7)));
    fx.run_loop.run_until_idle();
    assert_eq!(recorder.take(), vec![vec![0]]);
}

/// Registering before any collection is attached is allowed; the proxy
/// leg materializes on attach.
#[test]
fn test_register_before_attach() {
    use qview::{Query, QueryView, RunLoop};

    let run_loop = Rc::new(RunLoop::new());
    let view = QueryView::new(run_loop.clone());
    let recorder = RangeRecorder::new();
    view.add_range_observer(None, recorder.clone());

    let list = make_collection(0..10);
    view.set_collection(Some(list.clone()));
    view.set_query(Some(Query::parse("value >= 8").unwrap()));
    run_loop.run_until_idle();

    list.push(make_record(9));
    run_loop.run_until_idle();
    assert_eq!(recorder.take(), vec![vec![2]]);
}
