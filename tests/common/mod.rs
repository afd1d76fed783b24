#![allow(dead_code)]

//! Common fixtures for qview integration tests.
//!
//! Provides collection builders, a wired view + run-loop fixture, and
//! observer recorders used across the scenario tests.

use qview::{
    Query, QueryView, RecordList, RunLoop, ViewChange, ViewConfig, ViewMetrics, ViewObserver,
};
use serde_json::{json, Value};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;
use ulid::Ulid;

/// Generate a unique record id.
pub fn generate_id() -> String {
    Ulid::new().to_string()
}

pub fn make_record(value: i64) -> Value {
    json!({ "id": generate_id(), "value": value })
}

pub fn make_collection(values: impl IntoIterator<Item = i64>) -> RecordList {
    RecordList::from_records(values.into_iter().map(make_record).collect())
}

pub struct Fixture {
    pub run_loop: Rc<RunLoop>,
    pub list: RecordList,
    pub view: QueryView,
    pub metrics: Rc<ViewMetrics>,
}

/// View over `values` filtered by `condition`, with the default budget.
pub fn setup(values: impl IntoIterator<Item = i64>, condition: &str) -> Fixture {
    setup_with_budget(values, condition, None)
}

/// Same, with an explicit time budget (`Some(Duration::ZERO)` forces a
/// suspension after every range).
pub fn setup_with_budget(
    values: impl IntoIterator<Item = i64>,
    condition: &str,
    budget: Option<Duration>,
) -> Fixture {
    let run_loop = Rc::new(RunLoop::new());
    let list = make_collection(values);
    let metrics = Rc::new(ViewMetrics::new());
    let mut config = ViewConfig { metrics: Some(metrics.clone()), ..Default::default() };
    if let Some(budget) = budget {
        config.time_budget = budget;
    }
    let view = QueryView::with_config(run_loop.clone(), config);
    view.set_collection(Some(list.clone()));
    view.set_query(Some(Query::parse(condition).expect("invalid test condition")));
    run_loop.run_until_idle();
    Fixture { run_loop, list, view, metrics }
}

/// Records every content notification the view emits.
pub struct ChangeRecorder {
    pub events: RefCell<Vec<(&'static str, ViewChange)>>,
}

impl ChangeRecorder {
    pub fn new() -> Rc<Self> {
        Rc::new(Self { events: RefCell::new(Vec::new()) })
    }

    pub fn dids(&self) -> Vec<ViewChange> {
        self.events
            .borrow()
            .iter()
            .filter(|(kind, _)| *kind == "did")
            .map(|(_, change)| *change)
            .collect()
    }

    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }
}

impl ViewObserver for ChangeRecorder {
    fn view_will_change(&self, change: &ViewChange) {
        self.events.borrow_mut().push(("will", *change));
    }

    fn view_did_change(&self, change: &ViewChange) {
        self.events.borrow_mut().push(("did", *change));
    }
}

/// The `value` field of every record currently in the view, in order.
pub fn values_of(view: &QueryView) -> Vec<i64> {
    view.to_vec()
        .iter()
        .map(|record| record.get("value").and_then(Value::as_i64).expect("record has a value"))
        .collect()
}

/// The `value` field of every record in a collection matching `condition`,
/// in collection order: the synchronous reference a settled view must
/// agree with.
pub fn reference_values(list: &RecordList, condition: &str) -> Vec<i64> {
    let query = Query::parse(condition).expect("invalid test condition");
    list.to_vec()
        .iter()
        .filter(|record| query.matches(record))
        .map(|record| record.get("value").and_then(Value::as_i64).expect("record has a value"))
        .collect()
}
