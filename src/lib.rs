//! Live filtered views over mutable record collections.
//!
//! A [`QueryView`] binds a [`RecordList`] to a [`Query`] and keeps the
//! matching subset materialized as an ordered view, updating incrementally
//! as records change. Updates are diffed against current membership and
//! applied in contiguous batches under a wall-clock budget; when the
//! budget runs out the engine yields to the host's [`Scheduler`] and
//! finishes on a later turn, so a large resynchronization never blocks the
//! event loop it shares.
//!
//! ```
//! use std::rc::Rc;
//! use serde_json::json;
//! use qview::{Query, QueryView, RecordList, RunLoop};
//!
//! let run_loop = Rc::new(RunLoop::new());
//! let records = RecordList::from_records(
//!     (0..20).map(|i| json!({ "value": i })).collect(),
//! );
//!
//! let view = QueryView::new(run_loop.clone());
//! view.set_collection(Some(records.clone()));
//! view.set_query(Some(Query::parse("5 <= value AND value < 10").unwrap()));
//! run_loop.run_until_idle();
//!
//! assert_eq!(view.len(), 5);
//! assert_eq!(view.get(0), Some(json!({ "value": 5 })));
//!
//! records.push(json!({ "value": 7 }));
//! run_loop.run_until_idle();
//! assert_eq!(view.len(), 6);
//! ```

pub mod collection;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod observe;
pub mod query;
pub mod scheduler;

pub use collection::RecordList;
pub use engine::view::{QueryView, ViewConfig, DEFAULT_TIME_BUDGET};
pub use engine::IndexSet;
pub use error::ViewError;
pub use metrics::{MetricsSnapshot, ViewMetrics};
pub use observe::{
    ObserverId, PublicIndexes, RangeObserver, RangeObserverId, ViewChange, ViewObserver,
};
pub use query::{Path, Predicate, Query};
pub use scheduler::{RunLoop, Scheduler};
