pub(crate) mod batch;
pub(crate) mod diff;
pub mod index_set;
pub mod translate;
pub mod types;
pub mod view;

pub use index_set::IndexSet;
pub use view::{QueryView, ViewConfig, DEFAULT_TIME_BUDGET};
