use std::fmt;

/// Failures surfaced by the view itself. Index-translation misses are not
/// errors; they come back as `None` because callers routinely probe
/// boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewError {
    /// The view is a read-only projection; structural mutations must go
    /// through the backing collection.
    ImmutableView,
    /// A batch application was started while another was already running.
    /// Requests that arrive mid-batch are supposed to be queued, so this
    /// indicates a sequencing bug in the caller.
    ReentrantBatch,
    /// The operation needs both a backing collection and a query, and at
    /// least one of them is unset.
    Detached,
}

impl fmt::Display for ViewError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViewError::ImmutableView => {
                write!(f, "view is immutable; mutate the backing collection instead")
            }
            ViewError::ReentrantBatch => {
                write!(f, "batch application is already in progress")
            }
            ViewError::Detached => {
                write!(f, "view has no backing collection or no query")
            }
        }
    }
}

impl std::error::Error for ViewError {}
