//! Error types raised by the driver manager itself.
//!
//! Wire-level codes ([Status], [NodeError], [ComponentError]) live in `decl`;
//! the enums here describe failures of the runner's own bookkeeping and of the
//! collaborator calls it makes.

use alloc::boxed::Box;
use decl::{ComponentError, Status};
use thiserror::Error;

/// A composite match that could not be slotted into a composite set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CompositeError {
    #[error("missing node index or node count")]
    MissingFields,
    #[error("node index {index} is out of range of {num_nodes} nodes")]
    IndexOutOfRange { index: u32, num_nodes: u32 },
    #[error("missing driver info or driver url")]
    MissingDriverInfo,
    #[error("node count {expected} does not match existing set of {actual}")]
    CountMismatch { expected: u32, actual: usize },
    #[error("a parent of the composite is being removed")]
    ParentRemoved,
}

/// Failure of `DriverIndex.MatchDriver`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MatchError {
    /// The call never reached the index.
    #[error("transport error: {0}")]
    Transport(Status),
    /// The index answered with an error, usually [Status::NotFound].
    #[error("{0}")]
    Index(Status),
}

/// Failure of a realm request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RealmError {
    #[error("transport error: {0}")]
    Transport(Status),
    #[error("{0}")]
    Component(ComponentError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("unknown teardown order '{0}'")]
    UnknownTeardownOrder(Box<str>),
}
