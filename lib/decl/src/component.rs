//! Component declarations exchanged with the realm.

use crate::{handle::HandleInfo, offer::Offer};
use alloc::{boxed::Box, vec::Vec};
use num_enum::{FromPrimitive, IntoPrimitive};
use thiserror::Error;

/// Reference to a child component, optionally inside a collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildRef {
    pub name: Box<str>,
    pub collection: Option<Box<str>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionRef {
    pub name: Box<str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StartupMode {
    #[default]
    Lazy,
    Eager,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildDecl {
    pub name: Box<str>,
    pub url: Box<str>,
    pub startup: StartupMode,
}

#[derive(Debug, Default)]
pub struct CreateChildArgs {
    pub dynamic_offers: Option<Vec<Offer>>,
    pub numbered_handles: Option<Vec<HandleInfo>>,
}

/// Errors reported by the realm. Unknown raw values decode as [ComponentError::Internal].
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, IntoPrimitive, Error)]
#[repr(u32)]
pub enum ComponentError {
    #[num_enum(default)]
    #[error("internal error")]
    Internal = 1,
    #[error("invalid arguments")]
    InvalidArguments = 2,
    #[error("unsupported")]
    Unsupported = 3,
    #[error("access denied")]
    AccessDenied = 4,
    #[error("instance not found")]
    InstanceNotFound = 5,
    #[error("instance already exists")]
    InstanceAlreadyExists = 6,
    #[error("instance cannot start")]
    InstanceCannotStart = 7,
    #[error("instance cannot resolve")]
    InstanceCannotResolve = 8,
    #[error("collection not found")]
    CollectionNotFound = 9,
    #[error("resource unavailable")]
    ResourceUnavailable = 10,
    #[error("instance died")]
    InstanceDied = 11,
    #[error("resource not found")]
    ResourceNotFound = 12,
}
