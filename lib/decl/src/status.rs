use num_enum::{FromPrimitive, IntoPrimitive};
use thiserror::Error;

/// Status codes carried by epitaphs and RPC failures.
///
/// Raw codes that are not listed here decode as [Status::Internal].
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, IntoPrimitive, Error)]
#[repr(i32)]
pub enum Status {
    #[error("ok")]
    Ok = 0,
    #[num_enum(default)]
    #[error("internal error")]
    Internal = -1,
    #[error("not supported")]
    NotSupported = -2,
    #[error("no resources")]
    NoResources = -3,
    #[error("no memory")]
    NoMemory = -4,
    #[error("invalid arguments")]
    InvalidArgs = -10,
    #[error("bad state")]
    BadState = -20,
    #[error("canceled")]
    Canceled = -23,
    #[error("peer closed")]
    PeerClosed = -24,
    #[error("not found")]
    NotFound = -25,
    #[error("already exists")]
    AlreadyExists = -26,
    #[error("unavailable")]
    Unavailable = -28,
}

impl Status {
    pub fn into_raw(self) -> i32 {
        self.into()
    }

    pub fn from_raw(raw: i32) -> Status {
        Status::from(raw)
    }
}
