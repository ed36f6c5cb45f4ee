//! Kernel-object identities, tokens, numbered handles and channel endpoints.

use crate::status::Status;
use core::sync::atomic::{AtomicU64, Ordering};
use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Kernel object id. Unique for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Koid(u64);

static NEXT_KOID: AtomicU64 = AtomicU64::new(1);

impl Koid {
    /// Allocate a fresh id. Fails once the id space is exhausted.
    pub fn allocate() -> Result<Koid, Status> {
        NEXT_KOID
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |koid| koid.checked_add(1))
            .map(Koid)
            .map_err(|_| Status::NoResources)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// An unforgeable, single-use token. Cannot be cloned, only moved.
#[derive(Debug, PartialEq, Eq)]
pub struct Event {
    koid: Koid,
}

impl Event {
    pub fn create() -> Result<Event, Status> {
        Ok(Event {
            koid: Koid::allocate()?,
        })
    }

    pub fn koid(&self) -> Koid {
        self.koid
    }
}

/// Processargs handle types (the low byte of a numbered handle id).
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum HandleType {
    ProcSelf = 0x01,
    ThreadSelf = 0x02,
    DirectoryRequest = 0x3B,
    User0 = 0xF0,
    User1 = 0xF1,
    User2 = 0xF2,
}

/// Compose a numbered handle id from its type and argument.
pub const fn handle_id(ty: HandleType, arg: u16) -> u32 {
    (ty as u32 & 0xFF) | ((arg as u32) << 16)
}

/// Decode the type and argument of a numbered handle id.
pub fn split_handle_id(id: u32) -> Option<(HandleType, u16)> {
    if id & 0xFF00 != 0 {
        return None;
    }
    let ty = HandleType::try_from((id & 0xFF) as u8).ok()?;
    Some((ty, (id >> 16) as u16))
}

/// Id under which the runner attaches the start token to a driver component.
pub const TOKEN_ID: u32 = handle_id(HandleType::User0, 0);

/// A handle passed to a component at a fixed numbered slot.
#[derive(Debug)]
pub struct HandleInfo {
    pub handle: Option<Event>,
    pub id: u32,
}

/// Client side of a channel.
#[derive(Debug, PartialEq, Eq)]
pub struct ClientEnd {
    koid: Koid,
}

/// Server side of a channel.
#[derive(Debug, PartialEq, Eq)]
pub struct ServerEnd {
    koid: Koid,
}

impl ClientEnd {
    pub fn koid(&self) -> Koid {
        self.koid
    }
}

impl ServerEnd {
    pub fn koid(&self) -> Koid {
        self.koid
    }
}

/// Create a connected pair of channel endpoints.
pub fn create_endpoints() -> Result<(ClientEnd, ServerEnd), Status> {
    let client = ClientEnd {
        koid: Koid::allocate()?,
    };
    let server = ServerEnd {
        koid: Koid::allocate()?,
    };
    Ok((client, server))
}
