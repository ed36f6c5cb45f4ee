//! Protocol data model shared between the driver runner and its collaborators.
//!
//! Nothing here talks to a transport. The types mirror what travels over the wire
//! (offers, node arguments, start info, numbered handles) so the runner can be
//! driven by any channel implementation.
#![cfg_attr(not(test), no_std)]
extern crate alloc;

pub mod component;
pub mod handle;
pub mod index;
pub mod node;
pub mod offer;
pub mod runner;
pub mod status;

pub use component::*;
pub use handle::*;
pub use index::*;
pub use node::*;
pub use offer::*;
pub use runner::*;
pub use status::*;
