//! Driver topology and binding runtime.
//!
//! Keeps the live graph of device nodes, asks the driver index which driver fits
//! each node, launches driver hosts through the realm, starts drivers inside them
//! and tears the graph down again when nodes go away. All collaborators are
//! reached through the traits in [protocol]; nothing here blocks.
#![cfg_attr(not(test), no_std)]
extern crate alloc;

#[macro_use]
pub mod logging;
pub mod collection;
pub mod composite;
pub mod config;
pub mod driver;
pub mod driver_host;
pub mod error;
pub mod node;
pub mod protocol;
pub mod runner;

pub use collection::Collection;
pub use config::{RunnerConfig, TeardownOrder};
pub use driver::DriverComponent;
pub use driver_host::DriverHostComponent;
pub use node::{DriverBinder, Node, NodePtr, NodeRef, NodeState};
pub use runner::DriverRunner;
