//! Build-time configuration for the driver manager.
//! The values come from `flags.json` at the workspace root and are baked in as constants.

#![no_std]
#![deny(missing_docs)]

/// Constants generated from `flags.json`.
pub mod build_flags {
    #![allow(missing_docs)]
    include!(concat!(env!("OUT_DIR"), "/build_flags.rs"));
}

pub use build_flags::*;
