//! Results of driver matching.

use alloc::boxed::Box;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DriverInfo {
    pub url: Option<Box<str>>,
}

impl DriverInfo {
    pub fn with_url(url: &str) -> DriverInfo {
        DriverInfo {
            url: Some(url.into()),
        }
    }
}

/// A composite driver match: the node fills slot `node_index` of `num_nodes`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchedCompositeInfo {
    pub node_index: Option<u32>,
    pub num_nodes: Option<u32>,
    pub driver_info: Option<DriverInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchedDriver {
    Driver(DriverInfo),
    CompositeDriver(MatchedCompositeInfo),
    /// A match kind this side of the protocol does not understand.
    Unknown,
}
