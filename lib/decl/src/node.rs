//! Arguments for adding nodes to the topology.

use crate::offer::Offer;
use alloc::{boxed::Box, vec::Vec};
use num_enum::{IntoPrimitive, TryFromPrimitive};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodePropertyKey {
    IntValue(u32),
    StringValue(Box<str>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodePropertyValue {
    IntValue(u32),
    StringValue(Box<str>),
    BoolValue(bool),
    EnumValue(Box<str>),
}

/// A key/value pair used when matching drivers to a node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeProperty {
    pub key: Option<NodePropertyKey>,
    pub value: Option<NodePropertyValue>,
}

impl NodeProperty {
    pub fn new(key: NodePropertyKey, value: NodePropertyValue) -> NodeProperty {
        NodeProperty {
            key: Some(key),
            value: Some(value),
        }
    }
}

/// A named address shared with drivers colocated in the same driver host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeSymbol {
    pub name: Option<Box<str>>,
    pub address: Option<u64>,
}

impl NodeSymbol {
    pub fn new(name: &str, address: u64) -> NodeSymbol {
        NodeSymbol {
            name: Some(name.into()),
            address: Some(address),
        }
    }
}

/// Arguments of `Node.AddChild`, also sent to the driver index for matching.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeAddArgs {
    pub name: Option<Box<str>>,
    pub offers: Option<Vec<Offer>>,
    pub properties: Option<Vec<NodeProperty>>,
    pub symbols: Option<Vec<NodeSymbol>>,
}

impl NodeAddArgs {
    pub fn named(name: &str) -> NodeAddArgs {
        NodeAddArgs {
            name: Some(name.into()),
            ..Default::default()
        }
    }
}

/// Errors returned by `Node.AddChild`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive, Error)]
#[repr(u32)]
pub enum NodeError {
    #[error("internal error")]
    Internal = 1,
    #[error("node was removed")]
    NodeRemoved = 2,
    #[error("name is missing")]
    NameMissing = 3,
    #[error("name contains an invalid character")]
    NameInvalid = 4,
    #[error("name already exists among siblings")]
    NameAlreadyExists = 5,
    #[error("offer is missing a source name")]
    OfferSourceNameMissing = 6,
    #[error("offer already has a source or target")]
    OfferRefExists = 7,
    #[error("symbol is missing a name")]
    SymbolNameMissing = 8,
    #[error("symbol is missing an address")]
    SymbolAddressMissing = 9,
    #[error("symbol already exists")]
    SymbolAlreadyExists = 10,
}
