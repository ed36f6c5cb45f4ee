//! Runtime configuration of the driver runner.
//!
//! Defaults come from the build-time flags in the `config` crate; embedders and
//! tests override individual fields with the `with_*` builders.

use crate::error::ConfigError;
use alloc::boxed::Box;
use core::str::FromStr;
use log::warn;

/// Whether a node asks its own driver to stop before or after its children are gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TeardownOrder {
    /// Children are fully removed before the node's driver is asked to stop.
    #[default]
    ChildrenFirst,
    /// The node's driver is asked to stop as soon as removal starts.
    ParentFirst,
}

impl FromStr for TeardownOrder {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "children-first" => Ok(TeardownOrder::ChildrenFirst),
            "parent-first" => Ok(TeardownOrder::ParentFirst),
            other => Err(ConfigError::UnknownTeardownOrder(other.into())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Driver URLs with this prefix are launched in the boot collection.
    pub boot_scheme: Box<str>,
    pub driver_host_url: Box<str>,
    pub driver_host_name_prefix: Box<str>,
    pub root_node_name: Box<str>,
    pub composite_node_name: Box<str>,
    pub teardown_order: TeardownOrder,
    pub first_driver_host_id: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        let teardown_order = TeardownOrder::from_str(::config::TEARDOWN_ORDER).unwrap_or_else(|err| {
            warn!("{}, falling back to children-first", err);
            TeardownOrder::ChildrenFirst
        });
        RunnerConfig {
            boot_scheme: ::config::BOOT_SCHEME.into(),
            driver_host_url: ::config::DRIVER_HOST_URL.into(),
            driver_host_name_prefix: ::config::DRIVER_HOST_NAME_PREFIX.into(),
            root_node_name: ::config::ROOT_NODE_NAME.into(),
            composite_node_name: ::config::COMPOSITE_NODE_NAME.into(),
            teardown_order,
            first_driver_host_id: ::config::FIRST_DRIVER_HOST_ID,
        }
    }
}

impl RunnerConfig {
    pub fn with_boot_scheme(mut self, scheme: &str) -> RunnerConfig {
        self.boot_scheme = scheme.into();
        self
    }

    pub fn with_teardown_order(mut self, order: TeardownOrder) -> RunnerConfig {
        self.teardown_order = order;
        self
    }

    pub fn with_root_node_name(mut self, name: &str) -> RunnerConfig {
        self.root_node_name = name.into();
        self
    }
}
