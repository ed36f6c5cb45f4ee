//! The device node graph.
//!
//! Parents own their children through [NodePtr]; every back-edge (child to parent,
//! node to driver, node to driver host, node to binder) is weak. A node can have
//! several parents only when it is a composite, and its first parent is the
//! primary one used for naming, symbol visibility and driver host inheritance.
//!
//! Removal runs bottom-up. A node asked to go away first removes its children,
//! then asks its own driver to stop, and only once the driver is gone does it
//! unlink from its parents. A parent waiting on its last child is removed again
//! as soon as that child unlinks.

use crate::{
    config::TeardownOrder,
    driver::DriverComponent,
    driver_host::DriverHostComponent,
    protocol::{Binding, NodeControllerBinding, Transport},
    Collection,
};
use alloc::{
    boxed::Box,
    collections::BTreeSet,
    string::String,
    sync::{Arc, Weak},
    vec,
    vec::Vec,
};
use bitflags::bitflags;
use core::fmt;
use decl::{NodeAddArgs, NodeError, NodeProperty, NodeSymbol, Offer, Ref, ServerEnd};
use log::{error, warn};
use spin::Mutex;
use utils::{
    handle::{Handle, HandleRef},
    impl_conversion, impl_deref,
};

/// Separates node names in a topological name. Not allowed inside a name.
pub const NODE_NAME_SEPARATOR: &str = ".";

/// Receives nodes that need a driver.
pub trait DriverBinder: Send + Sync {
    fn bind(&self, node: &NodePtr, args: NodeAddArgs);
}

bitflags! {
    struct NodeFlags: u8 {
        const REMOVAL_IN_PROGRESS = 1 << 0;
        const DRIVER_STOP_REQUESTED = 1 << 1;
        const UNLINKING = 1 << 2;
        const REMOVED = 1 << 3;
    }
}

/// Where a node is in its teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    Active,
    /// Waiting for children to go away.
    RemovalRequested,
    /// Children are gone, waiting for the bound driver to stop.
    DriverStopRequested,
    Unlinking,
    /// Detached from every parent.
    Removed,
}

pub struct Node {
    name: Box<str>,
    offers: Vec<Offer>,
    properties: Vec<NodeProperty>,
    symbols: Vec<NodeSymbol>,
    transport: Arc<dyn Transport>,
    teardown_order: TeardownOrder,
    data: Mutex<NodeData>,
}

struct NodeData {
    parents: Vec<NodeRef>,
    children: Vec<NodePtr>,
    /// Cleared once removal starts, so nothing new can be added or bound.
    binder: Option<Weak<dyn DriverBinder>>,
    collection: Collection,
    driver_host: Option<HandleRef<DriverHostComponent>>,
    driver_component: Option<HandleRef<DriverComponent>>,
    flags: NodeFlags,
    controller_ref: Option<Box<dyn NodeControllerBinding>>,
    node_ref: Option<Box<dyn Binding>>,
}

#[derive(Debug, Clone)]
pub struct NodePtr {
    inner: Arc<Node>,
}
impl_deref!(NodePtr, Arc<Node>);
impl_conversion!(NodePtr, Arc<Node>);

#[derive(Debug, Clone)]
pub struct NodeRef {
    inner: Weak<Node>,
}
impl_deref!(NodeRef, Weak<Node>);
impl_conversion!(NodeRef, Weak<Node>);

impl NodeRef {
    pub fn get_handle(&self) -> Option<NodePtr> {
        self.upgrade().map(NodePtr::from)
    }
}

/// The parts of a node fixed at creation.
struct NodeDesc {
    name: Box<str>,
    offers: Vec<Offer>,
    properties: Vec<NodeProperty>,
    symbols: Vec<NodeSymbol>,
}

impl NodeDesc {
    fn named(name: &str) -> NodeDesc {
        NodeDesc {
            name: name.into(),
            offers: vec![],
            properties: vec![],
            symbols: vec![],
        }
    }
}

impl NodePtr {
    fn create(
        desc: NodeDesc,
        parents: &[NodePtr],
        binder: Option<Weak<dyn DriverBinder>>,
        transport: Arc<dyn Transport>,
        teardown_order: TeardownOrder,
    ) -> NodePtr {
        // A node starts out in the driver host of its primary parent.
        let driver_host = parents.first().and_then(|parent| parent.data.lock().driver_host.clone());
        NodePtr::from(Arc::new(Node {
            name: desc.name,
            offers: desc.offers,
            properties: desc.properties,
            symbols: desc.symbols,
            transport,
            teardown_order,
            data: Mutex::new(NodeData {
                parents: parents.iter().map(NodePtr::create_ref).collect(),
                children: vec![],
                binder,
                collection: Collection::None,
                driver_host,
                driver_component: None,
                flags: NodeFlags::empty(),
                controller_ref: None,
                node_ref: None,
            }),
        }))
    }

    pub fn new_root(
        name: &str,
        binder: Weak<dyn DriverBinder>,
        transport: Arc<dyn Transport>,
        teardown_order: TeardownOrder,
    ) -> NodePtr {
        NodePtr::create(NodeDesc::named(name), &[], Some(binder), transport, teardown_order)
    }

    /// Create a composite of `parents`, in slot order. The caller links it with
    /// [NodePtr::add_to_parents] once it is ready to be seen.
    pub fn new_composite(
        name: &str,
        parents: &[NodePtr],
        binder: Weak<dyn DriverBinder>,
        transport: Arc<dyn Transport>,
        teardown_order: TeardownOrder,
    ) -> NodePtr {
        NodePtr::create(NodeDesc::named(name), parents, Some(binder), transport, teardown_order)
    }

    pub fn create_ref(&self) -> NodeRef {
        NodeRef::from(Arc::downgrade(self))
    }

    pub fn ptr_eq(&self, other: &NodePtr) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn add_to_parents(&self) {
        for parent in self.parents() {
            parent.data.lock().children.push(self.clone());
        }
    }

    /// `Node.AddChild`. On success the child is linked and either served on
    /// `node` or handed to the binder to find a driver.
    pub fn add_child(
        &self,
        args: NodeAddArgs,
        controller: ServerEnd,
        node: Option<ServerEnd>,
    ) -> Result<(), NodeError> {
        let binder = self.data.lock().binder.clone();
        let Some((binder_ref, binder)) = binder.and_then(|weak| weak.upgrade().map(|strong| (weak, strong))) else {
            warn!("Failed to add Node, as this Node '{}' was removed", self.name);
            return Err(NodeError::NodeRemoved);
        };
        let Some(name) = args.name.as_deref() else {
            error!("Failed to add Node, a name must be provided");
            return Err(NodeError::NameMissing);
        };
        if name.contains(NODE_NAME_SEPARATOR) {
            error!("Failed to add Node '{}', name must not contain '{}'", name, NODE_NAME_SEPARATOR);
            return Err(NodeError::NameInvalid);
        }
        if self.data.lock().children.iter().any(|child| child.name() == name) {
            error!("Failed to add Node '{}', name already exists among siblings", name);
            return Err(NodeError::NameAlreadyExists);
        }
        let desc = NodeDesc {
            name: name.into(),
            offers: validate_offers(name, args.offers.as_deref())?,
            properties: args.properties.clone().unwrap_or_default(),
            symbols: validate_symbols(name, args.symbols.as_deref())?,
        };
        let child = NodePtr::create(
            desc,
            core::slice::from_ref(self),
            Some(binder_ref),
            self.transport.clone(),
            self.teardown_order,
        );
        child.set_controller_ref(self.transport.bind_node_controller(controller, child.create_ref()));
        child.add_to_parents();
        match node {
            // The owner serves the node itself, so no driver is bound to it.
            Some(server_end) => child.set_node_ref(self.transport.bind_node(server_end, child.clone())),
            None => binder.bind(&child, args),
        }
        Ok(())
    }

    /// Start or continue removing this node. Safe to call any number of times.
    pub fn remove(&self) {
        let children = {
            let mut inner = self.data.lock();
            inner.flags.insert(NodeFlags::REMOVAL_IN_PROGRESS);
            inner.binder = None;
            inner.children.clone()
        };
        if self.teardown_order == TeardownOrder::ParentFirst {
            self.request_driver_stop();
        }
        for child in children {
            child.remove();
        }
        // Resumed by the last child to unlink.
        if !self.data.lock().children.is_empty() {
            return;
        }
        // Resumed when the driver component goes away.
        if self.request_driver_stop() {
            return;
        }
        self.unlink();
    }

    fn request_driver_stop(&self) -> bool {
        let Some(driver) = self.driver_component() else {
            return false;
        };
        self.data.lock().flags.insert(NodeFlags::DRIVER_STOP_REQUESTED);
        driver.stop_driver();
        true
    }

    fn unlink(&self) {
        let parents = {
            let mut inner = self.data.lock();
            inner.flags.insert(NodeFlags::UNLINKING);
            core::mem::take(&mut inner.parents)
        };
        let composite = parents.len() > 1;
        for parent in parents.iter().filter_map(NodeRef::get_handle) {
            let resume = {
                let mut inner = parent.data.lock();
                inner.children.retain(|child| !child.ptr_eq(self));
                inner.flags.contains(NodeFlags::REMOVAL_IN_PROGRESS) && inner.children.is_empty()
            };
            // Every parent of a composite goes down with it.
            if resume || composite {
                parent.remove();
            }
        }
        let (controller_ref, node_ref) = {
            let mut inner = self.data.lock();
            inner.flags.insert(NodeFlags::REMOVED);
            (inner.controller_ref.take(), inner.node_ref.take())
        };
        if let Some(binding) = controller_ref {
            binding.unbind();
        }
        if let Some(binding) = node_ref {
            binding.unbind();
        }
    }
}

impl Node {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn offers(&self) -> &[Offer] {
        &self.offers
    }

    pub fn properties(&self) -> &[NodeProperty] {
        &self.properties
    }

    pub fn parents(&self) -> Vec<NodePtr> {
        self.data.lock().parents.iter().filter_map(NodeRef::get_handle).collect()
    }

    pub fn primary_parent(&self) -> Option<NodePtr> {
        self.data.lock().parents.first().and_then(NodeRef::get_handle)
    }

    pub fn children(&self) -> Vec<NodePtr> {
        self.data.lock().children.clone()
    }

    pub fn is_composite(&self) -> bool {
        self.data.lock().parents.len() > 1
    }

    /// Names from the root down to this node, joined by [NODE_NAME_SEPARATOR].
    pub fn topo_name(&self) -> String {
        let mut names = vec![self.name.clone()];
        let mut next = self.primary_parent();
        while let Some(node) = next {
            names.push(node.name.clone());
            next = node.primary_parent();
        }
        names.reverse();
        names.join(NODE_NAME_SEPARATOR)
    }

    pub fn collection(&self) -> Collection {
        self.data.lock().collection
    }

    pub fn set_collection(&self, collection: Collection) {
        self.data.lock().collection = collection;
    }

    pub fn driver_host(&self) -> Option<Handle<DriverHostComponent>> {
        self.data.lock().driver_host.as_ref().and_then(HandleRef::get_handle)
    }

    pub fn set_driver_host(&self, driver_host: Option<HandleRef<DriverHostComponent>>) {
        self.data.lock().driver_host = driver_host;
    }

    pub fn driver_component(&self) -> Option<Handle<DriverComponent>> {
        self.data.lock().driver_component.as_ref().and_then(HandleRef::get_handle)
    }

    pub fn set_driver_component(&self, driver: Option<HandleRef<DriverComponent>>) {
        self.data.lock().driver_component = driver;
    }

    pub fn set_controller_ref(&self, binding: Box<dyn NodeControllerBinding>) {
        let previous = self.data.lock().controller_ref.replace(binding);
        if let Some(previous) = previous {
            previous.unbind();
        }
    }

    pub fn set_node_ref(&self, binding: Box<dyn Binding>) {
        let previous = self.data.lock().node_ref.replace(binding);
        if let Some(previous) = previous {
            previous.unbind();
        }
    }

    pub fn state(&self) -> NodeState {
        let flags = self.data.lock().flags;
        if flags.contains(NodeFlags::REMOVED) {
            NodeState::Removed
        } else if flags.contains(NodeFlags::UNLINKING) {
            NodeState::Unlinking
        } else if flags.contains(NodeFlags::DRIVER_STOP_REQUESTED) {
            NodeState::DriverStopRequested
        } else if flags.contains(NodeFlags::REMOVAL_IN_PROGRESS) {
            NodeState::RemovalRequested
        } else {
            NodeState::Active
        }
    }

    /// Tell the node's owner a driver was bound.
    pub fn on_bind(&self) {
        // Sent unlocked: the owner may react by removing the node.
        let Some(controller) = self.data.lock().controller_ref.take() else {
            return;
        };
        if let Err(status) = controller.send_on_bind() {
            error!("Failed to send OnBind event for Node '{}': {}", self.name, status);
        }
        let stale = {
            let mut inner = self.data.lock();
            if inner.flags.contains(NodeFlags::REMOVED) || inner.controller_ref.is_some() {
                Some(controller)
            } else {
                inner.controller_ref = Some(controller);
                None
            }
        };
        if let Some(controller) = stale {
            controller.unbind();
        }
    }

    /// Whether the node may still be bound to a driver or gain children.
    pub fn is_active(&self) -> bool {
        self.state() == NodeState::Active
    }

    /// Symbols a driver bound to this node may use. Only drivers colocated with
    /// the primary parent's driver see them.
    pub fn symbols(&self) -> Vec<NodeSymbol> {
        let (primary, driver_host, composite) = {
            let inner = self.data.lock();
            (
                inner.parents.first().and_then(NodeRef::get_handle),
                inner.driver_host.clone(),
                inner.parents.len() > 1,
            )
        };
        let Some(primary) = primary else {
            return vec![];
        };
        let parent_host = primary.data.lock().driver_host.clone();
        if !same_driver_host(parent_host.as_ref(), driver_host.as_ref()) {
            return vec![];
        }
        if composite {
            primary.symbols.clone()
        } else {
            self.symbols.clone()
        }
    }

    /// Offers routed to the driver bound to this node, sourced from the nearest
    /// ancestor that was launched in a collection. A composite routes each
    /// parent's offers from that parent's side.
    pub fn create_offers(&self) -> Vec<Offer> {
        let parents = self.parents();
        let composite = parents.len() > 1;
        let mut node_offers = vec![];
        for parent in parents {
            let source = collection_source(parent.clone());
            let source_ref = Ref::Child(source.collection().child_ref(&source.topo_name()));
            let offers = if composite { &parent.offers } else { &self.offers };
            for offer in offers {
                let mut offer = offer.clone();
                offer.visit_mut(|decl| decl.set_source(source_ref.clone()));
                node_offers.push(offer);
            }
        }
        node_offers
    }

    /// Arguments to match this node again after it was orphaned.
    pub fn create_add_args(&self) -> NodeAddArgs {
        NodeAddArgs {
            name: Some(self.name.clone()),
            offers: Some(self.create_offers()),
            properties: Some(self.properties.clone()),
            symbols: Some(self.symbols.clone()),
        }
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("name", &self.name)
            .field("state", &self.state())
            .finish()
    }
}

impl Drop for Node {
    fn drop(&mut self) {
        if let Some(controller) = self.data.get_mut().controller_ref.take() {
            controller.unbind();
        }
    }
}

/// Walk up the primary parents to the first node launched in a collection.
/// Without one, the topmost ancestor is the source.
fn collection_source(mut node: NodePtr) -> NodePtr {
    while node.collection() == Collection::None {
        match node.primary_parent() {
            Some(parent) => node = parent,
            None => break,
        }
    }
    node
}

fn same_driver_host(
    a: Option<&HandleRef<DriverHostComponent>>,
    b: Option<&HandleRef<DriverHostComponent>>,
) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => a.ptr_eq(b),
        _ => false,
    }
}

fn validate_offers(name: &str, offers: Option<&[Offer]>) -> Result<Vec<Offer>, NodeError> {
    let offers = offers.unwrap_or_default();
    for offer in offers {
        if !offer.visit(|decl| decl.source_name().is_some()).unwrap_or(false) {
            error!("Failed to add Node '{}', an offer must have a source name", name);
            return Err(NodeError::OfferSourceNameMissing);
        }
        if offer.visit(|decl| decl.source().is_some() || decl.target().is_some()).unwrap_or(false) {
            error!("Failed to add Node '{}', an offer must not have a source or target", name);
            return Err(NodeError::OfferRefExists);
        }
    }
    Ok(offers.to_vec())
}

fn validate_symbols(name: &str, symbols: Option<&[NodeSymbol]>) -> Result<Vec<NodeSymbol>, NodeError> {
    let symbols = symbols.unwrap_or_default();
    let mut names = BTreeSet::new();
    for symbol in symbols {
        let Some(symbol_name) = symbol.name.as_deref() else {
            error!("Failed to add Node '{}', a symbol is missing a name", name);
            return Err(NodeError::SymbolNameMissing);
        };
        if symbol.address.is_none() {
            error!("Failed to add Node '{}', symbol '{}' is missing an address", name, symbol_name);
            return Err(NodeError::SymbolAddressMissing);
        }
        if !names.insert(symbol_name) {
            error!("Failed to add Node '{}', symbol '{}' already exists", name, symbol_name);
            return Err(NodeError::SymbolAlreadyExists);
        }
    }
    Ok(symbols.to_vec())
}
