//! In-process fakes of the runner's collaborators.
#![allow(dead_code)]

use decl::{
    ChildDecl, ChildRef, ClientEnd, CollectionRef, ComponentStartInfo, CreateChildArgs, Dictionary, DriverInfo,
    DriverStartArgs, HandleInfo, Koid, MatchedCompositeInfo, MatchedDriver, NodeAddArgs, NodeError, NodeSymbol, Offer,
    ServerEnd, Status, create_endpoints,
};
use driver_manager::{
    DriverComponent, DriverRunner, NodePtr, NodeRef, RunnerConfig,
    error::{MatchError, RealmError},
    protocol::{Binding, Callback, Driver, DriverHost, DriverIndex, NodeControllerBinding, Realm, Transport},
};
use spin::Mutex;
use std::{
    collections::BTreeMap,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};
use utils::handle::{Handle, HandleRef};

pub const BOOT_URL: &str = "fuchsia-boot:///#meta/root-driver.cm";
pub const PKG_URL: &str = "fuchsia-pkg://fuchsia.com/block#meta/block.cm";
pub const COMPOSITE_URL: &str = "fuchsia-pkg://fuchsia.com/composite#meta/composite.cm";

pub fn driver(url: &str) -> Result<MatchedDriver, MatchError> {
    Ok(MatchedDriver::Driver(DriverInfo::with_url(url)))
}

pub fn composite(url: &str, node_index: u32, num_nodes: u32) -> Result<MatchedDriver, MatchError> {
    Ok(MatchedDriver::CompositeDriver(MatchedCompositeInfo {
        node_index: Some(node_index),
        num_nodes: Some(num_nodes),
        driver_info: Some(DriverInfo::with_url(url)),
    }))
}

type MatchRequest = (NodeAddArgs, Callback<Result<MatchedDriver, MatchError>>);

#[derive(Default)]
pub struct FakeDriverIndex {
    matches: Mutex<Vec<MatchRequest>>,
    waiters: Mutex<Vec<Callback<Result<(), Status>>>>,
}

impl DriverIndex for FakeDriverIndex {
    fn match_driver(&self, args: NodeAddArgs, callback: Callback<Result<MatchedDriver, MatchError>>) {
        self.matches.lock().push((args, callback));
    }

    fn wait_for_base_drivers(&self, callback: Callback<Result<(), Status>>) {
        self.waiters.lock().push(callback);
    }
}

impl FakeDriverIndex {
    /// Names of the nodes waiting for a match, oldest first.
    pub fn pending(&self) -> Vec<String> {
        self.matches
            .lock()
            .iter()
            .map(|(args, _)| args.name.as_deref().unwrap_or_default().to_string())
            .collect()
    }

    pub fn args(&self, name: &str) -> NodeAddArgs {
        let matches = self.matches.lock();
        let (args, _) = matches
            .iter()
            .find(|(args, _)| args.name.as_deref() == Some(name))
            .expect("no match request for node");
        args.clone()
    }

    /// Answer the oldest match request for `name`.
    pub fn reply(&self, name: &str, result: Result<MatchedDriver, MatchError>) {
        let (_, callback) = {
            let mut matches = self.matches.lock();
            let index = matches
                .iter()
                .position(|(args, _)| args.name.as_deref() == Some(name))
                .expect("no match request for node");
            matches.remove(index)
        };
        callback(result);
    }

    pub fn release_base_drivers(&self, result: Result<(), Status>) {
        let waiters = std::mem::take(&mut *self.waiters.lock());
        for waiter in waiters {
            waiter(result);
        }
    }
}

pub struct CreatedChild {
    pub collection: String,
    pub name: String,
    pub url: String,
    pub offers: Option<Vec<Offer>>,
    pub handles: Option<Vec<HandleInfo>>,
}

#[derive(Default)]
pub struct FakeRealm {
    children: Mutex<Vec<CreatedChild>>,
    opened: Mutex<Vec<ChildRef>>,
    create_error: Mutex<Option<RealmError>>,
}

impl Realm for FakeRealm {
    fn create_child(
        &self,
        collection: CollectionRef,
        decl: ChildDecl,
        args: CreateChildArgs,
        callback: Callback<Result<(), RealmError>>,
    ) -> Result<(), Status> {
        self.children.lock().push(CreatedChild {
            collection: collection.name.to_string(),
            name: decl.name.to_string(),
            url: decl.url.to_string(),
            offers: args.dynamic_offers,
            handles: args.numbered_handles,
        });
        let error = *self.create_error.lock();
        callback(error.map_or(Ok(()), Err));
        Ok(())
    }

    fn open_exposed_dir(&self, child: ChildRef, _exposed_dir: ServerEnd, callback: Callback<Result<(), RealmError>>) {
        self.opened.lock().push(child);
        callback(Ok(()));
    }
}

impl FakeRealm {
    /// `collection/name` of every child created so far.
    pub fn children(&self) -> Vec<String> {
        self.children
            .lock()
            .iter()
            .map(|child| format!("{}/{}", child.collection, child.name))
            .collect()
    }

    pub fn offers(&self, name: &str) -> Vec<Offer> {
        let children = self.children.lock();
        let child = children.iter().rev().find(|child| child.name == name).expect("no such child");
        child.offers.clone().unwrap_or_default()
    }

    pub fn opened(&self) -> Vec<ChildRef> {
        self.opened.lock().clone()
    }

    pub fn fail_create(&self, error: RealmError) {
        *self.create_error.lock() = Some(error);
    }

    /// The start request the component framework would send for child `name`.
    pub fn start_info(&self, name: &str, program: &[(&str, &str)]) -> ComponentStartInfo {
        let mut children = self.children.lock();
        let child = children
            .iter_mut()
            .rev()
            .find(|child| child.name == name && child.handles.is_some())
            .expect("no pending driver component");
        ComponentStartInfo {
            resolved_url: Some(child.url.as_str().into()),
            program: Some(Dictionary::from_pairs(program.iter().copied())),
            numbered_handles: child.handles.take(),
            ..Default::default()
        }
    }
}

pub struct HostStart {
    pub url: String,
    pub symbols: Option<Vec<NodeSymbol>>,
}

struct HostRecord {
    teardown: Option<Box<dyn FnOnce() + Send>>,
}

#[derive(Default)]
pub struct TransportState {
    nodes: Mutex<BTreeMap<Koid, NodePtr>>,
    on_bind: Mutex<Vec<String>>,
    remove_on_bind: AtomicBool,
    unbound_controllers: AtomicUsize,
    component_controllers: Mutex<BTreeMap<Koid, Box<dyn FnOnce() + Send>>>,
    epitaphs: Mutex<Vec<Status>>,
    drivers: Mutex<Vec<(HandleRef<DriverComponent>, Arc<AtomicUsize>)>>,
    hosts: Mutex<Vec<HostRecord>>,
    host_starts: Mutex<Vec<HostStart>>,
    host_connect_error: Mutex<Option<Status>>,
}

#[derive(Default)]
pub struct FakeTransport {
    state: Arc<TransportState>,
}

struct NodeBinding {
    koid: Koid,
    state: Arc<TransportState>,
}

impl Binding for NodeBinding {
    fn unbind(self: Box<Self>) {
        let node = self.state.nodes.lock().remove(&self.koid);
        drop(node);
    }

    fn close(self: Box<Self>, _epitaph: Status) {
        self.unbind();
    }
}

struct ControllerBinding {
    topo_name: String,
    node: NodeRef,
    state: Arc<TransportState>,
}

impl Binding for ControllerBinding {
    fn unbind(self: Box<Self>) {
        self.state.unbound_controllers.fetch_add(1, Ordering::Relaxed);
    }

    fn close(self: Box<Self>, _epitaph: Status) {
        self.unbind();
    }
}

impl NodeControllerBinding for ControllerBinding {
    fn send_on_bind(&self) -> Result<(), Status> {
        self.state.on_bind.lock().push(self.topo_name.clone());
        // The owner answers the event by dropping the node.
        if self.state.remove_on_bind.load(Ordering::Relaxed) {
            if let Some(node) = self.node.get_handle() {
                node.remove();
            }
        }
        Ok(())
    }
}

struct ComponentControllerBinding {
    koid: Koid,
    state: Arc<TransportState>,
}

impl ComponentControllerBinding {
    fn finish(&self) {
        let on_unbound = self.state.component_controllers.lock().remove(&self.koid);
        if let Some(on_unbound) = on_unbound {
            on_unbound();
        }
    }
}

impl Binding for ComponentControllerBinding {
    fn unbind(self: Box<Self>) {
        self.finish();
    }

    fn close(self: Box<Self>, epitaph: Status) {
        self.state.epitaphs.lock().push(epitaph);
        self.finish();
    }
}

struct FakeDriver {
    stops: Arc<AtomicUsize>,
}

impl Driver for FakeDriver {
    fn stop(&self) -> Result<(), Status> {
        self.stops.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

struct FakeDriverHost {
    state: Arc<TransportState>,
}

impl DriverHost for FakeDriverHost {
    fn start(&self, args: DriverStartArgs, _driver: ServerEnd) -> Result<(), Status> {
        self.state.host_starts.lock().push(HostStart {
            url: args.url.as_deref().unwrap_or_default().to_string(),
            symbols: args.symbols,
        });
        Ok(())
    }
}

impl Transport for FakeTransport {
    fn bind_node(&self, server_end: ServerEnd, node: NodePtr) -> Box<dyn Binding> {
        self.state.nodes.lock().insert(server_end.koid(), node);
        Box::new(NodeBinding {
            koid: server_end.koid(),
            state: self.state.clone(),
        })
    }

    fn bind_node_controller(&self, _server_end: ServerEnd, node: NodeRef) -> Box<dyn NodeControllerBinding> {
        let topo_name = node.get_handle().map(|node| node.topo_name()).unwrap_or_default();
        Box::new(ControllerBinding {
            topo_name,
            node,
            state: self.state.clone(),
        })
    }

    fn bind_component_controller(
        &self,
        server_end: ServerEnd,
        _driver: HandleRef<DriverComponent>,
        on_unbound: Box<dyn FnOnce() + Send>,
    ) -> Box<dyn Binding> {
        self.state.component_controllers.lock().insert(server_end.koid(), on_unbound);
        Box::new(ComponentControllerBinding {
            koid: server_end.koid(),
            state: self.state.clone(),
        })
    }

    fn connect_driver(&self, _client_end: ClientEnd, driver: HandleRef<DriverComponent>) -> Box<dyn Driver> {
        let stops = Arc::new(AtomicUsize::new(0));
        self.state.drivers.lock().push((driver, stops.clone()));
        Box::new(FakeDriver { stops })
    }

    fn connect_driver_host(
        &self,
        _exposed_dir: ClientEnd,
        on_teardown: Box<dyn FnOnce() + Send>,
    ) -> Result<Box<dyn DriverHost>, Status> {
        if let Some(status) = *self.state.host_connect_error.lock() {
            return Err(status);
        }
        self.state.hosts.lock().push(HostRecord {
            teardown: Some(on_teardown),
        });
        Ok(Box::new(FakeDriverHost {
            state: self.state.clone(),
        }))
    }
}

impl FakeTransport {
    /// Topological names of the nodes that were told a driver bound.
    pub fn on_bind(&self) -> Vec<String> {
        self.state.on_bind.lock().clone()
    }

    pub fn unbound_controllers(&self) -> usize {
        self.state.unbound_controllers.load(Ordering::Relaxed)
    }

    pub fn served_nodes(&self) -> usize {
        self.state.nodes.lock().len()
    }

    pub fn epitaphs(&self) -> Vec<Status> {
        self.state.epitaphs.lock().clone()
    }

    pub fn host_starts(&self) -> Vec<(String, Option<Vec<NodeSymbol>>)> {
        self.state
            .host_starts
            .lock()
            .iter()
            .map(|start| (start.url.clone(), start.symbols.clone()))
            .collect()
    }

    pub fn stop_count(&self, driver: &Handle<DriverComponent>) -> usize {
        let drivers = self.state.drivers.lock();
        drivers
            .iter()
            .find(|(candidate, _)| candidate.ptr_eq(&driver.create_ref()))
            .map_or(0, |(_, stops)| stops.load(Ordering::Relaxed))
    }

    /// Make node owners remove their node as soon as a driver binds to it.
    pub fn remove_nodes_on_bind(&self) {
        self.state.remove_on_bind.store(true, Ordering::Relaxed);
    }

    pub fn fail_host_connect(&self, status: Status) {
        *self.state.host_connect_error.lock() = Some(status);
    }

    /// Close the channel of the `index`th driver host launched.
    pub fn teardown_host(&self, index: usize) {
        let teardown = self.state.hosts.lock()[index].teardown.take();
        if let Some(teardown) = teardown {
            teardown();
        }
    }
}

pub struct TestEnv {
    pub runner: Arc<DriverRunner>,
    pub realm: Arc<FakeRealm>,
    pub index: Arc<FakeDriverIndex>,
    pub transport: Arc<FakeTransport>,
}

impl TestEnv {
    pub fn new() -> TestEnv {
        TestEnv::with_config(RunnerConfig::default())
    }

    pub fn with_config(config: RunnerConfig) -> TestEnv {
        let realm = Arc::new(FakeRealm::default());
        let index = Arc::new(FakeDriverIndex::default());
        let transport = Arc::new(FakeTransport::default());
        let runner = DriverRunner::new(config, realm.clone(), index.clone(), transport.clone());
        TestEnv {
            runner,
            realm,
            index,
            transport,
        }
    }

    pub fn root(&self) -> NodePtr {
        self.runner.root_node().clone()
    }

    /// Launch the root driver from the boot image and complete its start request.
    pub fn start_root(&self) {
        self.runner.start_root_driver(BOOT_URL).unwrap();
        self.start_component("root", &[]).unwrap();
    }

    /// Deliver the component framework's start request for driver component `name`.
    pub fn start_component(&self, name: &str, program: &[(&str, &str)]) -> Result<(), Status> {
        let start_info = self.realm.start_info(name, program);
        let (_, controller) = create_endpoints().unwrap();
        self.runner.start(start_info, controller)
    }

    pub fn add_child(&self, parent: &NodePtr, args: NodeAddArgs) -> Result<NodePtr, NodeError> {
        let name = args.name.clone();
        let (_, controller) = create_endpoints().unwrap();
        parent.add_child(args, controller, None)?;
        Ok(child(parent, name.as_deref().unwrap_or_default()))
    }

    /// Match `node` to the driver at `url` and start it in its own driver host.
    pub fn bind(&self, node: &NodePtr, url: &str) {
        self.index.reply(node.name(), driver(url));
        self.start_component(&node.topo_name(), &[]).unwrap();
    }
}

pub fn child(parent: &NodePtr, name: &str) -> NodePtr {
    parent
        .children()
        .into_iter()
        .find(|child| child.name() == name)
        .expect("no such child")
}

pub fn names(nodes: &[NodePtr]) -> Vec<String> {
    nodes.iter().map(|node| node.name().to_string()).collect()
}

/// Simulate the driver closing its channel, as a driver host does once the
/// driver has stopped.
pub fn close_driver(node: &NodePtr, epitaph: Status) {
    let driver = node.driver_component().expect("node has no driver");
    driver.on_driver_closed(epitaph);
}
