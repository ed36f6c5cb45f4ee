//! The driver runner.
//!
//! Responsibilities:
//! - Own the root of the node graph and hand every new node to the driver index.
//! - Launch matched drivers as components in the realm, carrying a one-shot token
//!   that ties the component's later start request back to its node.
//! - Start driver hosts on demand and start drivers inside them when the component
//!   framework asks the runner to start a driver component.
//! - Keep nodes without a driver as orphans and retry them once base drivers load.
//! - Assemble composite nodes once every part of a composite driver has matched.
//!
//! Concurrency notes:
//! - **No lock is held while calling a collaborator.** Replies can arrive
//!   synchronously, and every continuation re-checks that the runner and the node
//!   it was issued for still exist before touching them.
//! - The runner only owns driver components and driver hosts; nodes are owned by
//!   their parents, so everything here refers to nodes weakly except the root.
use crate::{
    collection::Collection,
    composite::{CompositeArgsTable, CompositeStatus},
    config::RunnerConfig,
    driver::DriverComponent,
    driver_host::DriverHostComponent,
    error::{CompositeError, MatchError},
    node::{DriverBinder, Node, NodePtr, NodeRef},
    protocol::{DriverIndex, Realm, Transport},
};
use alloc::{
    boxed::Box,
    collections::BTreeMap,
    format,
    string::String,
    sync::{Arc, Weak},
    vec,
    vec::Vec,
};
use core::sync::atomic::{AtomicUsize, Ordering};
use decl::{
    ChildDecl, ComponentStartInfo, CreateChildArgs, Event, HandleInfo, HandleType, Koid, MatchedCompositeInfo,
    MatchedDriver, NodeAddArgs, ServerEnd, StartupMode, Status, TOKEN_ID, program_value, split_handle_id,
};
use log::{error, info, warn};
use spin::Mutex;
use utils::handle::{Handle, HandleRef};

/// Protocol a driver host exposes to the runner.
pub const DRIVER_HOST_PROTOCOL: &str = "fuchsia.driver.framework.DriverHost";

#[derive(Default)]
struct CreateComponentOpts<'a> {
    /// Node whose offers are routed to the component.
    node: Option<&'a NodePtr>,
    /// Start token attached at [TOKEN_ID].
    token: Option<Event>,
    exposed_dir: Option<ServerEnd>,
}

pub struct DriverRunner {
    config: RunnerConfig,
    realm: Arc<dyn Realm>,
    driver_index: Arc<dyn DriverIndex>,
    transport: Arc<dyn Transport>,
    weak_self: Weak<DriverRunner>,
    root_node: NodePtr,
    /// Nodes waiting for their driver component's start request, by token.
    driver_args: Mutex<BTreeMap<Koid, NodeRef>>,
    orphaned_nodes: Mutex<Vec<NodeRef>>,
    composite_args: Mutex<CompositeArgsTable<Node>>,
    driver_hosts: Mutex<Vec<Handle<DriverHostComponent>>>,
    drivers: Mutex<Vec<Handle<DriverComponent>>>,
    next_driver_host_id: AtomicUsize,
}

impl DriverRunner {
    pub fn new(
        config: RunnerConfig,
        realm: Arc<dyn Realm>,
        driver_index: Arc<dyn DriverIndex>,
        transport: Arc<dyn Transport>,
    ) -> Arc<DriverRunner> {
        Arc::new_cyclic(|weak_self: &Weak<DriverRunner>| {
            let binder: Weak<dyn DriverBinder> = weak_self.clone();
            let root_node = NodePtr::new_root(&config.root_node_name, binder, transport.clone(), config.teardown_order);
            DriverRunner {
                next_driver_host_id: AtomicUsize::new(config.first_driver_host_id),
                config,
                realm,
                driver_index,
                transport,
                weak_self: weak_self.clone(),
                root_node,
                driver_args: Mutex::new(BTreeMap::new()),
                orphaned_nodes: Mutex::new(vec![]),
                composite_args: Mutex::new(CompositeArgsTable::new()),
                driver_hosts: Mutex::new(vec![]),
                drivers: Mutex::new(vec![]),
            }
        })
    }

    pub fn root_node(&self) -> &NodePtr {
        &self.root_node
    }

    pub fn num_orphaned_nodes(&self) -> usize {
        self.orphaned_nodes.lock().len()
    }

    pub fn num_pending_composites(&self) -> usize {
        self.composite_args.lock().pending()
    }

    pub fn drivers(&self) -> Vec<Handle<DriverComponent>> {
        self.drivers.lock().clone()
    }

    pub fn driver_hosts(&self) -> Vec<Handle<DriverHostComponent>> {
        self.driver_hosts.lock().clone()
    }

    pub fn start_root_driver(&self, url: &str) -> Result<(), Status> {
        self.start_driver(&self.root_node, url)
    }

    /// Launch the driver component at `url` for `node`. The component's start
    /// request comes back through [DriverRunner::start].
    pub fn start_driver(&self, node: &NodePtr, url: &str) -> Result<(), Status> {
        let token = Event::create()?;
        let koid = token.koid();
        let collection = Collection::for_url(url, &self.config.boot_scheme);
        node.set_collection(collection);
        // Registered first: the start request may arrive before create_component returns.
        self.driver_args.lock().insert(koid, node.create_ref());
        let opts = CreateComponentOpts {
            node: Some(node),
            token: Some(token),
            ..Default::default()
        };
        if let Err(status) = self.create_component(&node.topo_name(), collection, url, opts) {
            self.driver_args.lock().remove(&koid);
            return Err(status);
        }
        Ok(())
    }

    /// `ComponentRunner.Start` for a driver component. On error the caller closes
    /// `controller` with the returned status.
    pub fn start(&self, start_info: ComponentStartInfo, controller: ServerEnd) -> Result<(), Status> {
        let url = String::from(start_info.resolved_url.as_deref().unwrap_or_default());
        let koid = match start_info.numbered_handles.as_deref() {
            Some([HandleInfo { handle: Some(token), id }]) if split_handle_id(*id) == Some((HandleType::User0, 0)) => {
                token.koid()
            }
            _ => {
                error!("Failed to start driver '{}', invalid request for driver", url);
                return Err(Status::InvalidArgs);
            }
        };
        let node = self.driver_args.lock().remove(&koid);
        let Some(node) = node.as_ref().and_then(NodeRef::get_handle) else {
            error!("Failed to start driver '{}', unknown request for driver", url);
            return Err(Status::Unavailable);
        };

        if program_value(start_info.program.as_ref(), "colocate") == Some("true") {
            if node.ptr_eq(&self.root_node) {
                error!("Failed to start driver '{}', root driver cannot colocate", url);
                return Err(Status::InvalidArgs);
            }
            if node.driver_host().is_none() {
                error!("Failed to start driver '{}', no driver host to colocate with", url);
                return Err(Status::BadState);
            }
        } else {
            let driver_host = self.start_driver_host()?;
            node.set_driver_host(Some(driver_host.create_ref()));
            self.driver_hosts.lock().push(driver_host);
        }
        let Some(driver_host) = node.driver_host() else {
            error!("Failed to start driver '{}', driver host went away", url);
            return Err(Status::BadState);
        };

        let (node_client, node_server) = self.transport.create_endpoints()?;
        node.set_node_ref(self.transport.bind_node(node_server, node.clone()));
        let driver_client = driver_host.start(node_client, &node, start_info)?;

        let transport = self.transport.clone();
        let driver = Handle::new_cyclic(|weak_driver| {
            DriverComponent::new(transport.connect_driver(driver_client, weak_driver.clone()), &url)
        });
        let runner = self.weak_self.clone();
        let weak_driver = driver.create_ref();
        let binding = self.transport.bind_component_controller(
            controller,
            driver.create_ref(),
            Box::new(move || {
                if let Some(runner) = runner.upgrade() {
                    runner.remove_driver(&weak_driver);
                }
            }),
        );
        driver.set_driver_ref(binding);
        driver.set_node(node.clone());
        node.set_driver_component(Some(driver.create_ref()));
        self.drivers.lock().push(driver);
        info!("Started driver '{}' for Node '{}'", url, node.topo_name());
        Ok(())
    }

    /// Ask the driver index for a driver for `node`.
    pub fn bind(&self, node: &NodePtr, args: NodeAddArgs) {
        let runner = self.weak_self.clone();
        let weak_node = node.create_ref();
        self.driver_index.match_driver(
            args,
            Box::new(move |result| {
                let Some(runner) = runner.upgrade() else {
                    return;
                };
                let Some(node) = weak_node.get_handle() else {
                    warn!("Node was freed before it could be bound");
                    return;
                };
                if !node.is_active() {
                    debug_ex!("Node '{}' is being removed, ignoring its match", node.name());
                    return;
                }
                runner.on_match(&node, result);
            }),
        );
    }

    fn on_match(&self, node: &NodePtr, result: Result<MatchedDriver, MatchError>) {
        let matched = match result {
            Ok(matched) => matched,
            Err(MatchError::Transport(status)) => {
                self.orphan(node);
                error!("Failed to call match Node '{}': {}", node.name(), status);
                return;
            }
            Err(MatchError::Index(status)) => {
                self.orphan(node);
                warn!("Failed to match Node '{}': {}", node.name(), status);
                return;
            }
        };
        let driver_info = match &matched {
            MatchedDriver::Driver(driver_info) => driver_info,
            MatchedDriver::CompositeDriver(composite) => match composite.driver_info.as_ref() {
                Some(driver_info) => driver_info,
                None => {
                    self.orphan(node);
                    warn!("Failed to match Node '{}', the composite driver has no driver info", node.name());
                    return;
                }
            },
            MatchedDriver::Unknown => {
                self.orphan(node);
                warn!("Failed to match Node '{}', the matched driver is neither a driver nor a composite", node.name());
                return;
            }
        };
        let Some(url) = driver_info.url.as_deref() else {
            self.orphan(node);
            error!("Failed to match Node '{}', the driver URL is missing", node.name());
            return;
        };

        let driver_node = match &matched {
            MatchedDriver::CompositeDriver(composite) => match self.create_composite_node(node, composite) {
                Ok(CompositeStatus::Complete(composite)) => composite,
                Ok(CompositeStatus::Pending) => return,
                Err(err) => {
                    error!("Failed to create composite node for '{}': {}", node.name(), err);
                    return;
                }
            },
            _ => node.clone(),
        };
        if let Err(status) = self.start_driver(&driver_node, url) {
            self.orphan(&driver_node);
            error!("Failed to start driver '{}': {}", driver_node.name(), status);
            return;
        }
        node.on_bind();
    }

    /// Slot `node` into its composite set. Once the set is complete, build the
    /// composite node with the set's nodes as parents, in slot order.
    pub fn create_composite_node(
        &self,
        node: &NodePtr,
        info: &MatchedCompositeInfo,
    ) -> Result<CompositeStatus<NodePtr>, CompositeError> {
        let filled = {
            let mut composite_args = self.composite_args.lock();
            composite_args
                .add_to_composite_args(node.name(), info)
                .map(|slot| composite_args.fill_slot(slot, node.create_ref().into()))
        };
        let parents: Vec<NodePtr> = match filled {
            Ok(CompositeStatus::Complete(parents)) => parents.into_iter().map(NodePtr::from).collect(),
            Ok(CompositeStatus::Pending) => return Ok(CompositeStatus::Pending),
            Err(err) => {
                self.orphan(node);
                return Err(err);
            }
        };
        // A parent being removed has already torn down its children. The set is
        // dropped and the remaining parents wait to be matched again.
        if !parents.iter().all(|parent| parent.is_active()) {
            for parent in parents.iter().filter(|parent| parent.is_active()) {
                self.orphan(parent);
            }
            return Err(CompositeError::ParentRemoved);
        }
        let composite = NodePtr::new_composite(
            &self.config.composite_node_name,
            &parents,
            self.weak_self.clone(),
            self.transport.clone(),
            self.config.teardown_order,
        );
        composite.add_to_parents();
        Ok(CompositeStatus::Complete(composite))
    }

    /// Retry orphaned nodes once the driver index has loaded base drivers.
    /// Covers one load; call again to wait for the next.
    pub fn schedule_base_drivers_binding(&self) {
        let runner = self.weak_self.clone();
        self.driver_index.wait_for_base_drivers(Box::new(move |result| {
            let Some(runner) = runner.upgrade() else {
                return;
            };
            match result {
                Ok(()) => runner.bind_orphans(),
                Err(Status::PeerClosed) => warn!("Connection to DriverIndex closed during WaitForBaseDrivers."),
                Err(status) => error!("DriverIndex::WaitForBaseDrivers failed with: {}", status),
            }
        }));
    }

    fn bind_orphans(&self) {
        let orphaned = core::mem::take(&mut *self.orphaned_nodes.lock());
        for node in orphaned.iter().filter_map(NodeRef::get_handle).filter(|node| node.is_active()) {
            let args = node.create_add_args();
            self.bind(&node, args);
        }
    }

    fn orphan(&self, node: &NodePtr) {
        self.orphaned_nodes.lock().push(node.create_ref());
    }

    fn create_component(&self, name: &str, collection: Collection, url: &str, opts: CreateComponentOpts<'_>) -> Result<(), Status> {
        let child_decl = ChildDecl {
            name: name.into(),
            url: url.into(),
            startup: StartupMode::Lazy,
        };
        let args = CreateChildArgs {
            dynamic_offers: opts.node.map(|node| node.create_offers()),
            numbered_handles: opts.token.map(|token| {
                vec![HandleInfo {
                    handle: Some(token),
                    id: TOKEN_ID,
                }]
            }),
        };
        let runner = self.weak_self.clone();
        let exposed_dir = opts.exposed_dir;
        let (name, url) = (String::from(name), String::from(url));
        self.realm.create_child(
            collection.collection_ref(),
            child_decl,
            args,
            Box::new(move |result| {
                if let Err(err) = result {
                    error!("Failed to create component '{}' ({}): {}", name, url, err);
                    return;
                }
                let (Some(exposed_dir), Some(runner)) = (exposed_dir, runner.upgrade()) else {
                    return;
                };
                let child = collection.child_ref(&name);
                runner.realm.open_exposed_dir(
                    child,
                    exposed_dir,
                    Box::new(move |result| {
                        if let Err(err) = result {
                            error!("Failed to open exposed directory for component '{}' ({}): {}", name, url, err);
                        }
                    }),
                );
            }),
        )
    }

    fn start_driver_host(&self) -> Result<Handle<DriverHostComponent>, Status> {
        let (client_end, server_end) = self.transport.create_endpoints()?;
        let id = self.next_driver_host_id.fetch_add(1, Ordering::Relaxed);
        let name = format!("{}{}", self.config.driver_host_name_prefix, id);
        let opts = CreateComponentOpts {
            exposed_dir: Some(server_end),
            ..Default::default()
        };
        self.create_component(&name, Collection::Host, &self.config.driver_host_url, opts)?;

        let runner = self.weak_self.clone();
        let driver_host = self
            .transport
            .connect_driver_host(
                client_end,
                Box::new(move || {
                    if let Some(runner) = runner.upgrade() {
                        runner.remove_driver_host(id);
                    }
                }),
            )
            .map_err(|status| {
                error!("Failed to connect to service '{}': {}", DRIVER_HOST_PROTOCOL, status);
                status
            })?;
        debug_ex!("Launched driver host '{}'", name);
        Ok(Handle::from(DriverHostComponent::new(id, driver_host, self.transport.clone())))
    }

    fn remove_driver(&self, driver: &HandleRef<DriverComponent>) {
        let removed = {
            let mut drivers = self.drivers.lock();
            drivers
                .iter()
                .position(|candidate| candidate.create_ref().ptr_eq(driver))
                .map(|index| drivers.remove(index))
        };
        // Dropping the last handle resumes removal of the node.
        drop(removed);
    }

    fn remove_driver_host(&self, id: usize) {
        let removed = {
            let mut driver_hosts = self.driver_hosts.lock();
            driver_hosts
                .iter()
                .position(|driver_host| driver_host.id() == id)
                .map(|index| driver_hosts.remove(index))
        };
        drop(removed);
    }
}

impl DriverBinder for DriverRunner {
    fn bind(&self, node: &NodePtr, args: NodeAddArgs) {
        DriverRunner::bind(self, node, args);
    }
}
