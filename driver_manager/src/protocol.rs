//! Interfaces to the collaborators of the driver runner.
//!
//! The runner never owns a channel. Everything that crosses a process boundary goes
//! through these traits: the driver index that matches nodes to drivers, the realm
//! that creates components, driver hosts and drivers themselves, and a [Transport]
//! that serves the runner's own protocols on server ends handed to it.
//!
//! Replies arrive through [Callback]s. A callback may run synchronously inside the
//! call that registered it, so the runner never holds a lock across any of these calls.

use crate::{
    driver::DriverComponent,
    error::{MatchError, RealmError},
    node::{NodePtr, NodeRef},
};
use alloc::boxed::Box;
use decl::{
    ChildDecl, ChildRef, ClientEnd, CollectionRef, CreateChildArgs, DriverStartArgs, MatchedDriver, NodeAddArgs,
    ServerEnd, Status,
};
use utils::handle::HandleRef;

/// One-shot reply continuation.
pub type Callback<T> = Box<dyn FnOnce(T) + Send>;

/// A protocol served on a channel. Dropping the box without calling either
/// method leaves the transport to decide.
pub trait Binding: Send {
    /// Stop serving without an epitaph and release whatever the binding owns.
    fn unbind(self: Box<Self>);
    /// Send `epitaph` to the peer, then stop serving.
    fn close(self: Box<Self>, epitaph: Status);
}

/// Binding of `NodeController`.
pub trait NodeControllerBinding: Binding {
    /// Emit the `OnBind` event.
    fn send_on_bind(&self) -> Result<(), Status>;
}

pub trait DriverIndex: Send + Sync {
    fn match_driver(&self, args: NodeAddArgs, callback: Callback<Result<MatchedDriver, MatchError>>);
    /// Reply once the base drivers are loaded and matching may be retried.
    fn wait_for_base_drivers(&self, callback: Callback<Result<(), Status>>);
}

pub trait Realm: Send + Sync {
    /// Submit a child declaration. An `Err` means the request was never sent;
    /// the outcome of a sent request arrives through `callback`.
    fn create_child(
        &self,
        collection: CollectionRef,
        decl: ChildDecl,
        args: CreateChildArgs,
        callback: Callback<Result<(), RealmError>>,
    ) -> Result<(), Status>;

    fn open_exposed_dir(&self, child: ChildRef, exposed_dir: ServerEnd, callback: Callback<Result<(), RealmError>>);
}

pub trait DriverHost: Send + Sync {
    fn start(&self, args: DriverStartArgs, driver: ServerEnd) -> Result<(), Status>;
}

pub trait Driver: Send + Sync {
    fn stop(&self) -> Result<(), Status>;
}

pub trait Transport: Send + Sync {
    fn create_endpoints(&self) -> Result<(ClientEnd, ServerEnd), Status> {
        decl::create_endpoints()
    }

    /// Serve `Node` for `node`. The binding keeps the node alive while bound,
    /// and the peer closing the channel calls [NodePtr::remove].
    fn bind_node(&self, server_end: ServerEnd, node: NodePtr) -> Box<dyn Binding>;

    fn bind_node_controller(&self, server_end: ServerEnd, node: NodeRef) -> Box<dyn NodeControllerBinding>;

    /// Serve `ComponentController` for `driver`. `on_unbound` runs once the
    /// binding is closed or unbound, from either side.
    fn bind_component_controller(
        &self,
        server_end: ServerEnd,
        driver: HandleRef<DriverComponent>,
        on_unbound: Box<dyn FnOnce() + Send>,
    ) -> Box<dyn Binding>;

    /// Connect to a started driver. The transport reports the driver's channel
    /// closing through [DriverComponent::on_driver_closed].
    fn connect_driver(&self, client_end: ClientEnd, driver: HandleRef<DriverComponent>) -> Box<dyn Driver>;

    /// Connect to the `DriverHost` protocol in a driver host's exposed directory.
    /// `on_teardown` runs when the host's channel closes.
    fn connect_driver_host(
        &self,
        exposed_dir: ClientEnd,
        on_teardown: Box<dyn FnOnce() + Send>,
    ) -> Result<Box<dyn DriverHost>, Status>;
}
