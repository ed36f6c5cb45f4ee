//! Driver components: the runner's side of a driver started in a driver host.
//!
//! Responsibilities:
//! - Hold the connection to the started driver ([Driver]) and the binding of the
//!   component controller the component framework talks to.
//! - Turn component framework `Stop`/`Kill` requests into removal of the bound node.
//! - Ask the driver to stop, at most once, when the bound node is being removed.
//!
//! Ownership notes:
//! - A [DriverComponent] keeps its node alive with a strong [NodePtr]; the node only
//!   refers back weakly. Dropping the component clears that back-reference and
//!   resumes the node's removal.
//! - **The runner's driver list is the only long-lived owner.** The component goes
//!   away once its controller binding is unbound and the runner drops it.
use crate::{
    node::NodePtr,
    protocol::{Binding, Driver},
};
use alloc::boxed::Box;
use core::sync::atomic::{AtomicBool, Ordering};
use decl::Status;
use log::{error, warn};
use spin::Mutex;

pub struct DriverComponent {
    url: Box<str>,
    driver: Box<dyn Driver>,
    node: Mutex<Option<NodePtr>>,
    driver_ref: Mutex<Option<Box<dyn Binding>>>,
    stop_in_progress: AtomicBool,
}

impl DriverComponent {
    pub fn new(driver: Box<dyn Driver>, url: &str) -> DriverComponent {
        DriverComponent {
            url: url.into(),
            driver,
            node: Mutex::new(None),
            driver_ref: Mutex::new(None),
            stop_in_progress: AtomicBool::new(false),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn node(&self) -> Option<NodePtr> {
        self.node.lock().clone()
    }

    pub fn set_node(&self, node: NodePtr) {
        *self.node.lock() = Some(node);
    }

    /// Take over the component controller binding.
    pub fn set_driver_ref(&self, binding: Box<dyn Binding>) {
        let previous = self.driver_ref.lock().replace(binding);
        if let Some(previous) = previous {
            previous.unbind();
        }
    }

    /// The driver's channel closed. A clean close carries [Status::Ok].
    pub fn on_driver_closed(&self, epitaph: Status) {
        if epitaph != Status::Ok {
            warn!("Driver '{}' closed its channel: {}", self.url, epitaph);
        }
        self.stop_component();
    }

    /// `ComponentController.Stop`.
    pub fn stop(&self) {
        self.request_driver_stop();
    }

    /// `ComponentController.Kill`.
    pub fn kill(&self) {
        self.request_driver_stop();
    }

    fn request_driver_stop(&self) {
        let node = self.node();
        if let Some(node) = node {
            node.remove();
        }
    }

    /// Close the component controller with a clean epitaph. The component
    /// framework then destroys the component.
    pub fn stop_component(&self) {
        let binding = self.driver_ref.lock().take();
        if let Some(binding) = binding {
            binding.close(Status::Ok);
        }
    }

    /// Ask the driver to stop. Later calls do nothing.
    pub fn stop_driver(&self) {
        if self.stop_in_progress.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Err(status) = self.driver.stop() {
            error!("Failed to stop driver '{}': {}", self.url, status);
        }
    }
}

impl Drop for DriverComponent {
    fn drop(&mut self) {
        if let Some(node) = self.node.get_mut().take() {
            node.set_driver_component(None);
            node.remove();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::sync::Arc;
    use core::sync::atomic::AtomicUsize;

    struct CountingDriver {
        stops: Arc<AtomicUsize>,
    }

    impl Driver for CountingDriver {
        fn stop(&self) -> Result<(), Status> {
            self.stops.fetch_add(1, Ordering::Relaxed);
            Err(Status::PeerClosed)
        }
    }

    struct ClosingBinding {
        epitaph: Arc<Mutex<Option<Status>>>,
    }

    impl Binding for ClosingBinding {
        fn unbind(self: Box<Self>) {}

        fn close(self: Box<Self>, epitaph: Status) {
            *self.epitaph.lock() = Some(epitaph);
        }
    }

    #[test]
    fn stop_driver_reaches_the_driver_once() {
        let stops = Arc::new(AtomicUsize::new(0));
        let driver = DriverComponent::new(Box::new(CountingDriver { stops: stops.clone() }), "fuchsia-boot:///#meta/x.cm");
        driver.stop_driver();
        driver.stop_driver();
        assert_eq!(stops.load(Ordering::Relaxed), 1);
        assert_eq!(driver.url(), "fuchsia-boot:///#meta/x.cm");
    }

    #[test]
    fn driver_close_closes_controller_cleanly() {
        let epitaph = Arc::new(Mutex::new(None));
        let stops = Arc::new(AtomicUsize::new(0));
        let driver = DriverComponent::new(Box::new(CountingDriver { stops }), "x");
        driver.set_driver_ref(Box::new(ClosingBinding { epitaph: epitaph.clone() }));

        driver.on_driver_closed(Status::PeerClosed);
        assert_eq!(*epitaph.lock(), Some(Status::Ok));

        // Already closed.
        *epitaph.lock() = None;
        driver.stop_component();
        assert_eq!(*epitaph.lock(), None);
    }
}
