use crate::{
    node::Node,
    protocol::{DriverHost, Transport},
};
use alloc::{boxed::Box, string::String, sync::Arc};
use decl::{ClientEnd, ComponentStartInfo, DriverStartArgs, Status, program_value};
use log::error;

/// A running driver host process, as seen by the runner.
pub struct DriverHostComponent {
    id: usize,
    driver_host: Box<dyn DriverHost>,
    transport: Arc<dyn Transport>,
}

impl DriverHostComponent {
    pub fn new(id: usize, driver_host: Box<dyn DriverHost>, transport: Arc<dyn Transport>) -> DriverHostComponent {
        DriverHostComponent {
            id,
            driver_host,
            transport,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Start a driver for `node` in this host. `node_client` is the client end
    /// of the node's `Node` channel. Return the client end of the driver's channel.
    pub fn start(&self, node_client: ClientEnd, node: &Node, start_info: ComponentStartInfo) -> Result<ClientEnd, Status> {
        let (client_end, server_end) = self.transport.create_endpoints()?;
        let binary = String::from(program_value(start_info.program.as_ref(), "binary").unwrap_or_default());
        let symbols = node.symbols();
        let args = DriverStartArgs {
            node: Some(node_client),
            url: start_info.resolved_url,
            program: start_info.program,
            ns: start_info.ns,
            outgoing_dir: start_info.outgoing_dir,
            symbols: (!symbols.is_empty()).then_some(symbols),
        };
        if let Err(status) = self.driver_host.start(args, server_end) {
            error!("Failed to start driver '{}' in driver host: {}", binary, status);
            return Err(status);
        }
        Ok(client_end)
    }
}
