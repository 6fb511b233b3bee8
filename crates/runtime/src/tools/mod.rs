//! Tool servers, the tool registry and the tool host seam.

mod connector;
#[cfg(test)]
pub(crate) mod fake;
mod host;
mod manager;
mod registry;

pub use connector::{Connector, ProcessConnector};
pub use host::{EmptyToolHost, ToolHost};
pub use manager::ToolServerManager;
pub use registry::{ToolDescriptor, ToolRegistry};
