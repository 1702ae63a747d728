use crate::connection::{ConnectionRef, Destination};
use crate::error::Result;
use crate::state::NodeInfo;

/// An addressable peer on the mesh.
///
/// Handed to bot handlers by the runtime. Sending through it issues a direct
/// message to this node over the runtime's connection.
#[derive(Debug, Clone)]
pub struct MeshtasticNode {
    info: NodeInfo,
    connection: ConnectionRef,
}

impl MeshtasticNode {
    pub fn new(info: NodeInfo, connection: ConnectionRef) -> Self {
        Self { info, connection }
    }

    pub fn num(&self) -> u32 {
        self.info.num
    }

    /// The `!xxxxxxxx` form of the node number.
    pub fn id(&self) -> &str {
        &self.info.id
    }

    pub fn short_name(&self) -> Option<&str> {
        self.info.short_name()
    }

    pub fn long_name(&self) -> Option<&str> {
        self.info.long_name()
    }

    pub fn info(&self) -> &NodeInfo {
        &self.info
    }

    pub async fn send_message(&self, text: &str) -> Result<()> {
        self.connection
            .send(text, Destination::Node(self.info.num), false)
            .await
            .map(|_| ())
    }

    /// Sends with an acknowledgement request and returns the packet id.
    pub async fn send_message_with_ack(&self, text: &str) -> Result<u32> {
        self.connection
            .send(text, Destination::Node(self.info.num), true)
            .await
    }
}
