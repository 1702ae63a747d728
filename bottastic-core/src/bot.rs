//! The bot extension point.
//!
//! A bot implements [`Bot`] and overrides whichever handlers it cares about;
//! the rest default to no-ops. The runtime calls handlers one at a time, in
//! the order events arrive, and waits for each to finish before decoding the
//! next event, so a bot can mutate its own state without locking.

use async_trait::async_trait;

use crate::channel::MeshtasticChannel;
use crate::connection::ConnectionRef;
use crate::error::Result;
use crate::node::MeshtasticNode;
use crate::state::{MyNodeInfo, NodeRegistry};

#[async_trait]
pub trait Bot: Send {
    /// Called once, after the connection to the device is established and
    /// before any message handler.
    async fn on_initialized(&mut self, _ctx: &BotContext<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called for every text broadcast on a channel.
    async fn handle_message(
        &mut self,
        _ctx: &BotContext<'_>,
        _from_node: MeshtasticNode,
        _message: &str,
        _channel: MeshtasticChannel,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called for every text message addressed to the local device.
    async fn handle_direct_message(
        &mut self,
        _ctx: &BotContext<'_>,
        _from_node: MeshtasticNode,
        _message: &str,
    ) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Runtime view handed to every handler invocation.
pub struct BotContext<'a> {
    my_node: &'a MyNodeInfo,
    registry: &'a NodeRegistry,
    connection: ConnectionRef,
    default_channel: u32,
}

impl<'a> BotContext<'a> {
    pub(crate) fn new(
        my_node: &'a MyNodeInfo,
        registry: &'a NodeRegistry,
        connection: ConnectionRef,
        default_channel: u32,
    ) -> Self {
        Self {
            my_node,
            registry,
            connection,
            default_channel,
        }
    }

    /// The locally connected device.
    pub fn my_node(&self) -> &MyNodeInfo {
        self.my_node
    }

    pub fn nodes(&self) -> &NodeRegistry {
        self.registry
    }

    /// Handle for any node number, known or not.
    pub fn node(&self, num: u32) -> MeshtasticNode {
        MeshtasticNode::new(self.registry.resolve(num), self.connection.clone())
    }

    pub fn channel(&self, index: u32) -> MeshtasticChannel {
        MeshtasticChannel::new(index, self.connection.clone())
    }

    /// Broadcasts on the configured default channel.
    pub async fn send_message(&self, text: &str) -> Result<()> {
        self.channel(self.default_channel).send_message(text).await
    }
}
