use std::sync::Arc;
use strum::Display;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::bot::{Bot, BotContext};
use crate::channel::MeshtasticChannel;
use crate::connection::{Connection, ConnectionOptions, ConnectionRef, MeshLink, MeshtasticLink};
use crate::echo::Echo;
use crate::error::{BotError, Result};
use crate::event::{BotEvent, RawEvent, decode};
use crate::message::Message;
use crate::node::MeshtasticNode;
use crate::state::{MyNodeInfo, NodeRegistry};

/// Settings threaded from the command line into every dispatch and send.
#[derive(Debug, Clone, Default)]
pub struct BotConfig {
    /// Print every outbound message to the console.
    pub echo_sent: bool,
    /// Print every inbound message to the console before dispatching it.
    pub echo_received: bool,
    /// Channel used by [`BotRuntime::send_message`] and [`BotContext::send_message`].
    pub default_channel: u32,
}

/// Connection lifecycle of a [`BotRuntime`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum RuntimeState {
    Connecting,
    Running,
    /// The device link was lost. Terminal.
    Disconnected,
    /// Connecting failed, or a handler error stopped the run. Terminal.
    Failed,
}

/// Owns the device connection and routes decoded events to a bot.
pub struct BotRuntime {
    config: BotConfig,
    state: RuntimeState,
    connection: Option<Arc<Connection>>,
    events: Option<mpsc::UnboundedReceiver<RawEvent>>,
    registry: NodeRegistry,
    my_node: Option<MyNodeInfo>,
    echo: Echo,
}

impl BotRuntime {
    pub fn new(config: BotConfig) -> Self {
        Self::with_echo(config, Echo::stdout())
    }

    /// Like [`new`](Self::new), but echoes to `echo` instead of stdout.
    pub fn with_echo(config: BotConfig, echo: Echo) -> Self {
        Self {
            config,
            state: RuntimeState::Connecting,
            connection: None,
            events: None,
            registry: NodeRegistry::new(),
            my_node: None,
            echo,
        }
    }

    pub fn state(&self) -> RuntimeState {
        self.state
    }

    pub fn config(&self) -> &BotConfig {
        &self.config
    }

    /// The local device, once the connection has been established.
    pub fn my_node(&self) -> Option<&MyNodeInfo> {
        self.my_node.as_ref()
    }

    pub fn registry(&self) -> &NodeRegistry {
        &self.registry
    }

    /// Connects to a Meshtastic device. On failure the runtime moves to
    /// [`RuntimeState::Failed`].
    pub async fn connect(&mut self, options: &ConnectionOptions) -> Result<()> {
        match MeshtasticLink::connect(options).await {
            Ok((link, events)) => {
                self.attach(Box::new(link), events);
                Ok(())
            }
            Err(e) => {
                warn!("Connection failed: {e}");
                self.state = RuntimeState::Failed;
                Err(e)
            }
        }
    }

    /// Takes ownership of an already connected link and its event stream.
    pub fn attach(&mut self, link: Box<dyn MeshLink>, events: mpsc::UnboundedReceiver<RawEvent>) {
        let echo = self.config.echo_sent.then(|| self.echo.clone());
        self.connection = Some(Arc::new(Connection::new(link, echo)));
        self.events = Some(events);
        self.state = RuntimeState::Running;
    }

    fn connection_ref(&self) -> ConnectionRef {
        match &self.connection {
            Some(connection) => ConnectionRef::new(connection),
            None => ConnectionRef::detached(),
        }
    }

    pub fn channel(&self, index: u32) -> MeshtasticChannel {
        MeshtasticChannel::new(index, self.connection_ref())
    }

    pub fn node(&self, num: u32) -> MeshtasticNode {
        MeshtasticNode::new(self.registry.resolve(num), self.connection_ref())
    }

    /// Broadcasts on the default channel.
    pub async fn send_message(&self, text: &str) -> Result<()> {
        self.channel(self.config.default_channel)
            .send_message(text)
            .await
    }

    /// Processes events until the connection is lost or a handler fails.
    ///
    /// Events are handled strictly one at a time; a handler that never returns
    /// stalls the loop. Losing the device link ends the run with
    /// [`BotError::Connection`].
    pub async fn run(&mut self, bot: &mut dyn Bot) -> Result<()> {
        let mut events = self
            .events
            .take()
            .ok_or_else(|| BotError::Connection("not connected".to_string()))?;

        info!("Bot runtime started");

        while let Some(event) = events.recv().await {
            if let Err(e) = self.dispatch(bot, event).await {
                self.state = RuntimeState::Failed;
                if let Some(connection) = &self.connection {
                    connection.mark_closed().await;
                }
                return Err(e);
            }

            if self.state == RuntimeState::Disconnected {
                return Err(BotError::Connection(
                    "connection to device lost".to_string(),
                ));
            }
        }

        self.dispatch(bot, RawEvent::Disconnected).await?;
        Err(BotError::Connection(
            "connection to device lost".to_string(),
        ))
    }

    /// Decodes one raw event and runs the matching handler to completion.
    pub async fn dispatch(&mut self, bot: &mut dyn Bot, event: RawEvent) -> Result<()> {
        if self.state != RuntimeState::Running {
            debug!("Ignoring event in state {}", self.state);
            return Ok(());
        }

        let my_node_num = self.my_node.as_ref().map(|n| n.node_num);
        let Some(event) = decode(event, my_node_num, &self.registry) else {
            return Ok(());
        };

        match event {
            BotEvent::ConnectionEstablished(my_node) => self.on_connected(bot, my_node).await,

            BotEvent::NodeUpdated(node) => {
                debug!("Updated node info for {}", node.id);
                self.registry.upsert(node.num, node);
                Ok(())
            }

            BotEvent::ChannelMessage(message) => self.on_channel_message(bot, message).await,

            BotEvent::DirectMessage(message) => self.on_direct_message(bot, message).await,

            BotEvent::Delivered { request_id, error } => {
                self.on_delivered(request_id, error).await;
                Ok(())
            }

            BotEvent::ConnectionLost => {
                warn!("Connection to device lost");
                self.state = RuntimeState::Disconnected;
                if let Some(connection) = &self.connection {
                    connection.mark_closed().await;
                }
                Ok(())
            }
        }
    }

    async fn on_connected(&mut self, bot: &mut dyn Bot, mut my_node: MyNodeInfo) -> Result<()> {
        if self.my_node.is_some() {
            warn!("Ignoring repeated connection-established event");
            return Ok(());
        }

        my_node.user = self
            .registry
            .lookup(my_node.node_num)
            .ok()
            .and_then(|node| node.user.clone());
        info!("Connected as {}", my_node.node_id);
        self.my_node = Some(my_node);

        let Some(my_node) = self.my_node.as_ref() else {
            return Ok(());
        };
        let ctx = BotContext::new(
            my_node,
            &self.registry,
            self.connection_ref(),
            self.config.default_channel,
        );
        bot.on_initialized(&ctx).await.map_err(BotError::Handler)
    }

    async fn on_channel_message(&self, bot: &mut dyn Bot, message: Message) -> Result<()> {
        let Some(my_node) = self.my_node.as_ref() else {
            return Ok(());
        };
        let index = message.channel.unwrap_or(self.config.default_channel);

        if self.config.echo_received {
            self.echo.line(format_args!(
                "Message from {} on channel {index}: {}",
                message.from.id, message.text
            ));
        }

        let ctx = BotContext::new(
            my_node,
            &self.registry,
            self.connection_ref(),
            self.config.default_channel,
        );
        let from_node = MeshtasticNode::new(message.from, self.connection_ref());
        let channel = MeshtasticChannel::new(index, self.connection_ref());

        bot.handle_message(&ctx, from_node, &message.text, channel)
            .await
            .map_err(BotError::Handler)
    }

    async fn on_direct_message(&self, bot: &mut dyn Bot, message: Message) -> Result<()> {
        let Some(my_node) = self.my_node.as_ref() else {
            return Ok(());
        };

        if self.config.echo_received {
            self.echo.line(format_args!(
                "Direct message from {}: {}",
                message.from.id, message.text
            ));
        }

        let ctx = BotContext::new(
            my_node,
            &self.registry,
            self.connection_ref(),
            self.config.default_channel,
        );
        let from_node = MeshtasticNode::new(message.from, self.connection_ref());

        bot.handle_direct_message(&ctx, from_node, &message.text)
            .await
            .map_err(BotError::Handler)
    }

    async fn on_delivered(&self, request_id: u32, error: Option<String>) {
        let Some(connection) = &self.connection else {
            return;
        };
        let Some(sent) = connection.take_pending(request_id).await else {
            return;
        };

        match error {
            None => {
                debug!("Packet {request_id} delivered to {}", sent.destination);
                if self.config.echo_sent && self.config.echo_received {
                    self.echo.line(format_args!(
                        "Delivered message to {}: {}",
                        sent.destination, sent.text
                    ));
                }
            }
            Some(reason) => {
                warn!(
                    "Delivery of packet {request_id} to {} failed: {reason}",
                    sent.destination
                );
            }
        }
    }

    #[cfg(test)]
    pub(crate) async fn pending_deliveries(&self) -> usize {
        match &self.connection {
            Some(connection) => connection.pending_count().await,
            None => 0,
        }
    }

    /// Closes the device link. Handles kept by the bot fail to send afterwards.
    pub async fn shutdown(&mut self) -> Result<()> {
        let closed = match self.connection.take() {
            Some(connection) => connection.close().await,
            None => Ok(()),
        };
        if self.state == RuntimeState::Running {
            self.state = RuntimeState::Disconnected;
        }
        closed
    }
}
