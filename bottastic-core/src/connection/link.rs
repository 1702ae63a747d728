use crate::echo::Echo;
use crate::error::{BotError, Result};
use crate::state::node_id;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::Mutex;
use tracing::debug;

/// Where an outbound text packet is addressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Destination {
    /// Direct message to a single node.
    Node(u32),
    /// Broadcast on a channel index.
    Channel(u32),
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::Node(num) => write!(f, "{}", node_id(*num)),
            Destination::Channel(index) => write!(f, "channel {index}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingText {
    pub packet_id: u32,
    pub text: String,
    pub destination: Destination,
    pub want_ack: bool,
}

/// Send surface of a connected mesh device.
#[async_trait]
pub trait MeshLink: Send + Sync {
    async fn send_text(&self, packet: &OutgoingText) -> Result<()>;

    async fn close(&self) -> Result<()>;
}

/// The live device link owned by the runtime.
pub struct Connection {
    link: Box<dyn MeshLink>,
    /// Set when every send should be echoed.
    echo: Option<Echo>,
    open: AtomicBool,
    pending: Mutex<HashMap<u32, OutgoingText>>,
}

impl Connection {
    pub fn new(link: Box<dyn MeshLink>, echo: Option<Echo>) -> Self {
        Self {
            link,
            echo,
            open: AtomicBool::new(true),
            pending: Mutex::new(HashMap::new()),
        }
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    /// Submits a text packet and returns its packet id.
    pub async fn send(&self, text: &str, destination: Destination, want_ack: bool) -> Result<u32> {
        if !self.is_open() {
            return Err(BotError::SendFailed("connection is closed".to_string()));
        }

        let packet = OutgoingText {
            packet_id: rand::random::<u32>().max(1),
            text: text.to_string(),
            destination,
            want_ack,
        };

        if want_ack {
            let mut pending = self.pending.lock().await;
            pending.insert(packet.packet_id, packet.clone());
        }

        if let Err(e) = self.link.send_text(&packet).await {
            self.pending.lock().await.remove(&packet.packet_id);
            return Err(e);
        }

        debug!("Sent packet {} to {destination}", packet.packet_id);
        if let Some(echo) = &self.echo {
            echo.line(format_args!("Sent to {destination}: {text}"));
        }

        Ok(packet.packet_id)
    }

    /// Removes and returns the outstanding send acknowledged by `request_id`.
    pub(crate) async fn take_pending(&self, request_id: u32) -> Option<OutgoingText> {
        self.pending.lock().await.remove(&request_id)
    }

    #[cfg(test)]
    pub(crate) async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }

    /// Refuses further sends and forgets acknowledgements that can no longer
    /// arrive.
    pub(crate) async fn mark_closed(&self) {
        self.open.store(false, Ordering::SeqCst);
        let mut pending = self.pending.lock().await;
        if !pending.is_empty() {
            debug!("Dropping {} unacknowledged sends", pending.len());
            pending.clear();
        }
    }

    /// Closes the underlying link. Links treat repeated closes as no-ops.
    pub(crate) async fn close(&self) -> Result<()> {
        self.mark_closed().await;
        self.link.close().await
    }
}

/// Non-owning handle to the runtime's [`Connection`].
///
/// Node and channel handles carry one of these so that they can reply without
/// keeping the device link alive. Once the runtime tears the connection down
/// every send through a stale handle fails with [`BotError::SendFailed`].
#[derive(Debug, Clone)]
pub struct ConnectionRef(Weak<Connection>);

impl ConnectionRef {
    pub fn new(connection: &Arc<Connection>) -> Self {
        Self(Arc::downgrade(connection))
    }

    /// A handle that was never attached to a connection.
    pub fn detached() -> Self {
        Self(Weak::new())
    }

    pub async fn send(&self, text: &str, destination: Destination, want_ack: bool) -> Result<u32> {
        let connection = self
            .0
            .upgrade()
            .ok_or_else(|| BotError::SendFailed("connection has been torn down".to_string()))?;
        connection.send(text, destination, want_ack).await
    }
}
