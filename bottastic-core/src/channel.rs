use crate::connection::{ConnectionRef, Destination};
use crate::error::Result;

/// A numbered broadcast channel. Two handles are equal when their indices are.
#[derive(Debug, Clone)]
pub struct MeshtasticChannel {
    index: u32,
    connection: ConnectionRef,
}

impl MeshtasticChannel {
    pub fn new(index: u32, connection: ConnectionRef) -> Self {
        Self { index, connection }
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub async fn send_message(&self, text: &str) -> Result<()> {
        self.connection
            .send(text, Destination::Channel(self.index), false)
            .await
            .map(|_| ())
    }

    pub async fn send_message_with_ack(&self, text: &str) -> Result<u32> {
        self.connection
            .send(text, Destination::Channel(self.index), true)
            .await
    }
}

impl PartialEq for MeshtasticChannel {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl Eq for MeshtasticChannel {}
