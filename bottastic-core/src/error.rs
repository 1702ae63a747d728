use thiserror::Error;

/// Errors surfaced by the bot runtime and its send handles.
#[derive(Debug, Error)]
pub enum BotError {
    /// The device link could not be established or was lost.
    #[error("connection error: {0}")]
    Connection(String),

    /// Connecting to the device did not finish in time.
    #[error("connection timed out after {seconds}s")]
    Timeout { seconds: u64 },

    /// The node number has never been observed on the mesh.
    #[error("node !{0:08x} not found")]
    NodeNotFound(u32),

    /// The transport rejected an outbound packet.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// A bot handler returned an error.
    #[error("bot handler failed: {0:#}")]
    Handler(anyhow::Error),

    /// No bot is registered under the requested name.
    #[error("unknown bot '{name}' (available: {available})")]
    UnknownBot { name: String, available: String },
}

pub type Result<T> = std::result::Result<T, BotError>;
