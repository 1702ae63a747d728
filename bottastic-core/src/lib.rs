//! Event dispatch core for Meshtastic bots
//!
//! This crate owns the connection to a Meshtastic device, decodes the packets
//! it reports into channel and direct messages, and routes them to a [`Bot`]
//! implementation together with handles that can reply in the right context.

pub mod bot;
pub mod bots;
pub mod channel;
pub mod connection;
pub mod echo;
pub mod error;
pub mod event;
pub mod message;
pub mod node;
pub mod runtime;
pub mod state;

// Re-export commonly used types
pub use bot::{Bot, BotContext};
pub use channel::MeshtasticChannel;
pub use connection::ConnectionOptions;
pub use echo::Echo;
pub use error::{BotError, Result};
pub use node::MeshtasticNode;
pub use runtime::{BotConfig, BotRuntime, RuntimeState};

// Re-export meshtastic types for convenience
pub use meshtastic::protobufs;
