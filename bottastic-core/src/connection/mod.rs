pub mod link;
pub mod manager;

pub use link::{Connection, ConnectionRef, Destination, MeshLink, OutgoingText};
pub use manager::{ConnectionOptions, FromRadioTranslator, MeshtasticLink};
