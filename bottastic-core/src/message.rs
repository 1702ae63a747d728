use crate::state::NodeInfo;
use meshtastic::protobufs;

/// A text message received from the mesh, alive for one dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub from: NodeInfo,
    pub text: String,
    /// Channel index for broadcasts, `None` for direct messages.
    pub channel: Option<u32>,
}

impl Message {
    pub fn is_direct(&self) -> bool {
        self.channel.is_none()
    }
}

/// Extracts the text of a packet sent on the text message port.
///
/// Encrypted payloads, other ports and bytes that are not valid UTF-8 all
/// yield `None`.
pub fn text_payload(mesh_packet: &protobufs::MeshPacket) -> Option<String> {
    let data = match mesh_packet.payload_variant.as_ref()? {
        protobufs::mesh_packet::PayloadVariant::Decoded(d) => d,
        _ => return None,
    };

    if data.portnum() != protobufs::PortNum::TextMessageApp {
        return None;
    }

    String::from_utf8(data.payload.clone()).ok()
}
