//! Translation of raw transport events into the events the runtime dispatches.

use meshtastic::Message as ProstMessage;
use meshtastic::protobufs;
use tracing::debug;

use crate::message::{Message, text_payload};
use crate::state::{MyNodeInfo, NodeInfo, NodeRegistry};

/// An event as delivered by the transport layer.
#[derive(Debug, Clone)]
pub enum RawEvent {
    Connected(MyNodeInfo),
    Packet(protobufs::MeshPacket),
    NodeInfo(NodeInfo),
    Disconnected,
}

/// A decoded event, ready to be routed to the bot.
#[derive(Debug, Clone, PartialEq)]
pub enum BotEvent {
    ConnectionEstablished(MyNodeInfo),
    ChannelMessage(Message),
    DirectMessage(Message),
    NodeUpdated(NodeInfo),
    /// Routing report for a packet we sent with an acknowledgement request.
    Delivered {
        request_id: u32,
        error: Option<String>,
    },
    ConnectionLost,
}

/// Classifies a raw event.
///
/// Text packets addressed to `my_node_num` become direct messages; every other
/// text packet is a broadcast on its channel. Senders are resolved through the
/// registry, falling back to a placeholder for nodes not seen yet. Returns
/// `None` for anything that should not reach the bot.
pub fn decode(
    event: RawEvent,
    my_node_num: Option<u32>,
    registry: &NodeRegistry,
) -> Option<BotEvent> {
    match event {
        RawEvent::Connected(my_node) => Some(BotEvent::ConnectionEstablished(my_node)),
        RawEvent::NodeInfo(node) => Some(BotEvent::NodeUpdated(node)),
        RawEvent::Disconnected => Some(BotEvent::ConnectionLost),
        RawEvent::Packet(mesh_packet) => decode_packet(&mesh_packet, my_node_num, registry),
    }
}

fn decode_packet(
    mesh_packet: &protobufs::MeshPacket,
    my_node_num: Option<u32>,
    registry: &NodeRegistry,
) -> Option<BotEvent> {
    if let Some(event) = decode_routing(mesh_packet) {
        return Some(event);
    }

    let Some(my_node_num) = my_node_num else {
        debug!(
            "Dropping packet from {:08x} received before connection setup",
            mesh_packet.from
        );
        return None;
    };

    let Some(text) = text_payload(mesh_packet) else {
        debug!("Ignoring non-text packet from {:08x}", mesh_packet.from);
        return None;
    };

    let from = registry.resolve(mesh_packet.from);

    if mesh_packet.to == my_node_num {
        debug!("Direct message from {:08x}", mesh_packet.from);
        Some(BotEvent::DirectMessage(Message {
            from,
            text,
            channel: None,
        }))
    } else {
        debug!(
            "Channel {} message from {:08x}",
            mesh_packet.channel, mesh_packet.from
        );
        Some(BotEvent::ChannelMessage(Message {
            from,
            text,
            channel: Some(mesh_packet.channel),
        }))
    }
}

fn decode_routing(mesh_packet: &protobufs::MeshPacket) -> Option<BotEvent> {
    let data = match mesh_packet.payload_variant.as_ref()? {
        protobufs::mesh_packet::PayloadVariant::Decoded(d) => d,
        _ => return None,
    };

    if data.portnum() != protobufs::PortNum::RoutingApp || data.request_id == 0 {
        return None;
    }

    let routing = protobufs::Routing::decode(data.payload.as_slice()).ok()?;
    let error = match routing.variant {
        Some(protobufs::routing::Variant::ErrorReason(0)) => None,
        Some(protobufs::routing::Variant::ErrorReason(reason)) => {
            Some(format!("routing error {reason}"))
        }
        _ => return None,
    };

    Some(BotEvent::Delivered {
        request_id: data.request_id,
        error,
    })
}
