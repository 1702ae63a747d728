use async_trait::async_trait;
use meshtastic::api::state::Configured;
use meshtastic::api::{ConnectedStreamApi, StreamApi};
use meshtastic::packet::PacketReceiver;
use meshtastic::protobufs;
use meshtastic::utils;
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::link::{Destination, MeshLink, OutgoingText};
use crate::error::{BotError, Result};
use crate::event::RawEvent;
use crate::state::MyNodeInfo;

/// Destination number Meshtastic uses for channel broadcasts.
pub const BROADCAST_NUM: u32 = 0xFFFF_FFFF;

/// Port the Meshtastic firmware listens on for TCP clients.
pub const DEFAULT_TCP_PORT: u16 = 4403;

const DEFAULT_HOP_LIMIT: u32 = 3;

/// How to reach the device.
#[derive(Debug, Clone)]
pub struct ConnectionOptions {
    /// Hostname or `host:port` of a network-attached device.
    pub host: Option<String>,
    /// Serial device path.
    pub port: Option<String>,
    /// Bluetooth device name or MAC address.
    pub ble: Option<String>,
    pub timeout: Duration,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            host: None,
            port: None,
            ble: None,
            timeout: Duration::from_secs(30),
        }
    }
}

fn connection_error<E: std::fmt::Display>(context: &'static str) -> impl FnOnce(E) -> BotError {
    move |e| BotError::Connection(format!("{context}: {e}"))
}

fn tcp_address(host: &str) -> String {
    if host.contains(':') {
        host.to_string()
    } else {
        format!("{host}:{DEFAULT_TCP_PORT}")
    }
}

/// Runs a connection attempt, failing with [`BotError::Timeout`] once `limit`
/// has elapsed.
pub(crate) async fn within<T>(
    limit: Duration,
    attempt: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::time::timeout(limit, attempt)
        .await
        .map_err(|_| BotError::Timeout {
            seconds: limit.as_secs(),
        })?
}

/// [`MeshLink`] backed by a configured `meshtastic` stream API.
pub struct MeshtasticLink {
    api: Mutex<Option<ConnectedStreamApi<Configured>>>,
    event_pump: JoinHandle<()>,
}

impl MeshtasticLink {
    /// Connects to the device and starts translating its packet stream into
    /// [`RawEvent`]s. Fails with [`BotError::Timeout`] if the device does not
    /// finish configuring within `options.timeout`.
    pub async fn connect(
        options: &ConnectionOptions,
    ) -> Result<(Self, mpsc::UnboundedReceiver<RawEvent>)> {
        within(options.timeout, Self::establish(options)).await
    }

    async fn establish(
        options: &ConnectionOptions,
    ) -> Result<(Self, mpsc::UnboundedReceiver<RawEvent>)> {
        info!("Establishing connection to Meshtastic device...");

        let stream_api = StreamApi::new();

        let (packet_receiver, connected_api) = if let Some(_ble_addr) = &options.ble {
            #[cfg(feature = "bluetooth")]
            {
                info!("Connecting via Bluetooth to {addr}", addr = _ble_addr);
                let ble_id = utils::stream::BleId::from_mac_address(_ble_addr)
                    .unwrap_or_else(|_| utils::stream::BleId::from_name(_ble_addr));
                let stream = utils::stream::build_ble_stream(&ble_id, Duration::from_secs(10))
                    .await
                    .map_err(connection_error("Failed to connect via Bluetooth"))?;
                stream_api.connect(stream).await
            }
            #[cfg(not(feature = "bluetooth"))]
            {
                return Err(BotError::Connection(
                    "Bluetooth support not compiled. Build with --features bluetooth".to_string(),
                ));
            }
        } else if let Some(host) = &options.host {
            let address = tcp_address(host);
            info!("Connecting via TCP to {address}");
            let stream = utils::stream::build_tcp_stream(address)
                .await
                .map_err(connection_error("Failed to connect via TCP"))?;
            stream_api.connect(stream).await
        } else if let Some(port) = &options.port {
            info!("Connecting via serial port {port}");
            let stream = utils::stream::build_serial_stream(port.clone(), None, None, None)
                .map_err(connection_error("Failed to connect via serial"))?;
            stream_api.connect(stream).await
        } else {
            info!("Auto-detecting serial port...");
            let ports = utils::stream::available_serial_ports()
                .map_err(connection_error("Failed to list serial ports"))?;

            let Some(port_name) = ports.first().cloned() else {
                return Err(BotError::Connection(
                    "No serial ports found. Please specify --host or --port".to_string(),
                ));
            };
            info!("Using auto-detected port: {port_name}");

            let stream = utils::stream::build_serial_stream(port_name, None, None, None)
                .map_err(connection_error("Failed to connect to auto-detected serial port"))?;
            stream_api.connect(stream).await
        };

        info!("Configuring connection...");
        let config_id = utils::generate_rand_id();
        let configured_api = connected_api
            .configure(config_id)
            .await
            .map_err(connection_error("Failed to configure connection"))?;

        let (events, event_pump) = spawn_event_pump(packet_receiver);

        info!("Connection established and configured successfully");
        Ok((
            Self {
                api: Mutex::new(Some(configured_api)),
                event_pump,
            },
            events,
        ))
    }
}

#[async_trait]
impl MeshLink for MeshtasticLink {
    async fn send_text(&self, packet: &OutgoingText) -> Result<()> {
        let mut guard = self.api.lock().await;
        let api = guard
            .as_mut()
            .ok_or_else(|| BotError::SendFailed("not connected".to_string()))?;

        let (to, channel) = match packet.destination {
            Destination::Node(num) => (num, 0),
            Destination::Channel(index) => (BROADCAST_NUM, index),
        };

        let priority = if packet.want_ack {
            protobufs::mesh_packet::Priority::Reliable
        } else {
            protobufs::mesh_packet::Priority::Default
        };

        let mesh_packet = protobufs::MeshPacket {
            payload_variant: Some(protobufs::mesh_packet::PayloadVariant::Decoded(
                protobufs::Data {
                    portnum: protobufs::PortNum::TextMessageApp as i32,
                    payload: packet.text.as_bytes().to_vec(),
                    ..Default::default()
                },
            )),
            to,
            channel,
            id: packet.packet_id,
            hop_limit: DEFAULT_HOP_LIMIT,
            hop_start: DEFAULT_HOP_LIMIT,
            want_ack: packet.want_ack,
            priority: priority as i32,
            ..Default::default()
        };

        api.send_to_radio_packet(Some(protobufs::to_radio::PayloadVariant::Packet(
            mesh_packet,
        )))
        .await
        .map_err(|e| BotError::SendFailed(e.to_string()))
    }

    async fn close(&self) -> Result<()> {
        self.event_pump.abort();

        let api = self.api.lock().await.take();
        if let Some(api) = api {
            api.disconnect()
                .await
                .map_err(connection_error("Failed to disconnect"))?;
            info!("Disconnected from device");
        }

        Ok(())
    }
}

fn spawn_event_pump(
    mut receiver: PacketReceiver,
) -> (mpsc::UnboundedReceiver<RawEvent>, JoinHandle<()>) {
    let (tx, rx) = mpsc::unbounded_channel();

    let handle = tokio::spawn(async move {
        info!("Starting packet processing loop");

        let mut translator = FromRadioTranslator::default();
        while let Some(packet) = receiver.recv().await {
            if let Some(event) = translator.translate(packet)
                && tx.send(event).is_err()
            {
                debug!("Event consumer dropped, stopping packet processing");
                return;
            }
        }

        info!("Packet processing loop ended");
        let _ = tx.send(RawEvent::Disconnected);
    });

    (rx, handle)
}

/// Turns the device's `FromRadio` stream into [`RawEvent`]s.
///
/// `MyInfo` is only remembered; the connection counts as established once the
/// device reports the end of its configuration dump.
#[derive(Debug, Default)]
pub struct FromRadioTranslator {
    my_info: Option<MyNodeInfo>,
    connected: bool,
}

impl FromRadioTranslator {
    pub fn translate(&mut self, from_radio: protobufs::FromRadio) -> Option<RawEvent> {
        match from_radio.payload_variant? {
            protobufs::from_radio::PayloadVariant::MyInfo(my_info) => {
                debug!("Local node is {:08x}", my_info.my_node_num);
                self.my_info = Some(my_info.into());
                None
            }

            protobufs::from_radio::PayloadVariant::NodeInfo(node_info) => {
                Some(RawEvent::NodeInfo(node_info.into()))
            }

            protobufs::from_radio::PayloadVariant::ConfigCompleteId(config_id) => {
                if self.connected {
                    return None;
                }
                let Some(my_info) = self.my_info.clone() else {
                    debug!("Config {config_id} complete before MyInfo, waiting");
                    return None;
                };
                self.connected = true;
                Some(RawEvent::Connected(my_info))
            }

            protobufs::from_radio::PayloadVariant::Packet(mesh_packet) => {
                Some(RawEvent::Packet(mesh_packet))
            }

            _ => None,
        }
    }
}
