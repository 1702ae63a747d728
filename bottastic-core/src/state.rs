use crate::error::{BotError, Result};
use chrono::{DateTime, Utc};
use meshtastic::protobufs;
use std::collections::HashMap;

/// Formats a node number the way the Meshtastic apps display it.
pub fn node_id(num: u32) -> String {
    format!("!{num:08x}")
}

/// Last known attributes of a mesh node.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeInfo {
    pub id: String,
    pub num: u32,
    pub user: Option<User>,
    pub last_heard: Option<u64>,
    pub snr: Option<f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: String,
    pub long_name: String,
    pub short_name: String,
    pub hw_model: Option<String>,
}

/// Identity of the locally connected device.
#[derive(Debug, Clone, PartialEq)]
pub struct MyNodeInfo {
    pub node_num: u32,
    pub node_id: String,
    pub reboot_count: u32,
    pub min_app_version: u32,
    pub device_id: String,
    /// Resolved from the node database once the connection is established.
    pub user: Option<User>,
}

impl NodeInfo {
    /// A record carrying nothing but the node number.
    pub fn placeholder(num: u32) -> Self {
        Self {
            id: node_id(num),
            num,
            user: None,
            last_heard: None,
            snr: None,
        }
    }

    pub fn short_name(&self) -> Option<&str> {
        self.user
            .as_ref()
            .map(|u| u.short_name.as_str())
            .filter(|name| !name.is_empty())
    }

    pub fn long_name(&self) -> Option<&str> {
        self.user
            .as_ref()
            .map(|u| u.long_name.as_str())
            .filter(|name| !name.is_empty())
    }

    pub fn last_heard_at(&self) -> Option<DateTime<Utc>> {
        self.last_heard
            .filter(|secs| *secs > 0)
            .and_then(|secs| DateTime::from_timestamp(secs as i64, 0))
    }
}

impl From<protobufs::User> for User {
    fn from(user: protobufs::User) -> Self {
        Self {
            hw_model: Some(format!("{:?}", user.hw_model())),
            id: user.id,
            long_name: user.long_name,
            short_name: user.short_name,
        }
    }
}

impl From<protobufs::NodeInfo> for NodeInfo {
    fn from(node_info: protobufs::NodeInfo) -> Self {
        Self {
            id: node_id(node_info.num),
            num: node_info.num,
            user: node_info.user.map(User::from),
            last_heard: Some(node_info.last_heard as u64),
            snr: Some(node_info.snr),
        }
    }
}

impl From<protobufs::MyNodeInfo> for MyNodeInfo {
    fn from(my_info: protobufs::MyNodeInfo) -> Self {
        Self {
            node_num: my_info.my_node_num,
            node_id: node_id(my_info.my_node_num),
            reboot_count: my_info.reboot_count,
            min_app_version: my_info.min_app_version,
            device_id: hex::encode(my_info.device_id),
            user: None,
        }
    }
}

/// Best-effort cache of every node seen on the mesh. Entries are never evicted.
#[derive(Debug, Clone, Default)]
pub struct NodeRegistry {
    nodes: HashMap<u32, NodeInfo>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or overwrites the record for `node_num`; last write wins.
    pub fn upsert(&mut self, node_num: u32, node_info: NodeInfo) {
        self.nodes.insert(node_num, node_info);
    }

    pub fn lookup(&self, node_num: u32) -> Result<&NodeInfo> {
        self.nodes
            .get(&node_num)
            .ok_or(BotError::NodeNotFound(node_num))
    }

    /// Like [`lookup`](Self::lookup), but falls back to a placeholder record.
    pub fn resolve(&self, node_num: u32) -> NodeInfo {
        match self.lookup(node_num) {
            Ok(node) => node.clone(),
            Err(_) => NodeInfo::placeholder(node_num),
        }
    }

    pub fn get_node_by_id(&self, node_id: &str) -> Option<&NodeInfo> {
        self.nodes.values().find(|n| n.id == node_id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
