//! Wire types for the panel's JSON API.
//!
//! The panel wraps every object as `{"object": ..., "attributes": {...}}` and
//! every list as `{"object": "list", "data": [...]}`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    pub attributes: T,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListEnvelope<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<Envelope<T>>,
}

impl<T> ListEnvelope<T> {
    pub fn into_items(self) -> Vec<T> {
        self.data.into_iter().map(|e| e.attributes).collect()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Account {
    pub id: i64,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Limits {
    pub memory: u64,
    #[serde(default)]
    pub swap: i64,
    pub disk: u64,
    #[serde(default = "default_io")]
    pub io: u64,
    pub cpu: u64,
}

fn default_io() -> u64 {
    500
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureLimits {
    #[serde(default)]
    pub databases: u32,
    #[serde(default)]
    pub allocations: u32,
    #[serde(default)]
    pub backups: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct Deploy {
    pub locations: Vec<u32>,
    pub dedicated_ip: bool,
    pub port_range: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewServer {
    pub name: String,
    pub user: i64,
    pub egg: u32,
    pub nest: u32,
    pub docker_image: String,
    pub startup: String,
    pub limits: Limits,
    pub environment: serde_json::Map<String, serde_json::Value>,
    pub feature_limits: FeatureLimits,
    pub deploy: Deploy,
}

/// A server as seen through the application API.
#[derive(Debug, Clone, Deserialize)]
pub struct Server {
    pub id: i64,
    pub identifier: String,
    #[serde(default)]
    pub uuid: String,
    pub name: String,
    #[serde(default)]
    pub node: Option<i64>,
    #[serde(default)]
    pub suspended: bool,
    #[serde(default)]
    pub allocation: Option<i64>,
    #[serde(default)]
    pub limits: Limits,
    #[serde(default)]
    pub feature_limits: FeatureLimits,
}

#[derive(Debug, Clone, Serialize)]
pub struct BuildUpdate {
    pub allocation: i64,
    pub memory: u64,
    pub swap: i64,
    pub disk: u64,
    pub io: u64,
    pub cpu: u64,
    pub feature_limits: FeatureLimits,
}

impl BuildUpdate {
    pub fn from_server(server: &Server, limits: Limits) -> Option<Self> {
        Some(Self {
            allocation: server.allocation?,
            memory: limits.memory,
            swap: limits.swap,
            disk: limits.disk,
            io: limits.io,
            cpu: limits.cpu,
            feature_limits: server.feature_limits.clone(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerSignal {
    Start,
    Stop,
    Restart,
}

impl PowerSignal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Restart => "restart",
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResourceUsage {
    #[serde(default)]
    pub memory_bytes: u64,
    #[serde(default)]
    pub cpu_absolute: f64,
    #[serde(default)]
    pub disk_bytes: u64,
    #[serde(default)]
    pub network_rx_bytes: u64,
    #[serde(default)]
    pub network_tx_bytes: u64,
    #[serde(default)]
    pub uptime: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerResources {
    pub current_state: String,
    #[serde(default)]
    pub is_suspended: bool,
    #[serde(default)]
    pub resources: ResourceUsage,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Allocation {
    pub ip: String,
    #[serde(default)]
    pub ip_alias: Option<String>,
    pub port: u16,
    #[serde(default)]
    pub is_default: bool,
}

impl Allocation {
    pub fn address(&self) -> String {
        format!("{}:{}", self.ip_alias.as_deref().unwrap_or(&self.ip), self.port)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClientRelationships {
    #[serde(default)]
    pub allocations: Option<ListEnvelope<Allocation>>,
}

/// A server as seen through the client API.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientServer {
    pub identifier: String,
    pub name: String,
    #[serde(default)]
    pub node: String,
    #[serde(default)]
    pub limits: Limits,
    #[serde(default)]
    pub relationships: ClientRelationships,
}

impl ClientServer {
    /// The default allocation, or the first one when none is flagged.
    pub fn primary_allocation(&self) -> Option<&Allocation> {
        let allocations = self.relationships.allocations.as_ref()?;
        allocations
            .data
            .iter()
            .map(|e| &e.attributes)
            .find(|a| a.is_default)
            .or_else(|| allocations.data.first().map(|e| &e.attributes))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Backup {
    pub uuid: String,
    pub name: String,
    #[serde(default)]
    pub bytes: u64,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub completed_at: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignedUrl {
    pub url: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AllocatedResources {
    #[serde(default)]
    pub memory: u64,
    #[serde(default)]
    pub disk: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Node {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub fqdn: String,
    #[serde(default)]
    pub location_id: i64,
    #[serde(default)]
    pub maintenance_mode: bool,
    pub memory: u64,
    #[serde(default)]
    pub memory_overallocate: i64,
    pub disk: u64,
    #[serde(default)]
    pub disk_overallocate: i64,
    #[serde(default)]
    pub allocated_resources: Option<AllocatedResources>,
}
