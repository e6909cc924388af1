//! Fixtures shared by controller tests.

use async_trait::async_trait;
use reqwest::StatusCode;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::config::Config;
use crate::databases::Databases;
use crate::events::EventManager;
use crate::modules::auth::AuthorizationGate;
use crate::modules::ownership::{NewServerRecord, UserId};
use crate::modules::panel::models::{
    Account, Allocation, Backup, BuildUpdate, ClientRelationships, ClientServer, Envelope,
    FeatureLimits, Limits, ListEnvelope, NewAccount, NewServer, Node, PowerSignal, ResourceUsage,
    Server, ServerResources,
};
use crate::modules::panel::{PanelApi, PanelError};
use crate::utils::Caller;
use crate::Data;

pub const ADMIN: UserId = 1;
pub const ALICE: UserId = 100;
pub const BOB: UserId = 200;
pub const CAROL: UserId = 300;

/// A panel that records every call and answers with canned data. Built with
/// [`FakePanel::failing`] it rejects every call with a 500.
#[derive(Debug, Default)]
pub struct FakePanel {
    calls: Mutex<Vec<String>>,
    fail: AtomicBool,
    pub log: String,
}

impl FakePanel {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        let panel = Self::default();
        panel.fail.store(true, Ordering::SeqCst);
        Arc::new(panel)
    }

    pub fn with_log(log: &str) -> Arc<Self> {
        Arc::new(Self {
            log: log.to_string(),
            ..Self::default()
        })
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn record(&self, operation: &'static str, detail: String) -> Result<(), PanelError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("{} {}", operation, detail).trim_end().to_string());
        if self.fail.load(Ordering::SeqCst) {
            return Err(PanelError::Status {
                operation,
                status: StatusCode::INTERNAL_SERVER_ERROR,
                body: String::new(),
            });
        }
        Ok(())
    }
}

pub fn server(id: i64, identifier: &str, name: &str) -> Server {
    Server {
        id,
        identifier: identifier.to_string(),
        uuid: format!("{}-uuid", identifier),
        name: name.to_string(),
        node: Some(1),
        suspended: false,
        allocation: Some(3),
        limits: Limits {
            memory: 1024,
            swap: 0,
            disk: 4096,
            io: 500,
            cpu: 100,
        },
        feature_limits: FeatureLimits {
            databases: 0,
            allocations: 1,
            backups: 2,
        },
    }
}

fn node(id: i64) -> Node {
    Node {
        id,
        name: format!("node-{}", id),
        fqdn: format!("node{}.example.com", id),
        location_id: 1,
        maintenance_mode: false,
        memory: 16384,
        memory_overallocate: 0,
        disk: 100_000,
        disk_overallocate: 0,
        allocated_resources: None,
    }
}

fn backup(uuid: &str, name: &str, completed: bool) -> Backup {
    Backup {
        uuid: uuid.to_string(),
        name: name.to_string(),
        bytes: 5 * 1024 * 1024,
        created_at: Some("2024-05-01T10:00:00+00:00".to_string()),
        completed_at: completed.then(|| "2024-05-01T10:01:00+00:00".to_string()),
    }
}

#[async_trait]
impl PanelApi for FakePanel {
    async fn create_account(&self, account: &NewAccount) -> Result<Account, PanelError> {
        self.record("create_account", account.username.clone())?;
        Ok(Account {
            id: 42,
            username: account.username.clone(),
            email: account.email.clone(),
        })
    }

    async fn create_server(&self, new: &NewServer) -> Result<Server, PanelError> {
        self.record("create_server", format!("{} user={}", new.name, new.user))?;
        Ok(server(7, "abcd1234", &new.name))
    }

    async fn get_server_details(&self, panel_id: &str) -> Result<Server, PanelError> {
        self.record("get_server_details", panel_id.to_string())?;
        Ok(server(7, "abcd1234", "Survival"))
    }

    async fn delete_server(&self, panel_id: &str) -> Result<(), PanelError> {
        self.record("delete_server", panel_id.to_string())
    }

    async fn suspend_server(&self, panel_id: &str) -> Result<(), PanelError> {
        self.record("suspend_server", panel_id.to_string())
    }

    async fn unsuspend_server(&self, panel_id: &str) -> Result<(), PanelError> {
        self.record("unsuspend_server", panel_id.to_string())
    }

    async fn wipe_server(&self, panel_id: &str) -> Result<(), PanelError> {
        self.record("wipe_server", panel_id.to_string())
    }

    async fn update_build(&self, panel_id: &str, build: &BuildUpdate) -> Result<Server, PanelError> {
        self.record(
            "update_build",
            format!("{} memory={} disk={} cpu={}", panel_id, build.memory, build.disk, build.cpu),
        )?;
        Ok(server(7, "abcd1234", "Survival"))
    }

    async fn list_nodes(&self) -> Result<Vec<Node>, PanelError> {
        self.record("list_nodes", String::new())?;
        Ok(vec![node(1), node(2)])
    }

    async fn get_node(&self, node_id: u32) -> Result<Node, PanelError> {
        self.record("get_node", node_id.to_string())?;
        let mut node = node(i64::from(node_id));
        node.allocated_resources = Some(crate::modules::panel::models::AllocatedResources {
            memory: 8192,
            disk: 25_000,
        });
        Ok(node)
    }

    async fn list_node_servers(&self, node_id: u32) -> Result<Vec<Server>, PanelError> {
        self.record("list_node_servers", node_id.to_string())?;
        Ok(vec![server(7, "abcd1234", "Survival"), server(8, "efgh5678", "Creative")])
    }

    async fn power(&self, server_id: &str, signal: PowerSignal) -> Result<(), PanelError> {
        self.record("power", format!("{} {}", server_id, signal.as_str()))
    }

    async fn send_command(&self, server_id: &str, command: &str) -> Result<(), PanelError> {
        self.record("send_command", format!("{} {}", server_id, command))
    }

    async fn resources(&self, server_id: &str) -> Result<ServerResources, PanelError> {
        self.record("resources", server_id.to_string())?;
        Ok(ServerResources {
            current_state: "running".to_string(),
            is_suspended: false,
            resources: ResourceUsage {
                memory_bytes: 512 * 1024 * 1024,
                cpu_absolute: 12.5,
                disk_bytes: 2 * 1024 * 1024 * 1024,
                network_rx_bytes: 1024,
                network_tx_bytes: 2048,
                uptime: 2 * 3_600_000,
            },
        })
    }

    async fn server_info(&self, server_id: &str) -> Result<ClientServer, PanelError> {
        self.record("server_info", server_id.to_string())?;
        Ok(ClientServer {
            identifier: server_id.to_string(),
            name: "Survival".to_string(),
            node: "node-1".to_string(),
            limits: Limits::default(),
            relationships: ClientRelationships {
                allocations: Some(ListEnvelope {
                    data: vec![Envelope {
                        attributes: Allocation {
                            ip: "10.0.0.5".to_string(),
                            ip_alias: None,
                            port: 25565,
                            is_default: true,
                        },
                    }],
                }),
            },
        })
    }

    async fn rename_server(&self, server_id: &str, name: &str) -> Result<(), PanelError> {
        self.record("rename_server", format!("{} {}", server_id, name))
    }

    async fn reinstall_server(&self, server_id: &str) -> Result<(), PanelError> {
        self.record("reinstall_server", server_id.to_string())
    }

    async fn read_log(&self, server_id: &str) -> Result<String, PanelError> {
        self.record("read_log", server_id.to_string())?;
        Ok(self.log.clone())
    }

    async fn list_backups(&self, server_id: &str) -> Result<Vec<Backup>, PanelError> {
        self.record("list_backups", server_id.to_string())?;
        Ok(vec![
            backup("b-1", "nightly", true),
            backup("b-2", "manual", false),
        ])
    }

    async fn create_backup(&self, server_id: &str) -> Result<Backup, PanelError> {
        self.record("create_backup", server_id.to_string())?;
        Ok(backup("b-3", "Backup at 2024-05-02", false))
    }

    async fn backup_download_url(&self, server_id: &str, backup_id: &str) -> Result<String, PanelError> {
        self.record("backup_download_url", format!("{} {}", server_id, backup_id))?;
        Ok(format!("https://files.example.com/{}/{}", server_id, backup_id))
    }
}

pub fn config(admins: &[UserId]) -> Config {
    let admin_ids = admins
        .iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(",");
    Config::from_lookup(|key| match key {
        "DISCORD_TOKEN" => Some("token".to_string()),
        "PANEL_URL" => Some("https://panel.example.com".to_string()),
        "PANEL_APPLICATION_KEY" => Some("ptla_test".to_string()),
        "ADMIN_IDS" => Some(admin_ids.clone()),
        "ALLOWED_DOMAINS" => Some("example.com".to_string()),
        _ => None,
    })
    .unwrap()
}

pub fn data(panel: Arc<FakePanel>) -> Data {
    let config = config(&[ADMIN]);
    Data {
        dbs: Arc::new(Databases::in_memory().unwrap()),
        panel,
        gate: Arc::new(AuthorizationGate::new(HashSet::from([ADMIN]))),
        config: Arc::new(config),
        event_manager: Arc::new(EventManager::new()),
    }
}

pub fn caller(id: UserId) -> Caller {
    let name = match id {
        ADMIN => "root",
        ALICE => "Alice",
        BOB => "Bob",
        _ => "Carol",
    };
    Caller::new(id, name)
}

/// Alice and Bob registered; Alice owns `srv-1` and has shared it with Bob.
pub async fn seeded(panel: Arc<FakePanel>) -> Data {
    let data = data(panel);
    let store = &data.dbs.ownership;
    store.register_user(ALICE, 42, "alice@example.com").await.unwrap();
    store.register_user(BOB, 43, "bob@example.com").await.unwrap();
    store
        .record_server(NewServerRecord {
            panel_id: Some(7),
            name: Some("Survival".to_string()),
            ..NewServerRecord::new("srv-1", ALICE)
        })
        .await
        .unwrap();
    store.grant_access("srv-1", BOB).await.unwrap();
    data
}
