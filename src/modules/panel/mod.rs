pub mod client;
pub mod models;

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde_json::json;
use std::fmt::Debug;

use crate::config::Config;
pub use client::{path_segment, PanelClient, PanelError};
use models::{
    Account, Backup, BuildUpdate, ClientServer, Envelope, ListEnvelope, NewAccount, NewServer,
    Node, PowerSignal, Server, ServerResources, SignedUrl,
};

const LOG_FILE: &str = "/logs/latest.log";

/// Everything the bot asks of the hosting panel, one request per call.
///
/// `application` operations take the panel's numeric server id (or whatever
/// identifier the admin supplied); `client` operations take the short server
/// identifier.
#[async_trait]
pub trait PanelApi: Send + Sync + Debug {
    async fn create_account(&self, account: &NewAccount) -> Result<Account, PanelError>;
    async fn create_server(&self, server: &NewServer) -> Result<Server, PanelError>;
    async fn get_server_details(&self, panel_id: &str) -> Result<Server, PanelError>;
    async fn delete_server(&self, panel_id: &str) -> Result<(), PanelError>;
    async fn suspend_server(&self, panel_id: &str) -> Result<(), PanelError>;
    async fn unsuspend_server(&self, panel_id: &str) -> Result<(), PanelError>;
    async fn wipe_server(&self, panel_id: &str) -> Result<(), PanelError>;
    async fn update_build(&self, panel_id: &str, build: &BuildUpdate) -> Result<Server, PanelError>;
    async fn list_nodes(&self) -> Result<Vec<Node>, PanelError>;
    async fn get_node(&self, node_id: u32) -> Result<Node, PanelError>;
    async fn list_node_servers(&self, node_id: u32) -> Result<Vec<Server>, PanelError>;

    async fn power(&self, server_id: &str, signal: PowerSignal) -> Result<(), PanelError>;
    async fn send_command(&self, server_id: &str, command: &str) -> Result<(), PanelError>;
    async fn resources(&self, server_id: &str) -> Result<ServerResources, PanelError>;
    async fn server_info(&self, server_id: &str) -> Result<ClientServer, PanelError>;
    async fn rename_server(&self, server_id: &str, name: &str) -> Result<(), PanelError>;
    async fn reinstall_server(&self, server_id: &str) -> Result<(), PanelError>;
    async fn read_log(&self, server_id: &str) -> Result<String, PanelError>;
    async fn list_backups(&self, server_id: &str) -> Result<Vec<Backup>, PanelError>;
    async fn create_backup(&self, server_id: &str) -> Result<Backup, PanelError>;
    async fn backup_download_url(&self, server_id: &str, backup_id: &str) -> Result<String, PanelError>;
}

/// The panel, reached through an application-scope session for admin work
/// and a client-scope session for self-service work.
#[derive(Clone, Debug)]
pub struct Panel {
    application: PanelClient,
    client: PanelClient,
}

impl Panel {
    pub fn new(application: PanelClient, client: PanelClient) -> Self {
        Self { application, client }
    }

    pub fn from_config(config: &Config) -> Result<Self, PanelError> {
        Ok(Self::new(
            PanelClient::new(&config.panel_url, &config.application_key, config.panel_timeout)?,
            PanelClient::new(&config.panel_url, &config.client_key, config.panel_timeout)?,
        ))
    }

    async fn application_action(
        &self,
        operation: &'static str,
        panel_id: &str,
        action: &str,
    ) -> Result<(), PanelError> {
        let path = format!(
            "/api/application/servers/{}/{}",
            path_segment(panel_id)?,
            action
        );
        self.application
            .empty(
                operation,
                self.application.request(Method::POST, &path),
                &[StatusCode::NO_CONTENT],
            )
            .await
    }

    fn client_path(server_id: &str, rest: &str) -> Result<String, PanelError> {
        Ok(format!("/api/client/servers/{}{}", path_segment(server_id)?, rest))
    }
}

#[async_trait]
impl PanelApi for Panel {
    async fn create_account(&self, account: &NewAccount) -> Result<Account, PanelError> {
        let request = self
            .application
            .request(Method::POST, "/api/application/users")
            .json(account);
        let created: Envelope<Account> = self
            .application
            .json("create account", request, &[StatusCode::CREATED])
            .await?;
        Ok(created.attributes)
    }

    async fn create_server(&self, server: &NewServer) -> Result<Server, PanelError> {
        let request = self
            .application
            .request(Method::POST, "/api/application/servers")
            .json(server);
        let created: Envelope<Server> = self
            .application
            .json("create server", request, &[StatusCode::CREATED])
            .await?;
        Ok(created.attributes)
    }

    async fn get_server_details(&self, panel_id: &str) -> Result<Server, PanelError> {
        let path = format!("/api/application/servers/{}", path_segment(panel_id)?);
        let server: Envelope<Server> = self
            .application
            .json(
                "get server",
                self.application.request(Method::GET, &path),
                &[StatusCode::OK],
            )
            .await?;
        Ok(server.attributes)
    }

    async fn delete_server(&self, panel_id: &str) -> Result<(), PanelError> {
        let path = format!("/api/application/servers/{}/force", path_segment(panel_id)?);
        self.application
            .empty(
                "delete server",
                self.application.request(Method::DELETE, &path),
                &[StatusCode::NO_CONTENT],
            )
            .await
    }

    async fn suspend_server(&self, panel_id: &str) -> Result<(), PanelError> {
        self.application_action("suspend server", panel_id, "suspend")
            .await
    }

    async fn unsuspend_server(&self, panel_id: &str) -> Result<(), PanelError> {
        self.application_action("unsuspend server", panel_id, "unsuspend")
            .await
    }

    async fn wipe_server(&self, panel_id: &str) -> Result<(), PanelError> {
        self.application_action("wipe server", panel_id, "reinstall")
            .await
    }

    async fn update_build(&self, panel_id: &str, build: &BuildUpdate) -> Result<Server, PanelError> {
        let path = format!("/api/application/servers/{}/build", path_segment(panel_id)?);
        let request = self.application.request(Method::PATCH, &path).json(build);
        let server: Envelope<Server> = self
            .application
            .json("update build", request, &[StatusCode::OK])
            .await?;
        Ok(server.attributes)
    }

    async fn list_nodes(&self) -> Result<Vec<Node>, PanelError> {
        let nodes: ListEnvelope<Node> = self
            .application
            .json(
                "list nodes",
                self.application.request(Method::GET, "/api/application/nodes"),
                &[StatusCode::OK],
            )
            .await?;
        Ok(nodes.into_items())
    }

    async fn get_node(&self, node_id: u32) -> Result<Node, PanelError> {
        let path = format!("/api/application/nodes/{}", node_id);
        let node: Envelope<Node> = self
            .application
            .json(
                "get node",
                self.application.request(Method::GET, &path),
                &[StatusCode::OK],
            )
            .await?;
        Ok(node.attributes)
    }

    async fn list_node_servers(&self, node_id: u32) -> Result<Vec<Server>, PanelError> {
        let path = format!("/api/application/nodes/{}/servers", node_id);
        let servers: ListEnvelope<Server> = self
            .application
            .json(
                "list node servers",
                self.application.request(Method::GET, &path),
                &[StatusCode::OK],
            )
            .await?;
        Ok(servers.into_items())
    }

    async fn power(&self, server_id: &str, signal: PowerSignal) -> Result<(), PanelError> {
        let request = self
            .client
            .request(Method::POST, &Self::client_path(server_id, "/power")?)
            .json(&json!({ "signal": signal }));
        self.client
            .empty("power", request, &[StatusCode::NO_CONTENT])
            .await
    }

    async fn send_command(&self, server_id: &str, command: &str) -> Result<(), PanelError> {
        let request = self
            .client
            .request(Method::POST, &Self::client_path(server_id, "/command")?)
            .json(&json!({ "command": command }));
        self.client
            .empty("send command", request, &[StatusCode::NO_CONTENT])
            .await
    }

    async fn resources(&self, server_id: &str) -> Result<ServerResources, PanelError> {
        let request = self
            .client
            .request(Method::GET, &Self::client_path(server_id, "/resources")?);
        let resources: Envelope<ServerResources> = self
            .client
            .json("resources", request, &[StatusCode::OK])
            .await?;
        Ok(resources.attributes)
    }

    async fn server_info(&self, server_id: &str) -> Result<ClientServer, PanelError> {
        let request = self
            .client
            .request(Method::GET, &Self::client_path(server_id, "")?)
            .query(&[("include", "allocations")]);
        let server: Envelope<ClientServer> = self
            .client
            .json("server info", request, &[StatusCode::OK])
            .await?;
        Ok(server.attributes)
    }

    async fn rename_server(&self, server_id: &str, name: &str) -> Result<(), PanelError> {
        let request = self
            .client
            .request(Method::POST, &Self::client_path(server_id, "/settings/rename")?)
            .json(&json!({ "name": name }));
        self.client
            .empty("rename server", request, &[StatusCode::NO_CONTENT])
            .await
    }

    async fn reinstall_server(&self, server_id: &str) -> Result<(), PanelError> {
        let request = self
            .client
            .request(Method::POST, &Self::client_path(server_id, "/settings/reinstall")?);
        self.client
            .empty("reinstall server", request, &[StatusCode::ACCEPTED])
            .await
    }

    async fn read_log(&self, server_id: &str) -> Result<String, PanelError> {
        let request = self
            .client
            .request(Method::GET, &Self::client_path(server_id, "/files/contents")?)
            .query(&[("file", LOG_FILE)]);
        self.client
            .text("read log", request, &[StatusCode::OK])
            .await
    }

    async fn list_backups(&self, server_id: &str) -> Result<Vec<Backup>, PanelError> {
        let request = self
            .client
            .request(Method::GET, &Self::client_path(server_id, "/backups")?);
        let backups: ListEnvelope<Backup> = self
            .client
            .json("list backups", request, &[StatusCode::OK])
            .await?;
        Ok(backups.into_items())
    }

    async fn create_backup(&self, server_id: &str) -> Result<Backup, PanelError> {
        let request = self
            .client
            .request(Method::POST, &Self::client_path(server_id, "/backups")?)
            .json(&json!({}));
        let backup: Envelope<Backup> = self
            .client
            .json("create backup", request, &[StatusCode::OK, StatusCode::CREATED])
            .await?;
        Ok(backup.attributes)
    }

    async fn backup_download_url(&self, server_id: &str, backup_id: &str) -> Result<String, PanelError> {
        let rest = format!("/backups/{}/download", path_segment(backup_id)?);
        let request = self
            .client
            .request(Method::GET, &Self::client_path(server_id, &rest)?);
        let signed: Envelope<SignedUrl> = self
            .client
            .json("download backup", request, &[StatusCode::OK])
            .await?;
        Ok(signed.attributes.url)
    }
}
