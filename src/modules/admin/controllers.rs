use serde_json::{json, Map, Value};
use tracing::{error, info, warn};

use crate::error::{CommandError, RemoteContext};
use crate::modules::auth::Permission;
use crate::modules::ownership::{NewServerRecord, ServerRecord, StoreError, UserId};
use crate::modules::panel::models::{BuildUpdate, Deploy, FeatureLimits, Limits, NewServer};
use crate::utils::{code_list, Caller};
use crate::Data;

async fn require_admin(data: &Data, caller: &Caller) -> Result<(), CommandError> {
    data.gate
        .authorize(&data.dbs.ownership, caller.id, Permission::Admin)
        .await?;
    Ok(())
}

/// The local record an admin's argument refers to, matched first on the
/// server identifier and then on the numeric panel id.
async fn find_record(data: &Data, server: &str) -> Result<Option<ServerRecord>, CommandError> {
    let store = &data.dbs.ownership;
    if let Some(record) = store.get_server(server).await? {
        return Ok(Some(record));
    }
    match server.parse::<i64>() {
        Ok(panel_id) => Ok(store.find_by_panel_id(panel_id).await?),
        Err(_) => Ok(None),
    }
}

/// The id the application API knows a server by: the recorded numeric panel
/// id when there is one, otherwise whatever the admin typed.
async fn resolve_target(data: &Data, server: &str) -> Result<String, CommandError> {
    let server = server.trim();
    Ok(find_record(data, server)
        .await?
        .and_then(|record| record.panel_id)
        .map(|id| id.to_string())
        .unwrap_or_else(|| server.to_string()))
}

fn server_environment() -> Map<String, Value> {
    let mut env = Map::new();
    env.insert("SERVER_JARFILE".into(), json!("server.jar"));
    env.insert("VERSION".into(), json!("latest"));
    env.insert("TYPE".into(), json!("vanilla"));
    env
}

pub async fn create_server(
    data: &Data,
    caller: &Caller,
    target: UserId,
    name: &str,
    ram: u64,
    disk: u64,
    cpu: Option<u64>,
) -> Result<String, CommandError> {
    require_admin(data, caller).await?;

    let name = name.trim();
    if name.is_empty() {
        return Err(CommandError::invalid("The server needs a name."));
    }
    if ram == 0 || disk == 0 {
        return Err(CommandError::invalid("RAM and disk must be greater than zero."));
    }

    let user = data
        .dbs
        .ownership
        .get_user(target)
        .await?
        .ok_or_else(|| CommandError::not_found("That user has not created a panel account yet."))?;
    if user.banned {
        return Err(CommandError::invalid("That user is banned."));
    }

    let defaults = &data.config.server_defaults;
    let request = NewServer {
        name: name.to_string(),
        user: user.panel_id,
        egg: defaults.egg,
        nest: defaults.nest,
        docker_image: defaults.docker_image.clone(),
        startup: defaults.startup.clone(),
        limits: Limits {
            memory: ram,
            swap: 0,
            disk,
            io: 500,
            cpu: cpu.unwrap_or(u64::from(defaults.cpu)),
        },
        environment: server_environment(),
        feature_limits: FeatureLimits {
            databases: 0,
            allocations: 1,
            backups: 0,
        },
        deploy: Deploy {
            locations: vec![defaults.location],
            dedicated_ip: false,
            port_range: Vec::new(),
        },
    };
    let server = data
        .panel
        .create_server(&request)
        .await
        .failed_to("create server")?;

    let recorded = data
        .dbs
        .ownership
        .record_server(NewServerRecord {
            panel_id: Some(server.id),
            name: Some(server.name.clone()),
            ..NewServerRecord::new(&server.identifier, target)
        })
        .await;
    if let Err(e) = recorded {
        error!(
            "Server {} (#{}) was created for {} but could not be recorded: {}",
            server.identifier, server.id, target, e
        );
        return Ok(format!(
            "⚠️ Server `{}` was created on the panel (ID `{}`) but could not be recorded as owned by <@{}>. It won't show up in their server list.",
            server.name, server.identifier, target
        ));
    }
    info!(
        "{} created server {} (#{}) for {}",
        caller.id, server.identifier, server.id, target
    );

    Ok(format!(
        "✅ Server `{}` created for <@{}>! ID: `{}`",
        server.name, target, server.identifier
    ))
}

pub async fn delete_server(data: &Data, caller: &Caller, server: &str) -> Result<String, CommandError> {
    require_admin(data, caller).await?;

    let server = server.trim();
    let record = find_record(data, server).await?;
    let target = record
        .as_ref()
        .and_then(|r| r.panel_id)
        .map(|id| id.to_string())
        .unwrap_or_else(|| server.to_string());
    data.panel
        .delete_server(&target)
        .await
        .failed_to("delete server")?;

    match record {
        Some(record) => {
            data.dbs.ownership.remove_server(&record.server_id).await?;
        }
        None => warn!("Deleted server {} had no local record", server),
    }
    info!("{} deleted server {}", caller.id, server);

    Ok(format!("🗑️ Server `{}` deleted.", server))
}

pub async fn suspend_server(data: &Data, caller: &Caller, server: &str) -> Result<String, CommandError> {
    require_admin(data, caller).await?;

    let target = resolve_target(data, server).await?;
    data.panel
        .suspend_server(&target)
        .await
        .failed_to("suspend server")?;

    Ok(format!("⏸️ Server `{}` suspended.", server.trim()))
}

pub async fn unsuspend_server(data: &Data, caller: &Caller, server: &str) -> Result<String, CommandError> {
    require_admin(data, caller).await?;

    let target = resolve_target(data, server).await?;
    data.panel
        .unsuspend_server(&target)
        .await
        .failed_to("unsuspend server")?;

    Ok(format!("▶️ Server `{}` unsuspended.", server.trim()))
}

pub async fn wipe_server(data: &Data, caller: &Caller, server: &str) -> Result<String, CommandError> {
    require_admin(data, caller).await?;

    let target = resolve_target(data, server).await?;
    data.panel
        .wipe_server(&target)
        .await
        .failed_to("wipe server")?;
    info!("{} wiped server {}", caller.id, server);

    Ok(format!("🧹 Server `{}` is being wiped and reinstalled.", server.trim()))
}

pub async fn update_server_limits(
    data: &Data,
    caller: &Caller,
    server: &str,
    ram: Option<u64>,
    disk: Option<u64>,
    cpu: Option<u64>,
) -> Result<String, CommandError> {
    require_admin(data, caller).await?;

    if ram.is_none() && disk.is_none() && cpu.is_none() {
        return Err(CommandError::invalid("Give at least one of RAM, disk or CPU."));
    }
    if [ram, disk, cpu].iter().flatten().any(|v| *v == 0) {
        return Err(CommandError::invalid("Limits must be greater than zero."));
    }

    let target = resolve_target(data, server).await?;
    let current = data
        .panel
        .get_server_details(&target)
        .await
        .failed_to("fetch server details")?;

    let limits = Limits {
        memory: ram.unwrap_or(current.limits.memory),
        disk: disk.unwrap_or(current.limits.disk),
        cpu: cpu.unwrap_or(current.limits.cpu),
        ..current.limits.clone()
    };
    let build = BuildUpdate::from_server(&current, limits)
        .ok_or_else(|| CommandError::invalid("That server has no primary allocation."))?;

    data.panel
        .update_build(&target, &build)
        .await
        .failed_to("update server limits")?;

    Ok(format!(
        "🔧 Updated `{}`: RAM {} MB, Disk {} MB, CPU {}%",
        server.trim(),
        build.memory,
        build.disk,
        build.cpu
    ))
}

async fn set_banned(
    data: &Data,
    caller: &Caller,
    target: UserId,
    banned: bool,
) -> Result<(), CommandError> {
    require_admin(data, caller).await?;

    if banned && target == caller.id {
        return Err(CommandError::invalid("You can't ban yourself."));
    }
    data.dbs
        .ownership
        .set_banned(target, banned)
        .await
        .map_err(|e| match e {
            StoreError::NotFound(_) => CommandError::not_found("That user has no account."),
            other => other.into(),
        })?;
    info!("{} set banned={} for {}", caller.id, banned, target);
    Ok(())
}

pub async fn ban_user(data: &Data, caller: &Caller, target: UserId) -> Result<String, CommandError> {
    set_banned(data, caller, target, true).await?;
    Ok(format!("🔨 <@{}> has been banned.", target))
}

pub async fn unban_user(data: &Data, caller: &Caller, target: UserId) -> Result<String, CommandError> {
    set_banned(data, caller, target, false).await?;
    Ok(format!("✅ <@{}> has been unbanned.", target))
}

pub async fn list_users(data: &Data, caller: &Caller) -> Result<String, CommandError> {
    require_admin(data, caller).await?;

    let users = data.dbs.ownership.list_users().await?;
    if users.is_empty() {
        return Ok("📭 No registered users.".to_string());
    }

    let lines: Vec<String> = users
        .iter()
        .map(|u| {
            format!(
                "• <@{}> panel `#{}` `{}`{}",
                u.discord_id,
                u.panel_id,
                u.email,
                if u.banned { " 🚫 banned" } else { "" }
            )
        })
        .collect();

    Ok(format!("👥 **{} registered users**\n{}", users.len(), lines.join("\n")))
}

pub async fn list_shared_access(
    data: &Data,
    caller: &Caller,
    server: Option<&str>,
) -> Result<String, CommandError> {
    require_admin(data, caller).await?;

    let store = &data.dbs.ownership;
    let server = server.map(str::trim);
    if let Some(server_id) = server {
        if store.get_server(server_id).await?.is_none() {
            return Err(CommandError::not_found(format!(
                "`{}` is not a recorded server.",
                server_id
            )));
        }
    }

    let grants = store.list_grants(server).await?;
    if grants.is_empty() {
        return Ok("📭 No shared access.".to_string());
    }

    let lines: Vec<String> = grants
        .iter()
        .map(|g| {
            format!(
                "• `{}` owner <@{}> → <@{}> since <t:{}:d>",
                g.server_id,
                g.owner_id,
                g.grantee_id,
                g.granted_at.timestamp()
            )
        })
        .collect();

    Ok(format!("🔗 **{} grants**\n{}", grants.len(), lines.join("\n")))
}

pub async fn servers_on_node(data: &Data, caller: &Caller, node_id: u32) -> Result<String, CommandError> {
    require_admin(data, caller).await?;

    let servers = data
        .panel
        .list_node_servers(node_id)
        .await
        .failed_to("retrieve the server list for this node")?;

    let names: Vec<String> = servers
        .iter()
        .map(|s| format!("{} ({})", s.name, s.identifier))
        .collect();

    Ok(format!(
        "🧩 **{} servers on node {}**\n{}",
        names.len(),
        node_id,
        code_list(&names)
    ))
}

pub async fn nodes(data: &Data, caller: &Caller) -> Result<String, CommandError> {
    require_admin(data, caller).await?;

    let nodes = data.panel.list_nodes().await.failed_to("fetch nodes")?;
    if nodes.is_empty() {
        return Ok("📭 No nodes configured.".to_string());
    }

    let entries: Vec<String> = nodes
        .iter()
        .map(|n| {
            format!(
                "**{}** (#{}) `{}`{}\n> Location `{}` · RAM {} MB · Disk {} MB",
                n.name,
                n.id,
                n.fqdn,
                if n.maintenance_mode { " 🛠️ maintenance" } else { "" },
                n.location_id,
                n.memory,
                n.disk
            )
        })
        .collect();

    Ok(format!("📡 **Node Status**\n{}", entries.join("\n")))
}

fn usage(used: u64, total: u64) -> String {
    if total == 0 {
        return format!("{} / unlimited MB", used);
    }
    format!("{} / {} MB ({:.0}%)", used, total, used as f64 * 100.0 / total as f64)
}

pub async fn node_status(data: &Data, caller: &Caller, node_id: u32) -> Result<String, CommandError> {
    require_admin(data, caller).await?;

    let node = data
        .panel
        .get_node(node_id)
        .await
        .failed_to("fetch node")?;
    let allocated = node.allocated_resources.clone().unwrap_or_default();

    Ok(format!(
        "📡 **{}** (#{})\n> FQDN: `{}`\n> Location: `{}`\n> Maintenance: {}\n> RAM: {}\n> Disk: {}",
        node.name,
        node.id,
        node.fqdn,
        node.location_id,
        if node.maintenance_mode { "yes" } else { "no" },
        usage(allocated.memory, node.memory),
        usage(allocated.disk, node.disk),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::auth::Denial;
    use crate::test_support::{caller, seeded, FakePanel, ADMIN, ALICE, BOB, CAROL};

    #[tokio::test]
    async fn non_admins_make_no_panel_calls() {
        let panel = FakePanel::new();
        let data = seeded(panel.clone()).await;
        let alice = caller(ALICE);

        let results = [
            create_server(&data, &alice, ALICE, "Mine", 1024, 2048, None).await,
            delete_server(&data, &alice, "srv-1").await,
            suspend_server(&data, &alice, "srv-1").await,
            unsuspend_server(&data, &alice, "srv-1").await,
            wipe_server(&data, &alice, "srv-1").await,
            update_server_limits(&data, &alice, "srv-1", Some(2048), None, None).await,
            ban_user(&data, &alice, BOB).await,
            list_users(&data, &alice).await,
            list_shared_access(&data, &alice, None).await,
            servers_on_node(&data, &alice, 1).await,
            nodes(&data, &alice).await,
            node_status(&data, &alice, 1).await,
        ];
        for result in results {
            let err = result.unwrap_err();
            assert!(matches!(err, CommandError::Unauthorized(Denial::NotAdmin)));
            assert_eq!(err.user_message(), "⛔ You are not authorized.");
        }
        assert_eq!(panel.call_count(), 0);
        assert!(data.dbs.ownership.get_server("srv-1").await.unwrap().is_some());
        assert!(!data.dbs.ownership.get_user(BOB).await.unwrap().unwrap().banned);
    }

    #[tokio::test]
    async fn create_server_records_owner() {
        let panel = FakePanel::new();
        let data = seeded(panel.clone()).await;

        let reply = create_server(&data, &caller(ADMIN), BOB, "Creative", 2048, 8192, None)
            .await
            .unwrap();
        assert_eq!(reply, "✅ Server `Creative` created for <@200>! ID: `abcd1234`");
        assert_eq!(panel.calls(), vec!["create_server Creative user=43"]);

        let record = data.dbs.ownership.get_server("abcd1234").await.unwrap().unwrap();
        assert_eq!(record.owner_id, BOB);
        assert_eq!(record.panel_id, Some(7));
        assert_eq!(data.dbs.ownership.list_owned(BOB).await.unwrap(), vec!["abcd1234"]);
    }

    #[tokio::test]
    async fn create_server_refuses_unregistered_or_banned_targets() {
        let panel = FakePanel::new();
        let data = seeded(panel.clone()).await;
        let admin = caller(ADMIN);

        let err = create_server(&data, &admin, CAROL, "X", 1024, 1024, None).await.unwrap_err();
        assert!(matches!(err, CommandError::NotFound(_)));

        data.dbs.ownership.set_banned(BOB, true).await.unwrap();
        let err = create_server(&data, &admin, BOB, "X", 1024, 1024, None).await.unwrap_err();
        assert!(matches!(err, CommandError::Invalid(_)));

        assert_eq!(panel.call_count(), 0);
    }

    #[tokio::test]
    async fn delete_server_uses_panel_id_and_cascades() {
        let panel = FakePanel::new();
        let data = seeded(panel.clone()).await;

        delete_server(&data, &caller(ADMIN), "srv-1").await.unwrap();
        assert_eq!(panel.calls(), vec!["delete_server 7"]);

        let store = &data.dbs.ownership;
        assert!(store.get_server("srv-1").await.unwrap().is_none());
        assert!(store.list_owned(ALICE).await.unwrap().is_empty());
        assert!(store.list_shared(BOB).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_by_panel_id_removes_the_record() {
        let panel = FakePanel::new();
        let data = seeded(panel.clone()).await;

        let reply = delete_server(&data, &caller(ADMIN), "7").await.unwrap();
        assert_eq!(reply, "🗑️ Server `7` deleted.");
        assert_eq!(panel.calls(), vec!["delete_server 7"]);

        let store = &data.dbs.ownership;
        assert!(store.get_server("srv-1").await.unwrap().is_none());
        assert!(store.list_owned(ALICE).await.unwrap().is_empty());
        assert!(store.list_grantees("srv-1").await.unwrap().is_empty());
        assert!(store.list_shared(BOB).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn create_server_reports_an_unrecorded_server() {
        let panel = FakePanel::new();
        let data = seeded(panel.clone()).await;
        data.dbs
            .ownership
            .transaction(|tx| {
                tx.execute_batch(
                    "CREATE TRIGGER no_new_servers BEFORE INSERT ON servers
                     BEGIN SELECT RAISE(ABORT, 'servers are read only'); END;",
                )
            })
            .await
            .unwrap();

        let reply = create_server(&data, &caller(ADMIN), BOB, "Creative", 2048, 8192, None)
            .await
            .unwrap();
        assert!(reply.starts_with("⚠️ Server `Creative` was created on the panel (ID `abcd1234`)"));
        assert!(reply.contains("could not be recorded"));
        assert_eq!(panel.calls(), vec!["create_server Creative user=43"]);
        assert!(data.dbs.ownership.list_owned(BOB).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_delete_keeps_the_record() {
        let panel = FakePanel::failing();
        let data = seeded(panel.clone()).await;

        let err = delete_server(&data, &caller(ADMIN), "srv-1").await.unwrap_err();
        assert_eq!(err.user_message(), "❌ Failed to delete server.");
        assert!(data.dbs.ownership.has_access("srv-1", BOB).await.unwrap());
    }

    #[tokio::test]
    async fn unknown_targets_pass_through() {
        let panel = FakePanel::new();
        let data = seeded(panel.clone()).await;
        let admin = caller(ADMIN);

        suspend_server(&data, &admin, "srv-1").await.unwrap();
        suspend_server(&data, &admin, "99").await.unwrap();
        unsuspend_server(&data, &admin, "99").await.unwrap();
        wipe_server(&data, &admin, "srv-1").await.unwrap();

        assert_eq!(
            panel.calls(),
            vec![
                "suspend_server 7",
                "suspend_server 99",
                "unsuspend_server 99",
                "wipe_server 7"
            ]
        );
    }

    #[tokio::test]
    async fn update_limits_merges_current_build() {
        let panel = FakePanel::new();
        let data = seeded(panel.clone()).await;
        let admin = caller(ADMIN);

        let reply = update_server_limits(&data, &admin, "srv-1", Some(2048), None, None)
            .await
            .unwrap();
        assert_eq!(reply, "🔧 Updated `srv-1`: RAM 2048 MB, Disk 4096 MB, CPU 100%");
        assert_eq!(
            panel.calls(),
            vec!["get_server_details 7", "update_build 7 memory=2048 disk=4096 cpu=100"]
        );

        let err = update_server_limits(&data, &admin, "srv-1", None, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::Invalid(_)));
        assert_eq!(panel.call_count(), 2);
    }

    #[tokio::test]
    async fn ban_and_unban() {
        let panel = FakePanel::new();
        let data = seeded(panel.clone()).await;
        let admin = caller(ADMIN);

        ban_user(&data, &admin, ALICE).await.unwrap();
        let err = crate::modules::servers::controllers::status(&data, &caller(ALICE), "srv-1")
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::Unauthorized(Denial::Banned)));
        assert_eq!(panel.call_count(), 0);

        unban_user(&data, &admin, ALICE).await.unwrap();
        crate::modules::servers::controllers::status(&data, &caller(ALICE), "srv-1")
            .await
            .unwrap();

        let err = ban_user(&data, &admin, CAROL).await.unwrap_err();
        assert_eq!(err.user_message(), "❌ That user has no account.");

        let err = ban_user(&data, &admin, ADMIN).await.unwrap_err();
        assert!(matches!(err, CommandError::Invalid(_)));
    }

    #[tokio::test]
    async fn listings() {
        let data = seeded(FakePanel::new()).await;
        let admin = caller(ADMIN);

        let users = list_users(&data, &admin).await.unwrap();
        assert!(users.starts_with("👥 **2 registered users**"));
        assert!(users.contains("<@100> panel `#42`"));

        let grants = list_shared_access(&data, &admin, Some("srv-1")).await.unwrap();
        assert!(grants.contains("`srv-1` owner <@100> → <@200>"));

        let err = list_shared_access(&data, &admin, Some("nope")).await.unwrap_err();
        assert!(matches!(err, CommandError::NotFound(_)));
    }

    #[tokio::test]
    async fn node_views() {
        let panel = FakePanel::new();
        let data = seeded(panel.clone()).await;
        let admin = caller(ADMIN);

        let listing = nodes(&data, &admin).await.unwrap();
        assert!(listing.contains("**node-1** (#1)"));
        assert!(listing.contains("**node-2** (#2)"));

        let status = node_status(&data, &admin, 3).await.unwrap();
        assert!(status.contains("RAM: 8192 / 16384 MB (50%)"));

        let servers = servers_on_node(&data, &admin, 1).await.unwrap();
        assert!(servers.starts_with("🧩 **2 servers on node 1**"));
        assert!(servers.contains("Creative (efgh5678)"));

        assert_eq!(panel.calls(), vec!["list_nodes", "get_node 3", "list_node_servers 1"]);
    }
}
