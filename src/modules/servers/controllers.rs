use tracing::{error, info};

use crate::error::{CommandError, RemoteContext};
use crate::modules::auth::Permission;
use crate::modules::ownership::{NewServerRecord, UserId};
use crate::modules::panel::models::PowerSignal;
use crate::utils::{format_bytes, format_duration_ms, tail_lines, truncate, Caller, MESSAGE_LIMIT};
use crate::Data;

pub const DEFAULT_LOG_LINES: usize = 20;
pub const MAX_LOG_LINES: usize = 50;
const MAX_NAME_LEN: usize = 191;

async fn require(data: &Data, caller: &Caller, permission: Permission<'_>) -> Result<(), CommandError> {
    data.gate
        .authorize(&data.dbs.ownership, caller.id, permission)
        .await?;
    Ok(())
}

pub async fn power(
    data: &Data,
    caller: &Caller,
    server_id: &str,
    signal: PowerSignal,
) -> Result<String, CommandError> {
    require(data, caller, Permission::Owner(server_id)).await?;

    let action = match signal {
        PowerSignal::Start => "start server",
        PowerSignal::Stop => "stop server",
        PowerSignal::Restart => "restart server",
    };
    data.panel.power(server_id, signal).await.failed_to(action)?;

    Ok(match signal {
        PowerSignal::Start => "🟢 Server starting...",
        PowerSignal::Stop => "🔴 Server stopping...",
        PowerSignal::Restart => "🔁 Server restarting...",
    }
    .to_string())
}

pub async fn status(data: &Data, caller: &Caller, server_id: &str) -> Result<String, CommandError> {
    require(data, caller, Permission::Access(server_id)).await?;

    let resources = data
        .panel
        .resources(server_id)
        .await
        .failed_to("retrieve status")?;

    let suspended = if resources.is_suspended {
        " (suspended)"
    } else {
        ""
    };
    Ok(format!(
        "📊 Server Status: `{}`{}",
        resources.current_state, suspended
    ))
}

pub async fn server_resources(
    data: &Data,
    caller: &Caller,
    server_id: &str,
) -> Result<String, CommandError> {
    require(data, caller, Permission::Owner(server_id)).await?;

    let stats = data
        .panel
        .resources(server_id)
        .await
        .failed_to("retrieve resource usage")?;
    let usage = &stats.resources;

    Ok(format!(
        "📈 **Resources for `{}`**\n> State: `{}`\n> CPU: {:.1}%\n> Memory: {}\n> Disk: {}\n> Network: ↓ {} / ↑ {}\n> Uptime: {}",
        server_id,
        stats.current_state,
        usage.cpu_absolute,
        format_bytes(usage.memory_bytes),
        format_bytes(usage.disk_bytes),
        format_bytes(usage.network_rx_bytes),
        format_bytes(usage.network_tx_bytes),
        format_duration_ms(usage.uptime),
    ))
}

pub async fn send_command(
    data: &Data,
    caller: &Caller,
    server_id: &str,
    command: &str,
) -> Result<String, CommandError> {
    require(data, caller, Permission::Owner(server_id)).await?;

    let command = command.trim();
    if command.is_empty() {
        return Err(CommandError::invalid("The command can't be empty."));
    }
    data.panel
        .send_command(server_id, command)
        .await
        .failed_to("send command")?;

    Ok(format!("📥 Sent command: `{}`", command))
}

pub async fn server_logs(
    data: &Data,
    caller: &Caller,
    server_id: &str,
    lines: Option<usize>,
) -> Result<String, CommandError> {
    require(data, caller, Permission::Access(server_id)).await?;

    let lines = lines.unwrap_or(DEFAULT_LOG_LINES).clamp(1, MAX_LOG_LINES);
    let log = data
        .panel
        .read_log(server_id)
        .await
        .failed_to("fetch server logs")?;

    let tail = tail_lines(&log, lines);
    if tail.trim().is_empty() {
        return Ok(format!("📜 The log for `{}` is empty.", server_id));
    }

    let header = format!("📜 **Last {} lines of `{}`**\n", lines, server_id);
    // header and code fences share the message budget
    let budget = MESSAGE_LIMIT - header.len() - 8;
    let tail = if tail.len() > budget {
        // drop whole leading lines until the rest fits
        let mut cut = tail.len() - budget;
        while !tail.is_char_boundary(cut) {
            cut += 1;
        }
        let rest = &tail[cut..];
        rest.split_once('\n').map_or(rest, |(_, rest)| rest).to_string()
    } else {
        tail
    };
    Ok(truncate(&format!("{}```\n{}\n```", header, tail), MESSAGE_LIMIT))
}

pub async fn change_name(
    data: &Data,
    caller: &Caller,
    server_id: &str,
    name: &str,
) -> Result<String, CommandError> {
    require(data, caller, Permission::Owner(server_id)).await?;

    let name = name.trim();
    if name.is_empty() || name.chars().count() > MAX_NAME_LEN {
        return Err(CommandError::invalid(format!(
            "Server names must be between 1 and {} characters.",
            MAX_NAME_LEN
        )));
    }
    data.panel
        .rename_server(server_id, name)
        .await
        .failed_to("rename server")?;

    // keep the local label in step; the rename itself already succeeded
    if let Err(e) = data
        .dbs
        .ownership
        .record_server(NewServerRecord {
            name: Some(name.to_string()),
            ..NewServerRecord::new(server_id, caller.id)
        })
        .await
    {
        error!("Failed to update name of {} locally: {}", server_id, e);
    }

    Ok(format!("✏️ Renamed `{}` to **{}**.", server_id, name))
}

pub async fn reset_server(data: &Data, caller: &Caller, server_id: &str) -> Result<String, CommandError> {
    require(data, caller, Permission::Owner(server_id)).await?;

    data.panel
        .reinstall_server(server_id)
        .await
        .failed_to("reset server")?;
    info!("{} reset server {}", caller.id, server_id);

    Ok(format!(
        "♻️ Server `{}` is being reset. This can take a few minutes.",
        server_id
    ))
}

pub async fn ip(data: &Data, caller: &Caller, server_id: &str) -> Result<String, CommandError> {
    require(data, caller, Permission::Access(server_id)).await?;

    let info = data
        .panel
        .server_info(server_id)
        .await
        .failed_to("fetch server info")?;
    let allocation = info
        .primary_allocation()
        .ok_or_else(|| CommandError::not_found("That server has no address assigned."))?;

    Ok(format!("🌐 Server IP: `{}`", allocation.address()))
}

pub async fn backup(data: &Data, caller: &Caller, server_id: &str) -> Result<String, CommandError> {
    require(data, caller, Permission::Owner(server_id)).await?;

    let backup = data
        .panel
        .create_backup(server_id)
        .await
        .failed_to("create backup")?;

    Ok(format!("🗂️ Backup created: `{}` (`{}`)", backup.name, backup.uuid))
}

/// Lists backups, or with `backup_id` returns a download link for one.
pub async fn download_backup(
    data: &Data,
    caller: &Caller,
    server_id: &str,
    backup_id: Option<&str>,
) -> Result<String, CommandError> {
    require(data, caller, Permission::Access(server_id)).await?;

    if let Some(backup_id) = backup_id {
        let url = data
            .panel
            .backup_download_url(server_id, backup_id.trim())
            .await
            .failed_to("get a download link")?;
        return Ok(format!(
            "📦 [Download backup `{}`]({})\nThe link expires shortly.",
            backup_id.trim(),
            url
        ));
    }

    let backups = data
        .panel
        .list_backups(server_id)
        .await
        .failed_to("list backups")?;
    if backups.is_empty() {
        return Ok(format!("📭 `{}` has no backups yet.", server_id));
    }

    let entries: Vec<String> = backups
        .iter()
        .map(|b| {
            let state = if b.completed_at.is_some() {
                format_bytes(b.bytes)
            } else {
                "in progress".to_string()
            };
            format!("• **{}** `{}` ({})", b.name, b.uuid, state)
        })
        .collect();

    Ok(format!(
        "🗂️ **Backups for `{}`**\n{}\nRun `/download-backup` again with a backup id to get a link.",
        server_id,
        entries.join("\n")
    ))
}

pub async fn share_access(
    data: &Data,
    caller: &Caller,
    server_id: &str,
    grantee: UserId,
) -> Result<String, CommandError> {
    require(data, caller, Permission::Owner(server_id)).await?;

    if grantee == caller.id {
        return Err(CommandError::invalid("You already own that server."));
    }
    if data.dbs.ownership.grant_access(server_id, grantee).await? {
        info!("{} shared {} with {}", caller.id, server_id, grantee);
        Ok(format!("✅ Shared server `{}` with <@{}>.", server_id, grantee))
    } else {
        Ok(format!("ℹ️ <@{}> already has access to `{}`.", grantee, server_id))
    }
}

pub async fn unshare_access(
    data: &Data,
    caller: &Caller,
    server_id: &str,
    grantee: UserId,
) -> Result<String, CommandError> {
    require(data, caller, Permission::Owner(server_id)).await?;

    if data.dbs.ownership.revoke_access(server_id, grantee).await? {
        info!("{} revoked {} from {}", caller.id, server_id, grantee);
        Ok(format!("🚫 Revoked access to `{}` from <@{}>.", server_id, grantee))
    } else {
        Ok(format!("ℹ️ <@{}> didn't have access to `{}`.", grantee, server_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::auth::Denial;
    use crate::test_support::{caller, seeded, FakePanel, ALICE, BOB, CAROL};

    #[tokio::test]
    async fn owner_commands_reach_the_panel() {
        let panel = FakePanel::new();
        let data = seeded(panel.clone()).await;
        let alice = caller(ALICE);

        assert_eq!(
            power(&data, &alice, "srv-1", PowerSignal::Start).await.unwrap(),
            "🟢 Server starting..."
        );
        send_command(&data, &alice, "srv-1", " say hi ").await.unwrap();
        reset_server(&data, &alice, "srv-1").await.unwrap();

        assert_eq!(
            panel.calls(),
            vec![
                "power srv-1 start",
                "send_command srv-1 say hi",
                "reinstall_server srv-1"
            ]
        );
    }

    #[tokio::test]
    async fn shared_user_cannot_reset() {
        let panel = FakePanel::new();
        let data = seeded(panel.clone()).await;

        assert_eq!(
            data.dbs.ownership.list_shared(BOB).await.unwrap(),
            vec!["srv-1"]
        );

        let err = reset_server(&data, &caller(BOB), "srv-1").await.unwrap_err();
        assert!(matches!(err, CommandError::Unauthorized(Denial::NotOwner(_))));
        assert_eq!(err.user_message(), "⛔ That's not your server.");
        assert_eq!(panel.call_count(), 0);

        reset_server(&data, &caller(ALICE), "srv-1").await.unwrap();
        assert_eq!(panel.calls(), vec!["reinstall_server srv-1"]);
    }

    #[tokio::test]
    async fn non_owner_is_rejected_whether_or_not_server_exists() {
        let panel = FakePanel::new();
        let data = seeded(panel.clone()).await;

        for server_id in ["srv-1", "does-not-exist"] {
            let err = change_name(&data, &caller(CAROL), server_id, "Mine").await.unwrap_err();
            assert!(matches!(err, CommandError::Unauthorized(Denial::NotOwner(_))));
            let err = server_resources(&data, &caller(CAROL), server_id).await.unwrap_err();
            assert!(matches!(err, CommandError::Unauthorized(Denial::NotOwner(_))));
        }
        assert_eq!(panel.call_count(), 0);
    }

    #[tokio::test]
    async fn banned_owner_makes_no_panel_calls() {
        let panel = FakePanel::new();
        let data = seeded(panel.clone()).await;
        data.dbs.ownership.set_banned(ALICE, true).await.unwrap();
        let alice = caller(ALICE);

        let results = [
            power(&data, &alice, "srv-1", PowerSignal::Stop).await,
            status(&data, &alice, "srv-1").await,
            send_command(&data, &alice, "srv-1", "stop").await,
            backup(&data, &alice, "srv-1").await,
            share_access(&data, &alice, "srv-1", CAROL).await,
        ];
        for result in results {
            assert!(matches!(
                result,
                Err(CommandError::Unauthorized(Denial::Banned))
            ));
        }
        assert_eq!(panel.call_count(), 0);
        assert!(!data.dbs.ownership.has_access("srv-1", CAROL).await.unwrap());
    }

    #[tokio::test]
    async fn grantees_get_read_only_commands() {
        let panel = FakePanel::with_log("boot\nready");
        let data = seeded(panel.clone()).await;
        let bob = caller(BOB);

        assert_eq!(
            status(&data, &bob, "srv-1").await.unwrap(),
            "📊 Server Status: `running`"
        );
        assert_eq!(ip(&data, &bob, "srv-1").await.unwrap(), "🌐 Server IP: `10.0.0.5:25565`");
        assert!(server_logs(&data, &bob, "srv-1", None).await.unwrap().contains("ready"));

        let err = power(&data, &bob, "srv-1", PowerSignal::Start).await.unwrap_err();
        assert!(matches!(err, CommandError::Unauthorized(Denial::NotOwner(_))));
        let err = status(&data, &caller(CAROL), "srv-1").await.unwrap_err();
        assert!(matches!(err, CommandError::Unauthorized(Denial::NoAccess(_))));

        assert_eq!(
            panel.calls(),
            vec!["resources srv-1", "server_info srv-1", "read_log srv-1"]
        );
    }

    #[tokio::test]
    async fn panel_failures_become_generic_replies() {
        let panel = FakePanel::failing();
        let data = seeded(panel.clone()).await;

        let err = power(&data, &caller(ALICE), "srv-1", PowerSignal::Start).await.unwrap_err();
        assert_eq!(err.user_message(), "❌ Failed to start server.");
        match err {
            CommandError::RemoteOperationFailed { source, .. } => {
                assert_eq!(source.status(), Some(reqwest::StatusCode::INTERNAL_SERVER_ERROR))
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn server_logs_tail_and_fit_in_one_message() {
        let log: String = (1..=500)
            .map(|i| format!("[12:00:00] line {} {}", i, "x".repeat(40)))
            .collect::<Vec<_>>()
            .join("\n");
        let data = seeded(FakePanel::with_log(&log)).await;

        let reply = server_logs(&data, &caller(ALICE), "srv-1", Some(500)).await.unwrap();
        assert!(reply.len() <= MESSAGE_LIMIT);
        assert!(reply.contains("line 500"));
        assert!(!reply.contains("line 400 "));
        assert!(reply.contains(&format!("Last {} lines", MAX_LOG_LINES)));

        let short = server_logs(&data, &caller(ALICE), "srv-1", Some(3)).await.unwrap();
        assert!(short.contains("line 498"));
        assert!(!short.contains("line 497"));
    }

    #[tokio::test]
    async fn change_name_updates_local_label() {
        let panel = FakePanel::new();
        let data = seeded(panel.clone()).await;

        let reply = change_name(&data, &caller(ALICE), "srv-1", "  Skyblock ").await.unwrap();
        assert_eq!(reply, "✏️ Renamed `srv-1` to **Skyblock**.");
        assert_eq!(panel.calls(), vec!["rename_server srv-1 Skyblock"]);

        let record = data.dbs.ownership.get_server("srv-1").await.unwrap().unwrap();
        assert_eq!(record.label(), "Skyblock");
        assert_eq!(record.panel_id, Some(7));
        assert_eq!(data.dbs.ownership.list_grantees("srv-1").await.unwrap(), vec![BOB]);

        let err = change_name(&data, &caller(ALICE), "srv-1", "   ").await.unwrap_err();
        assert!(matches!(err, CommandError::Invalid(_)));
    }

    #[tokio::test]
    async fn download_backup_lists_then_links() {
        let panel = FakePanel::new();
        let data = seeded(panel.clone()).await;
        let bob = caller(BOB);

        let listing = download_backup(&data, &bob, "srv-1", None).await.unwrap();
        assert!(listing.contains("**nightly** `b-1` (5.0 MB)"));
        assert!(listing.contains("**manual** `b-2` (in progress)"));

        let link = download_backup(&data, &bob, "srv-1", Some("b-1")).await.unwrap();
        assert!(link.contains("https://files.example.com/srv-1/b-1"));

        assert_eq!(
            panel.calls(),
            vec!["list_backups srv-1", "backup_download_url srv-1 b-1"]
        );
    }

    #[tokio::test]
    async fn share_and_unshare_flow() {
        let panel = FakePanel::new();
        let data = seeded(panel.clone()).await;
        let alice = caller(ALICE);

        let reply = share_access(&data, &alice, "srv-1", CAROL).await.unwrap();
        assert!(reply.starts_with("✅"));
        let reply = share_access(&data, &alice, "srv-1", CAROL).await.unwrap();
        assert!(reply.starts_with("ℹ️"));
        assert_eq!(
            data.dbs.ownership.list_grantees("srv-1").await.unwrap(),
            vec![BOB, CAROL]
        );

        let err = share_access(&data, &alice, "srv-1", ALICE).await.unwrap_err();
        assert!(matches!(err, CommandError::Invalid(_)));

        // a grantee cannot re-share
        let err = share_access(&data, &caller(BOB), "srv-1", CAROL).await.unwrap_err();
        assert!(matches!(err, CommandError::Unauthorized(Denial::NotOwner(_))));

        unshare_access(&data, &alice, "srv-1", CAROL).await.unwrap();
        let reply = unshare_access(&data, &alice, "srv-1", CAROL).await.unwrap();
        assert!(reply.starts_with("ℹ️"));
        assert_eq!(data.dbs.ownership.list_grantees("srv-1").await.unwrap(), vec![BOB]);
        assert_eq!(panel.call_count(), 0);
    }

    #[tokio::test]
    async fn resources_are_formatted() {
        let data = seeded(FakePanel::new()).await;
        let reply = server_resources(&data, &caller(ALICE), "srv-1").await.unwrap();
        assert!(reply.contains("CPU: 12.5%"));
        assert!(reply.contains("Memory: 512.0 MB"));
        assert!(reply.contains("Uptime: 2h 0m"));
    }
}
