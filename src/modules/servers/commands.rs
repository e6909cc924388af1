use poise::command;
use poise::serenity_prelude::{self as serenity, User};

use super::controllers;
use crate::modules::auth::Permission;
use crate::modules::panel::models::PowerSignal;
use crate::utils::{confirm, respond, Caller};
use crate::{Context, Error};

/// Suggests servers the invoker owns or has been given access to.
async fn autocomplete_server_id<'a>(
    ctx: Context<'_>,
    partial: &'a str,
) -> impl Iterator<Item = serenity::AutocompleteChoice> {
    let store = &ctx.data().dbs.ownership;
    let user_id = ctx.author().id.get();

    let mut servers = Vec::new();
    if let Ok(owned) = store.list_owned(user_id).await {
        for server_id in owned {
            let label = match store.get_server(&server_id).await {
                Ok(Some(record)) => format!("{} ({})", record.label(), server_id),
                _ => server_id.clone(),
            };
            servers.push((label, server_id));
        }
    }
    if let Ok(shared) = store.list_shared(user_id).await {
        servers.extend(shared.into_iter().map(|id| (format!("{} (shared)", id), id)));
    }

    let partial = partial.to_lowercase();
    servers
        .into_iter()
        .filter(move |(label, _)| label.to_lowercase().contains(&partial))
        .take(25)
        .map(|(label, server_id)| serenity::AutocompleteChoice::new(label, server_id))
        .collect::<Vec<_>>()
        .into_iter()
}

/// Start your server
#[command(slash_command, ephemeral, category = "Servers")]
pub async fn start(
    ctx: Context<'_>,
    #[description = "Server ID"]
    #[autocomplete = "autocomplete_server_id"]
    server_id: String,
) -> Result<(), Error> {
    ctx.defer_ephemeral().await?;
    let caller = Caller::from_ctx(&ctx);
    respond(
        ctx,
        controllers::power(ctx.data(), &caller, &server_id, PowerSignal::Start).await,
    )
    .await
}

/// Stop your server
#[command(slash_command, ephemeral, category = "Servers")]
pub async fn stop(
    ctx: Context<'_>,
    #[description = "Server ID"]
    #[autocomplete = "autocomplete_server_id"]
    server_id: String,
) -> Result<(), Error> {
    ctx.defer_ephemeral().await?;
    let caller = Caller::from_ctx(&ctx);
    respond(
        ctx,
        controllers::power(ctx.data(), &caller, &server_id, PowerSignal::Stop).await,
    )
    .await
}

/// Restart your server
#[command(slash_command, ephemeral, category = "Servers")]
pub async fn restart(
    ctx: Context<'_>,
    #[description = "Server ID"]
    #[autocomplete = "autocomplete_server_id"]
    server_id: String,
) -> Result<(), Error> {
    ctx.defer_ephemeral().await?;
    let caller = Caller::from_ctx(&ctx);
    respond(
        ctx,
        controllers::power(ctx.data(), &caller, &server_id, PowerSignal::Restart).await,
    )
    .await
}

/// Check whether a server is running
#[command(slash_command, ephemeral, category = "Servers")]
pub async fn status(
    ctx: Context<'_>,
    #[description = "Server ID"]
    #[autocomplete = "autocomplete_server_id"]
    server_id: String,
) -> Result<(), Error> {
    ctx.defer_ephemeral().await?;
    let caller = Caller::from_ctx(&ctx);
    respond(ctx, controllers::status(ctx.data(), &caller, &server_id).await).await
}

/// Show CPU, memory, disk and network usage of your server
#[command(slash_command, rename = "server-resources", ephemeral, category = "Servers")]
pub async fn server_resources(
    ctx: Context<'_>,
    #[description = "Server ID"]
    #[autocomplete = "autocomplete_server_id"]
    server_id: String,
) -> Result<(), Error> {
    ctx.defer_ephemeral().await?;
    let caller = Caller::from_ctx(&ctx);
    respond(
        ctx,
        controllers::server_resources(ctx.data(), &caller, &server_id).await,
    )
    .await
}

/// Send a console command to your server
#[command(slash_command, ephemeral, category = "Servers")]
pub async fn cmd(
    ctx: Context<'_>,
    #[description = "Server ID"]
    #[autocomplete = "autocomplete_server_id"]
    server_id: String,
    #[description = "Console command to run"] command: String,
) -> Result<(), Error> {
    ctx.defer_ephemeral().await?;
    let caller = Caller::from_ctx(&ctx);
    respond(
        ctx,
        controllers::send_command(ctx.data(), &caller, &server_id, &command).await,
    )
    .await
}

/// Show the latest console output of a server
#[command(slash_command, rename = "server-logs", ephemeral, category = "Servers")]
pub async fn server_logs(
    ctx: Context<'_>,
    #[description = "Server ID"]
    #[autocomplete = "autocomplete_server_id"]
    server_id: String,
    #[description = "Number of lines (default 20, max 50)"]
    #[min = 1]
    #[max = 50]
    lines: Option<u32>,
) -> Result<(), Error> {
    ctx.defer_ephemeral().await?;
    let caller = Caller::from_ctx(&ctx);
    respond(
        ctx,
        controllers::server_logs(ctx.data(), &caller, &server_id, lines.map(|n| n as usize)).await,
    )
    .await
}

/// Rename your server
#[command(slash_command, rename = "change-name", ephemeral, category = "Servers")]
pub async fn change_name(
    ctx: Context<'_>,
    #[description = "Server ID"]
    #[autocomplete = "autocomplete_server_id"]
    server_id: String,
    #[description = "New name"] name: String,
) -> Result<(), Error> {
    ctx.defer_ephemeral().await?;
    let caller = Caller::from_ctx(&ctx);
    respond(
        ctx,
        controllers::change_name(ctx.data(), &caller, &server_id, &name).await,
    )
    .await
}

/// Reinstall your server from scratch
#[command(slash_command, rename = "reset-server", ephemeral, category = "Servers")]
pub async fn reset_server(
    ctx: Context<'_>,
    #[description = "Server ID"]
    #[autocomplete = "autocomplete_server_id"]
    server_id: String,
) -> Result<(), Error> {
    ctx.defer_ephemeral().await?;
    let prompt = format!(
        "♻️ Reset `{}`? The server will be reinstalled and its files may be lost.",
        server_id
    );
    let caller = Caller::from_ctx(&ctx);
    // only callers the gate accepts are prompted; anyone else gets the denial
    let data = ctx.data();
    let allowed = data
        .gate
        .allows(&data.dbs.ownership, caller.id, Permission::Owner(&server_id))
        .await?;
    if allowed && !confirm(ctx, prompt, "Reset Server").await? {
        return Ok(());
    }
    respond(
        ctx,
        controllers::reset_server(ctx.data(), &caller, &server_id).await,
    )
    .await
}

/// Show the address players connect to
#[command(slash_command, ephemeral, category = "Servers")]
pub async fn ip(
    ctx: Context<'_>,
    #[description = "Server ID"]
    #[autocomplete = "autocomplete_server_id"]
    server_id: String,
) -> Result<(), Error> {
    ctx.defer_ephemeral().await?;
    let caller = Caller::from_ctx(&ctx);
    respond(ctx, controllers::ip(ctx.data(), &caller, &server_id).await).await
}

/// Create a backup of your server
#[command(slash_command, ephemeral, category = "Servers")]
pub async fn backup(
    ctx: Context<'_>,
    #[description = "Server ID"]
    #[autocomplete = "autocomplete_server_id"]
    server_id: String,
) -> Result<(), Error> {
    ctx.defer_ephemeral().await?;
    let caller = Caller::from_ctx(&ctx);
    respond(ctx, controllers::backup(ctx.data(), &caller, &server_id).await).await
}

/// List backups, or get a download link for one
#[command(slash_command, rename = "download-backup", ephemeral, category = "Servers")]
pub async fn download_backup(
    ctx: Context<'_>,
    #[description = "Server ID"]
    #[autocomplete = "autocomplete_server_id"]
    server_id: String,
    #[description = "Backup ID (leave empty to list backups)"] backup_id: Option<String>,
) -> Result<(), Error> {
    ctx.defer_ephemeral().await?;
    let caller = Caller::from_ctx(&ctx);
    respond(
        ctx,
        controllers::download_backup(ctx.data(), &caller, &server_id, backup_id.as_deref()).await,
    )
    .await
}

/// Give another user read access to your server
#[command(slash_command, rename = "share-access", ephemeral, category = "Sharing")]
pub async fn share_access(
    ctx: Context<'_>,
    #[description = "Server ID"]
    #[autocomplete = "autocomplete_server_id"]
    server_id: String,
    #[description = "User to share with"] user: User,
) -> Result<(), Error> {
    let caller = Caller::from_ctx(&ctx);
    respond(
        ctx,
        controllers::share_access(ctx.data(), &caller, &server_id, user.id.get()).await,
    )
    .await
}

/// Take back a user's access to your server
#[command(slash_command, rename = "unshare-access", ephemeral, category = "Sharing")]
pub async fn unshare_access(
    ctx: Context<'_>,
    #[description = "Server ID"]
    #[autocomplete = "autocomplete_server_id"]
    server_id: String,
    #[description = "User to remove"] user: User,
) -> Result<(), Error> {
    let caller = Caller::from_ctx(&ctx);
    respond(
        ctx,
        controllers::unshare_access(ctx.data(), &caller, &server_id, user.id.get()).await,
    )
    .await
}
