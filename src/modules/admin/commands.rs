use poise::command;
use poise::serenity_prelude::User;

use super::controllers;
use crate::modules::auth::Permission;
use crate::utils::{confirm, respond, Caller};
use crate::{Context, Error};

/// Asks for confirmation only when the gate would let the caller through, so
/// non-admins and banned admins get the plain denial instead of a prompt.
async fn confirm_admin(ctx: Context<'_>, prompt: String, label: &str) -> Result<bool, Error> {
    let data = ctx.data();
    let allowed = data
        .gate
        .allows(&data.dbs.ownership, ctx.author().id.get(), Permission::Admin)
        .await?;
    if !allowed {
        return Ok(true);
    }
    confirm(ctx, prompt, label).await
}

/// Admin: create a server for a user
#[command(slash_command, rename = "create-server", ephemeral, category = "Admin")]
pub async fn create_server(
    ctx: Context<'_>,
    #[description = "Owner of the new server"] user: User,
    #[description = "Server name"] name: String,
    #[description = "Memory in MB"]
    #[min = 1]
    ram: u64,
    #[description = "Disk in MB"]
    #[min = 1]
    disk: u64,
    #[description = "CPU limit in percent"]
    #[min = 1]
    cpu: Option<u64>,
) -> Result<(), Error> {
    ctx.defer_ephemeral().await?;
    let caller = Caller::from_ctx(&ctx);
    respond(
        ctx,
        controllers::create_server(ctx.data(), &caller, user.id.get(), &name, ram, disk, cpu).await,
    )
    .await
}

/// Admin: delete a server
#[command(slash_command, rename = "delete-server", ephemeral, category = "Admin")]
pub async fn delete_server(
    ctx: Context<'_>,
    #[description = "Server ID"] server_id: String,
) -> Result<(), Error> {
    ctx.defer_ephemeral().await?;
    let prompt = format!("🗑️ Delete `{}`? This cannot be undone.", server_id);
    if !confirm_admin(ctx, prompt, "Delete Server").await? {
        return Ok(());
    }
    let caller = Caller::from_ctx(&ctx);
    respond(
        ctx,
        controllers::delete_server(ctx.data(), &caller, &server_id).await,
    )
    .await
}

/// Admin: suspend a server
#[command(slash_command, rename = "suspend-server", ephemeral, category = "Admin")]
pub async fn suspend_server(
    ctx: Context<'_>,
    #[description = "Server ID"] server_id: String,
) -> Result<(), Error> {
    ctx.defer_ephemeral().await?;
    let caller = Caller::from_ctx(&ctx);
    respond(
        ctx,
        controllers::suspend_server(ctx.data(), &caller, &server_id).await,
    )
    .await
}

/// Admin: unsuspend a server
#[command(slash_command, rename = "unsuspend-server", ephemeral, category = "Admin")]
pub async fn unsuspend_server(
    ctx: Context<'_>,
    #[description = "Server ID"] server_id: String,
) -> Result<(), Error> {
    ctx.defer_ephemeral().await?;
    let caller = Caller::from_ctx(&ctx);
    respond(
        ctx,
        controllers::unsuspend_server(ctx.data(), &caller, &server_id).await,
    )
    .await
}

/// Admin: wipe and reinstall a server
#[command(slash_command, rename = "wipe-server", ephemeral, category = "Admin")]
pub async fn wipe_server(
    ctx: Context<'_>,
    #[description = "Server ID"] server_id: String,
) -> Result<(), Error> {
    ctx.defer_ephemeral().await?;
    let prompt = format!("🧹 Wipe `{}`? All of its files will be lost.", server_id);
    if !confirm_admin(ctx, prompt, "Wipe Server").await? {
        return Ok(());
    }
    let caller = Caller::from_ctx(&ctx);
    respond(
        ctx,
        controllers::wipe_server(ctx.data(), &caller, &server_id).await,
    )
    .await
}

/// Admin: change a server's RAM, disk or CPU limits
#[command(slash_command, rename = "update-server-limits", ephemeral, category = "Admin")]
pub async fn update_server_limits(
    ctx: Context<'_>,
    #[description = "Server ID"] server_id: String,
    #[description = "Memory in MB"]
    #[min = 1]
    ram: Option<u64>,
    #[description = "Disk in MB"]
    #[min = 1]
    disk: Option<u64>,
    #[description = "CPU limit in percent"]
    #[min = 1]
    cpu: Option<u64>,
) -> Result<(), Error> {
    ctx.defer_ephemeral().await?;
    let caller = Caller::from_ctx(&ctx);
    respond(
        ctx,
        controllers::update_server_limits(ctx.data(), &caller, &server_id, ram, disk, cpu).await,
    )
    .await
}

/// Admin: ban a user from the bot
#[command(slash_command, rename = "ban-user", ephemeral, category = "Admin")]
pub async fn ban_user(
    ctx: Context<'_>,
    #[description = "User to ban"] user: User,
) -> Result<(), Error> {
    let caller = Caller::from_ctx(&ctx);
    respond(
        ctx,
        controllers::ban_user(ctx.data(), &caller, user.id.get()).await,
    )
    .await
}

/// Admin: lift a ban
#[command(slash_command, rename = "unban-user", ephemeral, category = "Admin")]
pub async fn unban_user(
    ctx: Context<'_>,
    #[description = "User to unban"] user: User,
) -> Result<(), Error> {
    let caller = Caller::from_ctx(&ctx);
    respond(
        ctx,
        controllers::unban_user(ctx.data(), &caller, user.id.get()).await,
    )
    .await
}

/// Admin: list registered users
#[command(slash_command, rename = "list-users", ephemeral, category = "Admin")]
pub async fn list_users(ctx: Context<'_>) -> Result<(), Error> {
    let caller = Caller::from_ctx(&ctx);
    respond(ctx, controllers::list_users(ctx.data(), &caller).await).await
}

/// Admin: list who has been given access to which servers
#[command(slash_command, rename = "list-shared-access", ephemeral, category = "Admin")]
pub async fn list_shared_access(
    ctx: Context<'_>,
    #[description = "Only show grants on this server"] server_id: Option<String>,
) -> Result<(), Error> {
    let caller = Caller::from_ctx(&ctx);
    respond(
        ctx,
        controllers::list_shared_access(ctx.data(), &caller, server_id.as_deref()).await,
    )
    .await
}

/// Admin: list all servers on a node
#[command(slash_command, rename = "servers-on-node", ephemeral, category = "Admin")]
pub async fn servers_on_node(
    ctx: Context<'_>,
    #[description = "Node ID"] node_id: u32,
) -> Result<(), Error> {
    ctx.defer_ephemeral().await?;
    let caller = Caller::from_ctx(&ctx);
    respond(
        ctx,
        controllers::servers_on_node(ctx.data(), &caller, node_id).await,
    )
    .await
}

/// Admin: view all nodes
#[command(slash_command, ephemeral, category = "Admin")]
pub async fn nodes(ctx: Context<'_>) -> Result<(), Error> {
    ctx.defer_ephemeral().await?;
    let caller = Caller::from_ctx(&ctx);
    respond(ctx, controllers::nodes(ctx.data(), &caller).await).await
}

/// Admin: view one node's allocation
#[command(slash_command, rename = "node-status", ephemeral, category = "Admin")]
pub async fn node_status(
    ctx: Context<'_>,
    #[description = "Node ID"] node_id: u32,
) -> Result<(), Error> {
    ctx.defer_ephemeral().await?;
    let caller = Caller::from_ctx(&ctx);
    respond(
        ctx,
        controllers::node_status(ctx.data(), &caller, node_id).await,
    )
    .await
}
