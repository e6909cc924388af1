use poise::command;

use super::controllers;
use crate::utils::{respond, Caller};
use crate::{Context, Error};

/// Create a panel account linked to your Discord account
#[command(slash_command, rename = "create-account", ephemeral, category = "Account")]
pub async fn create_account(
    ctx: Context<'_>,
    #[description = "Email address for the panel account"] email: String,
) -> Result<(), Error> {
    ctx.defer_ephemeral().await?;
    let caller = Caller::from_ctx(&ctx);
    respond(ctx, controllers::create_account(ctx.data(), &caller, &email).await).await
}

/// View your account and servers
#[command(slash_command, ephemeral, category = "Account")]
pub async fn dashboard(ctx: Context<'_>) -> Result<(), Error> {
    let caller = Caller::from_ctx(&ctx);
    respond(ctx, controllers::dashboard(ctx.data(), &caller).await).await
}

/// List the servers you own or can access
#[command(slash_command, rename = "list-servers", ephemeral, category = "Account")]
pub async fn list_servers(ctx: Context<'_>) -> Result<(), Error> {
    let caller = Caller::from_ctx(&ctx);
    respond(ctx, controllers::list_servers(ctx.data(), &caller).await).await
}
