use config::Config;
use databases::Databases;
use error::CommandError;
use events::EventManager;
use modules::{
    auth::{AuthorizationGate, Permission},
    panel::{Panel, PanelApi},
    system::events::ReadyHandler,
};
use poise::serenity_prelude::{self as serenity, CreateAllowedMentions};
use std::sync::Arc;
use tracing::{error, info, trace};
use tracing_subscriber::EnvFilter;

mod config;
mod database;
mod databases;
mod error;
mod events;
mod migrations;
mod modules;
#[cfg(test)]
mod test_support;
mod utils;

#[derive(Clone, Debug)]
pub struct Data {
    pub dbs: Arc<Databases>,
    pub panel: Arc<dyn PanelApi>,
    pub gate: Arc<AuthorizationGate>,
    pub config: Arc<Config>,
    pub event_manager: Arc<EventManager>,
}

type Error = Box<dyn std::error::Error + Send + Sync>;
type Context<'a> = poise::Context<'a, Data, Error>;

/// Re-register slash commands (bot admins only)
#[poise::command(slash_command, ephemeral)]
async fn register(ctx: Context<'_>) -> Result<(), Error> {
    let data = ctx.data();
    if let Err(e) = data
        .gate
        .authorize(&data.dbs.ownership, ctx.author().id.get(), Permission::Admin)
        .await
    {
        ctx.say(CommandError::from(e).user_message()).await?;
        return Ok(());
    }
    poise::builtins::register_application_commands_buttons(ctx).await?;
    Ok(())
}

fn commands() -> Vec<poise::Command<Data, Error>> {
    let mut commands = vec![register()];
    commands.extend(modules::account::commands());
    commands.extend(modules::servers::commands());
    commands.extend(modules::admin::commands());
    commands
}

fn location(ctx: Context<'_>) -> String {
    ctx.guild_id()
        .map_or_else(|| "DM".to_string(), |id| id.to_string())
}

async fn run() -> Result<(), Error> {
    let config = Config::from_env()?;
    let dbs = Databases::open(&config.database_path).await?;

    let panel = Panel::from_config(&config)?;
    let gate = AuthorizationGate::new(config.admin_ids.clone());
    if config.admin_ids.is_empty() {
        info!("no ADMIN_IDS configured, admin commands are disabled");
    }

    let event_manager = Arc::new(EventManager::new());
    event_manager
        .add_handler(ReadyHandler::from_url(&config.panel_url))
        .await;

    let token = config.discord_token.clone();
    let data = Data {
        dbs: Arc::new(dbs),
        panel: Arc::new(panel),
        gate: Arc::new(gate),
        config: Arc::new(config),
        event_manager,
    };

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions::<Data, Error> {
            allowed_mentions: Some(CreateAllowedMentions::new().empty_roles().empty_users()),
            commands: commands(),
            pre_command: |ctx| {
                Box::pin(async move {
                    trace!(
                        "Command {} used by {} in {}",
                        ctx.command().qualified_name,
                        ctx.author().tag(),
                        location(ctx)
                    );
                })
            },
            post_command: |ctx| {
                Box::pin(async move {
                    info!(
                        "Command {} completed for {} in {}",
                        ctx.command().qualified_name,
                        ctx.author().tag(),
                        location(ctx)
                    );
                })
            },
            on_error: |error| {
                Box::pin(async move {
                    match error {
                        poise::FrameworkError::Command { error, ctx, .. } => {
                            error!(
                                "Command {} failed for {} in {}: {:?}",
                                ctx.command().qualified_name,
                                ctx.author().tag(),
                                location(ctx),
                                error
                            );
                            let reply = "❌ Something went wrong on our side. Please try again later.";
                            if let Err(e) = ctx.say(reply).await {
                                error!("Could not report failure: {}", e);
                            }
                        }
                        err => {
                            if let Err(e) = poise::builtins::on_error(err).await {
                                error!("Other framework error: {}", e);
                            }
                        }
                    }
                })
            },
            event_handler: |ctx, event, _framework, data| {
                Box::pin(async move {
                    data.event_manager.handle_event(ctx, event).await;
                    Ok(())
                })
            },
            ..Default::default()
        })
        .setup(move |ctx, _ready, framework| {
            Box::pin(async move {
                info!("registering commands");
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;
                Ok(data)
            })
        })
        .build();

    let intents = serenity::GatewayIntents::non_privileged();
    let mut client = serenity::ClientBuilder::new(token, intents)
        .framework(framework)
        .await?;

    client.start().await?;
    Ok(())
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    info!("starting panelbot");

    if let Err(e) = run().await {
        error!("panelbot stopped: {}", e);
        std::process::exit(1);
    }
}
