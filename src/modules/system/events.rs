use async_trait::async_trait;
use poise::serenity_prelude::{ActivityData, Context, FullEvent, OnlineStatus};
use tracing::info;

use crate::events::EventHandler;
use crate::Error;

/// Sets the bot's presence to the panel it manages once the gateway is up.
#[derive(Debug, Clone)]
pub struct ReadyHandler {
    panel_host: String,
}

impl ReadyHandler {
    pub fn new(panel_host: impl Into<String>) -> Self {
        Self {
            panel_host: panel_host.into(),
        }
    }

    /// `https://panel.example.com/` becomes `panel.example.com`.
    pub fn from_url(panel_url: &str) -> Self {
        let host = panel_url
            .split_once("://")
            .map_or(panel_url, |(_, rest)| rest)
            .trim_end_matches('/');
        Self::new(host)
    }

    pub fn status_text(&self) -> String {
        format!("over {}", self.panel_host)
    }
}

#[async_trait]
impl EventHandler for ReadyHandler {
    fn name(&self) -> &str {
        "Ready"
    }

    async fn handle(&self, ctx: &Context, event: &FullEvent) -> Result<(), Error> {
        if let FullEvent::Ready { data_about_bot } = event {
            info!(
                "Connected as {} in {} guilds",
                data_about_bot.user.name,
                data_about_bot.guilds.len()
            );
            ctx.set_presence(
                Some(ActivityData::watching(self.status_text())),
                OnlineStatus::Online,
            )
        }
        Ok(())
    }

    fn box_clone(&self) -> Box<dyn EventHandler> {
        Box::new(self.clone())
    }
}
