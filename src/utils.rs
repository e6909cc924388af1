use poise::serenity_prelude::{
    ButtonStyle, CreateActionRow, CreateButton, CreateInteractionResponse,
};
use poise::CreateReply;
use std::time::Duration;
use tracing::{debug, error, warn};

use crate::error::CommandError;
use crate::modules::ownership::UserId;
use crate::{Context, Error};

/// Discord's limit on message content.
pub const MESSAGE_LIMIT: usize = 2000;

#[macro_export]
macro_rules! default_struct {
    (
        $(#[$struct_meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$field_meta:meta])*
                $field_vis:vis $field:ident : $type:ty $(= $default:expr)?
            ),* $(,)?
        }
    ) => {
        $(#[$struct_meta])*
        $vis struct $name {
            $(
                $(#[$field_meta])*
                $field_vis $field: $type
            ),*
        }

        impl Default for $name {
            fn default() -> Self {
                Self {
                    $(
                        $field: $crate::default_struct!(@default $($default)?)
                    ),*
                }
            }
        }
    };
    (@default) => {
        Default::default()
    };
    (@default $expr:expr) => {
        $expr
    };
}

/// The Discord user invoking a command.
#[derive(Debug, Clone, PartialEq)]
pub struct Caller {
    pub id: UserId,
    pub name: String,
    pub display_name: String,
}

impl Caller {
    pub fn new(id: UserId, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id,
            display_name: name.clone(),
            name,
        }
    }

    pub fn from_ctx(ctx: &Context<'_>) -> Self {
        let author = ctx.author();
        Self {
            id: author.id.get(),
            name: author.name.clone(),
            display_name: author.display_name().to_string(),
        }
    }
}

/// Sends the outcome of a controller as the command's reply.
pub async fn respond(ctx: Context<'_>, outcome: Result<String, CommandError>) -> Result<(), Error> {
    let content = match outcome {
        Ok(content) => content,
        Err(e) => {
            let command = &ctx.command().qualified_name;
            match &e {
                CommandError::Unauthorized(denial) => {
                    debug!("{} denied for {}: {}", command, ctx.author().id, denial)
                }
                CommandError::RemoteOperationFailed { action, source } => {
                    warn!("{} could not {}: {}", command, action, source)
                }
                CommandError::Storage(source) => error!("{} storage failure: {}", command, source),
                other => debug!("{} rejected: {}", command, other),
            }
            e.user_message()
        }
    };

    ctx.say(truncate(&content, MESSAGE_LIMIT)).await?;
    Ok(())
}

/// Asks the invoker to confirm a destructive action with a button.
///
/// Returns `false` when the prompt is cancelled or times out; the prompt is
/// edited either way so the buttons can't be pressed twice.
pub async fn confirm(ctx: Context<'_>, prompt: String, label: &str) -> Result<bool, Error> {
    let buttons = CreateActionRow::Buttons(vec![
        CreateButton::new("confirm")
            .style(ButtonStyle::Danger)
            .label(label),
        CreateButton::new("cancel")
            .style(ButtonStyle::Secondary)
            .label("Cancel"),
    ]);

    let reply = ctx
        .send(
            CreateReply::default()
                .ephemeral(true)
                .content(prompt)
                .components(vec![buttons]),
        )
        .await?;

    let interaction = reply
        .message()
        .await?
        .await_component_interaction(ctx.serenity_context())
        .author_id(ctx.author().id)
        .timeout(Duration::from_secs(30))
        .await;

    let (confirmed, status) = match interaction {
        Some(interaction) => {
            interaction
                .create_response(ctx, CreateInteractionResponse::Acknowledge)
                .await?;
            if interaction.data.custom_id == "confirm" {
                (true, "⏳ Working on it...")
            } else {
                (false, "❌ Cancelled.")
            }
        }
        None => (false, "❌ Operation timed out"),
    };

    reply
        .edit(
            ctx,
            CreateReply::default().content(status).components(vec![]),
        )
        .await?;

    Ok(confirmed)
}

/// Cuts `text` to at most `limit` bytes on a char boundary, marking the cut.
pub fn truncate(text: &str, limit: usize) -> String {
    if text.len() <= limit {
        return text.to_string();
    }
    const MARKER: &str = "\n…";
    let mut cut = limit.saturating_sub(MARKER.len());
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}{}", &text[..cut], MARKER)
}

/// The last `n` lines of `text`.
pub fn tail_lines(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].join("\n")
}

pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut value = bytes as f64;
    let mut unit_idx = 0;

    while value >= 1024.0 && unit_idx < UNITS.len() - 1 {
        value /= 1024.0;
        unit_idx += 1;
    }

    format!("{:.1} {}", value, UNITS[unit_idx])
}

pub fn format_duration_ms(millis: u64) -> String {
    let secs = millis / 1000;
    let days = secs / 86400;
    let hours = (secs % 86400) / 3600;
    let mins = (secs % 3600) / 60;

    if days > 0 {
        format!("{}d {}h", days, hours)
    } else if hours > 0 {
        format!("{}h {}m", hours, mins)
    } else {
        format!("{}m", mins)
    }
}

/// Renders ids as a code block, or `none` when empty.
pub fn code_list<I, S>(items: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let items: Vec<String> = items.into_iter().map(|s| s.as_ref().to_string()).collect();
    if items.is_empty() {
        "> none".to_string()
    } else {
        format!("```\n{}\n```", items.join("\n"))
    }
}
