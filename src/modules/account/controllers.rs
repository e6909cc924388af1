use tracing::info;

use crate::error::{CommandError, RemoteContext};
use crate::modules::auth::Permission;
use crate::modules::panel::models::NewAccount;
use crate::utils::{code_list, Caller};
use crate::Data;

const NO_ACCOUNT: &str = "You have not created an account yet. Use `/create-account`.";

fn valid_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.contains(char::is_whitespace)
        }
        None => false,
    }
}

pub async fn create_account(data: &Data, caller: &Caller, email: &str) -> Result<String, CommandError> {
    let store = &data.dbs.ownership;
    let existing = data
        .gate
        .authorize(store, caller.id, Permission::SelfService)
        .await?;

    let email = email.trim();
    if !valid_email(email) {
        return Err(CommandError::invalid("That doesn't look like an email address."));
    }
    if !data.config.email_allowed(email) {
        return Err(CommandError::invalid("Email domain is not allowed."));
    }
    if existing.is_some() {
        return Err(CommandError::AlreadyExists(
            "You already have an account linked.".to_string(),
        ));
    }

    let first_name = caller
        .display_name
        .split_whitespace()
        .next()
        .unwrap_or(&caller.name)
        .to_string();
    let account = data
        .panel
        .create_account(&NewAccount {
            username: caller.name.to_lowercase(),
            email: email.to_string(),
            first_name,
            last_name: "discord".to_string(),
        })
        .await
        .failed_to("create your account. Contact an admin")?;

    store.register_user(caller.id, account.id, email).await?;
    info!("Registered {} as panel account {}", caller.id, account.id);

    Ok(format!(
        "✅ Account created for `{}`. You can now manage servers.",
        email
    ))
}

pub async fn dashboard(data: &Data, caller: &Caller) -> Result<String, CommandError> {
    let store = &data.dbs.ownership;
    let user = data
        .gate
        .authorize(store, caller.id, Permission::SelfService)
        .await?
        .ok_or_else(|| CommandError::not_found(NO_ACCOUNT))?;

    let owned = store.list_owned(caller.id).await?;
    let shared = store.list_shared(caller.id).await?;

    Ok(format!(
        "📦 **Your Dashboard**\n> Panel account: `#{}`\n> Email: `{}`\n> Registered <t:{}:R>\n\n🖥️ **Your Servers:** {}\n{}\n🔗 **Shared Servers:** {}\n{}",
        user.panel_id,
        user.email,
        user.registered_at.timestamp(),
        owned.len(),
        code_list(&owned),
        shared.len(),
        code_list(&shared),
    ))
}

pub async fn list_servers(data: &Data, caller: &Caller) -> Result<String, CommandError> {
    let store = &data.dbs.ownership;
    data.gate
        .authorize(store, caller.id, Permission::SelfService)
        .await?
        .ok_or_else(|| CommandError::not_found(NO_ACCOUNT))?;

    let mut owned = Vec::new();
    for server_id in store.list_owned(caller.id).await? {
        let label = match store.get_server(&server_id).await? {
            Some(record) if record.name.is_some() => format!("{} ({})", server_id, record.label()),
            _ => server_id,
        };
        owned.push(label);
    }
    let shared = store.list_shared(caller.id).await?;

    if owned.is_empty() && shared.is_empty() {
        return Ok("📭 You don't have any servers yet.".to_string());
    }

    Ok(format!(
        "🖥️ **Owned ({})**\n{}\n🔗 **Shared with you ({})**\n{}",
        owned.len(),
        code_list(&owned),
        shared.len(),
        code_list(&shared),
    ))
}
