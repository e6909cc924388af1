pub mod commands;
pub mod controllers;

use crate::{Data, Error};

pub fn commands() -> Vec<poise::Command<Data, Error>> {
    vec![
        commands::start(),
        commands::stop(),
        commands::restart(),
        commands::status(),
        commands::server_resources(),
        commands::cmd(),
        commands::server_logs(),
        commands::change_name(),
        commands::reset_server(),
        commands::ip(),
        commands::backup(),
        commands::download_backup(),
        commands::share_access(),
        commands::unshare_access(),
    ]
}
