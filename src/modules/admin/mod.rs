pub mod commands;
pub mod controllers;

use crate::{Data, Error};

pub fn commands() -> Vec<poise::Command<Data, Error>> {
    vec![
        commands::create_server(),
        commands::delete_server(),
        commands::suspend_server(),
        commands::unsuspend_server(),
        commands::wipe_server(),
        commands::update_server_limits(),
        commands::ban_user(),
        commands::unban_user(),
        commands::list_users(),
        commands::list_shared_access(),
        commands::servers_on_node(),
        commands::nodes(),
        commands::node_status(),
    ]
}
