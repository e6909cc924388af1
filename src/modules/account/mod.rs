pub mod commands;
pub mod controllers;

use crate::{Data, Error};

pub fn commands() -> Vec<poise::Command<Data, Error>> {
    vec![
        commands::create_account(),
        commands::dashboard(),
        commands::list_servers(),
    ]
}
