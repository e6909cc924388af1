use std::{collections::HashSet, path::PathBuf, time::Duration};
use thiserror::Error;

use crate::default_struct;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("missing {0}")]
    Missing(&'static str),
    #[error("invalid {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

default_struct! {
/// Values used when an admin provisions a new server.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerDefaults {
    pub egg: u32 = 1,
    pub nest: u32 = 1,
    pub location: u32 = 1,
    pub cpu: u32 = 100,
    pub docker_image: String = "ghcr.io/pterodactyl/yolks:java_17".to_string(),
    pub startup: String = "java -Xms128M -Xmx{{SERVER_MEMORY}}M -jar server.jar".to_string(),
}
}

#[derive(Debug, Clone)]
pub struct Config {
    pub discord_token: String,
    pub panel_url: String,
    pub application_key: String,
    pub client_key: String,
    pub admin_ids: HashSet<u64>,
    pub allowed_domains: Vec<String>,
    pub database_path: PathBuf,
    pub panel_timeout: Duration,
    pub server_defaults: ServerDefaults,
}

impl Config {
    /// Loads `.env` if present, then reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let require = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let application_key = get("PANEL_APPLICATION_KEY")
            .or_else(|| get("API_KEY"))
            .ok_or(ConfigError::Missing("PANEL_APPLICATION_KEY"))?;
        let client_key = get("PANEL_CLIENT_KEY").unwrap_or_else(|| application_key.clone());

        let admin_ids = split_list(get("ADMIN_IDS"))
            .into_iter()
            .map(|id| {
                id.parse::<u64>().map_err(|e| ConfigError::Invalid {
                    key: "ADMIN_IDS",
                    reason: format!("{:?}: {}", id, e),
                })
            })
            .collect::<Result<HashSet<_>, _>>()?;

        let defaults = ServerDefaults::default();
        let server_defaults = ServerDefaults {
            egg: parse_or("SERVER_EGG", get("SERVER_EGG"), defaults.egg)?,
            nest: parse_or("SERVER_NEST", get("SERVER_NEST"), defaults.nest)?,
            location: parse_or("SERVER_LOCATION", get("SERVER_LOCATION"), defaults.location)?,
            cpu: parse_or("SERVER_DEFAULT_CPU", get("SERVER_DEFAULT_CPU"), defaults.cpu)?,
            docker_image: get("SERVER_DOCKER_IMAGE").unwrap_or(defaults.docker_image),
            startup: get("SERVER_STARTUP").unwrap_or(defaults.startup),
        };

        Ok(Self {
            discord_token: require("DISCORD_TOKEN")?,
            panel_url: require("PANEL_URL")?.trim_end_matches('/').to_string(),
            application_key,
            client_key,
            admin_ids,
            allowed_domains: split_list(get("ALLOWED_DOMAINS")),
            database_path: get("DATABASE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("data/panelbot.db")),
            panel_timeout: Duration::from_secs(parse_or(
                "PANEL_TIMEOUT_SECS",
                get("PANEL_TIMEOUT_SECS"),
                15,
            )?),
            server_defaults,
        })
    }

    /// Whether `email` may register. An empty allowlist accepts everything.
    pub fn email_allowed(&self, email: &str) -> bool {
        let email = email.to_lowercase();
        self.allowed_domains.is_empty()
            || self
                .allowed_domains
                .iter()
                .any(|domain| email.ends_with(&domain.to_lowercase()))
    }
}

fn split_list(value: Option<String>) -> Vec<String> {
    value
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

fn parse_or<T>(key: &'static str, value: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        Some(v) => v.parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}
