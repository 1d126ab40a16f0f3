//! Runtime configuration, read once from the process environment.
//! `main.rs` loads `.env` first, so values may come from either place.

use crate::error::{BotError, Result};
use std::time::Duration;

pub const TOKEN_VAR: &str = "DISCORD_TOKEN";
pub const DATABASE_URL_VAR: &str = "DATABASE_URL";
pub const GUILD_VAR: &str = "GLOBAL_COMMANDS_GUILD_ID";
pub const DATABASE_NAME_VAR: &str = "DATABASE_NAME";
pub const COLLECTION_VAR: &str = "PROFILE_COLLECTION";
pub const CONNECT_TIMEOUT_VAR: &str = "STORAGE_CONNECT_TIMEOUT_SECS";

/// Guild that receives the command declarations unless overridden.
pub const DEFAULT_COMMANDS_GUILD_ID: u64 = 762272028622585866;
pub const DEFAULT_DATABASE_NAME: &str = "Crypto";
pub const DEFAULT_COLLECTION: &str = "Profiles";
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// The two values the bot cannot start without.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub token: String,
    pub database_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotConfig {
    pub credentials: Credentials,
    /// Where slash commands are declared.
    pub commands_guild_id: u64,
    pub database_name: String,
    /// Table holding profile documents.
    pub collection: String,
    pub connect_timeout: Duration,
}

impl BotConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup. Both credentials are checked
    /// together so the error names every missing key at once.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let token = required(TOKEN_VAR);
        let database_url = required(DATABASE_URL_VAR);
        let (token, database_url) = match (token, database_url) {
            (Some(token), Some(database_url)) => (token, database_url),
            (token, database_url) => {
                let missing: Vec<&str> = [
                    (TOKEN_VAR, token.is_none()),
                    (DATABASE_URL_VAR, database_url.is_none()),
                ]
                .into_iter()
                .filter_map(|(key, absent)| absent.then_some(key))
                .collect();
                return Err(BotError::Configuration(format!(
                    "the keys {} are not set in the environment or .env file",
                    missing.join(" and ")
                )));
            }
        };

        let commands_guild_id = match lookup(GUILD_VAR) {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(id) if id != 0 => id,
                _ => {
                    return Err(BotError::Configuration(format!(
                        "{GUILD_VAR} must be a non-zero number, got `{raw}`"
                    )));
                }
            },
            None => DEFAULT_COMMANDS_GUILD_ID,
        };

        let database_name =
            lookup(DATABASE_NAME_VAR).unwrap_or_else(|| DEFAULT_DATABASE_NAME.to_string());

        let collection = lookup(COLLECTION_VAR).unwrap_or_else(|| DEFAULT_COLLECTION.to_string());
        if !is_identifier(&collection) {
            return Err(BotError::Configuration(format!(
                "{COLLECTION_VAR} must be a plain identifier, got `{collection}`"
            )));
        }

        let connect_timeout = match lookup(CONNECT_TIMEOUT_VAR) {
            Some(raw) => raw.trim().parse::<u64>().map_err(|_| {
                BotError::Configuration(format!("{CONNECT_TIMEOUT_VAR} must be seconds, got `{raw}`"))
            })?,
            None => DEFAULT_CONNECT_TIMEOUT_SECS,
        };

        Ok(Self {
            credentials: Credentials {
                token,
                database_url,
            },
            commands_guild_id,
            database_name,
            collection,
            connect_timeout: Duration::from_secs(connect_timeout),
        })
    }
}

/// `[A-Za-z_][A-Za-z0-9_]*`, the only shape accepted as a table name.
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
