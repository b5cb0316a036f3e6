// Runtime configuration, read from the environment (and .env if present).

use std::env;
use thiserror::Error;

const DEFAULT_DATABASE_PATH: &str = "data/mod.db";
const DEFAULT_KEEPALIVE_PORT: u16 = 3000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing {0} environment variable")]
    Missing(&'static str),

    #[error("{key} must be a number, got {value:?}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct BotConfig {
    pub discord_token: String,
    /// Staff channel whose threads carry mod-mail sessions.
    pub modmail_channel_id: u64,
    /// Role granted by `warn` and removed by `clearwarnings`.
    pub warning_role_id: u64,
    pub database_path: String,
    pub keepalive_port: u16,
}

impl BotConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let required = |key: &'static str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or(ConfigError::Missing(key))
        };

        let discord_token = required("DISCORD_TOKEN")?;
        let modmail_channel_id = parse_id("MODMAIL_CHANNEL_ID", required("MODMAIL_CHANNEL_ID")?)?;
        let warning_role_id = parse_id("WARNING_ROLE_ID", required("WARNING_ROLE_ID")?)?;

        let database_path =
            lookup("DATABASE_PATH").unwrap_or_else(|| DEFAULT_DATABASE_PATH.to_string());

        let keepalive_port = match lookup("KEEPALIVE_PORT") {
            Some(value) => value.trim().parse::<u16>().map_err(|_| ConfigError::Invalid {
                key: "KEEPALIVE_PORT",
                value,
            })?,
            None => DEFAULT_KEEPALIVE_PORT,
        };

        Ok(Self {
            discord_token,
            modmail_channel_id,
            warning_role_id,
            database_path,
            keepalive_port,
        })
    }
}

fn parse_id(key: &'static str, value: String) -> Result<u64, ConfigError> {
    match value.parse::<u64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(ConfigError::Invalid { key, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const BASE: [(&str, &str); 3] = [
        ("DISCORD_TOKEN", "token"),
        ("MODMAIL_CHANNEL_ID", "1455174548495536280"),
        ("WARNING_ROLE_ID", "1449102427386019991"),
    ];

    #[test]
    fn test_defaults_apply() {
        let config = BotConfig::from_lookup(lookup_from(&BASE)).unwrap();

        assert_eq!(config.modmail_channel_id, 1455174548495536280);
        assert_eq!(config.warning_role_id, 1449102427386019991);
        assert_eq!(config.database_path, "data/mod.db");
        assert_eq!(config.keepalive_port, 3000);
    }

    #[test]
    fn test_missing_token_is_fatal() {
        let err = BotConfig::from_lookup(lookup_from(&BASE[1..])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("DISCORD_TOKEN")));
    }

    #[test]
    fn test_bad_ids_are_rejected() {
        let mut pairs = BASE.to_vec();
        pairs[1] = ("MODMAIL_CHANNEL_ID", "general");
        let err = BotConfig::from_lookup(lookup_from(&pairs)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "MODMAIL_CHANNEL_ID must be a number, got \"general\""
        );

        let mut pairs = BASE.to_vec();
        pairs.push(("KEEPALIVE_PORT", "99999"));
        assert!(BotConfig::from_lookup(lookup_from(&pairs)).is_err());
    }
}
