use crate::error::ConfigError;
use std::{env, fmt::Display, net::SocketAddr, str::FromStr};
use tracing::info;

pub struct Config {
    /// No URL means the process runs against an in-memory store.
    pub database_url: Option<String>,
    pub bind_addr: SocketAddr,
    pub notify_channel: String,
    pub serialize_channels: bool,
    pub max_connections: u32,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let notify_channel: String = try_load(&lookup, "NOTIFY_CHANNEL", "document_changes")?;
        if notify_channel.is_empty()
            || !notify_channel
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(ConfigError::Invalid {
                key: "NOTIFY_CHANNEL",
                value: notify_channel,
                reason: "only ASCII letters, digits and '_' are allowed".to_string(),
            });
        }

        Ok(Self {
            database_url: lookup("DATABASE_URL").filter(|url| !url.is_empty()),
            bind_addr: try_load(&lookup, "BIND_ADDR", "0.0.0.0:8080")?,
            notify_channel,
            serialize_channels: try_load(&lookup, "SERIALIZE_CHANNELS", "true")?,
            max_connections: try_load(&lookup, "DB_MAX_CONNECTIONS", "20")?,
        })
    }
}

fn try_load<T, F>(lookup: &F, key: &'static str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    let value = lookup(key).unwrap_or_else(|| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    value.parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        reason: e.to_string(),
        value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_without_environment() {
        let config = config(&[]).unwrap();
        assert_eq!(config.database_url, None);
        assert_eq!(config.bind_addr, "0.0.0.0:8080".parse().unwrap());
        assert_eq!(config.notify_channel, "document_changes");
        assert!(config.serialize_channels);
        assert_eq!(config.max_connections, 20);
    }

    #[test]
    fn reads_overrides() {
        let config = config(&[
            ("DATABASE_URL", "postgres://localhost/alarms"),
            ("BIND_ADDR", "127.0.0.1:9000"),
            ("SERIALIZE_CHANNELS", "false"),
            ("DB_MAX_CONNECTIONS", "4"),
        ])
        .unwrap();
        assert_eq!(
            config.database_url.as_deref(),
            Some("postgres://localhost/alarms")
        );
        assert_eq!(config.bind_addr.port(), 9000);
        assert!(!config.serialize_channels);
        assert_eq!(config.max_connections, 4);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(config(&[("BIND_ADDR", "nowhere")]).is_err());
        assert!(config(&[("SERIALIZE_CHANNELS", "maybe")]).is_err());
        assert!(config(&[("NOTIFY_CHANNEL", "changes'); DROP TABLE documents; --")]).is_err());
    }
}
