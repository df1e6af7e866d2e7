use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Deserializer};
use snafu::ResultExt as _;

use crate::database::DatabaseConfig;
use crate::error::{ApplicationError, ConfigLoadSnafu};

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(rename = "host_address", default = "default_host")]
    pub host: SocketAddr,
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    /// Front-end build served for every path outside `/api`.
    #[serde(default)]
    pub static_dir: Option<PathBuf>,
    /// How long one observer's views of a video count as one, e.g. `24h`.
    #[serde(default = "default_view_window", deserialize_with = "human_duration")]
    pub view_window: Duration,
    pub jwt_secret: SecretString,
    #[serde(default)]
    pub admin_email: Option<String>,
    #[serde(default)]
    pub admin_password: Option<SecretString>,
}

fn default_host() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 5000))
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_view_window() -> Duration {
    Duration::from_secs(24 * 60 * 60)
}

fn human_duration<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    let raw = String::deserialize(deserializer)?;
    humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
}

/// Reads the configuration from the environment. Database settings use the `SURREAL_` prefix.
pub fn load() -> Result<Config, ApplicationError> {
    let server = envy::from_env::<ServerConfig>().context(ConfigLoadSnafu)?;
    let database = envy::prefixed("SURREAL_")
        .from_env::<DatabaseConfig>()
        .context(ConfigLoadSnafu)?;

    Ok(Config { server, database })
}

#[cfg(test)]
mod tests {
    use secrecy::ExposeSecret as _;

    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect()
    }

    #[test]
    fn defaults() {
        let config: ServerConfig = envy::from_iter(vars(&[("JWT_SECRET", "s3cret")])).unwrap();

        assert_eq!(config.host, "0.0.0.0:5000".parse().unwrap());
        assert_eq!(config.log_dir, PathBuf::from("logs"));
        assert_eq!(config.view_window, Duration::from_secs(86_400));
        assert_eq!(config.jwt_secret.expose_secret(), "s3cret");
        assert!(config.static_dir.is_none());
        assert!(config.admin_email.is_none());
    }

    #[test]
    fn view_window_is_human_readable() {
        let config: ServerConfig =
            envy::from_iter(vars(&[("JWT_SECRET", "s3cret"), ("VIEW_WINDOW", "90m")])).unwrap();
        assert_eq!(config.view_window, Duration::from_secs(90 * 60));

        let broken = envy::from_iter::<_, ServerConfig>(vars(&[("JWT_SECRET", "s"), ("VIEW_WINDOW", "soon")]));
        assert!(broken.is_err());
    }

    #[test]
    fn secret_is_required() {
        assert!(envy::from_iter::<_, ServerConfig>(vars(&[])).is_err());
    }

    #[test]
    fn database_settings_are_prefixed() {
        let config: DatabaseConfig = envy::prefixed("SURREAL_")
            .from_iter(vars(&[("SURREAL_URL", "ws://localhost:8000"), ("SURREAL_USER", "root")]))
            .unwrap();

        assert_eq!(config.url.as_str(), "ws://localhost:8000/");
        assert_eq!(config.namespace, "vrhub");
        assert_eq!(config.username.as_deref(), Some("root"));
        assert!(config.password.is_none());
    }
}
