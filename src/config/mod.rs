use anyhow::Context;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub events_database: DatabaseConfig,
    pub geoip: GeoIpConfig,
    pub views: ViewConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub backend: DatabaseBackend,
    pub url: String,
    #[serde(default = "DatabaseConfig::default_max_connections")]
    pub max_connections: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    Sqlite,
    Postgres,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeoIpConfig {
    /// Path to a MaxMind GeoLite2-City or GeoIP2-City .mmdb file.
    /// When unset or unreadable, enrichment is disabled.
    pub city_db_path: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ViewConfig {
    #[serde(default)]
    pub refresh: ViewRefresh,
}

/// When the per-user view is (re)created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewRefresh {
    /// Create-or-replace on every aggregate query.
    #[default]
    Always,
    /// Create-or-replace once per user for the lifetime of the process.
    Once,
}

impl DatabaseConfig {
    const fn default_max_connections() -> u32 {
        5
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let backend_str =
            std::env::var("EVENTS_DATABASE_BACKEND").unwrap_or_else(|_| "sqlite".to_string());

        let backend = match backend_str.to_lowercase().as_str() {
            "postgres" | "postgresql" => DatabaseBackend::Postgres,
            _ => DatabaseBackend::Sqlite,
        };

        let database_url = std::env::var("EVENTS_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./hopcount-events.db".to_string());

        let max_connections = match std::env::var("EVENTS_DATABASE_MAX_CONNECTIONS") {
            Ok(v) => v
                .parse::<u32>()
                .with_context(|| format!("EVENTS_DATABASE_MAX_CONNECTIONS is not a number: {v}"))?,
            Err(_) => DatabaseConfig::default_max_connections(),
        };

        let city_db_path = std::env::var("GEOIP_CITY_DB_PATH")
            .ok()
            .filter(|p| !p.trim().is_empty());

        let refresh = match std::env::var("VIEW_REFRESH")
            .unwrap_or_else(|_| "always".to_string())
            .to_lowercase()
            .as_str()
        {
            "always" => ViewRefresh::Always,
            "once" => ViewRefresh::Once,
            other => {
                tracing::warn!(
                    "Unknown VIEW_REFRESH '{other}', falling back to 'always'. Supported values: always, once"
                );
                ViewRefresh::Always
            }
        };

        Ok(Config {
            events_database: DatabaseConfig {
                backend,
                url: database_url,
                max_connections,
            },
            geoip: GeoIpConfig { city_db_path },
            views: ViewConfig { refresh },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_view_refresh_deserializes_lowercase() {
        let refresh: ViewRefresh = serde_json::from_str("\"once\"").unwrap();
        assert_eq!(refresh, ViewRefresh::Once);
        assert_eq!(ViewRefresh::default(), ViewRefresh::Always);
    }

    #[test]
    fn test_database_config_default_connections() {
        let config: DatabaseConfig =
            serde_json::from_str(r#"{"backend":"postgres","url":"postgres://localhost/events"}"#)
                .unwrap();
        assert_eq!(config.backend, DatabaseBackend::Postgres);
        assert_eq!(config.max_connections, 5);
    }
}
