//! Configuration management for the server.

use std::env;

use livesync_engine::{MergeStrategy, DEFAULT_ID_FIELD};

use crate::sync::ResourceConfig;

/// Resources of the admin panel, synchronized when none are configured.
pub const DEFAULT_RESOURCES: &str =
    "traders,transactions,deposits,withdrawals,support_tickets,trades,kyc_submissions";

/// Notification channel the change trigger publishes to by default.
pub const DEFAULT_CHANNEL: &str = "livesync_changes";

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host address
    pub host: String,
    /// Server port
    pub port: u16,
    /// PostgreSQL connection URL
    pub database_url: String,
    /// Bearer token required for mutations, when set
    pub auth_secret: Option<String>,
    /// NOTIFY channel carrying row changes
    pub channel: String,
    /// Resources to synchronize
    pub resources: Vec<ResourceConfig>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidPort)?;

        let database_url = env::var("DATABASE_URL").map_err(|_| ConfigError::MissingDatabaseUrl)?;

        let auth_secret = env::var("AUTH_SECRET").ok().filter(|s| !s.is_empty());

        let channel = env::var("LIVESYNC_CHANNEL").unwrap_or_else(|_| DEFAULT_CHANNEL.to_string());

        let id_field =
            env::var("LIVESYNC_ID_FIELD").unwrap_or_else(|_| DEFAULT_ID_FIELD.to_string());

        let strategy = match env::var("LIVESYNC_STRATEGY") {
            Ok(value) => value.parse().map_err(ConfigError::InvalidStrategy)?,
            Err(_) => MergeStrategy::default(),
        };

        let order_by = env::var("LIVESYNC_ORDER_BY").ok().filter(|s| !s.is_empty());

        let mut resources = parse_resources(
            &env::var("LIVESYNC_RESOURCES").unwrap_or_else(|_| DEFAULT_RESOURCES.to_string()),
            &id_field,
            strategy,
        )?;
        if let Some(order_by) = order_by {
            resources = resources
                .into_iter()
                .map(|r| r.with_order_by(order_by.clone()))
                .collect();
        }

        Ok(Self {
            host,
            port,
            database_url,
            auth_secret,
            channel,
            resources,
        })
    }
}

/// Parse a comma separated list of `name` or `name:table` entries.
pub fn parse_resources(
    list: &str,
    id_field: &str,
    strategy: MergeStrategy,
) -> Result<Vec<ResourceConfig>, ConfigError> {
    let resources = list
        .split(',')
        .filter(|entry| !entry.trim().is_empty())
        .map(|entry| {
            ResourceConfig::parse(entry)
                .map(|config| config.with_id_field(id_field).with_strategy(strategy))
                .map_err(ConfigError::InvalidResource)
        })
        .collect::<Result<Vec<_>, _>>()?;

    if resources.is_empty() {
        return Err(ConfigError::NoResources);
    }
    Ok(resources)
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("DATABASE_URL environment variable is required")]
    MissingDatabaseUrl,

    #[error("Invalid PORT value")]
    InvalidPort,

    #[error("Invalid LIVESYNC_STRATEGY: {0}")]
    InvalidStrategy(String),

    #[error("Invalid LIVESYNC_RESOURCES: {0}")]
    InvalidResource(String),

    #[error("LIVESYNC_RESOURCES names no resources")]
    NoResources,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_resources() {
        let resources = parse_resources(DEFAULT_RESOURCES, "id", MergeStrategy::default()).unwrap();
        let names: Vec<_> = resources.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "traders",
                "transactions",
                "deposits",
                "withdrawals",
                "support_tickets",
                "trades",
                "kyc_submissions"
            ]
        );
    }

    #[test]
    fn mapped_resources_share_settings() {
        let resources = parse_resources(
            "tickets:support_tickets, kyc:kyc_submissions,",
            "uuid",
            MergeStrategy::InsertIfAbsent,
        )
        .unwrap();

        assert_eq!(resources.len(), 2);
        assert_eq!(resources[0].table, "support_tickets");
        assert_eq!(resources[1].name, "kyc");
        assert!(resources.iter().all(|r| r.id_field == "uuid"));
        assert!(resources
            .iter()
            .all(|r| r.strategy == MergeStrategy::InsertIfAbsent));
    }

    #[test]
    fn invalid_resources() {
        assert!(matches!(
            parse_resources(" , ", "id", MergeStrategy::default()),
            Err(ConfigError::NoResources)
        ));
        assert!(matches!(
            parse_resources("deposits:", "id", MergeStrategy::default()),
            Err(ConfigError::InvalidResource(_))
        ));
    }
}
