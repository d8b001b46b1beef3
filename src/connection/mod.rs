//! Connection management for MongoDB
//!
//! This module provides connection management functionality including:
//! - Connection establishment and termination
//! - Connection pool settings
//! - Ping-verified connect with retries

use mongodb::bson::doc;
use mongodb::{Client, Database, options::ClientOptions};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::MongoConfig;
use crate::error::{Result, StoreWriteError};
use crate::utils::sanitize_uri;

/// Base delay between connection attempts; multiplied by the attempt number.
const RETRY_BACKOFF: Duration = Duration::from_millis(500);

/// MongoDB connection manager
///
/// Owns the client and its connection pool for the lifetime of the process.
pub struct ConnectionManager {
    /// MongoDB client instance
    client: Option<Client>,

    /// Connection configuration
    config: MongoConfig,
}

impl ConnectionManager {
    /// Create a new connection manager
    ///
    /// # Arguments
    /// * `config` - MongoDB configuration, including the URI
    ///
    /// # Returns
    /// * `Self` - New connection manager instance
    pub fn new(config: MongoConfig) -> Self {
        Self {
            client: None,
            config,
        }
    }

    /// Establish connection to MongoDB
    ///
    /// # Returns
    /// * `Result<()>` - Success or connection error
    pub async fn connect(&mut self) -> Result<()> {
        info!("Connecting to {}", sanitize_uri(&self.config.uri));

        let options = Self::parse_uri(&self.config.uri).await?;
        let client = self.connect_with_retry(self.configure_pool(options)).await?;
        self.client = Some(client);
        Ok(())
    }

    /// Disconnect from MongoDB
    ///
    /// Closes all pooled connections.
    pub async fn disconnect(&mut self) {
        if let Some(client) = self.client.take() {
            client.shutdown().await;
            debug!("MongoDB client shut down");
        }
    }

    /// Get a database handle
    ///
    /// # Arguments
    /// * `name` - Database name
    ///
    /// # Returns
    /// * `Result<Database>` - Database handle or error
    pub fn get_database(&self, name: &str) -> Result<Database> {
        Ok(self.get_client()?.database(name))
    }

    /// Get the MongoDB client
    ///
    /// # Returns
    /// * `Result<&Client>` - Reference to client or error
    pub fn get_client(&self) -> Result<&Client> {
        self.client
            .as_ref()
            .ok_or_else(|| StoreWriteError::Connection("not connected to MongoDB".into()).into())
    }

    /// Parse connection URI and create client options
    async fn parse_uri(uri: &str) -> std::result::Result<ClientOptions, StoreWriteError> {
        ClientOptions::parse(uri).await.map_err(|e| {
            StoreWriteError::Connection(format!("invalid URI '{}': {}", sanitize_uri(uri), e))
        })
    }

    /// Configure client options with pool settings
    ///
    /// # Arguments
    /// * `options` - Base client options
    ///
    /// # Returns
    /// * `ClientOptions` - Configured options
    fn configure_pool(&self, mut options: ClientOptions) -> ClientOptions {
        let timeout = Duration::from_secs(self.config.timeout);

        options.max_pool_size = Some(self.config.max_pool_size);
        options.min_pool_size = Some(self.config.min_pool_size);
        options.connect_timeout = Some(timeout);
        options.server_selection_timeout = Some(timeout);
        if options.app_name.is_none() {
            options.app_name = Some(app_name());
        }
        options
    }

    /// Attempt connection with retries
    ///
    /// Each attempt builds a client and pings the server.
    async fn connect_with_retry(
        &self,
        options: ClientOptions,
    ) -> std::result::Result<Client, StoreWriteError> {
        let attempts = self.config.retry_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            match Self::try_connect(options.clone()).await {
                Ok(client) => {
                    debug!("Connected to MongoDB on attempt {}", attempt);
                    return Ok(client);
                }
                Err(e) => {
                    warn!("Connection attempt {}/{} failed: {}", attempt, attempts, e);
                    last_error = e.to_string();
                    if attempt < attempts {
                        tokio::time::sleep(RETRY_BACKOFF * attempt).await;
                    }
                }
            }
        }

        Err(StoreWriteError::Connection(last_error))
    }

    async fn try_connect(options: ClientOptions) -> mongodb::error::Result<Client> {
        let client = Client::with_options(options)?;
        client.database("admin").run_command(doc! { "ping": 1 }).await?;
        Ok(client)
    }
}

/// `appName` reported to the server
fn app_name() -> String {
    let host = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string());
    format!("oasis-export@{host}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_new_manager_has_no_client() {
        let manager = ConnectionManager::new(MongoConfig::default());
        assert!(manager.get_client().is_err());
        assert!(manager.get_database("oasis").is_err());
    }

    #[tokio::test]
    async fn test_configure_pool_applies_config() {
        let config = MongoConfig {
            max_pool_size: 7,
            min_pool_size: 1,
            timeout: 5,
            ..MongoConfig::default()
        };
        let manager = ConnectionManager::new(config);
        let options = ConnectionManager::parse_uri("mongodb://localhost:27017")
            .await
            .unwrap();

        let options = manager.configure_pool(options);

        assert_eq!(options.max_pool_size, Some(7));
        assert_eq!(options.min_pool_size, Some(1));
        assert_eq!(options.connect_timeout, Some(Duration::from_secs(5)));
        assert!(options.app_name.unwrap().starts_with("oasis-export@"));
    }

    #[tokio::test]
    async fn test_invalid_uri_fails_connect() {
        let config = MongoConfig {
            uri: "mongodb://".into(),
            retry_attempts: 1,
            ..MongoConfig::default()
        };
        let mut manager = ConnectionManager::new(config);

        let err = manager.connect().await.unwrap_err();
        assert!(matches!(
            err,
            crate::error::ExportError::Store(StoreWriteError::Connection(_))
        ));
        assert!(manager.get_client().is_err());
    }
}
