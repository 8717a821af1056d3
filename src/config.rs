pub mod loader;

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub service_name: String,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub writer: WriterConfig,
    pub query: QueryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub busy_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub issuer: String,
    /// Roles that the Access Gate treats as administrative
    pub admin_roles: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriterConfig {
    /// Attempts per append, including the first one
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub store_timeout_ms: u64,
    pub redelivery_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    pub default_page_size: u32,
    pub max_page_size: u32,
}

impl WriterConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    pub fn redelivery_interval(&self) -> Duration {
        Duration::from_secs(self.redelivery_interval_secs)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            service_name: "audit-trail".to_string(),
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
            },
            database: DatabaseConfig {
                url: "sqlite://audit.db".to_string(),
                max_connections: 8,
                busy_timeout_ms: 5_000,
            },
            auth: AuthConfig {
                jwt_secret: String::new(),
                issuer: "audit-trail".to_string(),
                admin_roles: vec!["admin".to_string()],
            },
            writer: WriterConfig {
                max_attempts: 4,
                base_delay_ms: 100,
                max_delay_ms: 2_000,
                store_timeout_ms: 5_000,
                redelivery_interval_secs: 30,
            },
            query: QueryConfig {
                default_page_size: 50,
                max_page_size: 200,
            },
        }
    }
}
