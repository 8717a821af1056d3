//! Configuration loader
//!
//! Layers built-in defaults, an optional TOML file and `AUDIT_*` environment
//! overrides into an [`AppConfig`].

use config::{Config, Environment, File, FileFormat};
use std::path::Path;
use tracing::info;

use super::AppConfig;
use crate::error::AuditError;

/// Minimum accepted length of the HS256 signing secret
const MIN_SECRET_LEN: usize = 32;

impl AppConfig {
    /// Load configuration from the file named by `AUDIT_CONFIG` (if any) and
    /// the environment.
    pub fn load() -> Result<Self, AuditError> {
        let path = std::env::var("AUDIT_CONFIG").ok();
        Self::load_from(path.as_deref().map(Path::new))
    }

    /// Load configuration with an explicit optional file path
    pub fn load_from(path: Option<&Path>) -> Result<Self, AuditError> {
        let defaults = serde_json::to_string(&AppConfig::default())?;

        let mut builder =
            Config::builder().add_source(File::from_str(&defaults, FileFormat::Json));

        if let Some(path) = path {
            info!("Loading audit configuration from: {:?}", path);
            builder = builder.add_source(File::from(path).format(FileFormat::Toml));
        }

        let settings = builder
            .add_source(
                Environment::with_prefix("AUDIT")
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("auth.admin_roles")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AuditError::Config(format!("Failed to build configuration: {}", e)))?;

        let config: AppConfig = settings
            .try_deserialize()
            .map_err(|e| AuditError::Config(format!("Failed to parse configuration: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the loaded configuration
    pub fn validate(&self) -> Result<(), AuditError> {
        if self.auth.jwt_secret.len() < MIN_SECRET_LEN {
            return Err(AuditError::Config(format!(
                "auth.jwt_secret must be at least {} bytes",
                MIN_SECRET_LEN
            )));
        }

        if self.auth.admin_roles.is_empty() {
            return Err(AuditError::Config(
                "auth.admin_roles must name at least one role".to_string(),
            ));
        }

        if self.writer.max_attempts == 0 {
            return Err(AuditError::Config(
                "writer.max_attempts must be at least 1".to_string(),
            ));
        }

        if self.writer.base_delay_ms > self.writer.max_delay_ms {
            return Err(AuditError::Config(format!(
                "writer.base_delay_ms ({}) > writer.max_delay_ms ({})",
                self.writer.base_delay_ms, self.writer.max_delay_ms
            )));
        }

        if self.writer.store_timeout_ms == 0 {
            return Err(AuditError::Config(
                "writer.store_timeout_ms must be positive".to_string(),
            ));
        }

        if self.query.max_page_size == 0 {
            return Err(AuditError::Config(
                "query.max_page_size must be positive".to_string(),
            ));
        }

        if self.query.default_page_size == 0
            || self.query.default_page_size > self.query.max_page_size
        {
            return Err(AuditError::Config(format!(
                "query.default_page_size ({}) must be within 1..={}",
                self.query.default_page_size, self.query.max_page_size
            )));
        }

        if self.database.max_connections == 0 {
            return Err(AuditError::Config(
                "database.max_connections must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn valid_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.auth.jwt_secret = "0123456789abcdef0123456789abcdef".to_string();
        config
    }

    #[test]
    fn test_defaults_require_secret() {
        assert!(AppConfig::default().validate().is_err());
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_page_size_bounds() {
        let mut config = valid_config();
        config.query.default_page_size = config.query.max_page_size + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_retry_delays_must_be_ordered() {
        let mut config = valid_config();
        config.writer.base_delay_ms = 5_000;
        config.writer.max_delay_ms = 100;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
[server]
port = 8088

[auth]
jwt_secret = "a-very-long-secret-used-only-in-this-test"
admin_roles = ["admin", "compliance"]

[query]
max_page_size = 25
default_page_size = 10
"#
        )
        .unwrap();

        let config = AppConfig::load_from(Some(&path)).unwrap();
        assert_eq!(config.server.port, 8088);
        assert_eq!(config.auth.admin_roles, vec!["admin", "compliance"]);
        assert_eq!(config.query.max_page_size, 25);
        // Untouched sections keep their defaults
        assert_eq!(config.writer.max_attempts, 4);
    }
}
