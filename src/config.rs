use std::env;
use std::path::PathBuf;

use serde::Deserialize;

/// Application settings, layered from `config/base.toml`, the `RUN_MODE`
/// file and `APP__`-prefixed environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub auth: AuthSettings,
    pub uploads: UploadSettings,
    pub grading: GradingSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub workers: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthSettings {
    pub jwt_secret: String,
    pub access_ttl_hours: i64,
    /// First-run admin credentials. When set and no admin row exists yet,
    /// an admin account is created at startup so the admin surface is
    /// reachable on a fresh deployment.
    #[serde(default)]
    pub bootstrap_admin_email: Option<String>,
    #[serde(default)]
    pub bootstrap_admin_password: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadSettings {
    pub staging_dir: PathBuf,
    pub assembled_dir: PathBuf,
    pub max_chunk_bytes: u64,
    pub max_file_bytes: u64,
    pub session_ttl_minutes: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GradingSettings {
    pub base_url: String,
    pub api_key: String,
    pub timeout_secs: u64,
}

impl Settings {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let settings: Settings = config::Config::builder()
            .add_source(config::File::with_name("config/base"))
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), config::ConfigError> {
        if self.server.port == 0 {
            return Err(config::ConfigError::Message("server.port must be non-zero".into()));
        }
        if self.auth.jwt_secret.len() < 32 {
            tracing::warn!("auth.jwt_secret is shorter than 32 characters");
        }
        if self.uploads.max_chunk_bytes == 0 || self.uploads.max_file_bytes < self.uploads.max_chunk_bytes {
            return Err(config::ConfigError::Message(
                "uploads.max_file_bytes must be at least uploads.max_chunk_bytes".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_toml(toml: &str) -> Result<Settings, config::ConfigError> {
        let settings: Settings = config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    const VALID: &str = r#"
        [server]
        host = "127.0.0.1"
        port = 8080
        workers = 1

        [database]
        url = "postgresql://x"
        max_connections = 5

        [auth]
        jwt_secret = "0123456789012345678901234567890123456789"
        access_ttl_hours = 12

        [uploads]
        staging_dir = "/tmp/staging"
        assembled_dir = "/tmp/assembled"
        max_chunk_bytes = 8388608
        max_file_bytes = 524288000
        session_ttl_minutes = 120

        [grading]
        base_url = "http://localhost:9100"
        api_key = ""
        timeout_secs = 300
    "#;

    #[test]
    fn parses_valid_settings() {
        let settings = from_toml(VALID).unwrap();
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.uploads.max_chunk_bytes, 8_388_608);
        assert_eq!(settings.grading.timeout_secs, 300);
    }

    #[test]
    fn bootstrap_admin_credentials_are_optional() {
        let settings = from_toml(VALID).unwrap();
        assert!(settings.auth.bootstrap_admin_email.is_none());

        let with_admin = VALID.replace(
            "access_ttl_hours = 12",
            "access_ttl_hours = 12\n        bootstrap_admin_email = \"admin@example.ac.th\"\n        bootstrap_admin_password = \"change-me-please\"",
        );
        let settings = from_toml(&with_admin).unwrap();
        assert_eq!(
            settings.auth.bootstrap_admin_email.as_deref(),
            Some("admin@example.ac.th")
        );
    }

    #[test]
    fn rejects_file_ceiling_below_chunk_ceiling() {
        let bad = VALID.replace("max_file_bytes = 524288000", "max_file_bytes = 1024");
        assert!(from_toml(&bad).is_err());
    }
}
