// src/config.rs - Configuration: TOML file, .env and environment overrides
use serde::Deserialize;
use std::env;
use std::path::Path;
use std::fs;
use anyhow::{Context, Result};

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub security: SecurityConfig,
    pub logging: LoggingConfig,
    pub layout: LayoutConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
    pub keep_alive: u64,
    pub client_timeout: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SecurityConfig {
    pub allowed_origins: Vec<String>,
    pub max_request_size: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

/// Grid defaults for newly created labs and the bounds every resize is
/// checked against.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LayoutConfig {
    pub default_rows: usize,
    pub default_columns: usize,
    pub max_dimension: usize,
    pub default_os_tags: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            workers: None,
            keep_alive: 30,
            client_timeout: 30,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:labgrid.db".to_string(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout: 30,
        }
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://127.0.0.1:3000".to_string(),
                "http://localhost:8080".to_string(),
            ],
            max_request_size: 1024 * 1024,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            default_rows: 6,
            default_columns: 6,
            max_dimension: 40,
            default_os_tags: vec!["Windows".to_string(), "Linux".to_string(), "Other".to_string()],
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        load_config()
    }

    pub fn validate(&self) -> Result<()> {
        if self.database.max_connections < self.database.min_connections {
            return Err(anyhow::anyhow!(
                "max_connections ({}) must be >= min_connections ({})",
                self.database.max_connections,
                self.database.min_connections
            ));
        }

        let layout = &self.layout;
        if layout.max_dimension == 0 {
            return Err(anyhow::anyhow!("layout.max_dimension must be positive"));
        }
        if layout.default_rows == 0 || layout.default_columns == 0 {
            return Err(anyhow::anyhow!(
                "Default grid must be at least 1x1 (got {}x{})",
                layout.default_rows,
                layout.default_columns
            ));
        }
        if layout.default_rows > layout.max_dimension || layout.default_columns > layout.max_dimension {
            return Err(anyhow::anyhow!(
                "Default grid {}x{} exceeds max_dimension {}",
                layout.default_rows,
                layout.default_columns,
                layout.max_dimension
            ));
        }

        Ok(())
    }

    pub fn print_startup_info(&self) {
        log::info!("🖥️ Lab grid service starting up...");
        log::info!("🌐 Server: {}:{}", self.server.host, self.server.port);
        log::info!("💾 Database: {}",
            if self.database.url.contains("sqlite") { "SQLite" } else { "Unknown" });
        log::info!("📐 Default grid: {}x{} (max {})",
            self.layout.default_rows, self.layout.default_columns, self.layout.max_dimension);
        log::info!("📊 Logging: {} level", self.logging.level);
    }
}

pub fn load_config() -> Result<Config> {
    load_env_file()?;

    let mut config = match env::var("CONFIG_FILE") {
        Ok(config_file) => load_from_path(Path::new(&config_file))?,
        Err(_) => Config::default(),
    };

    override_with(&mut config, |key| env::var(key).ok());

    config.validate()
        .context("Configuration validation failed")?;

    Ok(config)
}

pub fn load_from_path(path: &Path) -> Result<Config> {
    let config_str = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    toml::from_str(&config_str)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Applies overrides from `lookup` (the process environment in production).
/// Unparseable numbers are ignored with a warning.
fn override_with<F>(config: &mut Config, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    fn parsed<T: std::str::FromStr>(key: &str, value: Option<String>) -> Option<T> {
        let raw = value?;
        match raw.parse::<T>() {
            Ok(v) => Some(v),
            Err(_) => {
                log::warn!("Ignoring {}={:?}: not a valid number", key, raw);
                None
            }
        }
    }

    if let Some(host) = lookup("BIND_ADDRESS") {
        config.server.host = host;
    }
    if let Some(port) = parsed("LABGRID_PORT", lookup("LABGRID_PORT")) {
        config.server.port = port;
    }
    if let Some(workers) = parsed("LABGRID_WORKERS", lookup("LABGRID_WORKERS")) {
        config.server.workers = Some(workers);
    }
    if let Some(url) = lookup("DATABASE_URL") {
        config.database.url = url;
    }
    if let Some(max_conn) = parsed("DATABASE_MAX_CONNECTIONS", lookup("DATABASE_MAX_CONNECTIONS")) {
        config.database.max_connections = max_conn;
    }
    if let Some(origins) = lookup("ALLOWED_ORIGINS") {
        config.security.allowed_origins = origins
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
    }
    if let Some(level) = lookup("RUST_LOG") {
        config.logging.level = level;
    }
    if let Some(rows) = parsed("LABGRID_DEFAULT_ROWS", lookup("LABGRID_DEFAULT_ROWS")) {
        config.layout.default_rows = rows;
    }
    if let Some(columns) = parsed("LABGRID_DEFAULT_COLUMNS", lookup("LABGRID_DEFAULT_COLUMNS")) {
        config.layout.default_columns = columns;
    }
    if let Some(max) = parsed("LABGRID_MAX_DIMENSION", lookup("LABGRID_MAX_DIMENSION")) {
        config.layout.max_dimension = max;
    }
}

pub fn load_env_file() -> Result<()> {
    if let Ok(env_file) = env::var("ENV_FILE") {
        dotenvy::from_filename(&env_file)
            .with_context(|| format!("Failed to load environment file: {}", env_file))?;
    } else if Path::new(".env").exists() {
        dotenvy::dotenv().context("Failed to load .env file")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.layout.default_rows, 6);
        assert_eq!(config.layout.default_columns, 6);
        assert_eq!(config.layout.default_os_tags, vec!["Windows", "Linux", "Other"]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();

        config.database.max_connections = 1;
        config.database.min_connections = 5;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.layout.default_rows = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.layout.max_dimension = 4;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_loading() -> Result<()> {
        let toml_content = r#"
        [server]
        host = "0.0.0.0"
        port = 9000

        [layout]
        default_rows = 8
        max_dimension = 12
        "#;

        let mut temp_file = NamedTempFile::new()?;
        temp_file.write_all(toml_content.as_bytes())?;
        temp_file.flush()?;

        let config = load_from_path(temp_file.path())?;
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.layout.default_rows, 8);
        assert_eq!(config.layout.default_columns, 6);
        assert_eq!(config.layout.max_dimension, 12);
        assert_eq!(config.database.url, "sqlite:labgrid.db");
        assert!(config.validate().is_ok());

        Ok(())
    }

    #[test]
    fn test_invalid_toml_is_reported() -> Result<()> {
        let mut temp_file = NamedTempFile::new()?;
        temp_file.write_all(b"[server\nport = ")?;
        assert!(load_from_path(temp_file.path()).is_err());
        assert!(load_from_path(Path::new("/definitely/not/here.toml")).is_err());
        Ok(())
    }

    #[test]
    fn test_env_override() {
        let mut config = Config::default();
        override_with(
            &mut config,
            lookup_from(&[
                ("LABGRID_PORT", "9090"),
                ("LABGRID_WORKERS", "abc"),
                ("DATABASE_URL", "sqlite::memory:"),
                ("ALLOWED_ORIGINS", "http://a.test, ,http://b.test"),
                ("LABGRID_DEFAULT_ROWS", "4"),
                ("LABGRID_MAX_DIMENSION", "20"),
            ]),
        );

        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.workers, None);
        assert_eq!(config.database.url, "sqlite::memory:");
        assert_eq!(config.security.allowed_origins, vec!["http://a.test", "http://b.test"]);
        assert_eq!(config.layout.default_rows, 4);
        assert_eq!(config.layout.max_dimension, 20);
    }
}
