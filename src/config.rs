use config::{Config, ConfigError as LoadError, Environment, File};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur while loading, editing or saving the configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] LoadError),

    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unknown configuration key '{0}'")]
    UnknownKey(String),

    #[error("Invalid value '{value}' for '{key}': {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error("Could not determine the user configuration directory")]
    NoConfigDir,
}

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub connection: ConnectionSettings,
    pub tunnel: TunnelSettings,
    pub tally: TallySettings,
    pub forms: FormSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConnectType {
    #[default]
    Regular,
    SshTunnel,
}

impl fmt::Display for ConnectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectType::Regular => f.write_str("regular"),
            ConnectType::SshTunnel => f.write_str("ssh-tunnel"),
        }
    }
}

impl FromStr for ConnectType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "regular" => Ok(ConnectType::Regular),
            "ssh-tunnel" => Ok(ConnectType::SshTunnel),
            other => Err(format!("expected 'regular' or 'ssh-tunnel', got '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionSettings {
    pub connect_type: ConnectType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_connections: Option<u32>,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            connect_type: ConnectType::Regular,
            driver: Some(default_driver()),
            user: None,
            host: None,
            port: None,
            database: None,
            max_connections: None,
        }
    }
}

fn default_driver() -> String {
    "postgres".to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TunnelSettings {
    /// SSH host; falls back to the database host
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    /// Private key file; password authentication is used without one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TallySettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub out_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormSettings {
    pub compiler: String,
    pub args: Vec<String>,
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub source_extension: String,
    pub prefix: String,
    pub extension: String,
}

impl Default for FormSettings {
    fn default() -> Self {
        Self {
            compiler: "pyside6-uic".to_string(),
            args: vec!["{input}".to_string(), "-o".to_string(), "{output}".to_string()],
            input_dir: PathBuf::from("ui"),
            output_dir: PathBuf::from("compiled_ui_files"),
            source_extension: "ui".to_string(),
            prefix: "ui_".to_string(),
            extension: "py".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "compact".to_string() }

/// Keys that can be edited with `memmer config set`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    ConnectType,
    Driver,
    DbUser,
    DbHost,
    DbPort,
    DbName,
    SshHost,
    SshUser,
    SshPort,
    SshKey,
    TallyDir,
}

impl ConfigKey {
    pub const ALL: [ConfigKey; 11] = [
        ConfigKey::ConnectType,
        ConfigKey::Driver,
        ConfigKey::DbUser,
        ConfigKey::DbHost,
        ConfigKey::DbPort,
        ConfigKey::DbName,
        ConfigKey::SshHost,
        ConfigKey::SshUser,
        ConfigKey::SshPort,
        ConfigKey::SshKey,
        ConfigKey::TallyDir,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ConfigKey::ConnectType => "connection.connect_type",
            ConfigKey::Driver => "connection.driver",
            ConfigKey::DbUser => "connection.user",
            ConfigKey::DbHost => "connection.host",
            ConfigKey::DbPort => "connection.port",
            ConfigKey::DbName => "connection.database",
            ConfigKey::SshHost => "tunnel.host",
            ConfigKey::SshUser => "tunnel.user",
            ConfigKey::SshPort => "tunnel.port",
            ConfigKey::SshKey => "tunnel.key",
            ConfigKey::TallyDir => "tally.out_dir",
        }
    }
}

impl FromStr for ConfigKey {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ConfigKey::ALL
            .into_iter()
            .find(|k| k.name() == s)
            .ok_or_else(|| ConfigError::UnknownKey(s.to_string()))
    }
}

/// `None` for empty strings
fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn parse_port(key: ConfigKey, value: &str) -> Result<Option<u16>, ConfigError> {
    non_empty(value)
        .map(|v| {
            v.parse::<u16>().map_err(|e| ConfigError::InvalidValue {
                key: key.name().to_string(),
                value: v.clone(),
                reason: e.to_string(),
            })
        })
        .transpose()
}

impl Settings {
    /// Load configuration from files and environment variables
    ///
    /// Configuration is loaded in the following order (later overrides earlier):
    /// 1. Default values in the struct
    /// 2. Configuration files (config/default.toml, config/local.toml)
    /// 3. The user configuration file (or `path` if given)
    /// 4. Environment variables (prefixed with MEMMER__)
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let user_file = match path {
            Some(p) => Some(p.to_path_buf()),
            None => default_config_path().ok(),
        };

        let mut builder = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false));

        if let Some(file) = &user_file {
            // An explicitly given file has to exist
            builder = builder.add_source(File::from(file.as_path()).required(path.is_some()));
        }

        let settings = builder
            // e.g., MEMMER__CONNECTION__HOST -> connection.host
            .add_source(
                Environment::with_prefix("MEMMER")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut settings: Settings = settings.try_deserialize()?;
        settings.apply_libpq_env();

        Ok(settings)
    }

    /// Fill unset connection values from the standard PostgreSQL variables
    fn apply_libpq_env(&mut self) {
        use std::env;

        let conn = &mut self.connection;
        if conn.host.is_none() {
            conn.host = env::var("PGHOST").ok();
        }
        if conn.user.is_none() {
            conn.user = env::var("PGUSER").ok();
        }
        if conn.database.is_none() {
            conn.database = env::var("PGDATABASE").ok();
        }
        if conn.port.is_none() {
            conn.port = env::var("PGPORT").ok().and_then(|p| p.parse().ok());
        }
    }

    /// Write the settings as TOML to the user configuration file (or `path`)
    pub fn save(&self, path: Option<&Path>) -> Result<PathBuf, ConfigError> {
        let target = match path {
            Some(p) => p.to_path_buf(),
            None => default_config_path()?,
        };

        if let Some(parent) = target.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        std::fs::write(&target, toml::to_string_pretty(self)?)?;
        tracing::info!("Saved configuration to {}", target.display());

        Ok(target)
    }

    pub fn get(&self, key: ConfigKey) -> Option<String> {
        match key {
            ConfigKey::ConnectType => Some(self.connection.connect_type.to_string()),
            ConfigKey::Driver => self.connection.driver.clone(),
            ConfigKey::DbUser => self.connection.user.clone(),
            ConfigKey::DbHost => self.connection.host.clone(),
            ConfigKey::DbPort => self.connection.port.map(|p| p.to_string()),
            ConfigKey::DbName => self.connection.database.clone(),
            ConfigKey::SshHost => self.tunnel.host.clone(),
            ConfigKey::SshUser => self.tunnel.user.clone(),
            ConfigKey::SshPort => self.tunnel.port.map(|p| p.to_string()),
            ConfigKey::SshKey => self.tunnel.key.as_ref().map(|k| k.display().to_string()),
            ConfigKey::TallyDir => self.tally.out_dir.as_ref().map(|d| d.display().to_string()),
        }
    }

    /// Set a value from its string form; an empty value clears optional keys
    pub fn set(&mut self, key: ConfigKey, value: &str) -> Result<(), ConfigError> {
        match key {
            ConfigKey::ConnectType => {
                self.connection.connect_type = match non_empty(value) {
                    None => ConnectType::default(),
                    Some(v) => v.parse().map_err(|reason| ConfigError::InvalidValue {
                        key: key.name().to_string(),
                        value: v.clone(),
                        reason,
                    })?,
                }
            }
            ConfigKey::Driver => self.connection.driver = non_empty(value),
            ConfigKey::DbUser => self.connection.user = non_empty(value),
            ConfigKey::DbHost => self.connection.host = non_empty(value),
            ConfigKey::DbPort => self.connection.port = parse_port(key, value)?,
            ConfigKey::DbName => self.connection.database = non_empty(value),
            ConfigKey::SshHost => self.tunnel.host = non_empty(value),
            ConfigKey::SshUser => self.tunnel.user = non_empty(value),
            ConfigKey::SshPort => self.tunnel.port = parse_port(key, value)?,
            ConfigKey::SshKey => self.tunnel.key = non_empty(value).map(PathBuf::from),
            ConfigKey::TallyDir => self.tally.out_dir = non_empty(value).map(PathBuf::from),
        }

        Ok(())
    }
}

/// `<config dir>/memmer/config.toml`
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    dirs::config_dir()
        .map(|dir| dir.join("memmer").join("config.toml"))
        .ok_or(ConfigError::NoConfigDir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_logging() {
        let level = default_log_level();
        let format = default_log_format();
        assert_eq!(level, "info");
        assert_eq!(format, "compact");
    }

    #[test]
    fn test_default_forms() {
        let forms = FormSettings::default();
        assert_eq!(forms.compiler, "pyside6-uic");
        assert_eq!(forms.prefix, "ui_");
        assert_eq!(forms.args, vec!["{input}", "-o", "{output}"]);
    }

    #[test]
    fn test_set_and_get() {
        let mut settings = Settings::default();

        settings.set(ConfigKey::DbPort, "5433").unwrap();
        settings.set(ConfigKey::ConnectType, "SSH-Tunnel").unwrap();
        settings.set(ConfigKey::SshKey, "/home/me/.ssh/id_ed25519").unwrap();

        assert_eq!(settings.connection.port, Some(5433));
        assert_eq!(settings.connection.connect_type, ConnectType::SshTunnel);
        assert_eq!(settings.get(ConfigKey::ConnectType).as_deref(), Some("ssh-tunnel"));
        assert_eq!(
            settings.get(ConfigKey::SshKey).as_deref(),
            Some("/home/me/.ssh/id_ed25519")
        );

        // Empty value clears
        settings.set(ConfigKey::DbPort, "").unwrap();
        assert_eq!(settings.connection.port, None);
    }

    #[test]
    fn test_invalid_port() {
        let mut settings = Settings::default();
        assert!(matches!(
            settings.set(ConfigKey::SshPort, "not-a-port"),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut settings = Settings::default();
        settings.set(ConfigKey::DbHost, "db.example.org").unwrap();
        settings.set(ConfigKey::SshUser, "admin").unwrap();
        settings.save(Some(&path)).unwrap();

        let loaded = Settings::load(Some(&path)).unwrap();
        assert_eq!(loaded.connection.host.as_deref(), Some("db.example.org"));
        assert_eq!(loaded.tunnel.user.as_deref(), Some("admin"));
        assert_eq!(loaded.forms, FormSettings::default());
    }

    #[test]
    fn test_explicit_config_file_must_exist() {
        let dir = tempfile::TempDir::new().unwrap();
        assert!(Settings::load(Some(&dir.path().join("missing.toml"))).is_err());
    }

    #[test]
    fn test_key_names_round_trip() {
        for key in ConfigKey::ALL {
            assert_eq!(key.name().parse::<ConfigKey>().unwrap(), key);
        }
        assert!("connection.password".parse::<ConfigKey>().is_err());
    }
}
