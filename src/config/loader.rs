//! Configuration loading from disk and the process environment.

use std::fs;
use std::path::Path;

use envconfig::Envconfig;

use crate::config::schema::{ServiceConfig, StoreBackend};
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    /// An environment override carried a value of the wrong shape.
    Env(envconfig::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Env(e) => write!(f, "Environment error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Environment variables read once at startup. Unset variables leave the
/// file (or default) value alone.
#[derive(Debug, Default, Envconfig)]
pub struct EnvOverrides {
    /// Full bind address; wins over `LISTEN_PORT`.
    #[envconfig(from = "LISTEN_ADDRESS")]
    pub listen_address: Option<String>,

    /// Binds every interface on this port.
    #[envconfig(from = "LISTEN_PORT")]
    pub listen_port: Option<u16>,

    #[envconfig(from = "LOG_DIR")]
    pub log_dir: Option<String>,

    #[envconfig(from = "LOG_LEVEL")]
    pub log_level: Option<String>,

    #[envconfig(from = "STORE_BACKEND")]
    pub store_backend: Option<StoreBackend>,

    #[envconfig(from = "STORE_HOST")]
    pub store_host: Option<String>,

    #[envconfig(from = "STORE_PORT")]
    pub store_port: Option<u16>,

    #[envconfig(from = "STORE_USER")]
    pub store_user: Option<String>,

    #[envconfig(from = "STORE_PASSWORD")]
    pub store_password: Option<String>,

    #[envconfig(from = "STORE_DATABASE")]
    pub store_database: Option<String>,

    #[envconfig(from = "SHUTDOWN_GRACE_PERIOD_SECS")]
    pub shutdown_grace_period_secs: Option<u64>,
}

impl EnvOverrides {
    /// Overlay the set variables onto `config`. Empty strings count as unset.
    pub fn apply(self, mut config: ServiceConfig) -> ServiceConfig {
        if let Some(address) = non_empty(self.listen_address) {
            config.listener.bind_address = address;
        } else if let Some(port) = self.listen_port {
            config.listener.bind_address = format!("0.0.0.0:{}", port);
        }

        if let Some(dir) = non_empty(self.log_dir) {
            config.logging.directory = dir;
        }
        if let Some(level) = non_empty(self.log_level) {
            config.logging.level = level;
        }

        if let Some(backend) = self.store_backend {
            config.store.backend = backend;
        }
        if let Some(host) = non_empty(self.store_host) {
            config.store.host = host;
        }
        if let Some(port) = self.store_port {
            config.store.port = port;
        }
        if let Some(user) = non_empty(self.store_user) {
            config.store.user = user;
        }
        if let Some(password) = self.store_password {
            config.store.password = Some(password).filter(|p| !p.is_empty());
        }
        if let Some(database) = non_empty(self.store_database) {
            config.store.database = database;
        }

        if let Some(secs) = self.shutdown_grace_period_secs {
            config.shutdown.grace_period_secs = secs;
        }

        config
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Load configuration for startup.
///
/// Reads the TOML file when a path is given (defaults otherwise), applies the
/// process environment on top, then validates the result.
pub fn load(path: Option<&Path>) -> Result<ServiceConfig, ConfigError> {
    let config = match path {
        Some(path) => parse_file(path)?,
        None => ServiceConfig::default(),
    };

    let overrides = EnvOverrides::init_from_env().map_err(ConfigError::Env)?;
    let config = overrides.apply(config);
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

fn parse_file(path: &Path) -> Result<ServiceConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    toml::from_str(&content).map_err(ConfigError::Parse)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn overrides(pairs: &[(&str, &str)]) -> Result<EnvOverrides, envconfig::Error> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        EnvOverrides::init_from_hashmap(&vars)
    }

    #[test]
    fn env_overrides_store_and_listener() {
        let config = overrides(&[
            ("LISTEN_PORT", "6000"),
            ("LOG_DIR", "/var/log/records"),
            ("STORE_BACKEND", "tidb"),
            ("STORE_HOST", "tidb.internal"),
            ("STORE_PORT", "4001"),
            ("STORE_USER", "svc"),
            ("STORE_DATABASE", "records"),
            ("SHUTDOWN_GRACE_PERIOD_SECS", "3"),
            ("PATH", "/usr/bin"),
        ])
        .unwrap()
        .apply(ServiceConfig::default());

        assert_eq!(config.listener.bind_address, "0.0.0.0:6000");
        assert_eq!(config.logging.directory, "/var/log/records");
        assert_eq!(config.store.backend, StoreBackend::Mysql);
        assert_eq!(config.store.host, "tidb.internal");
        assert_eq!(config.store.port, 4001);
        assert_eq!(config.store.user, "svc");
        assert_eq!(config.store.database, "records");
        assert_eq!(config.shutdown.grace_period_secs, 3);
    }

    #[test]
    fn unset_variables_keep_file_values() {
        let mut base = ServiceConfig::default();
        base.store.host = "from-file".into();

        let config = overrides(&[]).unwrap().apply(base);

        assert_eq!(config.store.host, "from-file");
        assert_eq!(config.logging.directory, "logs");
        assert_eq!(config.listener.bind_address, "0.0.0.0:50051");
    }

    #[test]
    fn empty_log_dir_keeps_default() {
        let config = EnvOverrides {
            log_dir: Some(String::new()),
            ..EnvOverrides::default()
        }
        .apply(ServiceConfig::default());
        assert_eq!(config.logging.directory, "logs");
    }

    #[test]
    fn listen_address_beats_port() {
        let config = overrides(&[("LISTEN_ADDRESS", "127.0.0.1:7000"), ("LISTEN_PORT", "6000")])
            .unwrap()
            .apply(ServiceConfig::default());
        assert_eq!(config.listener.bind_address, "127.0.0.1:7000");
    }

    #[test]
    fn malformed_port_is_rejected() {
        let err = ConfigError::Env(overrides(&[("STORE_PORT", "forty")]).unwrap_err());
        assert!(err.to_string().contains("STORE_PORT"));
    }

    #[test]
    fn load_reads_toml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[listener]\nbind_address = \"127.0.0.1:0\"\n\n[store]\nbackend = \"memory\"\n\n[shutdown]\ngrace_period_secs = 8"
        )
        .unwrap();

        let config = load(Some(file.path())).unwrap();
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.logging.file_prefix, "record-service");
    }

    #[test]
    fn load_without_file_uses_defaults() {
        let config = load(None).unwrap();
        assert_eq!(config.logging.file_prefix, "record-service");
        assert_eq!(config.timeouts.request_secs, 30);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load(Some(Path::new("/definitely/not/here.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[shutdown\ngrace_period_secs = ").unwrap();

        let err = load(Some(file.path())).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn invalid_file_reports_validation() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[listener]\nmax_connections = 0").unwrap();

        let err = load(Some(file.path())).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(ref v) if v.len() == 1));
        assert!(err.to_string().starts_with("Validation failed: "));
    }
}
