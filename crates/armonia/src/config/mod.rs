use crate::tenancy::{SchemaName, TenancyError, TenantDirectory};
use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

const DEFAULT_MINUTES_SIGNATURES: u32 = 2;
const DEFAULT_DOCUMENTS_BASE_URL: &str = "/api/documents";

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub tenancy: TenancyConfig,
    pub assembly: AssemblyConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let format = LogFormat::from_str(&env::var("APP_LOG_FORMAT").unwrap_or_default());

        let allowed_schemas = match env::var("ARMONIA_TENANTS") {
            Ok(raw) if !raw.trim().is_empty() => Some(parse_tenants(&raw)?),
            _ => None,
        };

        let signatures_required = match env::var("ARMONIA_MINUTES_SIGNATURES") {
            Ok(raw) => raw
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|value| *value >= 1)
                .ok_or(ConfigError::InvalidSignatureCount)?,
            Err(_) => DEFAULT_MINUTES_SIGNATURES,
        };

        let documents_base_url = env::var("ARMONIA_DOCUMENTS_BASE_URL")
            .map(|raw| raw.trim_end_matches('/').to_string())
            .unwrap_or_else(|_| DEFAULT_DOCUMENTS_BASE_URL.to_string());

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level, format },
            tenancy: TenancyConfig { allowed_schemas },
            assembly: AssemblyConfig {
                signatures_required,
                documents_base_url,
            },
        })
    }
}

fn parse_tenants(raw: &str) -> Result<Vec<SchemaName>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            SchemaName::parse(entry).map_err(|source| ConfigError::InvalidTenant {
                value: entry.to_string(),
                source,
            })
        })
        .collect()
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub format: LogFormat,
}

/// Output encoding for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

impl LogFormat {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Compact,
        }
    }
}

/// Optional allow-list of tenant schemas served by this instance.
#[derive(Debug, Clone, Default)]
pub struct TenancyConfig {
    pub allowed_schemas: Option<Vec<SchemaName>>,
}

impl TenancyConfig {
    pub fn directory(&self) -> Option<TenantDirectory> {
        self.allowed_schemas
            .as_ref()
            .map(|schemas| TenantDirectory::new(schemas.iter().cloned()))
    }
}

/// Assembly minutes and document settings.
#[derive(Debug, Clone)]
pub struct AssemblyConfig {
    pub signatures_required: u32,
    pub documents_base_url: String,
}

impl Default for AssemblyConfig {
    fn default() -> Self {
        Self {
            signatures_required: DEFAULT_MINUTES_SIGNATURES,
            documents_base_url: DEFAULT_DOCUMENTS_BASE_URL.to_string(),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidTenant { value: String, source: TenancyError },
    InvalidSignatureCount,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidTenant { value, .. } => {
                write!(f, "ARMONIA_TENANTS entry '{}' is not a valid schema name", value)
            }
            ConfigError::InvalidSignatureCount => {
                write!(f, "ARMONIA_MINUTES_SIGNATURES must be a positive integer")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort | ConfigError::InvalidSignatureCount => None,
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidTenant { source, .. } => Some(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        env::remove_var("APP_ENV");
        env::remove_var("APP_HOST");
        env::remove_var("APP_PORT");
        env::remove_var("APP_LOG_LEVEL");
        env::remove_var("APP_LOG_FORMAT");
        env::remove_var("ARMONIA_TENANTS");
        env::remove_var("ARMONIA_MINUTES_SIGNATURES");
        env::remove_var("ARMONIA_DOCUMENTS_BASE_URL");
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(config.telemetry.format, LogFormat::Compact);
        assert!(config.tenancy.allowed_schemas.is_none());
        assert_eq!(config.assembly.signatures_required, 2);
        assert_eq!(config.assembly.documents_base_url, "/api/documents");
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 3000));
        reset_env();
    }

    #[test]
    fn parses_tenant_allow_list() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("ARMONIA_TENANTS", "tenant_alpha, tenant_beta,");
        let config = AppConfig::load().expect("config loads");
        let schemas = config.tenancy.allowed_schemas.expect("allow-list present");
        assert_eq!(schemas.len(), 2);
        assert_eq!(schemas[1].as_str(), "tenant_beta");
        reset_env();
    }

    #[test]
    fn rejects_invalid_tenant_and_signature_count() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("ARMONIA_TENANTS", "Bad-Schema");
        assert!(matches!(
            AppConfig::load(),
            Err(ConfigError::InvalidTenant { .. })
        ));

        reset_env();
        env::set_var("ARMONIA_MINUTES_SIGNATURES", "0");
        assert!(matches!(
            AppConfig::load(),
            Err(ConfigError::InvalidSignatureCount)
        ));
        reset_env();
    }
}
