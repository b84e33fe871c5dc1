use std::{env, fmt, net::SocketAddr, path::PathBuf};

use super::{non_empty_var, server_bind_address};

const DEFAULT_APP_URL: &str = "http://localhost:8080";
const DEFAULT_DATABASE_URL: &str = "sqlite://empleaworks.db";
const DEFAULT_STORAGE_DIR: &str = "storage";
const DEFAULT_SESSION_TTL_SECS: u64 = 7200;
const DEFAULT_UPLOAD_MAX_BYTES: usize = 5 * 1024 * 1024;
const DEFAULT_LOCALE: &str = "es";
const DEFAULT_MAIL_API_URL: &str = "https://api.brevo.com/v3/";
const DEFAULT_MAIL_FROM_ADDRESS: &str = "no-reply@empleaworks.test";
const DEFAULT_MAIL_FROM_NAME: &str = "EmpleaWorks";
const MIN_SECRET_BYTES: usize = 32;
const SUPPORTED_LOCALES: &[&str] = &["es", "en"];

// Only used outside production; production requires SESSION_SECRET.
const DEVELOPMENT_SESSION_SECRET: &str =
    "656d706c6561776f726b732d646576656c6f706d656e742d73657373696f6e21";

/// Application runtime environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
    Test,
}

impl Environment {
    fn from_str(value: &str) -> Result<Self, ConfigError> {
        match value {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            "test" => Ok(Self::Test),
            other => Err(ConfigError::InvalidEnvironment(other.to_string())),
        }
    }

    /// Returns `true` for production deployments.
    pub fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }

    /// Returns the canonical name used for logging/metrics labels.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Test => "test",
        }
    }
}

/// Session cookie signing parameters.
#[derive(Clone)]
pub struct SessionConfig {
    pub secret: Vec<u8>,
    pub ttl_secs: u64,
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("secret", &"<redacted>")
            .field("ttl_secs", &self.ttl_secs)
            .finish()
    }
}

/// Transactional email settings. Delivery is disabled when `api_key` is unset.
#[derive(Clone)]
pub struct MailConfig {
    pub api_url: String,
    pub api_key: Option<String>,
    pub from_address: String,
    pub from_name: String,
    pub contact_recipient: Option<String>,
}

impl MailConfig {
    pub fn is_enabled(&self) -> bool {
        self.api_key.is_some()
    }
}

impl fmt::Debug for MailConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MailConfig")
            .field("api_url", &self.api_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("from_address", &self.from_address)
            .field("from_name", &self.from_name)
            .field("contact_recipient", &self.contact_recipient)
            .finish()
    }
}

/// Runtime configuration resolved from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub environment: Environment,
    pub app_url: String,
    pub database_url: String,
    pub session: SessionConfig,
    pub storage_dir: PathBuf,
    pub upload_max_bytes: usize,
    pub default_locale: String,
    pub mail: MailConfig,
}

impl AppConfig {
    /// Constructs the configuration by reading and validating environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let env_value = env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());
        let environment = Environment::from_str(&env_value)?;
        let bind_addr = server_bind_address().map_err(ConfigError::BindAddress)?;

        let app_url = non_empty_var("APP_URL")
            .unwrap_or_else(|| DEFAULT_APP_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        let database_url =
            non_empty_var("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());

        let secret = match non_empty_var("SESSION_SECRET") {
            Some(value) => decode_secret(&value)?,
            None if environment.is_production() => {
                return Err(ConfigError::MissingVar("SESSION_SECRET"))
            }
            None => decode_secret(DEVELOPMENT_SESSION_SECRET)?,
        };
        let ttl_secs = parse_number("SESSION_TTL_SECS", DEFAULT_SESSION_TTL_SECS)?;

        let storage_dir = PathBuf::from(
            non_empty_var("STORAGE_DIR").unwrap_or_else(|| DEFAULT_STORAGE_DIR.to_string()),
        );
        let upload_max_bytes = parse_number("UPLOAD_MAX_BYTES", DEFAULT_UPLOAD_MAX_BYTES)?;

        let default_locale =
            non_empty_var("APP_LOCALE").unwrap_or_else(|| DEFAULT_LOCALE.to_string());
        if !SUPPORTED_LOCALES.contains(&default_locale.as_str()) {
            return Err(ConfigError::InvalidLocale(default_locale));
        }

        let mut api_url =
            non_empty_var("MAIL_API_URL").unwrap_or_else(|| DEFAULT_MAIL_API_URL.to_string());
        if !api_url.ends_with('/') {
            api_url.push('/');
        }
        let mail = MailConfig {
            api_url,
            api_key: non_empty_var("MAIL_API_KEY"),
            from_address: non_empty_var("MAIL_FROM_ADDRESS")
                .unwrap_or_else(|| DEFAULT_MAIL_FROM_ADDRESS.to_string()),
            from_name: non_empty_var("MAIL_FROM_NAME")
                .unwrap_or_else(|| DEFAULT_MAIL_FROM_NAME.to_string()),
            contact_recipient: non_empty_var("CONTACT_RECIPIENT"),
        };

        Ok(Self {
            bind_addr,
            environment,
            app_url,
            database_url,
            session: SessionConfig { secret, ttl_secs },
            storage_dir,
            upload_max_bytes,
            default_locale,
            mail,
        })
    }
}

fn decode_secret(value: &str) -> Result<Vec<u8>, ConfigError> {
    let bytes = hex::decode(value)
        .map_err(|err| ConfigError::InvalidSecret(format!("not valid hex: {err}")))?;
    if bytes.len() < MIN_SECRET_BYTES {
        return Err(ConfigError::InvalidSecret(format!(
            "expected at least {MIN_SECRET_BYTES} bytes, got {}",
            bytes.len()
        )));
    }
    Ok(bytes)
}

fn parse_number<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match non_empty_var(name) {
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::InvalidNumber { name, value }),
        None => Ok(default),
    }
}

/// Errors that can occur during configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    InvalidEnvironment(String),
    BindAddress(std::net::AddrParseError),
    MissingVar(&'static str),
    InvalidSecret(String),
    InvalidNumber { name: &'static str, value: String },
    InvalidLocale(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidEnvironment(value) => write!(
                f,
                "APP_ENV must be one of 'development', 'production', or 'test' (got {value})"
            ),
            Self::BindAddress(err) => write!(f, "invalid APP_BIND_ADDR value: {err}"),
            Self::MissingVar(name) => write!(f, "{name} must be set in this environment"),
            Self::InvalidSecret(reason) => write!(f, "invalid SESSION_SECRET: {reason}"),
            Self::InvalidNumber { name, value } => {
                write!(f, "{name} must be a positive integer (got {value})")
            }
            Self::InvalidLocale(value) => {
                write!(f, "APP_LOCALE must be one of 'es' or 'en' (got {value})")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ENV_GUARD;
    use crate::DEFAULT_BIND_ADDR;

    const VARS: &[&str] = &[
        "APP_ENV",
        "APP_BIND_ADDR",
        "APP_URL",
        "DATABASE_URL",
        "SESSION_SECRET",
        "SESSION_TTL_SECS",
        "STORAGE_DIR",
        "UPLOAD_MAX_BYTES",
        "APP_LOCALE",
        "MAIL_API_URL",
        "MAIL_API_KEY",
        "MAIL_FROM_ADDRESS",
        "MAIL_FROM_NAME",
        "CONTACT_RECIPIENT",
    ];

    fn clear_env() {
        for name in VARS {
            env::remove_var(name);
        }
    }

    #[test]
    fn loads_defaults_in_development() {
        let _guard = ENV_GUARD.lock().expect("env guard poisoned");
        clear_env();

        let config = AppConfig::from_env().expect("config should load with defaults");
        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.bind_addr.to_string(), DEFAULT_BIND_ADDR);
        assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
        assert_eq!(config.session.ttl_secs, DEFAULT_SESSION_TTL_SECS);
        assert_eq!(config.session.secret.len(), 32);
        assert_eq!(config.default_locale, "es");
        assert!(!config.mail.is_enabled());
        assert_eq!(config.mail.api_url, DEFAULT_MAIL_API_URL);
    }

    #[test]
    fn rejects_invalid_environment() {
        let _guard = ENV_GUARD.lock().expect("env guard poisoned");
        clear_env();
        env::set_var("APP_ENV", "invalid");

        let err = AppConfig::from_env().expect_err("invalid env should error");
        assert!(matches!(err, ConfigError::InvalidEnvironment(value) if value == "invalid"));

        clear_env();
    }

    #[test]
    fn production_requires_session_secret() {
        let _guard = ENV_GUARD.lock().expect("env guard poisoned");
        clear_env();
        env::set_var("APP_ENV", "production");

        let err = AppConfig::from_env().expect_err("secret is mandatory");
        assert!(matches!(err, ConfigError::MissingVar("SESSION_SECRET")));

        clear_env();
    }

    #[test]
    fn parses_production_environment() {
        let _guard = ENV_GUARD.lock().expect("env guard poisoned");
        clear_env();
        env::set_var("APP_ENV", "production");
        env::set_var("APP_BIND_ADDR", "0.0.0.0:9000");
        env::set_var("APP_URL", "https://empleaworks.example/");
        env::set_var("SESSION_SECRET", "ab".repeat(32));
        env::set_var("MAIL_API_KEY", "key-123");
        env::set_var("MAIL_API_URL", "http://mail.local/v3");
        env::set_var("CONTACT_RECIPIENT", "hello@empleaworks.example");
        env::set_var("APP_LOCALE", "en");

        let config = AppConfig::from_env().expect("config should load");
        assert_eq!(config.environment, Environment::Production);
        assert_eq!(config.bind_addr.to_string(), "0.0.0.0:9000");
        assert_eq!(config.app_url, "https://empleaworks.example");
        assert_eq!(config.session.secret, vec![0xab; 32]);
        assert!(config.mail.is_enabled());
        assert_eq!(config.mail.api_url, "http://mail.local/v3/");
        assert_eq!(
            config.mail.contact_recipient.as_deref(),
            Some("hello@empleaworks.example")
        );
        assert_eq!(config.default_locale, "en");

        clear_env();
    }

    #[test]
    fn rejects_short_or_malformed_secret() {
        let _guard = ENV_GUARD.lock().expect("env guard poisoned");
        clear_env();

        env::set_var("SESSION_SECRET", "abcd");
        let err = AppConfig::from_env().expect_err("short secret");
        assert!(matches!(err, ConfigError::InvalidSecret(_)));

        env::set_var("SESSION_SECRET", "zz".repeat(32));
        let err = AppConfig::from_env().expect_err("non-hex secret");
        assert!(matches!(err, ConfigError::InvalidSecret(_)));

        clear_env();
    }

    #[test]
    fn rejects_invalid_numbers_and_locales() {
        let _guard = ENV_GUARD.lock().expect("env guard poisoned");
        clear_env();

        env::set_var("UPLOAD_MAX_BYTES", "lots");
        let err = AppConfig::from_env().expect_err("invalid number");
        assert!(matches!(
            err,
            ConfigError::InvalidNumber { name: "UPLOAD_MAX_BYTES", .. }
        ));
        env::remove_var("UPLOAD_MAX_BYTES");

        env::set_var("APP_LOCALE", "fr");
        let err = AppConfig::from_env().expect_err("invalid locale");
        assert!(matches!(err, ConfigError::InvalidLocale(value) if value == "fr"));

        clear_env();
    }
}
