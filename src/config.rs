use std::fmt;
use std::path::{Path, PathBuf};
use serde::Deserialize;
use serenity::all::GuildId;
use thiserror::Error;
use crate::logging::LogLevel;

pub const DEFAULT_PORT: u16 = 3001;
pub const DEFAULT_CONFIG_PATH: &str = "announcebot.toml";
const DEV_ADMIN_PASSWORD: &str = "admin123";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration: {0}")]
    Source(#[from] config::ConfigError),

    #[error("{0} is required in production")]
    MissingInProduction(&'static str),

    #[error("Invalid value for {key}: '{value}'")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl Environment {
    pub fn is_production(self) -> bool {
        self == Environment::Production
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// How the admin password is supplied.
#[derive(Clone)]
pub enum AdminCredential {
    Plain(String),
    /// Argon2 PHC string, e.g. `$argon2id$v=19$...`.
    Hashed(String),
}

impl fmt::Debug for AdminCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdminCredential::Plain(_) => write!(f, "Plain(<redacted>)"),
            AdminCredential::Hashed(_) => write!(f, "Hashed(<redacted>)"),
        }
    }
}

/// Raw values as they come out of the file/environment layers.
#[derive(Debug, Deserialize, Default)]
struct Settings {
    discord_token: Option<String>,
    port: Option<u16>,
    host: Option<String>,
    admin_password: Option<String>,
    admin_password_hash: Option<String>,
    jwt_secret: Option<String>,
    environment: Option<Environment>,
    guild_id: Option<String>,
    cors_origin: Option<String>,
    static_dir: Option<PathBuf>,
    data_file: Option<PathBuf>,
    log_level: Option<LogLevel>,
    keep_alive_host: Option<String>,
    /// Set by Render on deployed services.
    render_external_hostname: Option<String>,
}

/// Values given on the command line; they win over file and environment.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub config_path: Option<PathBuf>,
    pub data_file: Option<PathBuf>,
    pub port: Option<u16>,
    pub log_level: Option<LogLevel>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub discord_token: Option<String>,
    pub host: String,
    pub port: u16,
    pub admin_credential: AdminCredential,
    /// `None` means a random per-process secret is generated.
    pub jwt_secret: Option<String>,
    pub environment: Environment,
    pub guild_id: Option<GuildId>,
    pub cors_origin: Option<String>,
    pub static_dir: PathBuf,
    pub data_file: PathBuf,
    pub log_level: LogLevel,
    pub keep_alive_host: Option<String>,
}

impl Config {
    /// Load configuration from `announcebot.toml` (optional) and the process
    /// environment, then apply command line overrides.
    ///
    /// Recognised keys (file keys are lowercase, env vars uppercase):
    /// - `DISCORD_TOKEN` — bot token; without it the panel runs alone
    /// - `PORT`, `HOST` — web panel bind address
    /// - `ADMIN_PASSWORD` / `ADMIN_PASSWORD_HASH` — panel credential
    /// - `JWT_SECRET` — session token signing secret
    /// - `ENVIRONMENT` — `development` or `production`
    /// - `GUILD_ID` — guild used for roles, categories and channel creation
    /// - `CORS_ORIGIN`, `STATIC_DIR`, `DATA_FILE`, `LOG_LEVEL`
    /// - `KEEP_ALIVE_HOST`, falling back to `RENDER_EXTERNAL_HOSTNAME`
    pub fn load(overrides: &Overrides) -> Result<Self, ConfigError> {
        Self::load_with_env(overrides, config::Environment::default())
    }

    /// Env values stay strings here; numeric fields are converted when
    /// deserialized, so secrets like `007` keep their leading zeros.
    fn load_with_env(overrides: &Overrides, env: config::Environment) -> Result<Self, ConfigError> {
        let path = overrides
            .config_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

        let settings: Settings = config::Config::builder()
            .add_source(config::File::from(path.as_path()).required(false))
            .add_source(env)
            .build()?
            .try_deserialize()?;

        Self::from_settings(settings, overrides)
    }

    /// Read a single TOML file without consulting the environment.
    pub fn from_file(path: &Path, overrides: &Overrides) -> Result<Self, ConfigError> {
        let settings: Settings = config::Config::builder()
            .add_source(config::File::from(path))
            .build()?
            .try_deserialize()?;

        Self::from_settings(settings, overrides)
    }

    fn from_settings(settings: Settings, overrides: &Overrides) -> Result<Self, ConfigError> {
        let environment = settings.environment.unwrap_or_default();

        let admin_credential = match (non_empty(settings.admin_password_hash), non_empty(settings.admin_password)) {
            (Some(hash), _) => AdminCredential::Hashed(hash),
            (None, Some(password)) => AdminCredential::Plain(password),
            (None, None) if environment.is_production() => {
                return Err(ConfigError::MissingInProduction("ADMIN_PASSWORD"));
            }
            (None, None) => AdminCredential::Plain(DEV_ADMIN_PASSWORD.to_string()),
        };

        let jwt_secret = non_empty(settings.jwt_secret);
        if jwt_secret.is_none() && environment.is_production() {
            return Err(ConfigError::MissingInProduction("JWT_SECRET"));
        }

        let guild_id = match non_empty(settings.guild_id) {
            Some(raw) => Some(parse_guild_id(&raw)?),
            None => None,
        };

        Ok(Config {
            discord_token: non_empty(settings.discord_token),
            host: non_empty(settings.host).unwrap_or_else(|| "0.0.0.0".to_string()),
            port: overrides.port.or(settings.port).unwrap_or(DEFAULT_PORT),
            admin_credential,
            jwt_secret,
            environment,
            guild_id,
            cors_origin: non_empty(settings.cors_origin),
            static_dir: settings.static_dir.unwrap_or_else(|| PathBuf::from("public")),
            data_file: overrides
                .data_file
                .clone()
                .or(settings.data_file)
                .unwrap_or_else(|| PathBuf::from("botData.json")),
            log_level: overrides.log_level.or(settings.log_level).unwrap_or_default(),
            keep_alive_host: non_empty(settings.keep_alive_host)
                .or_else(|| non_empty(settings.render_external_hostname)),
        })
    }

    pub fn is_discord_configured(&self) -> bool {
        self.discord_token.is_some()
    }

    pub fn uses_default_password(&self) -> bool {
        matches!(&self.admin_credential, AdminCredential::Plain(p) if p == DEV_ADMIN_PASSWORD)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse_guild_id(raw: &str) -> Result<GuildId, ConfigError> {
    match raw.parse::<u64>() {
        Ok(id) if id != 0 => Ok(GuildId::new(id)),
        _ => Err(ConfigError::Invalid {
            key: "GUILD_ID",
            value: raw.to_string(),
        }),
    }
}
