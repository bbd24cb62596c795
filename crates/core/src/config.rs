use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::index::RESERVED_SHEET_PREFIX;
use crate::domain::user::AdminAllowList;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub sheets: SheetsConfig,
    pub telegram: TelegramConfig,
    pub access: AccessConfig,
    pub analytics: AnalyticsConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct SheetsConfig {
    pub spreadsheet_id: String,
    pub credentials_path: PathBuf,
    pub api_base_url: String,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct TelegramConfig {
    pub bot_token: SecretString,
    pub api_base_url: String,
    pub poll_timeout_secs: u64,
    pub bot_title: String,
}

#[derive(Clone, Debug)]
pub struct AccessConfig {
    pub admins: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct AnalyticsConfig {
    pub sheet_name: String,
    pub queue_capacity: usize,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub health_check_port: u16,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub spreadsheet_id: Option<String>,
    pub credentials_path: Option<PathBuf>,
    pub sheets_api_base_url: Option<String>,
    pub telegram_bot_token: Option<String>,
    pub telegram_api_base_url: Option<String>,
    pub admins: Option<Vec<String>>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            sheets: SheetsConfig {
                spreadsheet_id: String::new(),
                credentials_path: PathBuf::new(),
                api_base_url: "https://sheets.googleapis.com".to_string(),
                timeout_secs: 30,
            },
            telegram: TelegramConfig {
                bot_token: String::new().into(),
                api_base_url: "https://api.telegram.org".to_string(),
                poll_timeout_secs: 30,
                bot_title: "FAQ Bot".to_string(),
            },
            access: AccessConfig { admins: Vec::new() },
            analytics: AnalyticsConfig {
                sheet_name: "_Analytics".to_string(),
                queue_capacity: 256,
            },
            server: ServerConfig { bind_address: "127.0.0.1".to_string(), health_check_port: 8080 },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("faqbot.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    pub fn admin_allow_list(&self) -> AdminAllowList {
        AdminAllowList::new(&self.access.admins)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(sheets) = patch.sheets {
            if let Some(spreadsheet_id) = sheets.spreadsheet_id {
                self.sheets.spreadsheet_id = spreadsheet_id;
            }
            if let Some(credentials_path) = sheets.credentials_path {
                self.sheets.credentials_path = credentials_path;
            }
            if let Some(api_base_url) = sheets.api_base_url {
                self.sheets.api_base_url = api_base_url;
            }
            if let Some(timeout_secs) = sheets.timeout_secs {
                self.sheets.timeout_secs = timeout_secs;
            }
        }

        if let Some(telegram) = patch.telegram {
            if let Some(bot_token_value) = telegram.bot_token {
                self.telegram.bot_token = secret_value(bot_token_value);
            }
            if let Some(api_base_url) = telegram.api_base_url {
                self.telegram.api_base_url = api_base_url;
            }
            if let Some(poll_timeout_secs) = telegram.poll_timeout_secs {
                self.telegram.poll_timeout_secs = poll_timeout_secs;
            }
            if let Some(bot_title) = telegram.bot_title {
                self.telegram.bot_title = bot_title;
            }
        }

        if let Some(access) = patch.access {
            if let Some(admins) = access.admins {
                self.access.admins = admins;
            }
        }

        if let Some(analytics) = patch.analytics {
            if let Some(sheet_name) = analytics.sheet_name {
                self.analytics.sheet_name = sheet_name;
            }
            if let Some(queue_capacity) = analytics.queue_capacity {
                self.analytics.queue_capacity = queue_capacity;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(health_check_port) = server.health_check_port {
                self.server.health_check_port = health_check_port;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        let spreadsheet_id =
            read_env("FAQBOT_SHEETS_SPREADSHEET_ID").or_else(|| read_env("SPREADSHEET_ID"));
        if let Some(value) = spreadsheet_id {
            self.sheets.spreadsheet_id = value;
        }
        let credentials_path = read_env("FAQBOT_SHEETS_CREDENTIALS_PATH")
            .or_else(|| read_env("GOOGLE_DOCS_CREDENTIALS_FILE_NAME"));
        if let Some(value) = credentials_path {
            self.sheets.credentials_path = PathBuf::from(value);
        }
        if let Some(value) = read_env("FAQBOT_SHEETS_API_BASE_URL") {
            self.sheets.api_base_url = value;
        }
        if let Some(value) = read_env("FAQBOT_SHEETS_TIMEOUT_SECS") {
            self.sheets.timeout_secs = parse_u64("FAQBOT_SHEETS_TIMEOUT_SECS", &value)?;
        }

        let bot_token =
            read_env("FAQBOT_TELEGRAM_BOT_TOKEN").or_else(|| read_env("TELEGRAM_BOT_TOKEN"));
        if let Some(value) = bot_token {
            self.telegram.bot_token = secret_value(value);
        }
        if let Some(value) = read_env("FAQBOT_TELEGRAM_API_BASE_URL") {
            self.telegram.api_base_url = value;
        }
        if let Some(value) = read_env("FAQBOT_TELEGRAM_POLL_TIMEOUT_SECS") {
            self.telegram.poll_timeout_secs =
                parse_u64("FAQBOT_TELEGRAM_POLL_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("FAQBOT_TELEGRAM_BOT_TITLE") {
            self.telegram.bot_title = value;
        }

        let admins = read_env("FAQBOT_ADMINS").or_else(|| read_env("BOT_ADMINS"));
        if let Some(value) = admins {
            self.access.admins = value.split(',').map(str::to_owned).collect();
        }

        if let Some(value) = read_env("FAQBOT_ANALYTICS_SHEET_NAME") {
            self.analytics.sheet_name = value;
        }
        if let Some(value) = read_env("FAQBOT_ANALYTICS_QUEUE_CAPACITY") {
            self.analytics.queue_capacity =
                parse_usize("FAQBOT_ANALYTICS_QUEUE_CAPACITY", &value)?;
        }

        if let Some(value) = read_env("FAQBOT_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("FAQBOT_SERVER_HEALTH_CHECK_PORT") {
            self.server.health_check_port = parse_u16("FAQBOT_SERVER_HEALTH_CHECK_PORT", &value)?;
        }

        let log_level = read_env("FAQBOT_LOGGING_LEVEL").or_else(|| read_env("FAQBOT_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("FAQBOT_LOGGING_FORMAT").or_else(|| read_env("FAQBOT_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(spreadsheet_id) = overrides.spreadsheet_id {
            self.sheets.spreadsheet_id = spreadsheet_id;
        }
        if let Some(credentials_path) = overrides.credentials_path {
            self.sheets.credentials_path = credentials_path;
        }
        if let Some(api_base_url) = overrides.sheets_api_base_url {
            self.sheets.api_base_url = api_base_url;
        }
        if let Some(bot_token) = overrides.telegram_bot_token {
            self.telegram.bot_token = secret_value(bot_token);
        }
        if let Some(api_base_url) = overrides.telegram_api_base_url {
            self.telegram.api_base_url = api_base_url;
        }
        if let Some(admins) = overrides.admins {
            self.access.admins = admins;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_sheets(&self.sheets)?;
        validate_telegram(&self.telegram)?;
        validate_analytics(&self.analytics)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("faqbot.toml"), PathBuf::from("config/faqbot.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_sheets(sheets: &SheetsConfig) -> Result<(), ConfigError> {
    if sheets.spreadsheet_id.trim().is_empty() {
        return Err(ConfigError::Validation(
            "sheets.spreadsheet_id is required. Copy it from the spreadsheet URL: https://docs.google.com/spreadsheets/d/<id>/edit".to_string(),
        ));
    }

    if sheets.credentials_path.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "sheets.credentials_path is required. Point it at the service account JSON key shared with the spreadsheet".to_string(),
        ));
    }

    validate_http_url("sheets.api_base_url", &sheets.api_base_url)?;

    if sheets.timeout_secs == 0 || sheets.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "sheets.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_telegram(telegram: &TelegramConfig) -> Result<(), ConfigError> {
    let bot_token = telegram.bot_token.expose_secret();
    if bot_token.is_empty() {
        return Err(ConfigError::Validation(
            "telegram.bot_token is required. Get it from @BotFather with /newbot or /token"
                .to_string(),
        ));
    }
    let well_formed = bot_token.split_once(':').is_some_and(|(bot_id, secret)| {
        !bot_id.is_empty() && bot_id.bytes().all(|byte| byte.is_ascii_digit()) && !secret.is_empty()
    });
    if !well_formed {
        return Err(ConfigError::Validation(
            "telegram.bot_token must look like `<bot id>:<secret>`. Get it from @BotFather"
                .to_string(),
        ));
    }

    validate_http_url("telegram.api_base_url", &telegram.api_base_url)?;

    // Telegram caps long polling at 50 seconds.
    if telegram.poll_timeout_secs == 0 || telegram.poll_timeout_secs > 50 {
        return Err(ConfigError::Validation(
            "telegram.poll_timeout_secs must be in range 1..=50".to_string(),
        ));
    }

    Ok(())
}

fn validate_analytics(analytics: &AnalyticsConfig) -> Result<(), ConfigError> {
    if !analytics.sheet_name.starts_with(RESERVED_SHEET_PREFIX) || analytics.sheet_name.len() < 2 {
        return Err(ConfigError::Validation(format!(
            "analytics.sheet_name must start with `{RESERVED_SHEET_PREFIX}` so it is not served as an FAQ section"
        )));
    }

    if analytics.queue_capacity == 0 {
        return Err(ConfigError::Validation(
            "analytics.queue_capacity must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.health_check_port == 0 {
        return Err(ConfigError::Validation(
            "server.health_check_port must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn validate_http_url(key: &str, value: &str) -> Result<(), ConfigError> {
    if !value.starts_with("http://") && !value.starts_with("https://") {
        return Err(ConfigError::Validation(format!("{key} must start with http:// or https://")));
    }
    Ok(())
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.parse::<usize>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    sheets: Option<SheetsPatch>,
    telegram: Option<TelegramPatch>,
    access: Option<AccessPatch>,
    analytics: Option<AnalyticsPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct SheetsPatch {
    spreadsheet_id: Option<String>,
    credentials_path: Option<PathBuf>,
    api_base_url: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct TelegramPatch {
    bot_token: Option<String>,
    api_base_url: Option<String>,
    poll_timeout_secs: Option<u64>,
    bot_title: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct AccessPatch {
    admins: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct AnalyticsPatch {
    sheet_name: Option<String>,
    queue_capacity: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    health_check_port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
