use anyhow::{bail, Context};
use loyalink_crm::PosterConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    /// Prefix the encrypted token is appended to, e.g.
    /// `https://example.com/register?token=`.
    #[serde(default)]
    pub base_url: String,
    #[serde(default = "default_locale")]
    pub locale: String,

    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub bot: BotConfig,
    #[serde(default)]
    pub crm: CrmConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Full SeaORM connection URL. Defaults to a SQLite file under `data_dir`.
    #[serde(default)]
    pub url: Option<String>,
}

impl DatabaseConfig {
    pub fn connection_url(&self, data_dir: &str) -> String {
        match &self.url {
            Some(url) if !url.trim().is_empty() => url.clone(),
            _ => sqlite_url(&PathBuf::from(data_dir).join("registration.db").to_string_lossy()),
        }
    }
}

fn sqlite_url(path: &str) -> String {
    format!("sqlite://{path}?mode=rwc")
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// 32-byte AES key as hex or base64. When absent the key is read from
    /// (or generated into) `<data_dir>/token.key`.
    #[serde(default)]
    pub encryption_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    #[serde(default)]
    pub token: Option<String>,
    /// Telegram user ids allowed to run admin commands.
    #[serde(default)]
    pub admins: Vec<i64>,
    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: u64,
    #[serde(default = "default_bot_api_url")]
    pub api_url: String,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            token: None,
            admins: Vec::new(),
            poll_timeout_secs: default_poll_timeout_secs(),
            api_url: default_bot_api_url(),
        }
    }
}

impl BotConfig {
    pub fn enabled(&self) -> bool {
        self.token.as_deref().is_some_and(|t| !t.trim().is_empty())
    }
}

fn default_poll_timeout_secs() -> u64 {
    10
}

fn default_bot_api_url() -> String {
    "https://api.telegram.org".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrmConfig {
    #[serde(default = "default_crm_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub token: String,
    #[serde(default = "default_crm_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_bonus_amount")]
    pub bonus_amount: i64,
    #[serde(default = "default_client_group_id")]
    pub client_group_id: i64,
    #[serde(default)]
    pub default_sex: i32,
}

impl Default for CrmConfig {
    fn default() -> Self {
        Self {
            base_url: default_crm_base_url(),
            token: String::new(),
            timeout_secs: default_crm_timeout_secs(),
            bonus_amount: default_bonus_amount(),
            client_group_id: default_client_group_id(),
            default_sex: 0,
        }
    }
}

impl CrmConfig {
    pub fn poster_config(&self) -> PosterConfig {
        PosterConfig {
            base_url: self.base_url.clone(),
            token: self.token.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
            client_group_id: self.client_group_id,
        }
    }
}

fn default_crm_base_url() -> String {
    "https://joinposter.com/api/".to_string()
}

fn default_crm_timeout_secs() -> u64 {
    15
}

fn default_bonus_amount() -> i64 {
    1000
}

fn default_client_group_id() -> i64 {
    2
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Directory holding the `styles/` and `fonts/` asset folders.
    #[serde(default = "default_static_dir")]
    pub static_dir: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            static_dir: default_static_dir(),
        }
    }
}

fn default_static_dir() -> String {
    "templates".to_string()
}

fn default_http_port() -> u16 {
    8080
}

fn default_data_dir() -> String {
    "data".to_string()
}

fn default_locale() -> String {
    loyalink_common::i18n::DEFAULT_LOCALE.to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: default_http_port(),
            data_dir: default_data_dir(),
            base_url: String::new(),
            locale: default_locale(),
            database: DatabaseConfig::default(),
            security: SecurityConfig::default(),
            bot: BotConfig::default(),
            crm: CrmConfig::default(),
            http: HttpConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Reads a TOML file, then applies environment overrides and validates.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file '{path}'"))?;
        let mut config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file '{path}'"))?;
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Builds the configuration from defaults and environment variables only.
    pub fn from_env() -> anyhow::Result<Self> {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn database_url(&self) -> String {
        self.database.connection_url(&self.data_dir)
    }

    /// Overrides file values with the deployment environment.
    pub fn apply_env<F>(&mut self, env: F) -> anyhow::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        if let Some(port) = var("PORT") {
            self.http_port = port
                .trim()
                .parse()
                .with_context(|| format!("PORT is not a valid port: '{port}'"))?;
        }
        if let Some(dir) = var("DATA_DIR") {
            self.data_dir = dir;
        }
        if let Some(url) = var("DATABASE_URL") {
            self.database.url = Some(url);
        } else if let Some(path) = var("DB_PATH") {
            self.database.url = Some(sqlite_url(&path));
        }
        if let Some(base_url) = var("BASE_URL") {
            self.base_url = base_url;
        }
        if let Some(locale) = var("LOCALE") {
            self.locale = locale;
        }
        if let Some(key) = var("ENCRYPTION_KEY") {
            self.security.encryption_key = Some(key);
        }
        if let Some(token) = var("BOT_TOKEN") {
            self.bot.token = Some(token);
        }
        if let Some(admins) = var("ADMINS") {
            self.bot.admins = parse_admins(&admins)?;
        }
        if let Some(token) = var("POSTER_TOKEN") {
            self.crm.token = token;
        }
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.base_url.trim().is_empty() {
            bail!("base_url is required (set BASE_URL)");
        }
        if self.crm.token.trim().is_empty() {
            bail!("crm.token is required (set POSTER_TOKEN)");
        }
        if self.crm.base_url.trim().is_empty() {
            bail!("crm.base_url must not be empty");
        }
        if self.crm.timeout_secs == 0 {
            bail!("crm.timeout_secs must be positive");
        }
        Ok(())
    }
}

/// Parses a comma separated list of admin ids, e.g. `"12345, 67890"`.
pub fn parse_admins(raw: &str) -> anyhow::Result<Vec<i64>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>()
                .with_context(|| format!("ADMINS contains a non-integer id: '{s}'"))
        })
        .collect()
}
