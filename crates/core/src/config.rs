use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::scoring::FollowUpPolicy;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub llm: LlmConfig,
    pub router: RouterConfig,
    pub scoring: ScoringConfig,
    pub knowledge: KnowledgeConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub api_key: Option<SecretString>,
    pub base_url: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

#[derive(Clone, Debug)]
pub struct RouterConfig {
    /// Prior turns forwarded to the classifier and generator.
    pub history_window: usize,
    pub classify_timeout_ms: u64,
    pub generate_timeout_ms: u64,
    pub fast_path_enabled: bool,
}

#[derive(Clone, Debug)]
pub struct ScoringConfig {
    pub hot_interval_days: u32,
    pub warm_interval_days: u32,
    pub cold_interval_days: u32,
    pub hot_weight: f64,
    pub warm_weight: f64,
    pub cold_weight: f64,
    pub overdue_points_per_day: f64,
    pub overdue_points_cap: f64,
}

#[derive(Clone, Debug, Default)]
pub struct KnowledgeConfig {
    /// JSON knowledge base. Built-in defaults are used when unset.
    pub path: Option<PathBuf>,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    /// No hosted model: keyword classification, generation unavailable.
    Offline,
    Gemini,
    #[serde(rename = "openai")]
    OpenAi,
    Ollama,
}

impl LlmProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Offline => "offline",
            Self::Gemini => "gemini",
            Self::OpenAi => "openai",
            Self::Ollama => "ollama",
        }
    }

    pub fn requires_api_key(&self) -> bool {
        matches!(self, Self::Gemini | Self::OpenAi)
    }
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
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub llm_provider: Option<LlmProvider>,
    pub llm_model: Option<String>,
    pub llm_api_key: Option<String>,
    pub knowledge_path: Option<PathBuf>,
    pub server_port: Option<u16>,
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
        let policy = FollowUpPolicy::default();
        Self {
            database: DatabaseConfig {
                url: "sqlite://aura.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            llm: LlmConfig {
                provider: LlmProvider::Offline,
                api_key: None,
                base_url: None,
                model: "gemini-2.5-flash".to_string(),
                timeout_secs: 30,
                max_retries: 1,
            },
            router: RouterConfig {
                history_window: 6,
                classify_timeout_ms: 8_000,
                generate_timeout_ms: 20_000,
                fast_path_enabled: true,
            },
            scoring: ScoringConfig {
                hot_interval_days: policy.hot_interval_days,
                warm_interval_days: policy.warm_interval_days,
                cold_interval_days: policy.cold_interval_days,
                hot_weight: policy.hot_weight,
                warm_weight: policy.warm_weight,
                cold_weight: policy.cold_weight,
                overdue_points_per_day: policy.overdue_points_per_day,
                overdue_points_cap: policy.overdue_points_cap,
            },
            knowledge: KnowledgeConfig::default(),
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl ScoringConfig {
    pub fn follow_up_policy(&self) -> FollowUpPolicy {
        FollowUpPolicy {
            hot_interval_days: self.hot_interval_days,
            warm_interval_days: self.warm_interval_days,
            cold_interval_days: self.cold_interval_days,
            hot_weight: self.hot_weight,
            warm_weight: self.warm_weight,
            cold_weight: self.cold_weight,
            overdue_points_per_day: self.overdue_points_per_day,
            overdue_points_cap: self.overdue_points_cap,
        }
    }
}

impl RouterConfig {
    pub fn classify_timeout(&self) -> Duration {
        Duration::from_millis(self.classify_timeout_ms)
    }

    pub fn generate_timeout(&self) -> Duration {
        Duration::from_millis(self.generate_timeout_ms)
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "offline" | "none" => Ok(Self::Offline),
            "gemini" => Ok(Self::Gemini),
            "openai" => Ok(Self::OpenAi),
            "ollama" => Ok(Self::Ollama),
            other => Err(ConfigError::Validation(format!(
                "unsupported llm provider `{other}` (expected offline|gemini|openai|ollama)"
            ))),
        }
    }
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
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("aura.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(llm) = patch.llm {
            if let Some(provider) = llm.provider {
                self.llm.provider = provider;
            }
            if let Some(api_key) = llm.api_key {
                self.llm.api_key = Some(secret_value(api_key));
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = Some(base_url);
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
            if let Some(max_retries) = llm.max_retries {
                self.llm.max_retries = max_retries;
            }
        }

        if let Some(router) = patch.router {
            if let Some(history_window) = router.history_window {
                self.router.history_window = history_window;
            }
            if let Some(classify_timeout_ms) = router.classify_timeout_ms {
                self.router.classify_timeout_ms = classify_timeout_ms;
            }
            if let Some(generate_timeout_ms) = router.generate_timeout_ms {
                self.router.generate_timeout_ms = generate_timeout_ms;
            }
            if let Some(fast_path_enabled) = router.fast_path_enabled {
                self.router.fast_path_enabled = fast_path_enabled;
            }
        }

        if let Some(scoring) = patch.scoring {
            let target = &mut self.scoring;
            let days = [
                (scoring.hot_interval_days, &mut target.hot_interval_days),
                (scoring.warm_interval_days, &mut target.warm_interval_days),
                (scoring.cold_interval_days, &mut target.cold_interval_days),
            ];
            for (value, slot) in days {
                if let Some(value) = value {
                    *slot = value;
                }
            }
            let points = [
                (scoring.hot_weight, &mut target.hot_weight),
                (scoring.warm_weight, &mut target.warm_weight),
                (scoring.cold_weight, &mut target.cold_weight),
                (scoring.overdue_points_per_day, &mut target.overdue_points_per_day),
                (scoring.overdue_points_cap, &mut target.overdue_points_cap),
            ];
            for (value, slot) in points {
                if let Some(value) = value {
                    *slot = value;
                }
            }
        }

        if let Some(knowledge) = patch.knowledge {
            if let Some(path) = knowledge.path {
                self.knowledge.path = Some(path);
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
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
        if let Some(value) = read_env("AURA_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("AURA_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_u32("AURA_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("AURA_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("AURA_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("AURA_LLM_PROVIDER") {
            self.llm.provider = value.parse()?;
        }
        if let Some(value) = read_env("AURA_LLM_API_KEY") {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("AURA_LLM_BASE_URL") {
            self.llm.base_url = Some(value);
        }
        if let Some(value) = read_env("AURA_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("AURA_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("AURA_LLM_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("AURA_LLM_MAX_RETRIES") {
            self.llm.max_retries = parse_u32("AURA_LLM_MAX_RETRIES", &value)?;
        }

        if let Some(value) = read_env("AURA_ROUTER_HISTORY_WINDOW") {
            self.router.history_window =
                parse_u32("AURA_ROUTER_HISTORY_WINDOW", &value)? as usize;
        }
        if let Some(value) = read_env("AURA_ROUTER_CLASSIFY_TIMEOUT_MS") {
            self.router.classify_timeout_ms = parse_u64("AURA_ROUTER_CLASSIFY_TIMEOUT_MS", &value)?;
        }
        if let Some(value) = read_env("AURA_ROUTER_GENERATE_TIMEOUT_MS") {
            self.router.generate_timeout_ms = parse_u64("AURA_ROUTER_GENERATE_TIMEOUT_MS", &value)?;
        }
        if let Some(value) = read_env("AURA_ROUTER_FAST_PATH_ENABLED") {
            self.router.fast_path_enabled = parse_bool("AURA_ROUTER_FAST_PATH_ENABLED", &value)?;
        }

        if let Some(value) = read_env("AURA_KNOWLEDGE_PATH") {
            self.knowledge.path = Some(PathBuf::from(value));
        }

        if let Some(value) = read_env("AURA_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("AURA_SERVER_PORT") {
            self.server.port = parse_u16("AURA_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("AURA_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("AURA_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level = read_env("AURA_LOGGING_LEVEL").or_else(|| read_env("AURA_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format = read_env("AURA_LOGGING_FORMAT").or_else(|| read_env("AURA_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(llm_provider) = overrides.llm_provider {
            self.llm.provider = llm_provider;
        }
        if let Some(llm_model) = overrides.llm_model {
            self.llm.model = llm_model;
        }
        if let Some(llm_api_key) = overrides.llm_api_key {
            self.llm.api_key = Some(secret_value(llm_api_key));
        }
        if let Some(knowledge_path) = overrides.knowledge_path {
            self.knowledge.path = Some(knowledge_path);
        }
        if let Some(port) = overrides.server_port {
            self.server.port = port;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_llm(&self.llm)?;
        validate_router(&self.router)?;
        self.scoring
            .follow_up_policy()
            .validate()
            .map_err(|message| ConfigError::Validation(format!("scoring: {message}")))?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("aura.toml"), PathBuf::from("config/aura.toml")]
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

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if llm.provider.requires_api_key() {
        let missing = llm
            .api_key
            .as_ref()
            .map(|value| value.expose_secret().trim().is_empty())
            .unwrap_or(true);
        if missing {
            return Err(ConfigError::Validation(format!(
                "llm.api_key is required for the {} provider (set AURA_LLM_API_KEY)",
                llm.provider.as_str()
            )));
        }
    }

    if llm.provider == LlmProvider::Ollama {
        let missing = llm.base_url.as_ref().map(|value| value.trim().is_empty()).unwrap_or(true);
        if missing {
            return Err(ConfigError::Validation(
                "llm.base_url is required for the ollama provider".to_string(),
            ));
        }
    }

    if llm.provider != LlmProvider::Offline && llm.model.trim().is_empty() {
        return Err(ConfigError::Validation("llm.model must not be empty".to_string()));
    }

    Ok(())
}

fn validate_router(router: &RouterConfig) -> Result<(), ConfigError> {
    for (name, value) in [
        ("router.classify_timeout_ms", router.classify_timeout_ms),
        ("router.generate_timeout_ms", router.generate_timeout_ms),
    ] {
        if value == 0 || value > 120_000 {
            return Err(ConfigError::Validation(format!("{name} must be in range 1..=120000")));
        }
    }

    if router.history_window > 50 {
        return Err(ConfigError::Validation(
            "router.history_window must be at most 50".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
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

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
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

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.parse::<bool>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    llm: Option<LlmPatch>,
    router: Option<RouterPatch>,
    scoring: Option<ScoringPatch>,
    knowledge: Option<KnowledgePatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    provider: Option<LlmProvider>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct RouterPatch {
    history_window: Option<usize>,
    classify_timeout_ms: Option<u64>,
    generate_timeout_ms: Option<u64>,
    fast_path_enabled: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct ScoringPatch {
    hot_interval_days: Option<u32>,
    warm_interval_days: Option<u32>,
    cold_interval_days: Option<u32>,
    hot_weight: Option<f64>,
    warm_weight: Option<f64>,
    cold_weight: Option<f64>,
    overdue_points_per_day: Option<f64>,
    overdue_points_cap: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct KnowledgePatch {
    path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
