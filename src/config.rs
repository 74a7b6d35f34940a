//! Configuration types, loaded from the environment.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::scoring::band::PriorityBand;
use crate::tools::retry::{RetryOn, RetryPolicy};

/// Tool-router connection settings.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    pub base_url: String,
    pub api_key: SecretString,
    pub entity_id: String,
}

/// Identifiers that address the right board, database and channel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolTargets {
    pub board_id: String,
    /// Lane (list) ids keyed by band: critical, high, medium, low.
    pub lanes: [String; 4],
    pub knowledge_base_database_id: String,
    pub chat_channel_id: String,
    pub spreadsheet_id: String,
}

impl ToolTargets {
    /// Lane id for `band`, falling back to the board id when unset.
    pub fn lane_for(&self, band: PriorityBand) -> &str {
        let lane = match band {
            PriorityBand::Critical => &self.lanes[0],
            PriorityBand::High => &self.lanes[1],
            PriorityBand::Medium => &self.lanes[2],
            PriorityBand::Low => &self.lanes[3],
        };
        if lane.is_empty() { &self.board_id } else { lane }
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Full service configuration.
#[derive(Debug, Clone)]
pub struct OpsConfig {
    /// Minimum score (1–10) that triggers fan-out.
    pub priority_threshold: u8,
    pub retry: RetryPolicy,
    pub router: Option<RouterConfig>,
    pub simulate_tools: bool,
    pub targets: ToolTargets,
    pub db_path: PathBuf,
    pub server: ServerConfig,
    pub log_dir: PathBuf,
    pub monitor_interval: Duration,
}

impl Default for OpsConfig {
    fn default() -> Self {
        Self {
            priority_threshold: 7,
            retry: RetryPolicy::default(),
            router: None,
            simulate_tools: false,
            targets: ToolTargets::default(),
            db_path: PathBuf::from("./data/operations.db"),
            server: ServerConfig {
                host: "0.0.0.0".into(),
                port: 8000,
            },
            log_dir: PathBuf::from("./logs"),
            monitor_interval: Duration::from_secs(60),
        }
    }
}

impl OpsConfig {
    /// Load from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using an arbitrary key lookup (tests pass a map).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env { lookup };
        let defaults = Self::default();

        let priority_threshold: u8 = env.parse_in("PRIORITY_THRESHOLD", defaults.priority_threshold, 1, 10)?;
        let max_attempts: u32 = env.parse_in("MAX_RETRIES", defaults.retry.max_attempts, 1, 10)?;
        let min_wait: u64 = env.parse_or("RETRY_MIN_WAIT_SECS", defaults.retry.min_wait.as_secs())?;
        let max_wait: u64 = env.parse_or("RETRY_MAX_WAIT_SECS", defaults.retry.max_wait.as_secs())?;
        if min_wait > max_wait {
            return Err(ConfigError::InvalidValue {
                key: "RETRY_MIN_WAIT_SECS".into(),
                message: format!("must not exceed RETRY_MAX_WAIT_SECS ({max_wait})"),
            });
        }
        let timeout_secs: u64 = env.parse_in(
            "ADAPTER_TIMEOUT_SECS",
            defaults.retry.attempt_timeout.as_secs(),
            10,
            300,
        )?;
        let retry_on = match env.text("RETRY_TRANSIENT_ONLY").as_deref() {
            Some(v) if parse_bool(v) => RetryOn::TransientOnly,
            _ => RetryOn::AllErrors,
        };

        let retry = RetryPolicy {
            max_attempts,
            multiplier: defaults.retry.multiplier,
            min_wait: Duration::from_secs(min_wait),
            max_wait: Duration::from_secs(max_wait),
            attempt_timeout: Duration::from_secs(timeout_secs),
            retry_on,
        };

        let router = match (env.text("TOOL_ROUTER_URL"), env.text("TOOL_ROUTER_API_KEY")) {
            (Some(base_url), Some(api_key)) => Some(RouterConfig {
                base_url,
                api_key: SecretString::from(api_key),
                entity_id: env.text("TOOL_ROUTER_ENTITY_ID").unwrap_or_else(|| "default".into()),
            }),
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::MissingEnvVar("TOOL_ROUTER_API_KEY".into())),
            (None, Some(_)) => return Err(ConfigError::MissingEnvVar("TOOL_ROUTER_URL".into())),
        };

        let simulate_tools = env.text("SIMULATE_TOOLS").is_some_and(|v| parse_bool(&v));

        let targets = ToolTargets {
            board_id: env.text("TRELLO_BOARD_ID").unwrap_or_default(),
            lanes: [
                env.text("TRELLO_LIST_CRITICAL").unwrap_or_default(),
                env.text("TRELLO_LIST_HIGH").unwrap_or_default(),
                env.text("TRELLO_LIST_MEDIUM").unwrap_or_default(),
                env.text("TRELLO_LIST_LOW").unwrap_or_default(),
            ],
            knowledge_base_database_id: env.text("NOTION_DATABASE_ID").unwrap_or_default(),
            chat_channel_id: env.text("SLACK_CHANNEL_ID").unwrap_or_default(),
            spreadsheet_id: env.text("SHEETS_SPREADSHEET_ID").unwrap_or_default(),
        };

        let monitor_secs: u64 = env.parse_or("MONITOR_INTERVAL_SECS", defaults.monitor_interval.as_secs())?;
        if monitor_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "MONITOR_INTERVAL_SECS".into(),
                message: "must be at least 1".into(),
            });
        }

        Ok(Self {
            priority_threshold,
            retry,
            router,
            simulate_tools,
            targets,
            db_path: env.text("OPS_DB_PATH").map(PathBuf::from).unwrap_or(defaults.db_path),
            server: ServerConfig {
                host: env.text("HOST").unwrap_or(defaults.server.host),
                port: env.parse_or("PORT", defaults.server.port)?,
            },
            log_dir: env.text("OPS_LOG_DIR").map(PathBuf::from).unwrap_or(defaults.log_dir),
            monitor_interval: Duration::from_secs(monitor_secs),
        })
    }
}

fn parse_bool(v: &str) -> bool {
    matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

struct Env<F> {
    lookup: F,
}

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Trimmed, non-empty value.
    fn text(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn parse_or<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.text(key) {
            None => Ok(default),
            Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
                key: key.into(),
                message: format!("'{raw}': {e}"),
            }),
        }
    }

    fn parse_in<T>(&self, key: &str, default: T, min: T, max: T) -> Result<T, ConfigError>
    where
        T: FromStr + PartialOrd + std::fmt::Display + Copy,
        T::Err: std::fmt::Display,
    {
        let value = self.parse_or(key, default)?;
        if value < min || value > max {
            return Err(ConfigError::InvalidValue {
                key: key.into(),
                message: format!("{value} is outside {min}..={max}"),
            });
        }
        Ok(value)
    }
}
