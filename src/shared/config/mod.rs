//! Application configuration module
//!
//! `AppConfig` is assembled once at startup from three layers, later ones
//! overriding earlier ones:
//!
//! 1. built-in defaults
//! 2. an optional TOML file named by `AGORA_CONFIG`
//! 3. environment variables (`SERVER_PORT`, `SESSION_NAME`, ...)
//!
//! Durations are written as `24h`, `60m`, `45s`, `250ms`, or bare seconds.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Environment variable naming an optional TOML config file
pub const CONFIG_FILE_ENV: &str = "AGORA_CONFIG";

/// Tunables of the live channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RealtimeConfig {
    /// Frames buffered per client before it is considered stuck
    pub queue_capacity: usize,
    /// Interval between server pings
    pub ping_period: Duration,
    /// Read idle timeout, reset by any frame or pong
    pub pong_wait: Duration,
    /// Deadline for writing a single frame
    pub write_wait: Duration,
    /// Largest inbound frame accepted, in bytes
    pub max_frame_size: usize,
    /// Capacity of the hub command channel
    pub hub_capacity: usize,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 256,
            ping_period: Duration::from_secs(54),
            pong_wait: Duration::from_secs(60),
            write_wait: Duration::from_secs(10),
            max_frame_size: 8 * 1024,
            hub_capacity: 1024,
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub server_host: String,
    pub server_port: u16,
    pub database_url: String,
    /// Cookie name carrying the session id
    pub session_name: String,
    pub session_duration: Duration,
    /// Destroy sessions whose client IP moves outside the tolerated range
    pub session_ip_check: bool,
    pub cookie_secure: bool,
    /// bcrypt work factor for new password hashes
    pub password_hash_cost: u32,
    /// Exact-match CORS origins
    pub allowed_origins: Vec<String>,
    pub max_images_per_message: usize,
    /// Per-file byte cap for message images
    pub max_message_image_size: usize,
    pub rate_limit_window: Duration,
    pub rate_limit_requests: u32,
    pub upload_dir: PathBuf,
    pub realtime: RealtimeConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_host: "localhost".to_string(),
            server_port: 8080,
            database_url: "sqlite://./data/forum.db".to_string(),
            session_name: "forum_session".to_string(),
            session_duration: Duration::from_secs(24 * 60 * 60),
            session_ip_check: true,
            cookie_secure: false,
            password_hash_cost: 12,
            allowed_origins: vec!["http://localhost:3000".to_string()],
            max_images_per_message: 5,
            max_message_image_size: 20 * 1024 * 1024,
            rate_limit_window: Duration::from_secs(60 * 60),
            rate_limit_requests: 100_000,
            upload_dir: PathBuf::from("./uploads"),
            realtime: RealtimeConfig::default(),
        }
    }
}

/// Shape of the optional TOML file; every key may be omitted.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    server_host: Option<String>,
    server_port: Option<u16>,
    database_url: Option<String>,
    session_name: Option<String>,
    session_duration: Option<String>,
    session_ip_check: Option<bool>,
    cookie_secure: Option<bool>,
    password_hash_cost: Option<u32>,
    allowed_origins: Option<Vec<String>>,
    max_images_per_message: Option<usize>,
    max_message_image_size: Option<usize>,
    rate_limit_window: Option<String>,
    rate_limit_requests: Option<u32>,
    upload_dir: Option<PathBuf>,
    #[serde(default)]
    realtime: FileRealtimeConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileRealtimeConfig {
    queue_capacity: Option<usize>,
    ping_period: Option<String>,
    pong_wait: Option<String>,
    write_wait: Option<String>,
    max_frame_size: Option<usize>,
    hub_capacity: Option<usize>,
}

impl AppConfig {
    /// Create a new AppConfigBuilder seeded with defaults
    pub fn builder() -> AppConfigBuilder {
        AppConfigBuilder::default()
    }

    /// Load defaults, then `AGORA_CONFIG`, then the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Ok(path) = std::env::var(CONFIG_FILE_ENV) {
            config.apply_toml_file(Path::new(&path))?;
        }
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a complete configuration from TOML text on top of the defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_toml_str(text)?;
        config.validate()?;
        Ok(config)
    }

    fn apply_toml_file(&mut self, path: &Path) -> Result<(), ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.apply_toml_str(&text)
    }

    fn apply_toml_str(&mut self, text: &str) -> Result<(), ConfigError> {
        let file: FileConfig = toml::from_str(text)?;

        if let Some(v) = file.server_host {
            self.server_host = v;
        }
        if let Some(v) = file.server_port {
            self.server_port = v;
        }
        if let Some(v) = file.database_url {
            self.database_url = v;
        }
        if let Some(v) = file.session_name {
            self.session_name = v;
        }
        if let Some(v) = file.session_duration {
            self.session_duration = duration_value("session_duration", &v)?;
        }
        if let Some(v) = file.session_ip_check {
            self.session_ip_check = v;
        }
        if let Some(v) = file.cookie_secure {
            self.cookie_secure = v;
        }
        if let Some(v) = file.password_hash_cost {
            self.password_hash_cost = v;
        }
        if let Some(v) = file.allowed_origins {
            self.allowed_origins = v;
        }
        if let Some(v) = file.max_images_per_message {
            self.max_images_per_message = v;
        }
        if let Some(v) = file.max_message_image_size {
            self.max_message_image_size = v;
        }
        if let Some(v) = file.rate_limit_window {
            self.rate_limit_window = duration_value("rate_limit_window", &v)?;
        }
        if let Some(v) = file.rate_limit_requests {
            self.rate_limit_requests = v;
        }
        if let Some(v) = file.upload_dir {
            self.upload_dir = v;
        }

        let rt = file.realtime;
        if let Some(v) = rt.queue_capacity {
            self.realtime.queue_capacity = v;
        }
        if let Some(v) = rt.ping_period {
            self.realtime.ping_period = duration_value("realtime.ping_period", &v)?;
        }
        if let Some(v) = rt.pong_wait {
            self.realtime.pong_wait = duration_value("realtime.pong_wait", &v)?;
        }
        if let Some(v) = rt.write_wait {
            self.realtime.write_wait = duration_value("realtime.write_wait", &v)?;
        }
        if let Some(v) = rt.max_frame_size {
            self.realtime.max_frame_size = v;
        }
        if let Some(v) = rt.hub_capacity {
            self.realtime.hub_capacity = v;
        }
        Ok(())
    }

    /// Overlay values from an environment lookup.
    ///
    /// Takes the lookup as a closure so tests never touch the real process
    /// environment.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("SERVER_HOST") {
            self.server_host = v;
        }
        if let Some(v) = get("SERVER_PORT") {
            self.server_port = parsed_value("SERVER_PORT", &v)?;
        }
        if let Some(v) = get("DATABASE_URL") {
            self.database_url = v;
        }
        if let Some(v) = get("SESSION_NAME") {
            self.session_name = v;
        }
        if let Some(v) = get("SESSION_DURATION") {
            self.session_duration = duration_value("SESSION_DURATION", &v)?;
        }
        if let Some(v) = get("SESSION_IP_CHECK") {
            self.session_ip_check = bool_value("SESSION_IP_CHECK", &v)?;
        }
        if let Some(v) = get("COOKIE_SECURE") {
            self.cookie_secure = bool_value("COOKIE_SECURE", &v)?;
        }
        if let Some(v) = get("PASSWORD_HASH_COST") {
            self.password_hash_cost = parsed_value("PASSWORD_HASH_COST", &v)?;
        }
        if let Some(v) = get("ALLOWED_ORIGINS") {
            self.allowed_origins = v
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(v) = get("MAX_IMAGES_PER_MESSAGE") {
            self.max_images_per_message = parsed_value("MAX_IMAGES_PER_MESSAGE", &v)?;
        }
        if let Some(v) = get("MAX_MESSAGE_IMAGE_SIZE") {
            self.max_message_image_size = parsed_value("MAX_MESSAGE_IMAGE_SIZE", &v)?;
        }
        if let Some(v) = get("RATE_LIMIT_WINDOW") {
            self.rate_limit_window = duration_value("RATE_LIMIT_WINDOW", &v)?;
        }
        if let Some(v) = get("RATE_LIMIT_REQUESTS") {
            self.rate_limit_requests = parsed_value("RATE_LIMIT_REQUESTS", &v)?;
        }
        if let Some(v) = get("UPLOAD_DIR") {
            self.upload_dir = PathBuf::from(v);
        }
        if let Some(v) = get("WS_QUEUE_CAPACITY") {
            self.realtime.queue_capacity = parsed_value("WS_QUEUE_CAPACITY", &v)?;
        }
        if let Some(v) = get("WS_PING_PERIOD") {
            self.realtime.ping_period = duration_value("WS_PING_PERIOD", &v)?;
        }
        if let Some(v) = get("WS_PONG_WAIT") {
            self.realtime.pong_wait = duration_value("WS_PONG_WAIT", &v)?;
        }
        if let Some(v) = get("WS_WRITE_WAIT") {
            self.realtime.write_wait = duration_value("WS_WRITE_WAIT", &v)?;
        }
        if let Some(v) = get("WS_MAX_FRAME_SIZE") {
            self.realtime.max_frame_size = parsed_value("WS_MAX_FRAME_SIZE", &v)?;
        }
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server_port == 0 {
            return Err(ConfigError::Invalid("server_port must be non-zero".into()));
        }
        if self.session_name.trim().is_empty() {
            return Err(ConfigError::Invalid("session_name must not be empty".into()));
        }
        if self.session_duration.is_zero() {
            return Err(ConfigError::Invalid("session_duration must be positive".into()));
        }
        if !(4..=31).contains(&self.password_hash_cost) {
            return Err(ConfigError::Invalid("password_hash_cost must be between 4 and 31".into()));
        }
        if self.max_images_per_message == 0 || self.max_message_image_size == 0 {
            return Err(ConfigError::Invalid("image limits must be positive".into()));
        }
        if self.rate_limit_requests == 0 || self.rate_limit_window.is_zero() {
            return Err(ConfigError::Invalid("rate limit must allow at least one request".into()));
        }
        let rt = &self.realtime;
        if rt.queue_capacity == 0 || rt.hub_capacity == 0 || rt.max_frame_size == 0 {
            return Err(ConfigError::Invalid("realtime capacities must be positive".into()));
        }
        if rt.ping_period >= rt.pong_wait {
            return Err(ConfigError::Invalid(format!(
                "ping period ({:?}) must be shorter than pong wait ({:?})",
                rt.ping_period, rt.pong_wait
            )));
        }
        Ok(())
    }

    /// `host:port` to bind
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }

    /// Largest request body the send endpoint must accept
    pub fn upload_body_limit(&self) -> usize {
        self.max_images_per_message
            .saturating_mul(self.max_message_image_size)
            .saturating_add(1024 * 1024)
    }
}

/// Builder for AppConfig
#[derive(Debug, Default)]
pub struct AppConfigBuilder {
    config: AppConfig,
}

impl AppConfigBuilder {
    pub fn server_host(mut self, host: impl Into<String>) -> Self {
        self.config.server_host = host.into();
        self
    }

    pub fn server_port(mut self, port: u16) -> Self {
        self.config.server_port = port;
        self
    }

    pub fn database_url(mut self, url: impl Into<String>) -> Self {
        self.config.database_url = url.into();
        self
    }

    pub fn session_name(mut self, name: impl Into<String>) -> Self {
        self.config.session_name = name.into();
        self
    }

    pub fn session_duration(mut self, duration: Duration) -> Self {
        self.config.session_duration = duration;
        self
    }

    pub fn session_ip_check(mut self, enabled: bool) -> Self {
        self.config.session_ip_check = enabled;
        self
    }

    pub fn cookie_secure(mut self, secure: bool) -> Self {
        self.config.cookie_secure = secure;
        self
    }

    pub fn password_hash_cost(mut self, cost: u32) -> Self {
        self.config.password_hash_cost = cost;
        self
    }

    pub fn allowed_origins<I, S>(mut self, origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.allowed_origins = origins.into_iter().map(Into::into).collect();
        self
    }

    pub fn max_images_per_message(mut self, max: usize) -> Self {
        self.config.max_images_per_message = max;
        self
    }

    pub fn max_message_image_size(mut self, bytes: usize) -> Self {
        self.config.max_message_image_size = bytes;
        self
    }

    pub fn rate_limit(mut self, requests: u32, window: Duration) -> Self {
        self.config.rate_limit_requests = requests;
        self.config.rate_limit_window = window;
        self
    }

    pub fn upload_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.upload_dir = dir.into();
        self
    }

    pub fn realtime(mut self, realtime: RealtimeConfig) -> Self {
        self.config.realtime = realtime;
        self
    }

    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.realtime.queue_capacity = capacity;
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<AppConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
    #[error("failed to read config file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

fn parsed_value<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key: key.to_string(),
        value: raw.to_string(),
        reason: e.to_string(),
    })
}

fn bool_value(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: raw.to_string(),
            reason: "expected a boolean".to_string(),
        }),
    }
}

fn duration_value(key: &str, raw: &str) -> Result<Duration, ConfigError> {
    parse_duration(raw).ok_or_else(|| ConfigError::InvalidValue {
        key: key.to_string(),
        value: raw.to_string(),
        reason: "expected a duration such as 24h, 60m, 45s or 250ms".to_string(),
    })
}

/// Parse `24h`, `60m`, `45s`, `250ms` or a bare number of seconds.
pub fn parse_duration(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    let split = raw
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(raw.len());
    let (digits, unit) = raw.split_at(split);
    let amount: u64 = digits.parse().ok()?;
    match unit.trim() {
        "" | "s" => Some(Duration::from_secs(amount)),
        "ms" => Some(Duration::from_millis(amount)),
        "m" => amount.checked_mul(60).map(Duration::from_secs),
        "h" => amount.checked_mul(3600).map(Duration::from_secs),
        _ => None,
    }
}
