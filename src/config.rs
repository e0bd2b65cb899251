//! Configuration types.
//!
//! Everything is read from the environment (optionally seeded from a `.env`
//! file by `main`). Secrets are held as [`SecretString`] so they never show
//! up in `Debug` output or logs.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::channels::{ChatTarget, UserId};
use crate::error::ConfigError;

/// School 21 public OpenID endpoint used to obtain directory credentials.
pub const DEFAULT_AUTH_URL: &str =
    "https://auth.sberclass.ru/auth/realms/EduPowerKeycloak/protocol/openid-connect/token";

/// School 21 public API base URL.
pub const DEFAULT_API_BASE_URL: &str = "https://edu-api.21-school.ru/services/21-school/api/v1";

/// Client id registered for the open API.
pub const DEFAULT_CLIENT_ID: &str = "s21-open-api";

/// Identity directory (School 21 API) configuration.
#[derive(Debug, Clone)]
pub struct DirectoryConfig {
    /// Credential endpoint (password grant).
    pub auth_url: String,
    /// Base URL for profile lookups; `/participants/{handle}` is appended.
    pub api_base_url: String,
    pub client_id: String,
    pub username: Option<SecretString>,
    pub password: Option<SecretString>,
    /// Refresh the cached credential when less than this remains.
    pub refresh_margin: Duration,
    /// Per-request HTTP timeout.
    pub request_timeout: Duration,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            auth_url: DEFAULT_AUTH_URL.to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            client_id: DEFAULT_CLIENT_ID.to_string(),
            username: None,
            password: None,
            refresh_margin: Duration::from_secs(60),
            request_timeout: Duration::from_secs(15),
        }
    }
}

impl DirectoryConfig {
    /// Load directory settings. Missing credentials are not an error here;
    /// the client reports them on every lookup instead.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            auth_url: std::env::var("S21_AUTH_URL").unwrap_or(defaults.auth_url),
            api_base_url: std::env::var("S21_API_BASE_URL").unwrap_or(defaults.api_base_url),
            client_id: std::env::var("S21_CLIENT_ID").unwrap_or(defaults.client_id),
            username: non_empty_var("S21_USERNAME").map(SecretString::from),
            password: non_empty_var("S21_PASSWORD").map(SecretString::from),
            refresh_margin: std::env::var("S21_REFRESH_MARGIN_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.refresh_margin),
            request_timeout: defaults.request_timeout,
        }
    }

    /// Names of the secrets that are still missing.
    pub fn missing_secrets(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.username.is_none() {
            missing.push("S21_USERNAME");
        }
        if self.password.is_none() {
            missing.push("S21_PASSWORD");
        }
        missing
    }
}

/// Registration flow configuration.
#[derive(Debug, Clone)]
pub struct FlowConfig {
    /// The single identity allowed to run `/reset`; also receives error notices.
    pub operator_id: UserId,
    /// Destinations for order summaries and bonus proofs.
    pub notify_destinations: Vec<ChatTarget>,
    /// Channel the user must be subscribed to.
    pub subscription_channel: ChatTarget,
    /// URL behind the promo "contact" button.
    pub contact_url: String,
    /// Directory holding `<variant>.png` and `ad_sample.png`.
    pub images_dir: PathBuf,
}

impl FlowConfig {
    /// Public link to the subscription channel, if it is a `@username`.
    pub fn subscription_link(&self) -> Option<String> {
        self.subscription_channel
            .as_str()
            .strip_prefix('@')
            .map(|name| format!("https://t.me/{name}"))
    }

    /// Path of the image for a logo variant.
    pub fn variant_image(&self, variant: &str) -> PathBuf {
        self.images_dir.join(format!("{variant}.png"))
    }

    /// Path of the promotional image.
    pub fn promo_image(&self) -> PathBuf {
        self.images_dir.join("ad_sample.png")
    }
}

/// Full bot configuration.
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub bot_token: SecretString,
    pub db_path: PathBuf,
    /// Per-user dispatcher workers retire after this long without events.
    pub worker_idle_timeout: Duration,
    pub flow: FlowConfig,
    pub directory: DirectoryConfig,
}

impl BotConfig {
    /// Load the configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let bot_token = non_empty_var("BOT_TOKEN")
            .map(SecretString::from)
            .ok_or_else(|| ConfigError::MissingEnvVar("BOT_TOKEN".into()))?;

        let operator_raw = non_empty_var("BOT_OPERATOR_ID")
            .ok_or_else(|| ConfigError::MissingEnvVar("BOT_OPERATOR_ID".into()))?;
        let operator_id: UserId =
            operator_raw
                .trim()
                .parse()
                .map_err(|e: std::num::ParseIntError| ConfigError::InvalidValue {
                    key: "BOT_OPERATOR_ID".into(),
                    message: e.to_string(),
                })?;

        let mut notify_destinations = parse_targets(
            &std::env::var("BOT_NOTIFY_CHAT_IDS").unwrap_or_default(),
        );
        if notify_destinations.is_empty() {
            notify_destinations.push(ChatTarget::from(operator_id));
        }

        let subscription_channel = ChatTarget::new(
            std::env::var("BOT_SUBSCRIPTION_CHANNEL")
                .unwrap_or_else(|_| "@sticky_online_store".to_string()),
        );

        let contact_url = std::env::var("BOT_CONTACT_URL")
            .unwrap_or_else(|_| "https://t.me/JUST_Samir".to_string());

        let images_dir = std::env::var("BOT_IMAGES_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("images"));

        let db_path = std::env::var("BOT_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data/sticker_bot.db"));

        let worker_idle_timeout = std::env::var("BOT_WORKER_IDLE_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(600));

        Ok(Self {
            bot_token,
            db_path,
            worker_idle_timeout,
            flow: FlowConfig {
                operator_id,
                notify_destinations,
                subscription_channel,
                contact_url,
                images_dir,
            },
            directory: DirectoryConfig::from_env(),
        })
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Parse a comma-separated list of chat targets, skipping blanks.
pub fn parse_targets(raw: &str) -> Vec<ChatTarget> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ChatTarget::new)
        .collect()
}
