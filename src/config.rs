//! Service settings.
//!
//! Read once at startup from an optional JSON file (`config.json`, or the
//! path in `LOCRELAY_CONFIG`) with `LOCRELAY_*` environment variables layered
//! on top.

use config::{Config, Environment, File};
use serde::Deserialize;

use crate::error::{Error, Result};

const ENV_PREFIX: &str = "LOCRELAY";
const DEFAULT_CONFIG_FILE: &str = "config.json";

#[derive(Clone, Deserialize)]
pub struct Settings {
    /// Telegram Bot API token.
    pub bot_token: String,

    /// Raises the log level of this crate to `debug`.
    #[serde(default)]
    pub bot_debug: bool,

    /// Externally reachable base URL, used for the webhook, subscription and
    /// picture URLs.
    pub server_path: String,

    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Maximum number of concurrent subscribers per subscription path.
    /// `0` disables the cap.
    #[serde(default)]
    pub group_limit: usize,

    #[serde(default)]
    pub fetch_user_pic: bool,

    /// Serve the map front-end from `static_dir`.
    #[serde(default)]
    pub enable_map: bool,

    #[serde(default = "default_static_dir")]
    pub static_dir: String,

    #[serde(default = "default_database_url")]
    pub database_url: String,

    #[serde(default)]
    pub allow_cors: bool,

    /// Updates accepted from the webhook but not yet processed.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_bind_address() -> String {
    "0.0.0.0:8080".to_owned()
}

fn default_static_dir() -> String {
    "./static".to_owned()
}

fn default_database_url() -> String {
    "sqlite://locbot.db".to_owned()
}

const fn default_queue_capacity() -> usize {
    256
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("bot_token", &"[redacted]")
            .field("bot_debug", &self.bot_debug)
            .field("server_path", &self.server_path)
            .field("bind_address", &self.bind_address)
            .field("group_limit", &self.group_limit)
            .field("fetch_user_pic", &self.fetch_user_pic)
            .field("enable_map", &self.enable_map)
            .field("static_dir", &self.static_dir)
            .field("database_url", &self.database_url)
            .field("allow_cors", &self.allow_cors)
            .field("queue_capacity", &self.queue_capacity)
            .finish()
    }
}

impl Settings {
    /// Settings with every optional field at its default.
    pub fn new(bot_token: impl Into<String>, server_path: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            bot_debug: false,
            server_path: server_path.into(),
            bind_address: default_bind_address(),
            group_limit: 0,
            fetch_user_pic: false,
            enable_map: false,
            static_dir: default_static_dir(),
            database_url: default_database_url(),
            allow_cors: false,
            queue_capacity: default_queue_capacity(),
        }
    }

    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();
        let path = std::env::var(format!("{ENV_PREFIX}_CONFIG"))
            .unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_owned());

        let config = Config::builder()
            .add_source(File::with_name(&path).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?;

        Self::from_config(config)
    }

    pub fn from_config(config: Config) -> Result<Self> {
        let mut settings: Self = config.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&mut self) -> Result<()> {
        if self.bot_token.trim().is_empty() {
            return Err(Error::Config("bot_token must not be empty".to_owned()));
        }

        let trimmed = self.server_path.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            return Err(Error::Config("server_path must not be empty".to_owned()));
        }
        self.server_path = trimmed.to_owned();

        if self.queue_capacity == 0 {
            self.queue_capacity = default_queue_capacity();
        }
        Ok(())
    }

    /// Public URL of a subscription stream.
    pub fn subscription_url(&self, secret: &str) -> String {
        format!("{}{}", self.server_path, crate::hub::channel_path(secret))
    }

    /// Public URL of a cached profile picture.
    pub fn picture_url(&self, handle: &str) -> String {
        format!("{}/pic/{handle}", self.server_path)
    }

    /// Public URL Telegram posts updates to.
    pub fn webhook_url(&self, hook_id: &str) -> String {
        format!("{}/hook/{hook_id}", self.server_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    fn from_json(json: &str) -> Result<Settings> {
        let config = Config::builder()
            .add_source(File::from_str(json, FileFormat::Json))
            .build()?;
        Settings::from_config(config)
    }

    #[test]
    fn defaults_fill_optional_fields() {
        let settings =
            from_json(r#"{"bot_token": "123:abc", "server_path": "https://example.org/loc/"}"#)
                .unwrap();

        assert_eq!(settings.server_path, "https://example.org/loc");
        assert_eq!(settings.bind_address, "0.0.0.0:8080");
        assert_eq!(settings.group_limit, 0);
        assert!(!settings.fetch_user_pic);
        assert!(!settings.enable_map);
        assert_eq!(settings.queue_capacity, 256);
    }

    #[test]
    fn original_file_keys_are_understood() {
        let settings = from_json(
            r#"{
                "bot_token": "123:abc",
                "bot_debug": true,
                "server_path": "https://example.org",
                "bind_address": "127.0.0.1:9000",
                "group_limit": 20,
                "fetch_user_pic": true,
                "enable_map": true
            }"#,
        )
        .unwrap();

        assert!(settings.bot_debug);
        assert_eq!(settings.bind_address, "127.0.0.1:9000");
        assert_eq!(settings.group_limit, 20);
        assert!(settings.fetch_user_pic);
        assert!(settings.enable_map);
    }

    #[test]
    fn empty_token_is_rejected() {
        let err =
            from_json(r#"{"bot_token": " ", "server_path": "https://example.org"}"#).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn missing_server_path_is_rejected() {
        assert!(from_json(r#"{"bot_token": "123:abc"}"#).is_err());
    }

    #[test]
    fn urls_are_built_from_server_path() {
        let settings =
            from_json(r#"{"bot_token": "t", "server_path": "https://example.org/"}"#).unwrap();

        assert_eq!(settings.subscription_url("abc"), "https://example.org/sub/abc");
        assert_eq!(settings.picture_url("h"), "https://example.org/pic/h");
        assert_eq!(settings.webhook_url("x"), "https://example.org/hook/x");
    }

    #[test]
    fn debug_output_hides_token() {
        let settings =
            from_json(r#"{"bot_token": "123:secret", "server_path": "https://e.org"}"#).unwrap();
        assert!(!format!("{settings:?}").contains("123:secret"));
    }
}
