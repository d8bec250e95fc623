use std::{
    collections::HashMap,
    fs, io,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;
use tracing::warn;
use url::Url;

use crate::error::ConfigError;

pub const DEFAULT_SERVER_URL: &str = "http://localhost:9000";
pub const DEFAULT_CONFIG_FILE: &str = "study_client.toml";
pub const DEFAULT_GREETING: &str = "Hello! Upload your course notes PDFs to start studying.";
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
const DEFAULT_CANNED_REPLY_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub server_url: Url,
    pub request_timeout: Duration,
    pub chat: ChatConfig,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatConfig {
    /// Assistant message the conversation opens with. In the config file,
    /// `show_greeting = false` disables it even when `greeting` is also set.
    pub greeting: Option<String>,
    /// Pause before the "upload first" reply when no documents exist.
    pub canned_reply_delay: Duration,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            greeting: Some(DEFAULT_GREETING.to_string()),
            canned_reply_delay: DEFAULT_CANNED_REPLY_DELAY,
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: Url::parse(DEFAULT_SERVER_URL).expect("default server url is valid"),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            chat: ChatConfig::default(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    server_url: Option<String>,
    request_timeout_secs: Option<u64>,
    greeting: Option<String>,
    show_greeting: Option<bool>,
    canned_reply_delay_ms: Option<u64>,
}

/// Loads defaults, then the config file, then environment overrides.
///
/// An explicitly named file must exist; the default file is optional.
pub fn load_config(path: Option<&Path>) -> Result<ClientConfig, ConfigError> {
    let (path, required) = match path {
        Some(path) => (path.to_path_buf(), true),
        None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
    };

    let raw = match fs::read_to_string(&path) {
        Ok(raw) => Some(raw),
        Err(err) if err.kind() == io::ErrorKind::NotFound && !required => None,
        Err(source) => return Err(ConfigError::Read { path, source }),
    };

    let env: HashMap<String, String> = std::env::vars().collect();
    ClientConfig::from_sources(raw.as_deref().map(|raw| (path.as_path(), raw)), &env)
}

impl ClientConfig {
    pub fn from_sources(
        file: Option<(&Path, &str)>,
        env: &HashMap<String, String>,
    ) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some((path, raw)) = file {
            let file_cfg: FileConfig = toml::from_str(raw).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
            config.apply_file(file_cfg)?;
        }

        config.apply_env(env)?;
        Ok(config)
    }

    pub fn with_server_url(mut self, raw: &str) -> Result<Self, ConfigError> {
        self.server_url = parse_server_url(raw)?;
        Ok(self)
    }

    fn apply_file(&mut self, file_cfg: FileConfig) -> Result<(), ConfigError> {
        if let Some(v) = file_cfg.server_url {
            self.server_url = parse_server_url(&v)?;
        }
        if let Some(v) = file_cfg.request_timeout_secs {
            self.request_timeout = Duration::from_secs(v);
        }
        if let Some(v) = file_cfg.greeting {
            self.chat.greeting = Some(v);
        }
        if file_cfg.show_greeting == Some(false) {
            self.chat.greeting = None;
        }
        if let Some(v) = file_cfg.canned_reply_delay_ms {
            self.chat.canned_reply_delay = Duration::from_millis(v);
        }
        Ok(())
    }

    fn apply_env(&mut self, env: &HashMap<String, String>) -> Result<(), ConfigError> {
        if let Some(v) = env_value(env, &["STUDY_SERVER_URL", "APP__SERVER_URL"]) {
            self.server_url = parse_server_url(v)?;
        }
        if let Some(secs) = env_number(env, "APP__REQUEST_TIMEOUT_SECS") {
            self.request_timeout = Duration::from_secs(secs);
        }
        if let Some(ms) = env_number(env, "APP__CANNED_REPLY_DELAY_MS") {
            self.chat.canned_reply_delay = Duration::from_millis(ms);
        }
        Ok(())
    }
}

// Later keys take precedence.
fn env_value<'a>(env: &'a HashMap<String, String>, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .rev()
        .find_map(|key| env.get(*key))
        .map(String::as_str)
}

fn env_number(env: &HashMap<String, String>, key: &str) -> Option<u64> {
    let raw = env.get(key)?;
    match raw.trim().parse::<u64>() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "ignoring non-numeric config override");
            None
        }
    }
}

fn parse_server_url(raw: &str) -> Result<Url, ConfigError> {
    let raw = raw.trim();
    let url = Url::parse(raw).map_err(|err| ConfigError::InvalidServerUrl {
        value: raw.to_string(),
        reason: err.to_string(),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidServerUrl {
            value: raw.to_string(),
            reason: "server url must start with http:// or https://".to_string(),
        });
    }
    Ok(url)
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
