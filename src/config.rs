use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const SERVER_URL_ENV: &str = "WARDROOM_SERVER_URL";

/// Which storage tier holds the conversation id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ThreadStorage {
    /// Lives only as long as this client process; every launch starts a new case
    #[default]
    Tab,
    /// Persisted next to the user record; a restart resumes the same case
    Durable,
}

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the chat service
    pub server_url: String,

    /// Storage tier for the conversation id
    #[serde(default)]
    pub thread_storage: ThreadStorage,

    /// Per-request timeout, in seconds
    pub request_timeout_secs: u64,

    /// Client home directory (config, durable storage, logs)
    #[serde(skip)]
    pub home: PathBuf,

    /// Optional speech recognizer
    #[serde(default)]
    pub speech: SpeechConfig,

    /// UI preferences
    #[serde(default)]
    pub ui: UiConfig,
}

/// External speech recognizer configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpeechConfig {
    /// Program that prints one recognized utterance per line on stdout
    pub command: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
}

/// UI configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiConfig {
    pub transcript_limit: usize,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            transcript_limit: 500,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("~"));

        Config {
            server_url: "http://127.0.0.1:5000".to_string(),
            thread_storage: ThreadStorage::Tab,
            request_timeout_secs: 60,
            home: home.join(".wardroom"),
            speech: SpeechConfig::default(),
            ui: UiConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from `~/.wardroom/config.toml`, or from `home` when given
    pub fn load(home: Option<PathBuf>) -> Result<Self> {
        let home = match home {
            Some(home) => home,
            None => dirs::home_dir()
                .context("Could not find home directory")?
                .join(".wardroom"),
        };
        Self::load_from(&home)
    }

    /// Load configuration rooted at an explicit home directory
    pub fn load_from(home: &Path) -> Result<Self> {
        fs::create_dir_all(home).context("Failed to create .wardroom directory")?;

        let config_path = home.join("config.toml");
        let mut config = if config_path.exists() {
            let content = fs::read_to_string(&config_path)
                .context("Failed to read config file")?;
            toml::from_str(&content)
                .context("Failed to parse config file")?
        } else {
            Config::default()
        };

        config.home = home.to_path_buf();
        if let Ok(url) = std::env::var(SERVER_URL_ENV) {
            if !url.trim().is_empty() {
                config.server_url = url.trim().to_string();
            }
        }

        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        fs::create_dir_all(&self.home).context("Failed to create .wardroom directory")?;
        let content = toml::to_string_pretty(self)
            .context("Failed to serialize config")?;
        fs::write(self.config_path(), content)
            .context("Failed to write config file")?;
        Ok(())
    }

    pub fn config_path(&self) -> PathBuf {
        self.home.join("config.toml")
    }

    /// Path of the durable key/value store
    pub fn storage_path(&self) -> PathBuf {
        self.home.join("storage.json")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.home.join("logs")
    }

    /// Base URL without a trailing slash
    pub fn base_url(&self) -> &str {
        self.server_url.trim_end_matches('/')
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_when_file_is_missing() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(dir.path()).unwrap();

        assert_eq!(config.thread_storage, ThreadStorage::Tab);
        assert_eq!(config.request_timeout_secs, 60);
        assert_eq!(config.home, dir.path());
        assert!(config.speech.command.is_none());
    }

    #[test]
    fn save_then_load_keeps_settings() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::load_from(dir.path()).unwrap();
        config.server_url = "http://ward.example:8080/".to_string();
        config.thread_storage = ThreadStorage::Durable;
        config.speech.command = Some("listen".to_string());
        config.save().unwrap();

        let loaded = Config::load_from(dir.path()).unwrap();
        // The env override would mask the saved URL.
        if std::env::var(SERVER_URL_ENV).is_err() {
            assert_eq!(loaded.base_url(), "http://ward.example:8080");
        }
        assert_eq!(loaded.thread_storage, ThreadStorage::Durable);
        assert_eq!(loaded.speech.command.as_deref(), Some("listen"));
    }

    #[test]
    fn thread_storage_parses_lowercase() {
        let config: Config = toml::from_str(
            "server_url = \"http://x\"\nrequest_timeout_secs = 5\nthread_storage = \"durable\"\n",
        )
        .unwrap();
        assert_eq!(config.thread_storage, ThreadStorage::Durable);
        assert_eq!(config.ui.transcript_limit, 500);
    }
}
