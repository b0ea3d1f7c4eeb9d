use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{info, warn};

const CONFIG_DIR: &str = "lexia";
const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Default, Deserialize, Serialize, Clone, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub agent: AgentDefaults,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub streaming: StreamingConfig,
    #[serde(default)]
    pub attachments: AttachmentConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct AgentDefaults {
    #[serde(default = "AgentDefaults::default_model")]
    pub model: String,
    #[serde(default = "AgentDefaults::default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "AgentDefaults::default_temperature")]
    pub temperature: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_system_message: Option<String>,
    #[serde(default = "AgentDefaults::default_history_limit")]
    pub history_limit: usize,
}

impl Default for AgentDefaults {
    fn default() -> Self {
        Self {
            model: Self::default_model(),
            max_tokens: Self::default_max_tokens(),
            temperature: Self::default_temperature(),
            system_prompt: None,
            project_system_message: None,
            history_limit: Self::default_history_limit(),
        }
    }
}

impl AgentDefaults {
    fn default_model() -> String {
        "gpt-4o-mini".to_string()
    }

    const fn default_max_tokens() -> u32 {
        1000
    }

    const fn default_temperature() -> f32 {
        0.7
    }

    const fn default_history_limit() -> usize {
        10
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    /// Fallback key when a request carries no `OPENAI_API_KEY` variable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default = "ProviderConfig::default_base_url")]
    pub base_url: String,
    #[serde(default = "ProviderConfig::default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: Self::default_base_url(),
            timeout_secs: Self::default_timeout_secs(),
        }
    }
}

impl ProviderConfig {
    fn default_base_url() -> String {
        "https://api.openai.com/v1".to_string()
    }

    const fn default_timeout_secs() -> u64 {
        120
    }
}

/// Streaming transport: direct in-process streaming or the hosted relay.
#[derive(Debug, Default, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StreamMode {
    #[default]
    Dev,
    Prod,
}

impl fmt::Display for StreamMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dev => f.write_str("dev"),
            Self::Prod => f.write_str("prod"),
        }
    }
}

impl FromStr for StreamMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dev" | "development" => Ok(Self::Dev),
            "prod" | "production" => Ok(Self::Prod),
            other => anyhow::bail!("Unknown stream mode: {other} (expected dev or prod)"),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct StreamingConfig {
    #[serde(default)]
    pub mode: StreamMode,
    /// Publish endpoint of the relay, required in prod mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relay_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relay_api_key: Option<String>,
    #[serde(default = "StreamingConfig::default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            mode: StreamMode::Dev,
            relay_url: None,
            relay_api_key: None,
            timeout_secs: Self::default_timeout_secs(),
        }
    }
}

impl StreamingConfig {
    const fn default_timeout_secs() -> u64 {
        30
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct AttachmentConfig {
    #[serde(default = "AttachmentConfig::default_max_bytes")]
    pub max_bytes: usize,
    #[serde(default = "AttachmentConfig::default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for AttachmentConfig {
    fn default() -> Self {
        Self {
            max_bytes: Self::default_max_bytes(),
            timeout_secs: Self::default_timeout_secs(),
        }
    }
}

impl AttachmentConfig {
    const fn default_max_bytes() -> usize {
        20 * 1024 * 1024
    }

    const fn default_timeout_secs() -> u64 {
        30
    }
}

impl Config {
    pub fn config_dir() -> anyhow::Result<PathBuf> {
        Ok(dirs::home_dir()
            .ok_or_else(|| anyhow::anyhow!("Cannot find home directory"))?
            .join(CONFIG_DIR))
    }

    pub fn config_path() -> anyhow::Result<PathBuf> {
        Ok(Self::config_dir()?.join(CONFIG_FILE))
    }

    /// Load `~/lexia/config.json`, then apply environment overrides.
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            anyhow::bail!(
                "Config file not found at: {}. Please run 'lexia init' to create config.",
                config_path.display()
            );
        }

        let mut config = Self::load_from(&config_path)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Invalid config at {}: {e}", path.display()))?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Apply `OPENAI_API_KEY`, `LEXIA_STREAM_MODE`, `LEXIA_RELAY_URL` and
    /// `LEXIA_RELAY_API_KEY` from `lookup`. Blank values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = get("OPENAI_API_KEY") {
            self.provider.api_key = Some(key);
        }
        if let Some(mode) = get("LEXIA_STREAM_MODE") {
            match mode.parse() {
                Ok(mode) => self.streaming.mode = mode,
                Err(e) => warn!("Ignoring LEXIA_STREAM_MODE: {e}"),
            }
        }
        if let Some(url) = get("LEXIA_RELAY_URL") {
            self.streaming.relay_url = Some(url);
        }
        if let Some(key) = get("LEXIA_RELAY_API_KEY") {
            self.streaming.relay_api_key = Some(key);
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.streaming.mode == StreamMode::Prod && self.streaming.relay_url.is_none() {
            anyhow::bail!(
                "Streaming mode is prod but no relay is configured. Set \"streaming.relay_url\" or LEXIA_RELAY_URL"
            );
        }
        if self.agent.model.trim().is_empty() {
            anyhow::bail!("\"agent.model\" must not be empty");
        }
        Ok(())
    }

    pub fn ensure_config_dir() -> anyhow::Result<PathBuf> {
        let config_dir = Self::config_dir()?;
        std::fs::create_dir_all(&config_dir)?;
        Ok(config_dir)
    }

    pub fn create_config() -> anyhow::Result<()> {
        let config_dir = Self::ensure_config_dir()?;
        let config_path = config_dir.join(CONFIG_FILE);
        Self::write_template(&config_path)?;

        println!("✅ Created config file at: {}", config_path.display());
        println!();
        println!("📝 Next steps:");
        println!("   1. Add your OpenAI API key (or export OPENAI_API_KEY)");
        println!("   2. Keep streaming.mode = \"dev\" locally, use \"prod\" with a relay URL");
        println!("   3. Run 'lexia chat' to start a conversation");
        println!();
        Ok(())
    }

    /// Write the starter template, refusing to overwrite an existing file.
    pub fn write_template(path: &Path) -> anyhow::Result<()> {
        if path.exists() {
            anyhow::bail!(
                "Config file already exists at: {}. Please edit it directly.",
                path.display()
            );
        }

        let config_template = r#"{
  "agent": {
    "model": "gpt-4o-mini",
    "max_tokens": 1000,
    "temperature": 0.7,
    "system_prompt": "You are a helpful AI assistant.",
    "history_limit": 10
  },
  "provider": {
    "api_key": "your-openai-api-key-here",
    "base_url": "https://api.openai.com/v1",
    "timeout_secs": 120
  },
  "streaming": {
    "mode": "dev",
    "timeout_secs": 30
  },
  "attachments": {
    "max_bytes": 20971520,
    "timeout_secs": 30
  }
}"#;

        std::fs::write(path, config_template)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn empty_document_uses_defaults() -> anyhow::Result<()> {
        let config: Config = serde_json::from_str("{}")?;
        assert_eq!(config, Config::default());
        assert_eq!(config.agent.history_limit, 10);
        assert_eq!(config.agent.max_tokens, 1000);
        assert_eq!(config.streaming.mode, StreamMode::Dev);
        assert_eq!(config.provider.base_url, "https://api.openai.com/v1");
        Ok(())
    }

    #[test]
    fn template_parses_and_validates() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("config.json");

        Config::write_template(&path)?;
        let config = Config::load_from(&path)?;

        assert_eq!(config.agent.model, "gpt-4o-mini");
        assert_eq!(config.attachments.max_bytes, 20 * 1024 * 1024);
        config.validate()?;

        assert!(Config::write_template(&path).is_err());
        Ok(())
    }

    #[test]
    fn env_overrides_apply() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("OPENAI_API_KEY", "sk-env"),
            ("LEXIA_STREAM_MODE", "production"),
            ("LEXIA_RELAY_URL", "https://relay.example.com/api/publish"),
            ("LEXIA_RELAY_API_KEY", " "),
        ]);

        let mut config = Config::default();
        config.apply_overrides(|k| env.get(k).map(|v| (*v).to_string()));

        assert_eq!(config.provider.api_key.as_deref(), Some("sk-env"));
        assert_eq!(config.streaming.mode, StreamMode::Prod);
        assert_eq!(
            config.streaming.relay_url.as_deref(),
            Some("https://relay.example.com/api/publish")
        );
        assert_eq!(config.streaming.relay_api_key, None);
    }

    #[test]
    fn bad_stream_mode_is_ignored() {
        let mut config = Config::default();
        config.apply_overrides(|k| (k == "LEXIA_STREAM_MODE").then(|| "sideways".to_string()));
        assert_eq!(config.streaming.mode, StreamMode::Dev);
    }

    #[test]
    fn prod_without_relay_is_rejected() {
        let mut config = Config::default();
        config.streaming.mode = StreamMode::Prod;
        assert!(config.validate().is_err());

        config.streaming.relay_url = Some("https://relay".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn invalid_json_reports_path() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json")?;

        let err = Config::load_from(&path).err().map(|e| e.to_string());
        assert!(err.is_some_and(|e| e.contains("Invalid config")));
        Ok(())
    }
}
