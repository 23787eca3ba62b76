use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Environment variable holding the Telegram bot token.
pub const BOT_TOKEN_VAR: &str = "BOT_TOKEN";
/// Environment variable holding the OpenAI API key.
pub const OPENAI_API_KEY_VAR: &str = "OPENAI_API_KEY";
/// Optional override for the config file location.
pub const CONFIG_PATH_VAR: &str = "PLANTBOT_CONFIG";

const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Architecture {
    #[default]
    Resnet18,
    Resnet34,
    Resnet50,
    Resnet101,
    Resnet152,
}

impl std::fmt::Display for Architecture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Architecture::Resnet18 => write!(f, "resnet18"),
            Architecture::Resnet34 => write!(f, "resnet34"),
            Architecture::Resnet50 => write!(f, "resnet50"),
            Architecture::Resnet101 => write!(f, "resnet101"),
            Architecture::Resnet152 => write!(f, "resnet152"),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: SocketAddr,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct HttpConfig {
    /// Total timeout for every outbound call. Unset leaves reqwest's default (none).
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

#[derive(Deserialize, Clone)]
pub struct TelegramConfig {
    #[serde(skip)]
    pub bot_token: String,
    #[serde(default = "default_telegram_api_url")]
    pub api_url: String,
    /// Public URL registered with `setWebhook` at startup, if set.
    #[serde(default)]
    pub webhook_url: Option<String>,
}

#[derive(Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(skip)]
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ClassifierConfig {
    #[serde(default)]
    pub architecture: Architecture,
    #[serde(default = "default_weights_path")]
    pub weights: PathBuf,
    #[serde(default = "default_labels_path")]
    pub labels: PathBuf,
}

const REDACTED: &str = "<redacted>";

impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("bot_token", &REDACTED)
            .field("api_url", &self.api_url)
            .field("webhook_url", &self.webhook_url)
            .finish()
    }
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("api_key", &REDACTED)
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("system_prompt", &self.system_prompt)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

fn default_bind() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 5000))
}

fn default_telegram_api_url() -> String {
    "https://api.telegram.org".to_string()
}

fn default_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_llm_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_system_prompt() -> String {
    "You are a witty, emotional houseplant that gives helpful plant care advice.".to_string()
}

fn default_weights_path() -> PathBuf {
    PathBuf::from("models/resnet18.safetensors")
}

fn default_labels_path() -> PathBuf {
    PathBuf::from("models/imagenet_classes.txt")
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            api_url: default_telegram_api_url(),
            webhook_url: None,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: default_model(),
            base_url: default_llm_base_url(),
            system_prompt: default_system_prompt(),
            max_tokens: None,
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            architecture: Architecture::default(),
            weights: default_weights_path(),
            labels: default_labels_path(),
        }
    }
}

impl Config {
    /// Load from the process environment: the optional TOML file, then the
    /// two required secrets.
    pub fn load() -> Result<Self> {
        let explicit = std::env::var(CONFIG_PATH_VAR).ok().map(PathBuf::from);
        let content = match &explicit {
            Some(path) => Some(read_file(path)?),
            None => {
                let path = Path::new(DEFAULT_CONFIG_PATH);
                if path.exists() {
                    Some(read_file(path)?)
                } else {
                    None
                }
            }
        };

        Self::from_sources(content.as_deref(), |key| std::env::var(key).ok())
    }

    /// Build a config from optional TOML text and an environment lookup.
    pub fn from_sources<F>(toml_text: Option<&str>, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config: Config = match toml_text {
            Some(text) => toml::from_str(text).context("Failed to parse config file")?,
            None => Config::default(),
        };

        config.telegram.bot_token = required_secret(&env, BOT_TOKEN_VAR)?;
        config.llm.api_key = required_secret(&env, OPENAI_API_KEY_VAR)?;

        Ok(config)
    }
}

fn read_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))
}

fn required_secret<F>(env: &F, key: &str) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    match env(key) {
        Some(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
        _ => bail!("Missing required environment variable {}", key),
    }
}
